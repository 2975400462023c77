// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    coroutine::{
        operation::{
            DeferredCall,
            Payload,
        },
        trampoline::FinalCallback,
    },
    runtime::fail::Fail,
};
use ::std::fmt;

//======================================================================================================================
// Structures
//======================================================================================================================

/// The final value carried by an [EarlyReturn].
pub enum ReturnValue<V: Payload> {
    Value(V),
    /// Chain to the final value of another coroutine.
    Deferred(DeferredCall<V>),
}

/// Terminates a coroutine immediately with a final value.
pub struct EarlyReturn<V: Payload>(ReturnValue<V>);

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Builds an early return with a plain value.
pub fn early_return<V: Payload>(value: V) -> EarlyReturn<V> {
    EarlyReturn(ReturnValue::Value(value))
}

/// Builds an early return whose final value is the result of another deferred coroutine invocation.
pub fn early_return_call<V: Payload>(call: DeferredCall<V>) -> EarlyReturn<V> {
    EarlyReturn(ReturnValue::Deferred(call))
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl<V: Payload> EarlyReturn<V> {
    pub fn new(value: ReturnValue<V>) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &ReturnValue<V> {
        &self.0
    }

    pub fn into_value(self) -> ReturnValue<V> {
        self.0
    }

    /// Returns true if the final value is a deferred coroutine invocation.
    pub fn is_deferred(&self) -> bool {
        matches!(self.0, ReturnValue::Deferred(_))
    }

    /// Hands the final value to `final_callback`. A deferred invocation is started with `final_callback` instead.
    pub fn deliver(self, final_callback: FinalCallback<V>) -> Result<(), Fail> {
        match self.0 {
            ReturnValue::Value(value) => final_callback(value),
            ReturnValue::Deferred(call) => call.start(final_callback),
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl<V: Payload + fmt::Debug> fmt::Debug for ReturnValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnValue::Value(value) => write!(f, "{:?}", value),
            ReturnValue::Deferred(call) => write!(f, "{:?}", call),
        }
    }
}

impl<V: Payload + fmt::Debug> fmt::Debug for EarlyReturn<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Yielded {:?}>", self.0)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
