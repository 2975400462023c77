// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    coroutine::trampoline::{
        Continuation,
        FinalCallback,
    },
    runtime::{
        fail::Fail,
        scheduler::SharedScheduler,
    },
};
use ::std::fmt;

//======================================================================================================================
// Structures
//======================================================================================================================

/// A positional argument delivered to a [Continuation].
#[derive(Debug, PartialEq)]
pub enum Arg<V> {
    Value(V),
    /// Conventionally passed in last position to mean "no error".
    Null,
    Error(Fail),
}

/// Network-style result that carries its own error.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    /// Status code reported by the peer.
    pub code: u16,
    /// Payload.
    pub body: Vec<u8>,
    /// Set if the exchange failed. A reply with an error is thrown into the waiting coroutine.
    pub error: Option<Fail>,
}

/// A pending asynchronous operation. Invoking it with a continuation starts the real work, which must eventually
/// report back through that continuation.
pub enum Operation<V: Payload> {
    Callable(Box<dyn FnOnce(Continuation<V>) -> Result<(), Fail>>),
    /// A wrapped coroutine invocation that has not started yet.
    Deferred(DeferredCall<V>),
}

/// A coroutine invocation whose construction is postponed until someone supplies the callback that should receive
/// its final value.
pub struct DeferredCall<V: Payload> {
    /// Name of the wrapped routine, for logging.
    name: String,
    start: Box<dyn FnOnce(FinalCallback<V>) -> Result<(), Fail>>,
}

//======================================================================================================================
// Traits
//======================================================================================================================

/// Values that may travel through a continuation.
pub trait Payload: 'static {
    /// Returns the error carried by a result wrapper, if any.
    fn error(&self) -> Option<&Fail> {
        None
    }
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Reply {
    pub fn new(code: u16, body: Vec<u8>) -> Self {
        Self {
            code,
            body,
            error: None,
        }
    }

    pub fn failed(code: u16, error: Fail) -> Self {
        Self {
            code,
            body: Vec::new(),
            error: Some(error),
        }
    }
}

impl<V: Payload> Operation<V> {
    /// Wraps a callable that takes the continuation.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Continuation<V>) -> Result<(), Fail> + 'static,
    {
        Operation::Callable(Box::new(f))
    }

    /// An operation that reports `value` as soon as it is invoked.
    pub fn ready(value: V) -> Self {
        Self::new(move |continuation: Continuation<V>| continuation.resolve(value))
    }

    /// An operation that reports `e` as soon as it is invoked.
    pub fn failed(e: Fail) -> Self {
        Self::new(move |continuation: Continuation<V>| continuation.reject(e))
    }

    /// An operation that reports `args` from a later scheduler callback, the way real I/O completes.
    pub fn later(scheduler: SharedScheduler, args: Vec<Arg<V>>) -> Self {
        Self::new(move |continuation: Continuation<V>| {
            scheduler.add_callback(Box::new(move || continuation.call(args)));
            Ok(())
        })
    }

    /// Returns true if this operation wraps a deferred coroutine invocation.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Operation::Deferred(_))
    }

    /// Starts the operation. A deferred invocation is started with a final callback that resumes `continuation`
    /// with the invocation's final value.
    pub fn invoke(self, continuation: Continuation<V>) -> Result<(), Fail> {
        match self {
            Operation::Callable(f) => f(continuation),
            Operation::Deferred(call) => call.start(Box::new(move |value: V| continuation.resolve(value))),
        }
    }
}

impl<V: Payload> DeferredCall<V> {
    pub fn new<F>(name: &str, start: F) -> Self
    where
        F: FnOnce(FinalCallback<V>) -> Result<(), Fail> + 'static,
    {
        Self {
            name: name.to_string(),
            start: Box::new(start),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constructs and starts the underlying coroutine. `final_callback` receives the value it returns early with.
    pub fn start(self, final_callback: FinalCallback<V>) -> Result<(), Fail> {
        trace!("start(): deferred call {}", self.name);
        (self.start)(final_callback)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

macro_rules! plain_payload {
    ($($t:ty),* $(,)?) => {
        $(impl Payload for $t {})*
    };
}

plain_payload!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str,
);

impl<T: Payload> Payload for Vec<T> {}

impl<T: Payload> Payload for Option<T> {
    fn error(&self) -> Option<&Fail> {
        self.as_ref().and_then(T::error)
    }
}

impl Payload for Reply {
    fn error(&self) -> Option<&Fail> {
        self.error.as_ref()
    }
}

impl<V> From<V> for Arg<V> {
    fn from(value: V) -> Self {
        Arg::Value(value)
    }
}

impl<V: Payload> From<DeferredCall<V>> for Operation<V> {
    fn from(call: DeferredCall<V>) -> Self {
        Operation::Deferred(call)
    }
}

impl<V: Payload> fmt::Debug for Operation<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Callable(_) => write!(f, "Operation::Callable"),
            Operation::Deferred(call) => write!(f, "Operation::Deferred({:?})", call),
        }
    }
}

impl<V: Payload> fmt::Debug for DeferredCall<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<DeferredCall {}>", self.name)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
