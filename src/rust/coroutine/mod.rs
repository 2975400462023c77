// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Resumable computations and the trampoline that drives them.
//!
//! A [Coroutine] is an explicit state machine. Each call to [Coroutine::resume] hands it the outcome of the operation
//! it last asked for and gets back the next [Step]: another operation to wait on, an early return, a normal
//! completion, or a failure. [Trampoline] owns the coroutine for the whole run and performs every resumption from a
//! scheduler callback.

mod early_return;
mod operation;
mod suspender;
mod trampoline;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    early_return::{
        early_return,
        early_return_call,
        EarlyReturn,
        ReturnValue,
    },
    operation::{
        Arg,
        DeferredCall,
        Operation,
        Payload,
        Reply,
    },
    suspender::{
        AsyncCoroutine,
        Exit,
        Suspender,
        Wait,
    },
    trampoline::{
        Continuation,
        FinalCallback,
        SharedTrampoline,
        Status,
        Trampoline,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// What a coroutine receives when it is resumed normally.
#[derive(Debug, PartialEq)]
pub enum Received<V> {
    /// Advance without a value.
    Nothing,
    /// A single result.
    One(V),
    /// A multi-valued result delivered as one composite. Members reported as null are None.
    Many(Vec<Option<V>>),
}

/// How a coroutine is resumed.
#[derive(Debug, PartialEq)]
pub enum Resumption<V> {
    Send(Received<V>),
    /// Raise the error at the current suspension point.
    Throw(Fail),
}

/// Outcome of a single resumption.
pub enum Step<V: Payload> {
    /// The coroutine is suspended until this operation reports back.
    Pending(Operation<V>),
    /// The coroutine terminated with a final value.
    EarlyReturn(EarlyReturn<V>),
    /// The coroutine ran off its end without an explicit return.
    Completed,
    /// An error escaped the coroutine.
    Failed(Fail),
}

pub type BoxCoroutine<V> = Box<dyn Coroutine<V>>;

//======================================================================================================================
// Traits
//======================================================================================================================

/// A computation that suspends at well-defined points and is resumed with a value or an error.
pub trait Coroutine<V: Payload> {
    /// Resumes the coroutine. Once a terminal [Step] has been returned, further resumptions must return
    /// [Step::Failed].
    fn resume(&mut self, resumption: Resumption<V>) -> Step<V>;

    /// Resumes with no value.
    fn next(&mut self) -> Step<V> {
        self.resume(Resumption::Send(Received::Nothing))
    }

    fn send(&mut self, value: V) -> Step<V> {
        self.resume(Resumption::Send(Received::One(value)))
    }

    /// Resumes with several values delivered as one composite.
    fn send_multi(&mut self, values: Vec<V>) -> Step<V> {
        self.resume(Resumption::Send(Received::Many(values.into_iter().map(Some).collect())))
    }

    fn throw(&mut self, e: Fail) -> Step<V> {
        self.resume(Resumption::Throw(e))
    }
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl<V> Received<V> {
    /// Unwraps a single result.
    pub fn into_one(self) -> Result<V, Fail> {
        match self {
            Received::One(value) => Ok(value),
            Received::Nothing => Err(Fail::new(libc::EINVAL, "expected a single result but received none")),
            Received::Many(values) => {
                let cause: String = format!("expected a single result but received {}", values.len());
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }

    /// Flattens into a list of results, keeping null members of a composite as None.
    pub fn into_vec(self) -> Vec<Option<V>> {
        match self {
            Received::Nothing => Vec::new(),
            Received::One(value) => vec![Some(value)],
            Received::Many(values) => values,
        }
    }
}

impl<V: Payload> Step<V> {
    /// Returns a short name of the step for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Pending(op) if op.is_deferred() => "pending(deferred)",
            Step::Pending(_) => "pending",
            Step::EarlyReturn(_) => "early-return",
            Step::Completed => "completed",
            Step::Failed(_) => "failed",
        }
    }

    /// Returns true if no further resumption may follow this step.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Step::Pending(_))
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
