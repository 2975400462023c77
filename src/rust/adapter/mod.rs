// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Adapters that turn routines into callback-style calls.
//!
//! [Asynchronous] runs a coroutine routine under a fresh trampoline each time it is called, or calls a plain routine
//! synchronously. Either way the value goes to the final callback fixed at wrap time, if there is one. [AsyncReturn]
//! postpones the call: it hands back a [DeferredCall] that starts the coroutine only once someone supplies the
//! callback that should receive its final value. A deferred call can be waited on like any other operation or
//! returned early from another coroutine, which chains the two results.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    coroutine::{
        BoxCoroutine,
        DeferredCall,
        FinalCallback,
        Payload,
        SharedTrampoline,
        Trampoline,
    },
    runtime::{
        fail::Fail,
        scheduler::SharedScheduler,
    },
    sink::{
        CompletionSink,
        SharedSink,
    },
};
use ::std::{
    cell::RefCell,
    rc::Rc,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// A function that can be adapted.
pub enum Routine<A, V: Payload> {
    /// Builds a coroutine that suspends on operations.
    Coroutine(Rc<dyn Fn(A) -> BoxCoroutine<V>>),
    /// Computes its result synchronously.
    Plain(Rc<dyn Fn(A) -> V>),
}

/// Result of calling an adapted routine.
pub enum Outcome<V: Payload> {
    /// A trampoline is now driving the coroutine.
    Running(SharedTrampoline<V>),
    /// A plain routine returned this value and no final callback was given.
    Returned(V),
    /// A plain routine's value was handed to the final callback.
    Delivered,
}

/// Final callback fixed when a routine is wrapped. Shared by every call of the adapter.
type WrappedCallback<V> = Rc<dyn Fn(V) -> Result<(), Fail>>;

/// Direct-mode adapter bound to a scheduler.
pub struct Asynchronous<A, V: Payload> {
    name: String,
    scheduler: SharedScheduler,
    routine: Routine<A, V>,
    callback: Option<WrappedCallback<V>>,
}

/// Deferred-construction adapter bound to a scheduler.
pub struct AsyncReturn<A, V: Payload> {
    inner: Rc<Asynchronous<A, V>>,
}

//======================================================================================================================
// Traits
//======================================================================================================================

/// Arguments of an adapted routine. If the first argument is a completion sink, the trampoline reports to it.
pub trait Arguments: 'static {
    fn completion_sink(&self) -> Option<SharedSink> {
        None
    }
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl<A, V: Payload> Routine<A, V> {
    pub fn coroutine<F>(f: F) -> Self
    where
        F: Fn(A) -> BoxCoroutine<V> + 'static,
    {
        Routine::Coroutine(Rc::new(f))
    }

    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(A) -> V + 'static,
    {
        Routine::Plain(Rc::new(f))
    }

    pub fn is_coroutine(&self) -> bool {
        matches!(self, Routine::Coroutine(_))
    }
}

impl<A: Arguments, V: Payload> Asynchronous<A, V> {
    pub fn new(name: &str, scheduler: SharedScheduler, routine: Routine<A, V>) -> Self {
        Self {
            name: name.to_string(),
            scheduler,
            routine,
            callback: None,
        }
    }

    /// Wraps `routine` together with the final callback that [Asynchronous::call] reports to.
    pub fn with_callback<F>(name: &str, scheduler: SharedScheduler, routine: Routine<A, V>, callback: F) -> Self
    where
        F: Fn(V) -> Result<(), Fail> + 'static,
    {
        let callback: WrappedCallback<V> = Rc::new(callback);
        Self {
            callback: Some(callback),
            ..Self::new(name, scheduler, routine)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls the routine. The value is handed to the callback given at wrap time, if any.
    pub fn call(&self, args: A) -> Result<Outcome<V>, Fail> {
        let final_callback: Option<FinalCallback<V>> = self.callback.clone().map(|callback| {
            let final_callback: FinalCallback<V> = Box::new(move |value: V| callback(value));
            final_callback
        });
        self.dispatch(args, final_callback)
    }

    /// Calls the routine. `final_callback` receives the value the coroutine returns early with, or the value of a
    /// plain routine. It takes the place of any callback given at wrap time.
    pub fn call_with_callback(&self, args: A, final_callback: FinalCallback<V>) -> Result<Outcome<V>, Fail> {
        self.dispatch(args, Some(final_callback))
    }

    fn dispatch(&self, args: A, final_callback: Option<FinalCallback<V>>) -> Result<Outcome<V>, Fail> {
        match &self.routine {
            Routine::Plain(f) => {
                trace!("dispatch(): calling plain routine {}", self.name);
                let value: V = f(args);
                match final_callback {
                    Some(final_callback) => {
                        final_callback(value)?;
                        Ok(Outcome::Delivered)
                    },
                    None => Ok(Outcome::Returned(value)),
                }
            },
            Routine::Coroutine(f) => {
                let sink: Option<SharedSink> = args.completion_sink();
                let coroutine: BoxCoroutine<V> = f(args);
                let trampoline: SharedTrampoline<V> =
                    Trampoline::start(&self.name, self.scheduler.clone(), coroutine, sink, final_callback)?;
                Ok(Outcome::Running(trampoline))
            },
        }
    }
}

impl<A: Arguments, V: Payload> AsyncReturn<A, V> {
    /// Wraps `routine`. Fails right away if it is not a coroutine routine.
    pub fn new(name: &str, scheduler: SharedScheduler, routine: Routine<A, V>) -> Result<Self, Fail> {
        if !routine.is_coroutine() {
            let cause: String = format!("cannot defer {}: routine never suspends", name);
            error!("new(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        Ok(Self {
            inner: Rc::new(Asynchronous::new(name, scheduler, routine)),
        })
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Captures `args` without running anything. The coroutine starts when the returned call is started.
    pub fn call(&self, args: A) -> DeferredCall<V> {
        let inner: Rc<Asynchronous<A, V>> = self.inner.clone();
        DeferredCall::new(self.inner.name(), move |final_callback: FinalCallback<V>| {
            inner.call_with_callback(args, final_callback).map(|_| ())
        })
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl<A, V: Payload> Clone for Routine<A, V> {
    fn clone(&self) -> Self {
        match self {
            Routine::Coroutine(f) => Routine::Coroutine(f.clone()),
            Routine::Plain(f) => Routine::Plain(f.clone()),
        }
    }
}

impl<A, V: Payload> Clone for AsyncReturn<A, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

macro_rules! plain_arguments {
    ($($t:ty),* $(,)?) => {
        $(impl Arguments for $t {})*
    };
}

plain_arguments!(
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

impl<T: 'static> Arguments for Vec<T> {}

impl Arguments for SharedSink {
    fn completion_sink(&self) -> Option<SharedSink> {
        Some(self.clone())
    }
}

impl<S: CompletionSink + 'static> Arguments for Rc<RefCell<S>> {
    fn completion_sink(&self) -> Option<SharedSink> {
        let sink: SharedSink = self.clone();
        Some(sink)
    }
}

impl<A: Arguments, B: 'static> Arguments for (A, B) {
    fn completion_sink(&self) -> Option<SharedSink> {
        self.0.completion_sink()
    }
}

impl<A: Arguments, B: 'static, C: 'static> Arguments for (A, B, C) {
    fn completion_sink(&self) -> Option<SharedSink> {
        self.0.completion_sink()
    }
}

impl<A: Arguments, B: 'static, C: 'static, D: 'static> Arguments for (A, B, C, D) {
    fn completion_sink(&self) -> Option<SharedSink> {
        self.0.completion_sink()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
