// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Runs an `async` block as a [Coroutine].
//!
//! The block receives a [Suspender] and awaits operations through it. Awaiting parks the operation in a slot shared
//! with the [AsyncCoroutine] and returns pending; the coroutine hands the parked operation to its trampoline as the
//! next step. When the trampoline resumes the coroutine, the outcome is placed in the same slot and the block is
//! polled again, which completes the await.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    coroutine::{
        early_return::EarlyReturn,
        operation::{
            Operation,
            Payload,
        },
        BoxCoroutine,
        Coroutine,
        Received,
        Resumption,
        Step,
    },
    runtime::fail::Fail,
};
use ::futures::task::noop_waker_ref;
use ::std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{
        Context,
        Poll,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// What an `async` coroutine body evaluates to: `Some` for an early return, `None` for running off the end.
pub type Exit<V> = Result<Option<EarlyReturn<V>>, Fail>;

type Body<V> = Pin<Box<dyn Future<Output = Exit<V>>>>;

/// Slot shared between a body and its coroutine.
struct Channel<V: Payload> {
    /// Operation the body is waiting on.
    request: Option<Operation<V>>,
    /// Outcome to complete the wait with.
    delivery: Option<Resumption<V>>,
}

/// Lets an `async` coroutine body wait on operations.
pub struct Suspender<V: Payload>(Rc<RefCell<Channel<V>>>);

/// Future that suspends the body on a single operation.
pub struct Wait<V: Payload> {
    /// The operation to request. Taken on first poll.
    operation: Option<Operation<V>>,
    channel: Suspender<V>,
}

/// A [Coroutine] backed by an `async` block.
pub struct AsyncCoroutine<V: Payload> {
    channel: Suspender<V>,
    /// None once the body has terminated.
    body: Option<Body<V>>,
    started: bool,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl<V: Payload> Suspender<V> {
    /// Suspends until `operation` reports back. Errors it reports are returned as `Err`.
    pub fn wait<O: Into<Operation<V>>>(&self, operation: O) -> Wait<V> {
        Wait {
            operation: Some(operation.into()),
            channel: self.clone(),
        }
    }

    /// Same as `wait` but expects exactly one result.
    pub async fn wait_value<O: Into<Operation<V>>>(&self, operation: O) -> Result<V, Fail> {
        self.wait(operation).await?.into_one()
    }

    /// Same as `wait` but flattens the results into a list. Null members of a composite are None.
    pub async fn wait_values<O: Into<Operation<V>>>(&self, operation: O) -> Result<Vec<Option<V>>, Fail> {
        Ok(self.wait(operation).await?.into_vec())
    }
}

impl<V: Payload> AsyncCoroutine<V> {
    /// Creates a coroutine from a function that builds the body. The body does not run until the first resumption.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Suspender<V>) -> Fut,
        Fut: Future<Output = Exit<V>> + 'static,
    {
        let channel: Suspender<V> = Suspender(Rc::new(RefCell::new(Channel {
            request: None,
            delivery: None,
        })));
        Self {
            body: Some(Box::pin(f(channel.clone()))),
            channel,
            started: false,
        }
    }

    pub fn boxed<F, Fut>(f: F) -> BoxCoroutine<V>
    where
        F: FnOnce(Suspender<V>) -> Fut,
        Fut: Future<Output = Exit<V>> + 'static,
    {
        Box::new(Self::new(f))
    }

    fn terminate(&mut self, step: Step<V>) -> Step<V> {
        self.body = None;
        let mut channel = self.channel.0.borrow_mut();
        channel.request = None;
        channel.delivery = None;
        step
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl<V: Payload> Clone for Suspender<V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<V: Payload> Future for Wait<V> {
    type Output = Result<Received<V>, Fail>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context) -> Poll<Self::Output> {
        let self_: &mut Self = self.get_mut();

        // First poll: park the operation and suspend.
        if let Some(operation) = self_.operation.take() {
            self_.channel.0.borrow_mut().request = Some(operation);
            return Poll::Pending;
        }

        let delivery: Option<Resumption<V>> = self_.channel.0.borrow_mut().delivery.take();
        match delivery {
            Some(Resumption::Send(received)) => Poll::Ready(Ok(received)),
            Some(Resumption::Throw(e)) => Poll::Ready(Err(e)),
            None => Poll::Pending,
        }
    }
}

impl<V: Payload> Coroutine<V> for AsyncCoroutine<V> {
    fn resume(&mut self, resumption: Resumption<V>) -> Step<V> {
        if self.body.is_none() {
            return Step::Failed(Fail::new(libc::EINVAL, "coroutine has already terminated"));
        }

        if !self.started {
            self.started = true;
            match resumption {
                Resumption::Send(Received::Nothing) => (),
                Resumption::Throw(e) => return self.terminate(Step::Failed(e)),
                Resumption::Send(_) => {
                    let e: Fail = Fail::new(libc::EINVAL, "cannot send a value to a coroutine that has not started");
                    return self.terminate(Step::Failed(e));
                },
            }
        } else {
            self.channel.0.borrow_mut().delivery = Some(resumption);
        }

        let mut ctx: Context = Context::from_waker(noop_waker_ref());
        let poll: Poll<Exit<V>> = match self.body.as_mut() {
            Some(body) => body.as_mut().poll(&mut ctx),
            None => return Step::Failed(Fail::new(libc::EINVAL, "coroutine has already terminated")),
        };

        match poll {
            Poll::Pending => {
                let request: Option<Operation<V>> = {
                    let mut channel = self.channel.0.borrow_mut();
                    channel.delivery = None;
                    channel.request.take()
                };
                match request {
                    Some(operation) => Step::Pending(operation),
                    None => {
                        let e: Fail = Fail::new(libc::EINVAL, "coroutine suspended without waiting on an operation");
                        error!("resume(): {:?}", e);
                        self.terminate(Step::Failed(e))
                    },
                }
            },
            Poll::Ready(Ok(Some(value))) => self.terminate(Step::EarlyReturn(value)),
            Poll::Ready(Ok(None)) => self.terminate(Step::Completed),
            Poll::Ready(Err(e)) => self.terminate(Step::Failed(e)),
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
