// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The trampoline drives a single coroutine to termination.
//!
//! Every time the coroutine suspends on an [Operation], the trampoline stores it and queues a scheduler callback that
//! invokes it with a fresh [Continuation]. The continuation resumes the coroutine with whatever the operation reported.
//! Resumptions are therefore never nested inside the call that requested the operation, which keeps the stack flat
//! no matter how many times the coroutine suspends.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    coroutine::{
        early_return::EarlyReturn,
        operation::{
            Arg,
            Operation,
            Payload,
        },
        BoxCoroutine,
        Received,
        Resumption,
        Step,
    },
    runtime::{
        fail::Fail,
        scheduler::SharedScheduler,
    },
    sink::{
        self,
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

/// Receives the final value of a coroutine that returns early.
pub type FinalCallback<V> = Box<dyn FnOnce(V) -> Result<(), Fail>>;

/// Life cycle of a trampoline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// Waiting for an operation to report back.
    Suspended,
    /// Inside a resumption.
    Running,
    /// Terminated through an early return.
    Returned,
    /// Terminated by running off the end.
    Completed,
    /// Terminated by an error escaping the coroutine.
    Failed,
}

/// Trampoline
pub struct Trampoline<V: Payload> {
    /// Name used to identify the coroutine in logs.
    name: String,
    /// The coroutine. Taken out while it is being resumed and dropped once it terminates.
    coroutine: Option<BoxCoroutine<V>>,
    /// Operation the coroutine is currently suspended on.
    work: Option<Operation<V>>,
    sink: Option<SharedSink>,
    scheduler: SharedScheduler,
    final_callback: Option<FinalCallback<V>>,
    status: Status,
    /// Number of resumptions so far.
    steps: usize,
}

pub struct SharedTrampoline<V: Payload>(Rc<RefCell<Trampoline<V>>>);

/// Resumes the coroutine of a trampoline. Consumed when called, so an operation can report back at most once.
pub struct Continuation<V: Payload> {
    trampoline: SharedTrampoline<V>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl<V: Payload> Trampoline<V> {
    /// Takes ownership of `coroutine` and performs its first resumption right away.
    ///
    /// If the coroutine fails and there is no `sink` to report to, the failure is returned here. The same holds for
    /// every later resumption: the failure is returned from the scheduler callback that performed it.
    pub fn start(
        name: &str,
        scheduler: SharedScheduler,
        coroutine: BoxCoroutine<V>,
        sink: Option<SharedSink>,
        final_callback: Option<FinalCallback<V>>,
    ) -> Result<SharedTrampoline<V>, Fail> {
        trace!("start(): name={}", name);
        let trampoline: SharedTrampoline<V> = SharedTrampoline(Rc::new(RefCell::new(Self {
            name: name.to_string(),
            coroutine: Some(coroutine),
            work: None,
            sink,
            scheduler,
            final_callback,
            status: Status::Suspended,
            steps: 0,
        })));
        trampoline.advance(Resumption::Send(Received::Nothing))?;
        Ok(trampoline)
    }
}

impl<V: Payload> SharedTrampoline<V> {
    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn status(&self) -> Status {
        self.0.borrow().status
    }

    /// Returns the number of times the coroutine has been resumed.
    pub fn steps(&self) -> usize {
        self.0.borrow().steps
    }

    /// Returns true once the coroutine has terminated.
    pub fn is_terminated(&self) -> bool {
        matches!(self.status(), Status::Returned | Status::Completed | Status::Failed)
    }

    /// Resumes the coroutine and acts on the step it produces.
    fn advance(&self, resumption: Resumption<V>) -> Result<(), Fail> {
        let mut coroutine: BoxCoroutine<V> = self.begin_resume()?;
        let step: Step<V> = coroutine.resume(resumption);
        trace!("advance(): name={} step={}", self.0.borrow().name, step.name());

        match step {
            Step::Pending(op) => {
                let scheduler: SharedScheduler = {
                    let mut trampoline = self.0.borrow_mut();
                    trampoline.coroutine = Some(coroutine);
                    trampoline.work = Some(op);
                    trampoline.status = Status::Suspended;
                    trampoline.scheduler.clone()
                };
                let trampoline: SharedTrampoline<V> = self.clone();
                scheduler.add_callback(Box::new(move || trampoline.execute_work()));
                Ok(())
            },
            Step::EarlyReturn(value) => {
                drop(coroutine);
                self.on_early_return(value)
            },
            Step::Completed => {
                drop(coroutine);
                let (sink, _) = self.terminate(Status::Completed);
                if let Some(sink) = sink {
                    sink::finish_once(&sink)?;
                }
                Ok(())
            },
            Step::Failed(e) => {
                drop(coroutine);
                self.on_failure(e)
            },
        }
    }

    /// Checks that the coroutine may be resumed and takes it out for the duration of the resumption.
    fn begin_resume(&self) -> Result<BoxCoroutine<V>, Fail> {
        let mut trampoline = self.0.borrow_mut();
        match trampoline.status {
            Status::Suspended => (),
            Status::Running => {
                let cause: String = format!("coroutine {} is already running", trampoline.name);
                error!("begin_resume(): {}", cause);
                return Err(Fail::new(libc::EBUSY, &cause));
            },
            status => {
                let cause: String = format!("coroutine {} resumed after termination ({:?})", trampoline.name, status);
                error!("begin_resume(): {}", cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        }
        match trampoline.coroutine.take() {
            Some(coroutine) => {
                trampoline.status = Status::Running;
                trampoline.steps += 1;
                Ok(coroutine)
            },
            None => {
                let cause: String = format!("coroutine {} is missing", trampoline.name);
                error!("begin_resume(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }

    /// Invokes the stored operation with a continuation back into this trampoline.
    fn execute_work(&self) -> Result<(), Fail> {
        let work: Option<Operation<V>> = self.0.borrow_mut().work.take();
        match work {
            Some(op) => op.invoke(Continuation {
                trampoline: self.clone(),
            }),
            None => {
                let cause: String = format!("coroutine {} has no pending operation", self.name());
                error!("execute_work(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }

    fn on_early_return(&self, value: EarlyReturn<V>) -> Result<(), Fail> {
        let (sink, final_callback) = self.terminate(Status::Returned);
        let finished: Result<(), Fail> = match sink {
            Some(sink) => sink::finish_once(&sink).map(|_| ()),
            None => Ok(()),
        };
        if let Err(e) = &finished {
            warn!("on_early_return(): failed to finish completion sink (name={} error={:?})", self.name(), e);
        }
        let delivered: Result<(), Fail> = match final_callback {
            Some(final_callback) => value.deliver(final_callback),
            None => {
                debug!(
                    "on_early_return(): no final callback, dropping value (name={} deferred={})",
                    self.name(),
                    value.is_deferred()
                );
                Ok(())
            },
        };
        delivered.and(finished)
    }

    fn on_failure(&self, e: Fail) -> Result<(), Fail> {
        let (sink, _) = self.terminate(Status::Failed);
        match sink {
            Some(sink) => {
                debug!("on_failure(): reporting to completion sink (name={} error={:?})", self.name(), e);
                sink::report_failure(&sink, &e)
            },
            None => {
                warn!("on_failure(): unhandled failure (name={} error={:?})", self.name(), e);
                Err(e)
            },
        }
    }

    /// Marks the trampoline as terminated and releases what it holds.
    fn terminate(&self, status: Status) -> (Option<SharedSink>, Option<FinalCallback<V>>) {
        let mut trampoline = self.0.borrow_mut();
        trampoline.status = status;
        trampoline.work = None;
        (trampoline.sink.take(), trampoline.final_callback.take())
    }
}

impl<V: Payload> Continuation<V> {
    /// Resumes the coroutine with the positional results an operation reported.
    ///
    /// A trailing error is thrown into the coroutine, as is the error carried by a first value that wraps one. A
    /// single trailing null means "no error" and is dropped. A lone remaining null resumes without a value, one
    /// remaining value is sent as is and several are sent as one composite whose null members are None.
    pub fn call(self, args: Vec<Arg<V>>) -> Result<(), Fail> {
        self.trampoline.advance(Self::classify(args))
    }

    /// Resumes the coroutine with a single result.
    pub fn resolve(self, value: V) -> Result<(), Fail> {
        self.call(vec![Arg::Value(value)])
    }

    /// Throws `e` into the coroutine.
    pub fn reject(self, e: Fail) -> Result<(), Fail> {
        self.call(vec![Arg::Error(e)])
    }

    /// Resumes the coroutine without a value.
    pub fn resume(self) -> Result<(), Fail> {
        self.call(Vec::new())
    }

    fn classify(mut args: Vec<Arg<V>>) -> Resumption<V> {
        if matches!(args.last(), Some(Arg::Error(_))) {
            if let Some(Arg::Error(e)) = args.pop() {
                return Resumption::Throw(e);
            }
        }

        if let Some(Arg::Value(first)) = args.first() {
            if let Some(e) = first.error() {
                return Resumption::Throw(e.clone());
            }
        }

        if matches!(args.last(), Some(Arg::Null)) {
            args.pop();
        }

        if matches!(args.as_slice(), [Arg::Null]) {
            return Resumption::Send(Received::Nothing);
        }

        let mut values: Vec<Option<V>> = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::Value(value) => values.push(Some(value)),
                Arg::Null => values.push(None),
                Arg::Error(e) => return Resumption::Throw(e),
            }
        }

        if values.len() > 1 {
            return Resumption::Send(Received::Many(values));
        }
        match values.pop().flatten() {
            Some(value) => Resumption::Send(Received::One(value)),
            None => Resumption::Send(Received::Nothing),
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl<V: Payload> Clone for SharedTrampoline<V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
