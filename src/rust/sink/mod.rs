// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Completion sinks: objects that must be told when a coroutine is done.
//!
//! A typical sink is the request/response lifecycle the coroutine is serving. Once a coroutine ends, the trampoline
//! closes the sink out; once it fails, the sink decides whether the failure can still become the response or whether
//! output has already gone out and the failure can only be logged.

mod response;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::std::{
    cell::RefCell,
    rc::Rc,
};

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::response::ResponseWriter;

//======================================================================================================================
// Structures
//======================================================================================================================

pub type SharedSink = Rc<RefCell<dyn CompletionSink>>;

//======================================================================================================================
// Traits
//======================================================================================================================

pub trait CompletionSink {
    /// Commits and closes the output. Must be idempotent.
    fn finish(&mut self);

    fn is_finished(&self) -> bool;

    /// Returns true once any output has been committed. From then on a failure can no longer be reported as the
    /// response.
    fn headers_committed(&self) -> bool;

    /// Reports a failure that escaped the coroutine before any output was committed.
    fn handle_request_exception(&mut self, e: &Fail);
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Finishes `sink` unless it has already been finished. Returns true if this call finished it.
pub fn finish_once(sink: &SharedSink) -> Result<bool, Fail> {
    let mut sink = borrow_sink(sink)?;
    if sink.is_finished() {
        return Ok(false);
    }
    sink.finish();
    Ok(true)
}

/// Hands an unrecovered failure to `sink`. If output has already been committed the failure is only logged, since
/// partial output cannot be retracted.
pub fn report_failure(sink: &SharedSink, e: &Fail) -> Result<(), Fail> {
    let mut sink = borrow_sink(sink)?;
    if sink.headers_committed() {
        error!("report_failure(): exception after headers written (error={:?})", e);
    } else {
        sink.handle_request_exception(e);
    }
    Ok(())
}

fn borrow_sink(sink: &SharedSink) -> Result<::std::cell::RefMut<'_, dyn CompletionSink>, Fail> {
    match sink.try_borrow_mut() {
        Ok(sink) => Ok(sink),
        Err(_) => {
            let cause: &str = "completion sink is borrowed elsewhere";
            error!("borrow_sink(): {}", cause);
            Err(Fail::new(libc::EBUSY, cause))
        },
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
