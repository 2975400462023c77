// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::fail::Fail,
    sink::CompletionSink,
};
use ::std::{
    cell::RefCell,
    rc::Rc,
};

//======================================================================================================================
// Constants
//======================================================================================================================

const STATUS_OK: u16 = 200;
const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;

//======================================================================================================================
// Structures
//======================================================================================================================

/// In-memory request/response lifecycle. Output is buffered until flushed; the first flush commits the headers.
pub struct ResponseWriter {
    status: u16,
    /// Output written but not yet flushed.
    buffer: Vec<u8>,
    /// Output committed so far.
    body: Vec<u8>,
    headers_written: bool,
    finished: bool,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: STATUS_OK,
            buffer: Vec::new(),
            body: Vec::new(),
            headers_written: false,
            finished: false,
        }
    }

    /// Creates a writer that can be handed to a trampoline as its completion sink.
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn set_status(&mut self, status: u16) -> Result<(), Fail> {
        if self.headers_written {
            let cause: String = format!("cannot set status {} after headers are written", status);
            error!("set_status(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        self.status = status;
        Ok(())
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Buffers `chunk` for output.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), Fail> {
        if self.finished {
            let cause: &str = "cannot write after finish";
            error!("write(): {}", cause);
            return Err(Fail::new(libc::EPIPE, cause));
        }
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    /// Commits the headers and any buffered output.
    pub fn flush(&mut self) {
        if !self.headers_written {
            trace!("flush(): writing headers (status={})", self.status);
            self.headers_written = true;
        }
        self.body.append(&mut self.buffer);
    }

    /// Returns the committed output.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSink for ResponseWriter {
    fn finish(&mut self) {
        if self.finished {
            debug!("finish(): already finished");
            return;
        }
        self.flush();
        self.finished = true;
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn headers_committed(&self) -> bool {
        self.headers_written
    }

    fn handle_request_exception(&mut self, e: &Fail) {
        if self.headers_written {
            error!("handle_request_exception(): cannot send error response after headers written (error={:?})", e);
            return;
        }
        warn!("handle_request_exception(): uncaught exception (error={:?})", e);
        self.status = STATUS_INTERNAL_SERVER_ERROR;
        self.buffer.clear();
        self.buffer.extend_from_slice(format!("{}", e).as_bytes());
        self.finish();
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
