// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Host scheduler boundary.
//!
//! The trampoline needs exactly one capability from its host: queue a zero-argument callback to run later, in FIFO
//! order relative to every other queued callback. [Schedule] names that capability and [EventLoop] is the in-process
//! implementation used by this crate.

mod event_loop;

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::fail::Fail;
use ::std::rc::Rc;

//==============================================================================
// Exports
//==============================================================================

pub use self::event_loop::{
    EventLoop,
    SharedEventLoop,
};

//==============================================================================
// Structures
//==============================================================================

/// A deferred unit of work. An error escaping a callback is fatal for the turn that runs it.
pub type Callback = Box<dyn FnOnce() -> Result<(), Fail>>;

/// Handle to the host scheduler that trampolines and adapters are built with.
pub type SharedScheduler = Rc<dyn Schedule>;

//==============================================================================
// Traits
//==============================================================================

/// Queues callbacks for later execution.
pub trait Schedule {
    /// Queues `callback` to run after every callback queued before it. Must never run it synchronously.
    fn add_callback(&self, callback: Callback);
}
