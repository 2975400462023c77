// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Implementation of our single-threaded, FIFO callback loop.
//!
//! Every resumption of a coroutine is dispatched from here, so each one starts on a fresh stack frame and two
//! trampolines never interleave mid-step.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    config::Config,
    fail::Fail,
    scheduler::{
        Callback,
        Schedule,
        SharedScheduler,
    },
};
use ::std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Event Loop
pub struct EventLoop {
    /// Callbacks waiting to run, oldest first.
    queue: VecDeque<Callback>,
    /// Maximum number of callbacks to run in a single turn. If none, then a turn drains everything queued before it.
    max_callbacks_per_turn: Option<usize>,
    /// Number of callbacks that have run so far.
    dispatched: u64,
}

#[derive(Clone)]
pub struct SharedEventLoop(Rc<RefCell<EventLoop>>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl EventLoop {
    /// Creates an event loop that runs at most `max_callbacks_per_turn` callbacks per turn.
    pub fn new(max_callbacks_per_turn: Option<usize>) -> Self {
        Self {
            queue: VecDeque::new(),
            max_callbacks_per_turn,
            dispatched: 0,
        }
    }
}

impl SharedEventLoop {
    pub fn new(max_callbacks_per_turn: Option<usize>) -> Self {
        Self(Rc::new(RefCell::new(EventLoop::new(max_callbacks_per_turn))))
    }

    /// Creates an event loop using the budget in `config`.
    pub fn from_config(config: &Config) -> Result<Self, Fail> {
        Ok(Self::new(config.max_callbacks_per_turn()?))
    }

    /// Returns a scheduler handle that queues callbacks on this loop.
    pub fn scheduler(&self) -> SharedScheduler {
        Rc::new(self.clone())
    }

    /// Runs one turn: the callbacks that were queued when the turn started, up to the per-turn budget. Callbacks
    /// queued during the turn run on the next one. Returns the number of callbacks that ran.
    ///
    /// If a callback fails, the turn stops and the failure is returned. Callbacks that did not run stay queued.
    pub fn run_once(&self) -> Result<usize, Fail> {
        let ready: usize = {
            let event_loop = self.0.borrow();
            match event_loop.max_callbacks_per_turn {
                Some(budget) => event_loop.queue.len().min(budget),
                None => event_loop.queue.len(),
            }
        };

        for n in 0..ready {
            // The borrow must be released before the callback runs, as it may queue more work.
            let callback: Option<Callback> = self.0.borrow_mut().queue.pop_front();
            let callback: Callback = match callback {
                Some(callback) => callback,
                None => return Ok(n),
            };
            self.0.borrow_mut().dispatched += 1;
            if let Err(e) = callback() {
                warn!("run_once(): callback failed (error={:?})", e);
                return Err(e);
            }
        }
        trace!("run_once(): ran {} callbacks", ready);
        Ok(ready)
    }

    /// Runs turns until no callback is queued. Returns the total number of callbacks that ran. Fails if the loop is
    /// still busy after `max_turns` turns.
    pub fn run_until_idle(&self, max_turns: usize) -> Result<usize, Fail> {
        let mut ran: usize = 0;
        for _ in 0..max_turns {
            if self.is_idle() {
                return Ok(ran);
            }
            ran += self.run_once()?;
        }
        if self.is_idle() {
            Ok(ran)
        } else {
            let cause: String = format!("event loop still busy after {} turns", max_turns);
            error!("run_until_idle(): {}", cause);
            Err(Fail::new(libc::ETIMEDOUT, &cause))
        }
    }

    /// Returns the number of queued callbacks.
    pub fn queued(&self) -> usize {
        self.0.borrow().queue.len()
    }

    /// Returns true if no callback is queued.
    pub fn is_idle(&self) -> bool {
        self.0.borrow().queue.is_empty()
    }

    /// Returns the number of callbacks that have run on this loop.
    pub fn dispatched(&self) -> u64 {
        self.0.borrow().dispatched
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for EventLoop {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Default for SharedEventLoop {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Schedule for SharedEventLoop {
    fn add_callback(&self, callback: Callback) {
        self.0.borrow_mut().queue.push_back(callback);
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
