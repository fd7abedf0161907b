//! Synchronous callback queue.
//!
//! Synchronous-lane work is not handed to the external scheduler; it is
//! collected here and flushed in one go at microtask timing. The flushing
//! flag makes the flush reentrancy-safe: callbacks that schedule more
//! synchronous work extend the current flush instead of nesting one.

use std::cell::RefCell;
use std::rc::Rc;

use crate::pipeline::root::Session;

pub(crate) type SyncCallback = Box<dyn FnOnce(&Rc<RefCell<Session>>)>;

/// Queue of synchronous callbacks awaiting a microtask flush.
#[derive(Default)]
pub(crate) struct SyncQueue {
    callbacks: Vec<SyncCallback>,
    pub(crate) flushing: bool,
}

impl SyncQueue {
    /// Append a callback to run at the next flush.
    pub(crate) fn schedule(&mut self, callback: SyncCallback) {
        self.callbacks.push(callback);
    }

    /// Take every queued callback, leaving the queue empty.
    pub(crate) fn take(&mut self) -> Vec<SyncCallback> {
        std::mem::take(&mut self.callbacks)
    }
}
