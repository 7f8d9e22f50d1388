// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Animation-frame callback queue.
//!
//! Callbacks are queued in registration order. At each tick the whole queue
//! is moved into a dispatch snapshot, so anything queued while the snapshot
//! runs waits for the next tick. Cancelling removes a callback from the live
//! queue; if it is part of the snapshot being dispatched, its handle is
//! flagged and the dispatcher skips it when it comes up.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::error::CallbackResult;
use crate::frame::Frame;
use crate::time::HostTime;

/// Identifies a queued animation-frame callback.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(pub(crate) u32);

impl FrameHandle {
    /// Returns the raw handle value. Handles start at 1.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameHandle({})", self.0)
    }
}

/// An animation-frame callback: receives the tick's device time and the
/// frame for that tick.
pub type FrameCallback = Box<dyn FnMut(HostTime, &mut Frame<'_>) -> CallbackResult>;

pub(crate) struct QueuedCallback {
    pub(crate) handle: FrameHandle,
    pub(crate) callback: FrameCallback,
}

#[derive(Default)]
pub(crate) struct CallbackQueue {
    last_handle: u32,
    pending: Vec<QueuedCallback>,
    in_flight: Vec<FrameHandle>,
    cancelled: Vec<FrameHandle>,
}

impl fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackQueue")
            .field("pending", &self.pending.len())
            .field("in_flight", &self.in_flight)
            .field("cancelled", &self.cancelled)
            .finish_non_exhaustive()
    }
}

impl CallbackQueue {
    pub(crate) fn push(&mut self, callback: FrameCallback) -> FrameHandle {
        self.last_handle += 1;
        let handle = FrameHandle(self.last_handle);
        self.pending.push(QueuedCallback { handle, callback });
        handle
    }

    pub(crate) fn cancel(&mut self, handle: FrameHandle) {
        self.pending.retain(|q| q.handle != handle);
        if self.in_flight.contains(&handle) && !self.cancelled.contains(&handle) {
            self.cancelled.push(handle);
        }
    }

    /// Moves the live queue into a dispatch snapshot.
    pub(crate) fn begin_dispatch(&mut self) -> Vec<QueuedCallback> {
        let snapshot = core::mem::take(&mut self.pending);
        self.in_flight = snapshot.iter().map(|q| q.handle).collect();
        self.cancelled.clear();
        snapshot
    }

    pub(crate) fn is_cancelled(&self, handle: FrameHandle) -> bool {
        self.cancelled.contains(&handle)
    }

    pub(crate) fn end_dispatch(&mut self) {
        self.in_flight.clear();
        self.cancelled.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> FrameCallback {
        Box::new(|_, _| Ok(()))
    }

    #[test]
    fn handles_increase_from_one() {
        let mut queue = CallbackQueue::default();
        assert_eq!(queue.push(noop()).get(), 1);
        assert_eq!(queue.push(noop()).get(), 2);
    }

    #[test]
    fn cancel_before_dispatch_removes_entry() {
        let mut queue = CallbackQueue::default();
        let a = queue.push(noop());
        let b = queue.push(noop());
        queue.cancel(a);
        let snapshot = queue.begin_dispatch();
        let handles: Vec<_> = snapshot.iter().map(|q| q.handle).collect();
        assert_eq!(handles, [b]);
        assert!(!queue.is_cancelled(a), "not part of the snapshot");
    }

    #[test]
    fn cancel_during_dispatch_flags_snapshot_entry() {
        let mut queue = CallbackQueue::default();
        let a = queue.push(noop());
        let b = queue.push(noop());
        let snapshot = queue.begin_dispatch();
        queue.cancel(b);
        assert!(queue.is_cancelled(b), "flagged");
        assert!(!queue.is_cancelled(a), "sibling untouched");
        assert_eq!(snapshot.len(), 2, "snapshot itself is not mutated");
        queue.end_dispatch();
        assert!(!queue.is_cancelled(b), "flags reset after dispatch");
    }

    #[test]
    fn callbacks_queued_during_dispatch_wait() {
        let mut queue = CallbackQueue::default();
        let _ = queue.push(noop());
        let snapshot = queue.begin_dispatch();
        let late = queue.push(noop());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(queue.len(), 1, "deferred to the next tick");
        queue.end_dispatch();
        let next = queue.begin_dispatch();
        assert_eq!(next[0].handle, late);
    }
}
