//! Single-slot hand-off between the capture callback and the pipeline tick

use crate::types::YuvFrame;
use std::sync::{Mutex, PoisonError};

/// Holds at most one converted frame, always the most recent one
#[derive(Default)]
pub struct FrameSlot {
    pending: Mutex<Option<YuvFrame>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, dropping any frame nobody took yet.
    ///
    /// Returns `true` when an undelivered frame was replaced.
    pub fn publish(&self, frame: YuvFrame) -> bool {
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(frame);
        // the replaced frame is released outside the lock
        previous.is_some()
    }

    /// Remove and return the pending frame, if any
    pub fn take(&self) -> Option<YuvFrame> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_empty(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
