//! Interfaces to the host media pipeline
//!
//! The host drives a filter through preprocess / process / postprocess on its
//! own ticker, reads time from a [`Ticker`] and collects output frames through
//! a [`FrameSink`].

use crate::types::{VideoSize, YuvFrame};
use std::collections::VecDeque;

/// Monotonic pipeline time in milliseconds
pub trait Ticker: Send + Sync {
    fn time_ms(&self) -> u64;
}

/// Output queue of a filter
pub trait FrameSink {
    fn put(&mut self, frame: YuvFrame);
}

impl FrameSink for Vec<YuvFrame> {
    fn put(&mut self, frame: YuvFrame) {
        self.push(frame);
    }
}

impl FrameSink for VecDeque<YuvFrame> {
    fn put(&mut self, frame: YuvFrame) {
        self.push_back(frame);
    }
}

/// Lifecycle hooks a host pipeline calls on a filter
///
/// Construction stands in for init and dropping the filter for uninit.
pub trait MediaFilter {
    fn preprocess(&self);
    /// Called once per host tick
    fn process(&self, output: &mut dyn FrameSink);
    fn postprocess(&self);
}

/// Notifications a capture filter emits to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Capture restarted with this negotiated size
    PreviewSizeChanged(VideoSize),
}
