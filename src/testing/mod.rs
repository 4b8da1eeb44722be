//! Testing utilities for crabcapture
//!
//! An in-memory camera backend, synthetic sensor images in both chroma
//! layouts, and a ticker whose time tests set by hand.

pub mod mock_backend;
pub mod synthetic_data;

pub use mock_backend::{FeedHandle, MockBackend, MockOp, ReaderConfig};
pub use synthetic_data::{
    gradient_image, padded_planar_image, planar_image, semi_planar_image, solid_image,
    ChromaOrder, SyntheticImage,
};

use crate::host::Ticker;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ticker driven explicitly by the test
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    now_ms: Arc<AtomicU64>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) -> u64 {
        self.now_ms.fetch_add(ms, Ordering::SeqCst) + ms
    }
}

impl Ticker for ManualTicker {
    fn time_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
