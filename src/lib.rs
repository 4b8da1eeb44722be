//! crabcapture: camera capture filter for pull-based media pipelines
//!
//! Frames arrive asynchronously from a platform camera backend, get converted
//! into rotated planar YUV 4:2:0 and wait in a single slot until the host
//! pipeline's next tick takes them.
//!
//! # Features
//! - Camera discovery with one device per facing
//! - Closest-area resolution negotiation
//! - Planar and semi-planar (NV12/NV21) chroma conversion with rotation
//! - Leak-free capture start and teardown over an ordered resource stack
//! - Frame rate admission and measured average fps
//!
//! # Usage
//! ```rust,ignore
//! use crabcapture::{CaptureFilter, DeviceRegistry, MediaFilter, TickerClock, VideoSize};
//! use std::sync::Arc;
//!
//! let backend: Arc<dyn crabcapture::CameraBackend> = Arc::new(my_backend);
//! let registry = DeviceRegistry::detect(backend.as_ref())?;
//! let device = registry.default_device().cloned().unwrap();
//! let filter = CaptureFilter::new(backend, device, Arc::new(TickerClock::new()));
//! filter.set_video_size(VideoSize::vga())?;
//! filter.preprocess();
//! let mut frames = Vec::new();
//! filter.process(&mut frames);
//! ```
pub mod config;
pub mod convert;
pub mod errors;
pub mod filter;
pub mod host;
pub mod invariant_ppt;
pub mod negotiate;
pub mod orientation;
pub mod platform;
pub mod registry;
pub mod session;
pub mod slot;
pub mod timing;
pub mod types;

// Testing utilities - mock backend and synthetic images for offline testing
pub mod testing;

pub use config::CaptureSettings;
pub use convert::PixelConverter;
pub use errors::CaptureError;
pub use filter::{CaptureFilter, SizeChange};
pub use host::{CaptureEvent, FrameSink, MediaFilter, Ticker};
pub use orientation::Rotation;
pub use platform::{BackendError, BackendEvent, CameraBackend, RequestTemplate};
pub use registry::DeviceRegistry;
pub use session::{CaptureSession, CaptureStats, SessionState};
pub use slot::FrameSlot;
pub use timing::TickerClock;
pub use types::{CameraDescriptor, Facing, PixelFormat, VideoSize, YuvFrame};

/// Initialize logging for the capture pipeline
pub fn init_logging() {
    init_logging_with_filter("crabcapture=info");
}

/// Initialize logging with `filter` unless `RUST_LOG` is already set
pub fn init_logging_with_filter(filter: &str) {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", filter);
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_name() {
        assert_eq!(NAME, "crabcapture");
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        log::info!("[Test] logging initialised twice");
    }
}
