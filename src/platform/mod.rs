//! Camera backend capability surface
//!
//! The capture pipeline never talks to a platform camera API directly. It
//! drives a [`CameraBackend`], which hands out opaque [`Handle`]s for every
//! object it creates and takes them back through [`CameraBackend::release`].
//! Images arrive asynchronously on a backend-owned thread through an
//! [`ImageListener`].

pub mod resources;

pub use resources::{Resource, ResourceKind, ResourceStack};

use crate::types::{Facing, PixelFormat, VideoSize};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Error code reported by the platform backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (status {status})")]
pub struct BackendError {
    pub status: i32,
    pub message: String,
}

impl BackendError {
    pub fn new(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Opaque identifier of a backend-owned object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(pub u64);

/// Static characteristics of one camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraCharacteristics {
    pub mount_orientation: i32,
    pub facing: Facing,
}

/// One entry of the backend's stream configuration table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfiguration {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub is_input: bool,
}

impl StreamConfiguration {
    pub fn output(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            is_input: false,
        }
    }

    pub fn input(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            is_input: true,
            ..Self::output(format, width, height)
        }
    }

    pub fn size(&self) -> VideoSize {
        VideoSize::new(self.width, self.height)
    }

    /// Parse the flat `(format, width, height, is_input)` quads of platform metadata.
    ///
    /// A trailing partial quad and entries with negative dimensions are ignored.
    pub fn from_raw_entries(entries: &[i32]) -> Vec<Self> {
        entries
            .chunks_exact(4)
            .filter_map(|quad| {
                let width = u32::try_from(quad[1]).ok()?;
                let height = u32::try_from(quad[2]).ok()?;
                Some(Self {
                    format: PixelFormat::from_code(quad[0]),
                    width,
                    height,
                    is_input: quad[3] != 0,
                })
            })
            .collect()
    }
}

/// Capture request template; continuous templates favour steady frame timing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestTemplate {
    #[default]
    Record,
    Preview,
    StillCapture,
}

/// Device and session state notifications from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    DeviceDisconnected { camera_id: String },
    DeviceError { camera_id: String, code: i32 },
    SessionReady,
    SessionActive,
    SessionClosed,
}

/// One plane of a captured image
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub row_stride: usize,
    pub pixel_stride: usize,
}

/// Image acquired from a reader; released back to the backend on drop
pub trait CapturedImage {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Plane 0 is luma, planes 1 and 2 are U and V
    fn plane(&self, index: usize) -> Option<Plane<'_>>;
}

/// The image reader as seen from inside the image-available callback
pub trait ImageSource {
    fn format(&self) -> BackendResult<PixelFormat>;
    fn acquire_next_image(&self) -> BackendResult<Box<dyn CapturedImage + '_>>;
}

pub type ImageListener = Arc<dyn Fn(&dyn ImageSource) + Send + Sync>;
pub type EventListener = Arc<dyn Fn(BackendEvent) + Send + Sync>;

/// Platform camera API
///
/// Every `create_*`/`open_*` call that succeeds hands out a handle the caller
/// must give back exactly once through [`CameraBackend::release`].
pub trait CameraBackend: Send + Sync {
    fn camera_ids(&self) -> BackendResult<Vec<String>>;

    fn characteristics(&self, camera_id: &str) -> BackendResult<CameraCharacteristics>;

    fn stream_configurations(&self, camera_id: &str) -> BackendResult<Vec<StreamConfiguration>>;

    fn open_device(&self, camera_id: &str, events: EventListener) -> BackendResult<Handle>;

    fn create_output_container(&self) -> BackendResult<Handle>;

    /// Reader producing images of `size` and `format`, keeping at most `max_images` in flight
    fn create_image_reader(
        &self,
        size: VideoSize,
        format: PixelFormat,
        max_images: u32,
    ) -> BackendResult<Handle>;

    fn set_image_listener(&self, reader: Handle, listener: ImageListener) -> BackendResult<()>;

    /// Drawing surface of `reader`, acquired for the caller
    fn acquire_window(&self, reader: Handle) -> BackendResult<Handle>;

    /// Session output on `window`, added to `container`
    fn create_session_output(&self, window: Handle, container: Handle) -> BackendResult<Handle>;

    fn create_capture_request(
        &self,
        device: Handle,
        template: RequestTemplate,
    ) -> BackendResult<Handle>;

    /// Output target on `window`, added to `request`
    fn create_output_target(&self, window: Handle, request: Handle) -> BackendResult<Handle>;

    fn create_capture_session(
        &self,
        device: Handle,
        container: Handle,
        events: EventListener,
    ) -> BackendResult<Handle>;

    fn set_repeating_request(&self, session: Handle, request: Handle) -> BackendResult<()>;

    fn release(&self, resource: &Resource) -> BackendResult<()>;
}
