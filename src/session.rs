//! Camera device and capture session lifecycle
//!
//! A [`CaptureSession`] walks Closed -> DeviceOpen -> SessionActive and back.
//! Starting acquires the backend objects in a fixed order onto a
//! [`ResourceStack`]; stopping releases them in exactly the reverse order.
//! Images arrive on a backend-owned thread. The image listener only holds a
//! `Weak` reference to the state it needs, so a callback racing with teardown
//! finds nothing to upgrade and drops the image.

use crate::config::{CaptureSettings, DEFAULT_FPS};
use crate::convert::PixelConverter;
use crate::errors::CaptureError;
use crate::host::Ticker;
use crate::negotiate::negotiate;
use crate::orientation::{self, Rotation};
use crate::platform::{
    BackendEvent, CameraBackend, EventListener, ImageListener, ImageSource, RequestTemplate,
    Resource, ResourceKind, ResourceStack,
};
use crate::slot::FrameSlot;
use crate::timing::FrameRateController;
use crate::types::{CameraDescriptor, PixelFormat, VideoSize, YuvFrame};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Format requested from the image reader
pub const TARGET_FORMAT: PixelFormat = PixelFormat::Yuv420Flexible;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Closed,
    DeviceOpen,
    SessionActive,
}

/// Tunables fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Images the reader may hold at once
    pub reader_depth: u32,
    pub template: RequestTemplate,
    pub pool_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reader_depth: 1,
            template: RequestTemplate::Record,
            pool_capacity: 3,
        }
    }
}

impl From<&CaptureSettings> for SessionOptions {
    fn from(settings: &CaptureSettings) -> Self {
        Self {
            reader_depth: settings.capture.image_reader_depth.max(1),
            template: settings.capture.request_template,
            pool_capacity: settings.capture.pool_capacity.max(1),
        }
    }
}

/// Frame accounting since the session was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStats {
    /// Frames handed downstream by the consumer; only counted by the filter
    pub delivered: u64,
    /// Frames converted successfully
    pub converted: u64,
    /// Images skipped by the frame rate controller
    pub rate_limited: u64,
    /// Converted frames overwritten before anyone took them
    pub replaced: u64,
    pub conversion_failed: u64,
    pub format_mismatch: u64,
    /// Images that arrived or finished converting while not capturing
    pub discarded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    converted: AtomicU64,
    rate_limited: AtomicU64,
    replaced: AtomicU64,
    conversion_failed: AtomicU64,
    format_mismatch: AtomicU64,
    discarded: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// State shared with the image callback thread
struct CaptureShared {
    device: CameraDescriptor,
    capturing: AtomicBool,
    device_rotation: AtomicI32,
    rate: Mutex<FrameRateController>,
    converter: PixelConverter,
    slot: FrameSlot,
    ticker: Arc<dyn Ticker>,
    counters: Counters,
}

impl CaptureShared {
    fn orientation(&self) -> i32 {
        orientation::resolve_for(&self.device, self.device_rotation.load(Ordering::Relaxed))
    }

    fn on_image_available(&self, source: &dyn ImageSource) {
        match source.format() {
            Ok(format) if format == TARGET_FORMAT => {}
            Ok(format) => {
                log::error!(
                    "[Capture] Image format mismatch: got {}, expected {}",
                    format,
                    TARGET_FORMAT
                );
                bump(&self.counters.format_mismatch);
                return;
            }
            Err(e) => {
                log::error!("[Capture] Could not query image format: {}", e);
                bump(&self.counters.format_mismatch);
                return;
            }
        }

        let image = match source.acquire_next_image() {
            Ok(image) => image,
            Err(e) => {
                log::warn!("[Capture] Could not acquire next image: {}", e);
                return;
            }
        };

        if !self.capturing.load(Ordering::Acquire) {
            log::debug!("[Capture] Not capturing, discarding image");
            bump(&self.counters.discarded);
            return;
        }

        let due = self
            .rate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit(self.ticker.time_ms());
        if !due {
            bump(&self.counters.rate_limited);
            return;
        }

        let angle = self.orientation();
        let Some(rotation) = Rotation::from_degrees(angle) else {
            log::error!("[Capture] Unsupported capture orientation {}", angle);
            bump(&self.counters.conversion_failed);
            return;
        };

        match self.converter.convert(image.as_ref(), rotation) {
            Some(frame) => {
                bump(&self.counters.converted);
                // stop() may have drained the slot while this frame was converting
                if !self.capturing.load(Ordering::Acquire) {
                    log::debug!("[Capture] Capture stopped during conversion, discarding frame");
                    bump(&self.counters.discarded);
                    return;
                }
                if self.slot.publish(frame) {
                    bump(&self.counters.replaced);
                }
            }
            None => bump(&self.counters.conversion_failed),
        }
    }

    fn on_backend_event(&self, event: &BackendEvent) {
        match event {
            BackendEvent::DeviceDisconnected { camera_id } => {
                log::warn!("[Capture] Camera {} disconnected", camera_id)
            }
            BackendEvent::DeviceError { camera_id, code } => {
                log::error!("[Capture] Camera {} reported error {}", camera_id, code)
            }
            BackendEvent::SessionReady => log::info!("[Capture] Capture session ready"),
            BackendEvent::SessionActive => log::info!("[Capture] Capture session active"),
            BackendEvent::SessionClosed => log::info!("[Capture] Capture session closed"),
        }
    }

    fn stats(&self) -> CaptureStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CaptureStats {
            delivered: 0,
            converted: load(&self.counters.converted),
            rate_limited: load(&self.counters.rate_limited),
            replaced: load(&self.counters.replaced),
            conversion_failed: load(&self.counters.conversion_failed),
            format_mismatch: load(&self.counters.format_mismatch),
            discarded: load(&self.counters.discarded),
        }
    }
}

/// One camera's capture pipeline on top of a [`CameraBackend`]
///
/// All methods taking `&mut self` must be serialized by the caller; the
/// image callback never needs that lock.
pub struct CaptureSession {
    backend: Arc<dyn CameraBackend>,
    shared: Arc<CaptureShared>,
    resources: ResourceStack,
    options: SessionOptions,
    size: VideoSize,
}

impl CaptureSession {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        device: CameraDescriptor,
        ticker: Arc<dyn Ticker>,
        options: SessionOptions,
    ) -> Self {
        log::debug!(
            "[Capture] New session for camera {} ({}, mounted at {})",
            device.camera_id,
            device.facing.as_str(),
            device.mount_orientation
        );
        Self {
            resources: ResourceStack::new(backend.clone()),
            backend,
            shared: Arc::new(CaptureShared {
                device,
                capturing: AtomicBool::new(false),
                device_rotation: AtomicI32::new(0),
                rate: Mutex::new(FrameRateController::new(DEFAULT_FPS)),
                converter: PixelConverter::with_pool_capacity(options.pool_capacity),
                slot: FrameSlot::new(),
                ticker,
                counters: Counters::default(),
            }),
            options,
            size: VideoSize::UNCONFIGURED,
        }
    }

    pub fn device(&self) -> &CameraDescriptor {
        &self.shared.device
    }

    pub fn state(&self) -> SessionState {
        if self.resources.contains(ResourceKind::Repeating) {
            SessionState::SessionActive
        } else if self.resources.contains(ResourceKind::Device) {
            SessionState::DeviceOpen
        } else {
            SessionState::Closed
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.capturing.load(Ordering::Acquire)
    }

    /// Negotiated capture size, unrotated
    pub fn size(&self) -> VideoSize {
        self.size
    }

    /// Resolve `requested` against the camera's stream table and adopt the result.
    ///
    /// An unconfigured request clears the size without asking the backend.
    pub fn negotiate(&mut self, requested: VideoSize) -> Result<VideoSize, CaptureError> {
        if !requested.is_configured() {
            self.size = VideoSize::UNCONFIGURED;
            return Ok(self.size);
        }

        let configs = self
            .backend
            .stream_configurations(&self.shared.device.camera_id)
            .map_err(|e| {
                log::error!("[Capture] Could not read stream configurations: {}", e);
                CaptureError::from(e)
            })?;

        let negotiated = negotiate(requested, TARGET_FORMAT, &configs);
        crate::assert_invariant!(
            negotiated.is_valid(),
            "Negotiated size is either unconfigured or fully positive",
            "session::negotiate"
        );
        if !negotiated.is_configured() {
            self.size = VideoSize::UNCONFIGURED;
            return Err(CaptureError::ConfigurationMismatch(format!(
                "camera {} offers no {} output",
                self.shared.device.camera_id, TARGET_FORMAT
            )));
        }

        self.size = negotiated;
        Ok(negotiated)
    }

    /// Open the camera device. No-op when already open.
    pub fn open(&mut self) -> Result<(), CaptureError> {
        if self.resources.contains(ResourceKind::Device) {
            return Ok(());
        }

        let camera_id = &self.shared.device.camera_id;
        match self.backend.open_device(camera_id, self.event_listener()) {
            Ok(handle) => {
                self.resources.push(Resource::Device(handle));
                log::info!("[Capture] Opened camera {}", camera_id);
                Ok(())
            }
            Err(e) => {
                log::error!("[Capture] Failed to open camera {}: {}", camera_id, e);
                Err(e.into())
            }
        }
    }

    /// Build the capture pipeline and issue the repeating request.
    ///
    /// Without a negotiated size, or while already capturing, this logs a
    /// warning and does nothing. On failure everything acquired by this call
    /// is released again, including the device if this call opened it.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if !self.size.is_configured() {
            log::warn!("[Capture] No capture size configured, not starting");
            return Ok(());
        }
        if self.is_capturing() {
            log::warn!("[Capture] Already capturing");
            return Ok(());
        }

        let opened_here = !self.resources.contains(ResourceKind::Device);
        self.open()?;
        let mark = if opened_here { 0 } else { self.resources.len() };

        match self.acquire_pipeline() {
            Ok(()) => {
                self.shared.capturing.store(true, Ordering::Release);
                log::info!(
                    "[Capture] Capturing {} from camera {} ({} resources live)",
                    self.size,
                    self.shared.device.camera_id,
                    self.resources.len()
                );
                Ok(())
            }
            Err(e) => {
                log::error!("[Capture] Failed to start capture: {}", e);
                self.resources.unwind_to(mark);
                Err(e)
            }
        }
    }

    fn acquire_pipeline(&mut self) -> Result<(), CaptureError> {
        let backend = Arc::clone(&self.backend);
        let device = self
            .resources
            .find(ResourceKind::Device)
            .ok_or_else(|| CaptureError::BackendUnavailable("camera device is not open".into()))?;

        let container = backend.create_output_container()?;
        self.resources.push(Resource::OutputContainer(container));

        let reader =
            backend.create_image_reader(self.size, TARGET_FORMAT, self.options.reader_depth)?;
        self.resources.push(Resource::ImageReader(reader));
        backend.set_image_listener(reader, self.image_listener())?;

        let window = backend.acquire_window(reader)?;
        self.resources.push(Resource::Window(window));

        let output = backend.create_session_output(window, container)?;
        self.resources.push(Resource::SessionOutput { output, container });

        let request = backend.create_capture_request(device, self.options.template)?;
        self.resources.push(Resource::CaptureRequest(request));

        let target = backend.create_output_target(window, request)?;
        self.resources.push(Resource::OutputTarget { target, request });

        let session = backend.create_capture_session(device, container, self.event_listener())?;
        self.resources.push(Resource::Session(session));

        backend.set_repeating_request(session, request)?;
        self.resources.push(Resource::Repeating { session });
        Ok(())
    }

    /// Stop capturing and release every backend object, device included.
    ///
    /// Logs a warning and does nothing when not capturing.
    pub fn stop(&mut self) {
        if !self.shared.capturing.swap(false, Ordering::AcqRel) {
            log::warn!("[Capture] Not capturing, nothing to stop");
            return;
        }
        self.resources.release_all();
        if self.shared.slot.take().is_some() {
            log::debug!("[Capture] Dropped pending frame on stop");
        }
        log::info!("[Capture] Stopped camera {}", self.shared.device.camera_id);
    }

    /// Release everything regardless of state
    pub fn close(&mut self) {
        self.shared.capturing.store(false, Ordering::Release);
        let _ = self.shared.slot.take();
        if !self.resources.is_empty() {
            self.resources.release_all();
            log::info!("[Capture] Closed camera {}", self.shared.device.camera_id);
        }
    }

    /// Remove the most recent converted frame, if one is pending
    pub fn take_frame(&self) -> Option<YuvFrame> {
        self.shared.slot.take()
    }

    /// Restart frame rate admission at `fps`
    pub fn reset_rate(&self, fps: f32) {
        self.shared
            .rate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset(fps);
    }

    /// Update the live device rotation; takes effect with the next image
    pub fn set_device_rotation(&self, degrees: i32) -> Result<(), CaptureError> {
        if degrees % 90 != 0 {
            return Err(CaptureError::InvalidArgument(format!(
                "device rotation {} is not a multiple of 90",
                degrees
            )));
        }
        self.shared
            .device_rotation
            .store(degrees.rem_euclid(360), Ordering::Relaxed);
        log::debug!("[Capture] Device rotation set to {}", degrees);
        Ok(())
    }

    pub fn device_rotation(&self) -> i32 {
        self.shared.device_rotation.load(Ordering::Relaxed)
    }

    /// Capture angle in `[0, 360)` for the current device rotation
    pub fn orientation(&self) -> i32 {
        self.shared.orientation()
    }

    pub fn on_backend_event(&self, event: &BackendEvent) {
        self.shared.on_backend_event(event);
    }

    /// Producer-side counters.
    ///
    /// `delivered` is always 0 here; [`crate::CaptureFilter::stats`] fills it in.
    pub fn stats(&self) -> CaptureStats {
        self.shared.stats()
    }

    /// Listener handed to the image reader
    pub(crate) fn image_listener(&self) -> ImageListener {
        let shared: Weak<CaptureShared> = Arc::downgrade(&self.shared);
        Arc::new(move |source: &dyn ImageSource| match shared.upgrade() {
            Some(shared) => shared.on_image_available(source),
            None => log::warn!("[Capture] Capture pipeline is gone, dropping image"),
        })
    }

    fn event_listener(&self) -> EventListener {
        let shared: Weak<CaptureShared> = Arc::downgrade(&self.shared);
        Arc::new(move |event: BackendEvent| {
            if let Some(shared) = shared.upgrade() {
                shared.on_backend_event(&event);
            }
        })
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{BackendResult, CapturedImage};
    use crate::testing::{solid_image, ManualTicker, MockBackend, SyntheticImage};
    use crate::types::Facing;
    use std::cell::Cell;

    fn session(backend: &Arc<MockBackend>) -> CaptureSession {
        CaptureSession::new(
            backend.clone(),
            CameraDescriptor::new("0", 90, Facing::Back),
            Arc::new(ManualTicker::new()),
            SessionOptions::default(),
        )
    }

    struct OneImage {
        image: SyntheticImage,
        acquired: Cell<bool>,
    }

    impl ImageSource for OneImage {
        fn format(&self) -> BackendResult<PixelFormat> {
            Ok(TARGET_FORMAT)
        }

        fn acquire_next_image(&self) -> BackendResult<Box<dyn CapturedImage + '_>> {
            self.acquired.set(true);
            Ok(Box::new(solid_image(
                self.image.width(),
                self.image.height(),
                1,
                2,
                3,
            )))
        }
    }

    #[test]
    fn test_state_follows_lifecycle() {
        let backend = Arc::new(MockBackend::new());
        let mut session = session(&backend);
        assert_eq!(session.state(), SessionState::Closed);

        session.open().unwrap();
        assert_eq!(session.state(), SessionState::DeviceOpen);

        session.negotiate(VideoSize::qvga()).unwrap();
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::SessionActive);
        assert!(session.is_capturing());

        session.stop();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn test_start_without_size_is_noop() {
        let backend = Arc::new(MockBackend::new());
        let mut session = session(&backend);
        session.start().unwrap();
        assert!(!session.is_capturing());
        assert!(backend.ops().is_empty());
    }

    #[test]
    fn test_reader_uses_negotiated_size_and_depth() {
        let backend = Arc::new(MockBackend::new());
        let mut session = session(&backend);
        assert_eq!(
            session.negotiate(VideoSize::new(400, 300)).unwrap(),
            VideoSize::qvga()
        );
        session.start().unwrap();
        let reader = backend.reader_config().unwrap();
        assert_eq!(reader.size, VideoSize::qvga());
        assert_eq!(reader.format, TARGET_FORMAT);
        assert_eq!(reader.max_images, 1);
        assert_eq!(backend.last_template(), Some(RequestTemplate::Record));
    }

    #[test]
    fn test_orientation_tracks_rotation() {
        let backend = Arc::new(MockBackend::new());
        let session = session(&backend);
        assert_eq!(session.orientation(), 90);
        session.set_device_rotation(90).unwrap();
        assert_eq!(session.orientation(), 0);
        assert!(session.set_device_rotation(45).is_err());
        assert_eq!(session.device_rotation(), 90);
    }

    #[test]
    fn test_listener_after_drop_touches_nothing() {
        let backend = Arc::new(MockBackend::new());
        let listener = session(&backend).image_listener();
        let source = OneImage {
            image: solid_image(4, 4, 0, 0, 0),
            acquired: Cell::new(false),
        };
        listener(&source);
        assert!(!source.acquired.get());
    }

    #[test]
    fn test_listener_while_stopped_discards() {
        let backend = Arc::new(MockBackend::new());
        let session = session(&backend);
        let listener = session.image_listener();
        let source = OneImage {
            image: solid_image(4, 4, 0, 0, 0),
            acquired: Cell::new(false),
        };
        listener(&source);
        assert!(source.acquired.get());
        assert!(session.take_frame().is_none());
        assert_eq!(session.stats().discarded, 1);
    }

    #[test]
    fn test_stop_drops_pending_frame() {
        let backend = Arc::new(MockBackend::new());
        let mut session = session(&backend);
        session.negotiate(VideoSize::qvga()).unwrap();
        session.start().unwrap();
        assert!(backend.deliver(solid_image(320, 240, 9, 9, 9)));
        assert_eq!(session.stats().converted, 1);

        session.stop();
        assert!(session.take_frame().is_none());
    }
}
