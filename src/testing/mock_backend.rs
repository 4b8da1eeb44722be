//! In-memory camera backend
//!
//! Records every acquisition and release in order so tests can check pairing
//! and teardown order, injects a failure at any acquisition step, and delivers
//! synthetic images through the registered listener either synchronously or
//! from a background feed thread.

use super::synthetic_data::{gradient_image, SyntheticImage};
use crate::platform::{
    BackendError, BackendEvent, BackendResult, CameraBackend, CameraCharacteristics,
    CapturedImage, EventListener, Handle, ImageListener, ImageSource, Plane, RequestTemplate,
    Resource, ResourceKind, StreamConfiguration,
};
use crate::types::{Facing, PixelFormat, VideoSize};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::cell::Cell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Status code reported for injected failures
pub const INJECTED_FAILURE: i32 = -10_001;

/// One recorded backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOp {
    Acquired(ResourceKind),
    Released(ResourceKind),
}

struct MockCamera {
    id: String,
    characteristics: CameraCharacteristics,
    configs: Vec<StreamConfiguration>,
    readable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    pub size: VideoSize,
    pub format: PixelFormat,
    pub max_images: u32,
}

struct MockState {
    ops: Vec<MockOp>,
    live: Vec<(ResourceKind, Handle)>,
    fail_at: HashSet<ResourceKind>,
    fail_enumeration: bool,
    reader_format: Option<PixelFormat>,
    reader: Option<ReaderConfig>,
    template: Option<RequestTemplate>,
    image_listener: Option<ImageListener>,
    device_events: Option<EventListener>,
    session_events: Option<EventListener>,
}

/// Fake [`CameraBackend`] for tests and the simulator
pub struct MockBackend {
    cameras: Mutex<Vec<MockCamera>>,
    state: Mutex<MockState>,
    next_handle: AtomicU64,
    images_acquired: AtomicUsize,
    images_released: AtomicUsize,
}

/// Stream table every mock camera starts with
pub fn default_stream_configurations() -> Vec<StreamConfiguration> {
    let yuv = PixelFormat::Yuv420Flexible;
    vec![
        StreamConfiguration::output(yuv, 1920, 1080),
        StreamConfiguration::output(yuv, 1280, 720),
        StreamConfiguration::output(yuv, 640, 480),
        StreamConfiguration::output(yuv, 320, 240),
        StreamConfiguration::output(PixelFormat::Jpeg, 4032, 3024),
        StreamConfiguration::input(yuv, 4032, 3024),
    ]
}

impl MockBackend {
    /// Backend with a back camera "0" mounted at 90 and a front camera "1" mounted at 270
    pub fn new() -> Self {
        Self::empty()
            .with_camera("0", 90, Facing::Back)
            .with_camera("1", 270, Facing::Front)
    }

    /// Backend without cameras
    pub fn empty() -> Self {
        Self {
            cameras: Mutex::new(Vec::new()),
            state: Mutex::new(MockState {
                ops: Vec::new(),
                live: Vec::new(),
                fail_at: HashSet::new(),
                fail_enumeration: false,
                reader_format: None,
                reader: None,
                template: None,
                image_listener: None,
                device_events: None,
                session_events: None,
            }),
            next_handle: AtomicU64::new(1),
            images_acquired: AtomicUsize::new(0),
            images_released: AtomicUsize::new(0),
        }
    }

    pub fn with_camera(self, id: &str, mount_orientation: i32, facing: Facing) -> Self {
        lock(&self.cameras).push(MockCamera {
            id: id.to_string(),
            characteristics: CameraCharacteristics {
                mount_orientation,
                facing,
            },
            configs: default_stream_configurations(),
            readable: true,
        });
        self
    }

    pub fn set_stream_configurations(&self, camera_id: &str, configs: Vec<StreamConfiguration>) {
        if let Some(camera) = lock(&self.cameras).iter_mut().find(|c| c.id == camera_id) {
            camera.configs = configs;
        }
    }

    /// Make characteristics of `camera_id` unreadable
    pub fn set_unreadable(&self, camera_id: &str) {
        if let Some(camera) = lock(&self.cameras).iter_mut().find(|c| c.id == camera_id) {
            camera.readable = false;
        }
    }

    /// Fail every future acquisition of `kind`
    pub fn fail_at(&self, kind: ResourceKind) {
        lock(&self.state).fail_at.insert(kind);
    }

    pub fn clear_failures(&self) {
        let mut state = lock(&self.state);
        state.fail_at.clear();
        state.fail_enumeration = false;
    }

    pub fn fail_enumeration(&self) {
        lock(&self.state).fail_enumeration = true;
    }

    /// Override the format the reader reports, independent of what was requested
    pub fn set_reader_format(&self, format: PixelFormat) {
        lock(&self.state).reader_format = Some(format);
    }

    pub fn ops(&self) -> Vec<MockOp> {
        lock(&self.state).ops.clone()
    }

    pub fn clear_ops(&self) {
        lock(&self.state).ops.clear();
    }

    /// Number of handles acquired and not yet released
    pub fn live_count(&self) -> usize {
        lock(&self.state).live.len()
    }

    pub fn live_kinds(&self) -> Vec<ResourceKind> {
        lock(&self.state).live.iter().map(|(kind, _)| *kind).collect()
    }

    pub fn is_repeating(&self) -> bool {
        lock(&self.state)
            .live
            .iter()
            .any(|(kind, _)| *kind == ResourceKind::Repeating)
    }

    /// Configuration of the most recently created image reader
    pub fn reader_config(&self) -> Option<ReaderConfig> {
        lock(&self.state).reader
    }

    pub fn last_template(&self) -> Option<RequestTemplate> {
        lock(&self.state).template
    }

    pub fn images_acquired(&self) -> usize {
        self.images_acquired.load(Ordering::SeqCst)
    }

    pub fn images_released(&self) -> usize {
        self.images_released.load(Ordering::SeqCst)
    }

    /// Hand `image` to the registered image listener on the calling thread.
    ///
    /// Returns `false` when no listener is registered or no repeating request is active.
    pub fn deliver(&self, image: SyntheticImage) -> bool {
        let (listener, format) = {
            let state = lock(&self.state);
            let repeating = state
                .live
                .iter()
                .any(|(kind, _)| *kind == ResourceKind::Repeating);
            let format = state
                .reader_format
                .or(state.reader.map(|r| r.format))
                .unwrap_or(PixelFormat::Yuv420Flexible);
            match (&state.image_listener, repeating) {
                (Some(listener), true) => (listener.clone(), format),
                _ => return false,
            }
        };

        let source = MockSource {
            backend: self,
            format,
            image,
            taken: Cell::new(false),
        };
        listener(&source);
        true
    }

    /// Send `event` to the device or session listener it belongs to.
    ///
    /// Returns `false` when nobody is listening.
    pub fn emit(&self, event: BackendEvent) -> bool {
        let listener = {
            let state = lock(&self.state);
            match event {
                BackendEvent::DeviceDisconnected { .. } | BackendEvent::DeviceError { .. } => {
                    state.device_events.clone()
                }
                _ => state.session_events.clone(),
            }
        };
        match listener {
            Some(listener) => {
                listener(event);
                true
            }
            None => false,
        }
    }

    /// Deliver gradient images at `fps` from a background thread until the handle is stopped
    pub fn start_feed(self: &Arc<Self>, fps: f32) -> FeedHandle {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let backend = Arc::clone(self);
        let interval = Duration::from_secs_f32(1.0 / fps.max(0.1));

        let thread = std::thread::spawn(move || {
            let mut frame_number = 0u64;
            let mut delivered = 0u64;
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let size = backend
                            .reader_config()
                            .map(|r| r.size)
                            .unwrap_or_else(VideoSize::qvga);
                        if backend.deliver(gradient_image(frame_number, size.width, size.height)) {
                            delivered += 1;
                        }
                        frame_number += 1;
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            delivered
        });

        FeedHandle {
            stop_tx,
            thread: Some(thread),
        }
    }

    fn camera<T>(
        &self,
        camera_id: &str,
        read: impl FnOnce(&MockCamera) -> T,
    ) -> BackendResult<T> {
        let cameras = lock(&self.cameras);
        match cameras.iter().find(|c| c.id == camera_id) {
            Some(camera) if camera.readable => Ok(read(camera)),
            Some(_) => Err(BackendError::new(INJECTED_FAILURE, "characteristics unavailable")),
            None => Err(BackendError::new(-2, format!("unknown camera {}", camera_id))),
        }
    }

    fn acquire(&self, kind: ResourceKind) -> BackendResult<Handle> {
        let mut state = lock(&self.state);
        if state.fail_at.contains(&kind) {
            return Err(BackendError::new(
                INJECTED_FAILURE,
                format!("injected failure creating {}", kind),
            ));
        }
        let handle = Handle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        state.live.push((kind, handle));
        state.ops.push(MockOp::Acquired(kind));
        Ok(handle)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for MockBackend {
    fn camera_ids(&self) -> BackendResult<Vec<String>> {
        if lock(&self.state).fail_enumeration {
            return Err(BackendError::new(INJECTED_FAILURE, "camera manager unavailable"));
        }
        Ok(lock(&self.cameras).iter().map(|c| c.id.clone()).collect())
    }

    fn characteristics(&self, camera_id: &str) -> BackendResult<CameraCharacteristics> {
        self.camera(camera_id, |c| c.characteristics.clone())
    }

    fn stream_configurations(&self, camera_id: &str) -> BackendResult<Vec<StreamConfiguration>> {
        self.camera(camera_id, |c| c.configs.clone())
    }

    fn open_device(&self, camera_id: &str, events: EventListener) -> BackendResult<Handle> {
        self.camera(camera_id, |_| ())?;
        let handle = self.acquire(ResourceKind::Device)?;
        lock(&self.state).device_events = Some(events);
        Ok(handle)
    }

    fn create_output_container(&self) -> BackendResult<Handle> {
        self.acquire(ResourceKind::OutputContainer)
    }

    fn create_image_reader(
        &self,
        size: VideoSize,
        format: PixelFormat,
        max_images: u32,
    ) -> BackendResult<Handle> {
        let handle = self.acquire(ResourceKind::ImageReader)?;
        lock(&self.state).reader = Some(ReaderConfig {
            size,
            format,
            max_images,
        });
        Ok(handle)
    }

    fn set_image_listener(&self, _reader: Handle, listener: ImageListener) -> BackendResult<()> {
        lock(&self.state).image_listener = Some(listener);
        Ok(())
    }

    fn acquire_window(&self, _reader: Handle) -> BackendResult<Handle> {
        self.acquire(ResourceKind::Window)
    }

    fn create_session_output(&self, _window: Handle, _container: Handle) -> BackendResult<Handle> {
        self.acquire(ResourceKind::SessionOutput)
    }

    fn create_capture_request(
        &self,
        _device: Handle,
        template: RequestTemplate,
    ) -> BackendResult<Handle> {
        let handle = self.acquire(ResourceKind::CaptureRequest)?;
        lock(&self.state).template = Some(template);
        Ok(handle)
    }

    fn create_output_target(&self, _window: Handle, _request: Handle) -> BackendResult<Handle> {
        self.acquire(ResourceKind::OutputTarget)
    }

    fn create_capture_session(
        &self,
        _device: Handle,
        _container: Handle,
        events: EventListener,
    ) -> BackendResult<Handle> {
        let handle = self.acquire(ResourceKind::Session)?;
        lock(&self.state).session_events = Some(events);
        Ok(handle)
    }

    fn set_repeating_request(&self, _session: Handle, _request: Handle) -> BackendResult<()> {
        self.acquire(ResourceKind::Repeating).map(|_| ())
    }

    fn release(&self, resource: &Resource) -> BackendResult<()> {
        let kind = resource.kind();
        let mut state = lock(&self.state);
        state.ops.push(MockOp::Released(kind));

        // Repeating entries are keyed by kind alone; their handle is the session's
        let position = state.live.iter().position(|(k, h)| {
            *k == kind && (kind == ResourceKind::Repeating || *h == resource.handle())
        });
        if let Some(position) = position {
            state.live.remove(position);
        }

        match kind {
            ResourceKind::ImageReader => state.image_listener = None,
            ResourceKind::Device => state.device_events = None,
            ResourceKind::Session => state.session_events = None,
            _ => {}
        }
        Ok(())
    }
}

/// Background delivery thread started by [`MockBackend::start_feed`]
pub struct FeedHandle {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<u64>>,
}

impl FeedHandle {
    /// Stop the feed and return how many images reached the listener
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        let _ = self.stop_tx.try_send(());
        self.thread
            .take()
            .and_then(|thread| thread.join().ok())
            .unwrap_or(0)
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct MockSource<'a> {
    backend: &'a MockBackend,
    format: PixelFormat,
    image: SyntheticImage,
    taken: Cell<bool>,
}

impl ImageSource for MockSource<'_> {
    fn format(&self) -> BackendResult<PixelFormat> {
        Ok(self.format)
    }

    fn acquire_next_image(&self) -> BackendResult<Box<dyn CapturedImage + '_>> {
        if self.taken.replace(true) {
            return Err(BackendError::new(-3, "no image available"));
        }
        self.backend.images_acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockImage {
            image: &self.image,
            released: &self.backend.images_released,
        }))
    }
}

struct MockImage<'a> {
    image: &'a SyntheticImage,
    released: &'a AtomicUsize,
}

impl CapturedImage for MockImage<'_> {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn plane(&self, index: usize) -> Option<Plane<'_>> {
        self.image.plane(index)
    }
}

impl Drop for MockImage<'_> {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_failure_acquires_nothing() {
        let backend = MockBackend::new();
        backend.fail_at(ResourceKind::OutputContainer);
        assert!(backend.create_output_container().is_err());
        assert_eq!(backend.live_count(), 0);
        assert!(backend.ops().is_empty());
    }

    #[test]
    fn test_release_pairs_with_acquire() {
        let backend = MockBackend::new();
        let handle = backend.create_output_container().unwrap();
        assert_eq!(backend.live_count(), 1);
        backend.release(&Resource::OutputContainer(handle)).unwrap();
        assert_eq!(backend.live_count(), 0);
        assert_eq!(
            backend.ops(),
            vec![
                MockOp::Acquired(ResourceKind::OutputContainer),
                MockOp::Released(ResourceKind::OutputContainer),
            ]
        );
    }

    #[test]
    fn test_deliver_requires_listener_and_repeating() {
        let backend = MockBackend::new();
        assert!(!backend.deliver(gradient_image(0, 4, 4)));
    }

    #[test]
    fn test_unknown_camera() {
        let backend = MockBackend::new();
        assert!(backend.characteristics("9").is_err());
        backend.set_unreadable("1");
        assert!(backend.characteristics("1").is_err());
        assert!(backend.characteristics("0").is_ok());
    }
}
