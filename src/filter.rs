//! Capture filter driven by the host media pipeline
//!
//! [`CaptureFilter`] maps the host lifecycle onto a [`CaptureSession`]:
//! preprocess starts capture when a size is configured, every process tick
//! drains the frame slot into the host's output queue, and postprocess stops
//! capture. Control calls and lifecycle hooks are serialized on one mutex;
//! the image callback never takes it.

use crate::config::{CaptureSettings, DEFAULT_FPS};
use crate::errors::CaptureError;
use crate::host::{CaptureEvent, FrameSink, MediaFilter, Ticker};
use crate::platform::CameraBackend;
use crate::registry::DeviceRegistry;
use crate::session::{CaptureSession, CaptureStats, SessionOptions, SessionState};
use crate::timing::{media_timestamp, AverageFps};
use crate::types::{CameraDescriptor, PixelFormat, VideoSize};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Outcome of [`CaptureFilter::set_video_size`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeChange {
    /// Capture was renegotiated and restarted
    Applied,
    /// Same size as before; nothing happened
    Unchanged,
}

struct FilterState {
    session: CaptureSession,
    fps: f32,
    requested: VideoSize,
    average: AverageFps,
    delivered: u64,
}

pub struct CaptureFilter {
    state: Mutex<FilterState>,
    ticker: Arc<dyn Ticker>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<CaptureEvent>>>,
}

impl CaptureFilter {
    /// Filter for `device` with default settings
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        device: CameraDescriptor,
        ticker: Arc<dyn Ticker>,
    ) -> Self {
        Self::with_settings(backend, device, ticker, &CaptureSettings::default())
    }

    /// Filter seeded from `settings`.
    ///
    /// A configured default resolution is negotiated right away; if that
    /// fails the filter starts unconfigured. An unusable default fps falls
    /// back to [`DEFAULT_FPS`].
    pub fn with_settings(
        backend: Arc<dyn CameraBackend>,
        device: CameraDescriptor,
        ticker: Arc<dyn Ticker>,
        settings: &CaptureSettings,
    ) -> Self {
        if let Err(e) = settings.validate() {
            log::warn!("[Filter] Capture settings invalid: {}", e);
        }
        let fps = if CaptureSettings::is_valid_fps(settings.capture.default_fps) {
            settings.capture.default_fps
        } else {
            log::warn!(
                "[Filter] Default fps {} unusable, falling back to {}",
                settings.capture.default_fps,
                DEFAULT_FPS
            );
            DEFAULT_FPS
        };
        let mut session = CaptureSession::new(
            backend,
            device,
            ticker.clone(),
            SessionOptions::from(settings),
        );
        session.reset_rate(fps);

        let mut requested = settings.capture.resolution();
        if requested.is_configured() {
            if let Err(e) = session.negotiate(requested) {
                log::error!("[Filter] Default resolution {} unusable: {}", requested, e);
                requested = VideoSize::UNCONFIGURED;
            }
        }

        Self {
            state: Mutex::new(FilterState {
                session,
                fps,
                requested,
                average: AverageFps::new(fps),
                delivered: 0,
            }),
            ticker,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Filter bound to the registered device `registry_id`
    pub fn for_device(
        backend: Arc<dyn CameraBackend>,
        registry: &DeviceRegistry,
        registry_id: &str,
        ticker: Arc<dyn Ticker>,
    ) -> Result<Self, CaptureError> {
        let device = registry.get(registry_id).cloned().ok_or_else(|| {
            CaptureError::InvalidArgument(format!("no registered device {}", registry_id))
        })?;
        Ok(Self::new(backend, device, ticker))
    }

    /// Tear the filter down, releasing every backend resource
    pub fn uninit(self) {
        log::debug!("[Filter] Uninit");
    }

    /// Receive size-change notifications from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CaptureEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn notify(&self, event: CaptureEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event).is_ok());
    }

    fn lock(&self) -> MutexGuard<'_, FilterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the target frame rate; restarts rate admission and the fps average
    pub fn set_fps(&self, fps: f32) -> Result<(), CaptureError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CaptureError::InvalidArgument(format!(
                "frame rate must be positive, got {}",
                fps
            )));
        }
        let mut state = self.lock();
        state.fps = fps;
        state.session.reset_rate(fps);
        state.average.reset(fps);
        log::info!("[Filter] Frame rate set to {}", fps);
        Ok(())
    }

    /// Measured average frame rate, 0 until two frames went out
    pub fn get_fps(&self) -> f32 {
        self.lock().average.get()
    }

    pub fn target_fps(&self) -> f32 {
        self.lock().fps
    }

    /// Request a new capture size.
    ///
    /// A size equal to the last request is a no-op. Otherwise capture is
    /// stopped, the size renegotiated and capture restarted; subscribers are
    /// told the negotiated size. On failure capture stays stopped and the
    /// next request is applied regardless of its size.
    pub fn set_video_size(&self, size: VideoSize) -> Result<SizeChange, CaptureError> {
        if !size.is_valid() {
            return Err(CaptureError::InvalidArgument(format!(
                "capture size {} must be fully zero or fully positive",
                size
            )));
        }

        let mut state = self.lock();
        if size == state.requested {
            log::info!("[Filter] Capture size already {}", size);
            return Ok(SizeChange::Unchanged);
        }

        if state.session.is_capturing() {
            state.session.stop();
        }

        let applied = match state.session.negotiate(size) {
            Ok(negotiated) => state.session.start().map(|()| negotiated),
            Err(e) => Err(e),
        };
        let negotiated = match applied {
            Ok(negotiated) => negotiated,
            Err(e) => {
                log::error!("[Filter] Could not apply capture size {}: {}", size, e);
                state.requested = VideoSize::UNCONFIGURED;
                return Err(e);
            }
        };
        state.requested = size;
        drop(state);

        log::info!(
            "[Filter] Capture size {} requested, {} negotiated",
            size,
            negotiated
        );
        self.notify(CaptureEvent::PreviewSizeChanged(negotiated));
        Ok(SizeChange::Applied)
    }

    /// Negotiated size as seen by the viewer, swapped for quarter-turn orientations
    pub fn get_video_size(&self) -> VideoSize {
        let state = self.lock();
        let size = state.session.size();
        if state.session.orientation() % 180 != 0 {
            size.swapped()
        } else {
            size
        }
    }

    pub fn set_device_rotation(&self, degrees: i32) -> Result<(), CaptureError> {
        self.lock().session.set_device_rotation(degrees)
    }

    /// Format of every frame this filter outputs
    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Yuv420Planar
    }

    pub fn state(&self) -> SessionState {
        self.lock().session.state()
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().session.is_capturing()
    }

    pub fn stats(&self) -> CaptureStats {
        let state = self.lock();
        CaptureStats {
            delivered: state.delivered,
            ..state.session.stats()
        }
    }
}

impl MediaFilter for CaptureFilter {
    fn preprocess(&self) {
        let mut state = self.lock();
        let fps = state.fps;
        state.session.reset_rate(fps);
        state.average.reset(fps);

        if state.session.size().is_configured() {
            if let Err(e) = state.session.start() {
                log::error!("[Filter] Capture did not start: {}", e);
            }
        }
    }

    fn process(&self, output: &mut dyn FrameSink) {
        let mut state = self.lock();
        let Some(mut frame) = state.session.take_frame() else {
            return;
        };

        let now = self.ticker.time_ms();
        frame.set_timestamp(media_timestamp(now));
        state.average.update(now);
        state.delivered += 1;
        output.put(frame);
    }

    fn postprocess(&self) {
        let mut state = self.lock();
        if state.session.is_capturing() {
            state.session.stop();
        }
    }
}
