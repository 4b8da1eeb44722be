//! Core value types shared across the capture pipeline

use crate::convert::PooledBuffer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capture resolution in pixels
///
/// Either both dimensions are zero (unconfigured) or both are positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub const UNCONFIGURED: VideoSize = VideoSize {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// QVGA 320x240
    pub fn qvga() -> Self {
        Self::new(320, 240)
    }

    /// VGA 640x480
    pub fn vga() -> Self {
        Self::new(640, 480)
    }

    /// HD 1280x720
    pub fn hd() -> Self {
        Self::new(1280, 720)
    }

    pub fn is_configured(&self) -> bool {
        self.width != 0 && self.height != 0
    }

    /// Both zero or both positive
    pub fn is_valid(&self) -> bool {
        (self.width == 0) == (self.height == 0)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn swapped(&self) -> Self {
        Self::new(self.height, self.width)
    }
}

impl fmt::Display for VideoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for VideoSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

/// Pixel formats understood by the pipeline
///
/// Backend formats carry the numeric code the platform reports for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Flexible YUV 4:2:0 as delivered by the sensor (planar or semi-planar chroma)
    Yuv420Flexible,
    /// Fully planar I420, the canonical output format
    Yuv420Planar,
    Jpeg,
    Other(i32),
}

impl PixelFormat {
    const YUV_420_888: i32 = 0x23;
    const JPEG: i32 = 0x100;
    const I420_FOURCC: i32 = 0x3032_3449;

    pub fn code(&self) -> i32 {
        match self {
            PixelFormat::Yuv420Flexible => Self::YUV_420_888,
            PixelFormat::Yuv420Planar => Self::I420_FOURCC,
            PixelFormat::Jpeg => Self::JPEG,
            PixelFormat::Other(code) => *code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            Self::YUV_420_888 => PixelFormat::Yuv420Flexible,
            Self::I420_FOURCC => PixelFormat::Yuv420Planar,
            Self::JPEG => PixelFormat::Jpeg,
            other => PixelFormat::Other(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Yuv420Flexible => "YUV_420_888",
            PixelFormat::Yuv420Planar => "YUV420P",
            PixelFormat::Jpeg => "JPEG",
            PixelFormat::Other(_) => "OTHER",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#x})", self.as_str(), self.code())
    }
}

/// Which way a camera points relative to the primary display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    Front,
    Back,
}

impl Facing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::Front => "front",
            Facing::Back => "back",
        }
    }

    pub fn is_back(&self) -> bool {
        matches!(self, Facing::Back)
    }
}

/// One physical camera as discovered from the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub camera_id: String,
    /// Sensor mount angle in degrees (0/90/180/270)
    pub mount_orientation: i32,
    pub facing: Facing,
}

impl CameraDescriptor {
    pub fn new(camera_id: impl Into<String>, mount_orientation: i32, facing: Facing) -> Self {
        Self {
            camera_id: camera_id.into(),
            mount_orientation,
            facing,
        }
    }

    /// Identifier used by the device registry, encoding camera id and facing
    pub fn registry_id(&self) -> String {
        format!(
            "CaptureDevice{}Facing{}",
            self.camera_id,
            self.facing.as_str()
        )
    }
}

/// Canonical planar YUV 4:2:0 frame handed downstream
///
/// Planes are stored back to back (Y, then U, then V) in a pooled buffer
/// that returns to its pool when the frame is dropped.
pub struct YuvFrame {
    width: u32,
    height: u32,
    buffer: PooledBuffer,
    timestamp: Option<u64>,
}

impl YuvFrame {
    pub(crate) fn new(width: u32, height: u32, buffer: PooledBuffer) -> Self {
        crate::assert_invariant!(
            buffer.len() == Self::buffer_len(width, height),
            "Frame buffer must hold exactly one I420 image",
            "types::YuvFrame"
        );
        Self {
            width,
            height,
            buffer,
            timestamp: None,
        }
    }

    /// Chroma plane dimensions for a luma plane of the given size
    pub fn chroma_size(width: u32, height: u32) -> (u32, u32) {
        (width.div_ceil(2), height.div_ceil(2))
    }

    /// Bytes needed for an I420 image of the given size
    pub fn buffer_len(width: u32, height: u32) -> usize {
        let (cw, ch) = Self::chroma_size(width, height);
        width as usize * height as usize + 2 * (cw as usize * ch as usize)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> VideoSize {
        VideoSize::new(self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::Yuv420Planar
    }

    /// Presentation timestamp on the 90 kHz media clock, set when delivered downstream
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = Some(timestamp);
    }

    fn plane_ranges(&self) -> [std::ops::Range<usize>; 3] {
        let y_len = self.width as usize * self.height as usize;
        let (cw, ch) = Self::chroma_size(self.width, self.height);
        let c_len = cw as usize * ch as usize;
        [0..y_len, y_len..y_len + c_len, y_len + c_len..y_len + 2 * c_len]
    }

    pub fn y(&self) -> &[u8] {
        let [y, _, _] = self.plane_ranges();
        &self.buffer[y]
    }

    pub fn u(&self) -> &[u8] {
        let [_, u, _] = self.plane_ranges();
        &self.buffer[u]
    }

    pub fn v(&self) -> &[u8] {
        let [_, _, v] = self.plane_ranges();
        &self.buffer[v]
    }

    /// Mutable Y, U and V planes at once
    pub(crate) fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let [y, u, _] = self.plane_ranges();
        let (luma, chroma) = self.buffer.split_at_mut(y.end);
        let (u_plane, v_plane) = chroma.split_at_mut(u.end - u.start);
        (luma, u_plane, v_plane)
    }

    /// Whole I420 buffer
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}

impl fmt::Debug for YuvFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YuvFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.buffer.len())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_size_validity() {
        assert!(VideoSize::UNCONFIGURED.is_valid());
        assert!(!VideoSize::UNCONFIGURED.is_configured());
        assert!(VideoSize::vga().is_configured());
        assert!(!VideoSize::new(0, 480).is_valid());
        assert!(!VideoSize::new(640, 0).is_configured());
    }

    #[test]
    fn test_video_size_swap_and_area() {
        let size = VideoSize::new(640, 480);
        assert_eq!(size.swapped(), VideoSize::new(480, 640));
        assert_eq!(size.area(), 307_200);
        assert_eq!(size.to_string(), "640x480");
    }

    #[test]
    fn test_pixel_format_codes() {
        assert_eq!(PixelFormat::from_code(0x23), PixelFormat::Yuv420Flexible);
        assert_eq!(PixelFormat::from_code(0x100), PixelFormat::Jpeg);
        assert_eq!(PixelFormat::from_code(7), PixelFormat::Other(7));
        assert_eq!(PixelFormat::Other(7).code(), 7);
    }

    #[test]
    fn test_registry_id_encodes_facing() {
        let back = CameraDescriptor::new("0", 90, Facing::Back);
        let front = CameraDescriptor::new("1", 270, Facing::Front);
        assert_eq!(back.registry_id(), "CaptureDevice0Facingback");
        assert_eq!(front.registry_id(), "CaptureDevice1Facingfront");
    }

    #[test]
    fn test_i420_buffer_len_handles_odd_sizes() {
        assert_eq!(YuvFrame::buffer_len(4, 2), 8 + 2 * 2);
        assert_eq!(YuvFrame::buffer_len(3, 3), 9 + 2 * 4);
    }
}
