//! Capture resolution negotiation against the backend's stream table

use crate::platform::StreamConfiguration;
use crate::types::{PixelFormat, VideoSize};

/// Pick the output size closest to `requested` for `format`.
///
/// Only output entries of the target format are considered. An exact match
/// wins outright; otherwise the entry with the smallest pixel-area distance
/// is chosen, first seen on ties. Returns [`VideoSize::UNCONFIGURED`] when the
/// format is not offered at all.
pub fn negotiate(
    requested: VideoSize,
    format: PixelFormat,
    configs: &[StreamConfiguration],
) -> VideoSize {
    let requested_area = requested.area();
    let mut best: Option<(VideoSize, u64)> = None;

    for config in configs.iter().filter(|c| !c.is_input && c.format == format) {
        let size = config.size();
        log::debug!("[Negotiate] Available size {} for format {}", size, format);

        if size == requested {
            log::info!("[Negotiate] Found exact match for requested size {}", requested);
            return size;
        }

        let distance = size.area().abs_diff(requested_area);
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((size, distance));
        }
    }

    match best {
        Some((size, _)) => {
            log::warn!(
                "[Negotiate] Couldn't find requested size {}, using {} instead",
                requested,
                size
            );
            size
        }
        None => {
            log::error!("[Negotiate] No output configuration for format {}", format);
            VideoSize::UNCONFIGURED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YUV: PixelFormat = PixelFormat::Yuv420Flexible;

    fn out(width: u32, height: u32) -> StreamConfiguration {
        StreamConfiguration::output(YUV, width, height)
    }

    #[test]
    fn test_exact_match() {
        let configs = [out(320, 240), out(640, 480), out(1280, 720)];
        assert_eq!(
            negotiate(VideoSize::vga(), YUV, &configs),
            VideoSize::vga()
        );
    }

    #[test]
    fn test_closest_area_fallback() {
        let configs = [out(320, 240), out(640, 480)];
        assert_eq!(
            negotiate(VideoSize::new(400, 300), YUV, &configs),
            VideoSize::new(320, 240)
        );
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        // both 100 pixels away from 200
        let configs = [out(10, 10), out(15, 20)];
        assert_eq!(
            negotiate(VideoSize::new(10, 20), YUV, &configs),
            VideoSize::new(10, 10)
        );
    }

    #[test]
    fn test_ignores_inputs_and_other_formats() {
        let configs = [
            StreamConfiguration::input(YUV, 400, 300),
            StreamConfiguration::output(PixelFormat::Jpeg, 400, 300),
            out(1280, 720),
        ];
        assert_eq!(
            negotiate(VideoSize::new(400, 300), YUV, &configs),
            VideoSize::hd()
        );
    }

    #[test]
    fn test_no_matching_format() {
        let configs = [StreamConfiguration::output(PixelFormat::Jpeg, 640, 480)];
        assert_eq!(
            negotiate(VideoSize::vga(), YUV, &configs),
            VideoSize::UNCONFIGURED
        );
    }
}
