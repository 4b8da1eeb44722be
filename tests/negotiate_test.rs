#[cfg(test)]
mod negotiate_tests {
    use crabcapture::negotiate::negotiate;
    use crabcapture::platform::StreamConfiguration;
    use crabcapture::testing::mock_backend::default_stream_configurations;
    use crabcapture::types::{PixelFormat, VideoSize};

    const YUV: PixelFormat = PixelFormat::Yuv420Flexible;

    #[test]
    fn test_mock_table_exact_sizes() {
        let configs = default_stream_configurations();
        for size in [VideoSize::qvga(), VideoSize::vga(), VideoSize::hd()] {
            assert_eq!(negotiate(size, YUV, &configs), size);
        }
    }

    #[test]
    fn test_larger_than_any_picks_largest() {
        let configs = default_stream_configurations();
        assert_eq!(
            negotiate(VideoSize::new(3840, 2160), YUV, &configs),
            VideoSize::new(1920, 1080)
        );
    }

    #[test]
    fn test_raw_platform_table() {
        let raw = [
            0x23, 1280, 720, 0, //
            0x23, 640, 480, 0, //
            0x23, 800, 600, 1, //
            0x100, 800, 600, 0,
        ];
        let configs = StreamConfiguration::from_raw_entries(&raw);
        // 800x600 entries are input or JPEG only
        assert_eq!(
            negotiate(VideoSize::new(800, 600), YUV, &configs),
            VideoSize::vga()
        );
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(
            negotiate(VideoSize::vga(), YUV, &[]),
            VideoSize::UNCONFIGURED
        );
    }
}
