//! Contract tests: each code path must check the invariants it relies on

#[cfg(test)]
mod invariant_contract_tests {
    use crabcapture::invariant_ppt::{clear_invariant_log, contract_test};
    use crabcapture::session::{CaptureSession, SessionOptions};
    use crabcapture::testing::{solid_image, ManualTicker, MockBackend};
    use crabcapture::types::{CameraDescriptor, Facing, VideoSize};
    use std::sync::Arc;

    #[test]
    fn contract_capture_start_and_delivery() {
        clear_invariant_log();
        let backend = Arc::new(MockBackend::new());
        let mut session = CaptureSession::new(
            backend.clone(),
            CameraDescriptor::new("0", 0, Facing::Back),
            Arc::new(ManualTicker::new()),
            SessionOptions::default(),
        );
        session.negotiate(VideoSize::qvga()).unwrap();
        session.start().unwrap();
        // delivery runs on this thread, so frame invariants are recorded here
        backend.deliver(solid_image(320, 240, 0, 0, 0));
        session.stop();

        contract_test(
            "capture start and delivery",
            &[
                "Device must be the first resource acquired",
                "Negotiated size is either unconfigured or fully positive",
                "Frame buffer must hold exactly one I420 image",
            ],
        );
    }
}
