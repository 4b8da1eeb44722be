#[cfg(test)]
mod registry_tests {
    use crabcapture::registry::DeviceRegistry;
    use crabcapture::testing::MockBackend;
    use crabcapture::types::{CameraDescriptor, Facing};

    #[test]
    fn test_detect_default_mock() {
        let registry = DeviceRegistry::detect(&MockBackend::new()).unwrap();
        assert_eq!(registry.len(), 2);

        let back = registry.get("CaptureDevice0Facingback").unwrap();
        assert_eq!(back.mount_orientation, 90);
        let front = registry.by_facing(Facing::Front).unwrap();
        assert_eq!(front.camera_id, "1");
        assert_eq!(registry.default_device(), Some(front));
    }

    #[test]
    fn test_empty_backend() {
        let registry = DeviceRegistry::detect(&MockBackend::empty()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.default_device().is_none());
    }

    #[test]
    fn test_first_per_facing_wins() {
        let backend = MockBackend::empty()
            .with_camera("5", 0, Facing::Front)
            .with_camera("6", 90, Facing::Front)
            .with_camera("7", 180, Facing::Back);
        let registry = DeviceRegistry::detect(&backend).unwrap();
        let ids: Vec<&str> = registry
            .devices()
            .iter()
            .map(|d| d.camera_id.as_str())
            .collect();
        assert_eq!(ids, vec!["7", "5"]);
    }

    #[test]
    fn test_manual_registration() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.register(CameraDescriptor::new("a", 0, Facing::Back)));
        assert!(!registry.register(CameraDescriptor::new("b", 0, Facing::Back)));
        assert!(registry.get("CaptureDeviceaFacingback").is_some());
        assert!(registry.get("CaptureDevicebFacingback").is_none());
    }
}
