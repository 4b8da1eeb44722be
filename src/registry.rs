//! Camera discovery
//!
//! Enumerates the backend's cameras and keeps at most one per facing. The
//! first camera found for a facing wins; registration prepends, so the most
//! recently registered facing is listed first.

use crate::errors::CaptureError;
use crate::platform::CameraBackend;
use crate::types::{CameraDescriptor, Facing};

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<CameraDescriptor>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate cameras on `backend` and register one per facing.
    ///
    /// Cameras whose characteristics cannot be read are skipped. Fails only
    /// when the camera list itself is unavailable.
    pub fn detect(backend: &dyn CameraBackend) -> Result<Self, CaptureError> {
        let ids = backend.camera_ids().map_err(|e| {
            log::error!("[Registry] Failed to get camera id list: {}", e);
            CaptureError::from(e)
        })?;

        let mut registry = Self::new();
        for camera_id in ids {
            let characteristics = match backend.characteristics(&camera_id) {
                Ok(characteristics) => characteristics,
                Err(e) => {
                    log::warn!(
                        "[Registry] Skipping camera {}: characteristics unavailable ({})",
                        camera_id,
                        e
                    );
                    continue;
                }
            };

            registry.register(CameraDescriptor::new(
                camera_id,
                characteristics.mount_orientation,
                characteristics.facing,
            ));
        }

        if registry.is_empty() {
            log::warn!("[Registry] No camera found");
        }
        Ok(registry)
    }

    /// Add `device` unless a camera with the same facing is already registered.
    ///
    /// Returns whether the device was added.
    pub fn register(&mut self, device: CameraDescriptor) -> bool {
        if let Some(existing) = self.by_facing(device.facing) {
            log::info!(
                "[Registry] Ignoring camera {}, {} facing already served by camera {}",
                device.camera_id,
                device.facing.as_str(),
                existing.camera_id
            );
            return false;
        }

        log::info!(
            "[Registry] Camera {} is facing {} with angle {}",
            device.camera_id,
            device.facing.as_str(),
            device.mount_orientation
        );
        self.devices.insert(0, device);
        true
    }

    pub fn devices(&self) -> &[CameraDescriptor] {
        &self.devices
    }

    /// Look up a device by its registry id (`CaptureDevice{id}Facing{facing}`)
    pub fn get(&self, registry_id: &str) -> Option<&CameraDescriptor> {
        self.devices.iter().find(|d| d.registry_id() == registry_id)
    }

    pub fn by_facing(&self, facing: Facing) -> Option<&CameraDescriptor> {
        self.devices.iter().find(|d| d.facing == facing)
    }

    /// First listed device
    pub fn default_device(&self) -> Option<&CameraDescriptor> {
        self.devices.first()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;

    #[test]
    fn test_detect_registers_one_per_facing() {
        let backend = MockBackend::new().with_camera("2", 90, Facing::Back);
        let registry = DeviceRegistry::detect(&backend).unwrap();
        assert_eq!(registry.len(), 2);
        // camera 2 lost to camera 0
        assert_eq!(registry.by_facing(Facing::Back).unwrap().camera_id, "0");
    }

    #[test]
    fn test_registration_prepends() {
        let registry = DeviceRegistry::detect(&MockBackend::new()).unwrap();
        let ids: Vec<_> = registry.devices().iter().map(|d| d.registry_id()).collect();
        assert_eq!(
            ids,
            vec!["CaptureDevice1Facingfront", "CaptureDevice0Facingback"]
        );
    }

    #[test]
    fn test_unreadable_camera_is_skipped() {
        let backend = MockBackend::new();
        backend.set_unreadable("0");
        let registry = DeviceRegistry::detect(&backend).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.by_facing(Facing::Back).is_none());
    }

    #[test]
    fn test_enumeration_failure() {
        let backend = MockBackend::new();
        backend.fail_enumeration();
        assert!(matches!(
            DeviceRegistry::detect(&backend),
            Err(CaptureError::BackendUnavailable(_))
        ));
    }
}
