//! Effective capture rotation from sensor mount, facing and device rotation

use crate::types::{CameraDescriptor, Facing};
use serde::{Deserialize, Serialize};

/// Clockwise rotation applied while copying a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Right-angle rotation for an angle in degrees, any sign.
    ///
    /// Returns `None` for angles that are not a multiple of 90.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether output width and height are exchanged
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// Resolve the capture angle in `[0, 360)`.
///
/// Back-facing sensors subtract the live device rotation from their mount
/// orientation; front-facing sensors add it.
pub fn resolve(mount_orientation: i32, facing: Facing, device_rotation: i32) -> i32 {
    let angle = match facing {
        Facing::Back => mount_orientation - device_rotation,
        Facing::Front => mount_orientation + device_rotation,
    };
    angle.rem_euclid(360)
}

/// [`resolve`] for a discovered camera
pub fn resolve_for(device: &CameraDescriptor, device_rotation: i32) -> i32 {
    resolve(device.mount_orientation, device.facing, device_rotation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_facing_subtracts_rotation() {
        assert_eq!(resolve(90, Facing::Back, 90), 0);
        assert_eq!(resolve(90, Facing::Back, 0), 90);
        assert_eq!(resolve(90, Facing::Back, 180), 270);
        assert_eq!(resolve(0, Facing::Back, 270), 90);
    }

    #[test]
    fn test_front_facing_adds_rotation() {
        assert_eq!(resolve(90, Facing::Front, 90), 180);
        assert_eq!(resolve(270, Facing::Front, 90), 0);
        assert_eq!(resolve(270, Facing::Front, 270), 180);
    }

    #[test]
    fn test_result_always_in_range() {
        for mount in [0, 90, 180, 270] {
            for rotation in [0, 90, 180, 270] {
                for facing in [Facing::Front, Facing::Back] {
                    let angle = resolve(mount, facing, rotation);
                    assert!((0..360).contains(&angle), "{mount} {rotation} {facing:?}");
                    assert_eq!(angle % 90, 0);
                }
            }
        }
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(0), Some(Rotation::Deg0));
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
        assert!(Rotation::Deg90.swaps_dimensions());
        assert!(!Rotation::Deg180.swaps_dimensions());
    }
}
