//! Rotation-aware plane copy

use crate::orientation::Rotation;

/// Read-only view of one image component inside a platform plane
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlaneView<'a> {
    pub data: &'a [u8],
    pub width: usize,
    pub height: usize,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl<'a> PlaneView<'a> {
    /// Smallest slice length that covers every sample of the view
    pub fn required_len(&self) -> usize {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        (self.height - 1) * self.row_stride + (self.width - 1) * self.pixel_stride + 1
    }

    pub fn is_mappable(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixel_stride > 0
            && self.row_stride >= (self.width - 1) * self.pixel_stride + 1
            && self.data.len() >= self.required_len()
    }

    #[inline]
    fn sample(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.row_stride + x * self.pixel_stride]
    }
}

/// Output dimensions of a `width` x `height` plane after `rotation`
pub(crate) fn rotated_dims(width: usize, height: usize, rotation: Rotation) -> (usize, usize) {
    if rotation.swaps_dimensions() {
        (height, width)
    } else {
        (width, height)
    }
}

/// Copy `src` into the tightly packed `dst`, rotating clockwise by `rotation`.
///
/// `dst` must hold exactly the rotated plane and `src` must be mappable.
pub(crate) fn copy_rotated(src: &PlaneView<'_>, dst: &mut [u8], rotation: Rotation) {
    let (dst_w, dst_h) = rotated_dims(src.width, src.height, rotation);
    debug_assert_eq!(dst.len(), dst_w * dst_h);

    if rotation == Rotation::Deg0 && src.pixel_stride == 1 {
        for (y, row) in dst.chunks_exact_mut(dst_w).enumerate() {
            let start = y * src.row_stride;
            row.copy_from_slice(&src.data[start..start + dst_w]);
        }
        return;
    }

    let (last_x, last_y) = (src.width - 1, src.height - 1);
    for (dy, row) in dst.chunks_exact_mut(dst_w).enumerate() {
        for (dx, px) in row.iter_mut().enumerate() {
            let (sx, sy) = match rotation {
                Rotation::Deg0 => (dx, dy),
                Rotation::Deg90 => (dy, last_y - dx),
                Rotation::Deg180 => (last_x - dx, last_y - dy),
                Rotation::Deg270 => (last_x - dy, dx),
            };
            *px = src.sample(sx, sy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 3x2 source:
    // 1 2 3
    // 4 5 6
    const SRC: [u8; 6] = [1, 2, 3, 4, 5, 6];

    fn view(data: &[u8]) -> PlaneView<'_> {
        PlaneView {
            data,
            width: 3,
            height: 2,
            row_stride: 3,
            pixel_stride: 1,
        }
    }

    fn rotate(rotation: Rotation) -> Vec<u8> {
        let mut dst = vec![0u8; 6];
        copy_rotated(&view(&SRC), &mut dst, rotation);
        dst
    }

    #[test]
    fn test_identity_copy() {
        assert_eq!(rotate(Rotation::Deg0), SRC.to_vec());
    }

    #[test]
    fn test_clockwise_quarter_turn() {
        // 4 1
        // 5 2
        // 6 3
        assert_eq!(rotate(Rotation::Deg90), vec![4, 1, 5, 2, 6, 3]);
    }

    #[test]
    fn test_half_turn() {
        assert_eq!(rotate(Rotation::Deg180), vec![6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_counter_clockwise_quarter_turn() {
        // 3 6
        // 2 5
        // 1 4
        assert_eq!(rotate(Rotation::Deg270), vec![3, 6, 2, 5, 1, 4]);
    }

    #[test]
    fn test_padded_rows_and_pixel_stride() {
        // interleaved row with padding: a x b x c x _ _
        let data = [1, 9, 2, 9, 3, 0, 0, 4, 9, 5, 9, 6];
        let src = PlaneView {
            data: &data,
            width: 3,
            height: 2,
            row_stride: 7,
            pixel_stride: 2,
        };
        assert!(src.is_mappable());
        let mut dst = vec![0u8; 6];
        copy_rotated(&src, &mut dst, Rotation::Deg0);
        assert_eq!(dst, SRC.to_vec());
    }

    #[test]
    fn test_short_slice_is_not_mappable() {
        let data = [1, 2, 3, 4, 5];
        assert!(!view(&data).is_mappable());
    }
}
