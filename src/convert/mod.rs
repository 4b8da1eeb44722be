//! Raw sensor image to canonical I420 conversion
//!
//! Two chroma layouts are supported and picked from the chroma pixel stride:
//! a stride of 1 takes the planar path (row copies when no rotation is
//! needed), any other stride takes the de-interleave path where U and V are
//! sampled out of one interleaved plane. Rotation happens during the copy and
//! the output dimensions are swapped for quarter turns.

pub mod pool;
mod rotate;

pub use pool::{BufferPool, PooledBuffer};

use crate::orientation::Rotation;
use crate::platform::{CapturedImage, Plane};
use crate::types::YuvFrame;
use rotate::{copy_rotated, PlaneView};

/// How the two chroma components are laid out in the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaLayout {
    /// Separate U and V planes with unit pixel stride
    Planar,
    /// U and V interleaved in one plane; each plane view starts at its own
    /// component and steps by `pixel_stride`
    SemiPlanar { pixel_stride: usize },
}

impl ChromaLayout {
    pub fn detect(u: &Plane<'_>) -> Self {
        if u.pixel_stride == 1 {
            ChromaLayout::Planar
        } else {
            ChromaLayout::SemiPlanar {
                pixel_stride: u.pixel_stride,
            }
        }
    }
}

/// Converts captured images into pooled [`YuvFrame`]s
pub struct PixelConverter {
    pool: BufferPool,
}

impl PixelConverter {
    pub fn new(pool: BufferPool) -> Self {
        Self { pool }
    }

    pub fn with_pool_capacity(max_buffers: usize) -> Self {
        Self::new(BufferPool::new(max_buffers))
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Convert `image` into a canonical frame rotated clockwise by `rotation`.
    ///
    /// Returns `None` when the image cannot be mapped (degenerate size,
    /// missing planes, plane data shorter than its strides imply). Callers
    /// skip the frame in that case.
    pub fn convert(&self, image: &dyn CapturedImage, rotation: Rotation) -> Option<YuvFrame> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            log::warn!("[Convert] Degenerate image size {}x{}", width, height);
            return None;
        }

        let (y, u, v) = match (image.plane(0), image.plane(1), image.plane(2)) {
            (Some(y), Some(u), Some(v)) => (y, u, v),
            _ => {
                log::warn!("[Convert] Image is missing one of its three planes");
                return None;
            }
        };

        let layout = ChromaLayout::detect(&u);
        log::trace!(
            "[Convert] Image {}x{} rotation {} ystride {} uvstride {} layout {:?}",
            width,
            height,
            rotation.degrees(),
            y.row_stride,
            u.row_stride,
            layout
        );

        let (cw, ch) = YuvFrame::chroma_size(width, height);
        let luma = view(&y, width, height, 1);
        let chroma_stride = match layout {
            ChromaLayout::Planar => 1,
            ChromaLayout::SemiPlanar { pixel_stride } => pixel_stride,
        };
        let u_view = view(&u, cw, ch, chroma_stride);
        let v_view = view(&v, cw, ch, chroma_stride);

        if !(luma.is_mappable() && u_view.is_mappable() && v_view.is_mappable()) {
            log::warn!(
                "[Convert] Plane data too short for {}x{} image, dropping frame",
                width,
                height
            );
            return None;
        }

        let (out_w, out_h) = if rotation.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        };
        let buffer = self.pool.acquire(YuvFrame::buffer_len(out_w, out_h));
        let mut frame = YuvFrame::new(out_w, out_h, buffer);

        let (dst_y, dst_u, dst_v) = frame.planes_mut();
        copy_rotated(&luma, dst_y, rotation);
        copy_rotated(&u_view, dst_u, rotation);
        copy_rotated(&v_view, dst_v, rotation);

        Some(frame)
    }
}

impl Default for PixelConverter {
    fn default() -> Self {
        Self::new(BufferPool::default())
    }
}

fn view<'a>(plane: &Plane<'a>, width: u32, height: u32, pixel_stride: usize) -> PlaneView<'a> {
    PlaneView {
        data: plane.data,
        width: width as usize,
        height: height as usize,
        row_stride: plane.row_stride,
        pixel_stride,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_data::{planar_image, semi_planar_image, ChromaOrder};
    use crate::types::VideoSize;

    #[test]
    fn test_planar_identity() {
        let image = planar_image(4, 2, |x, y| (y * 4 + x) as u8, |_, _| 10, |_, _| 20);
        let frame = PixelConverter::default()
            .convert(&image, Rotation::Deg0)
            .unwrap();
        assert_eq!(frame.size(), VideoSize::new(4, 2));
        assert_eq!(frame.y(), &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(frame.u(), &[10, 10]);
        assert_eq!(frame.v(), &[20, 20]);
    }

    #[test]
    fn test_quarter_turn_swaps_dimensions() {
        let image = planar_image(4, 2, |x, y| (y * 4 + x) as u8, |x, _| x as u8, |_, _| 0);
        let frame = PixelConverter::default()
            .convert(&image, Rotation::Deg90)
            .unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 4);
        // column 0 of the source read bottom-up becomes row 0
        assert_eq!(&frame.y()[0..2], &[4, 0]);
        assert_eq!(&frame.y()[6..8], &[7, 3]);
        // chroma 2x1 becomes 1x2
        assert_eq!(frame.u(), &[0, 1]);
    }

    #[test]
    fn test_semi_planar_chroma_order_preserved() {
        for order in [ChromaOrder::UFirst, ChromaOrder::VFirst] {
            let image = semi_planar_image(4, 4, order, |_, _| 128, |_, _| 50, |_, _| 200);
            let frame = PixelConverter::default()
                .convert(&image, Rotation::Deg0)
                .unwrap();
            assert!(frame.u().iter().all(|&b| b == 50), "{order:?}");
            assert!(frame.v().iter().all(|&b| b == 200), "{order:?}");
        }
    }

    #[test]
    fn test_layout_detection() {
        let planar = planar_image(2, 2, |_, _| 0, |_, _| 0, |_, _| 0);
        let nv21 = semi_planar_image(2, 2, ChromaOrder::VFirst, |_, _| 0, |_, _| 0, |_, _| 0);
        let layout = |image: &dyn CapturedImage| {
            ChromaLayout::detect(&image.plane(1).unwrap())
        };
        assert_eq!(layout(&planar), ChromaLayout::Planar);
        assert_eq!(
            layout(&nv21),
            ChromaLayout::SemiPlanar { pixel_stride: 2 }
        );
    }

    #[test]
    fn test_degenerate_image_is_skipped() {
        let image = planar_image(0, 0, |_, _| 0, |_, _| 0, |_, _| 0);
        assert!(PixelConverter::default()
            .convert(&image, Rotation::Deg0)
            .is_none());
    }

    #[test]
    fn test_missing_plane_is_skipped() {
        let image = planar_image(2, 2, |_, _| 0, |_, _| 0, |_, _| 0).without_plane(2);
        assert!(PixelConverter::default()
            .convert(&image, Rotation::Deg0)
            .is_none());
    }

    #[test]
    fn test_frames_reuse_pool_buffers() {
        let converter = PixelConverter::with_pool_capacity(2);
        let image = planar_image(8, 8, |_, _| 1, |_, _| 2, |_, _| 3);
        drop(converter.convert(&image, Rotation::Deg0).unwrap());
        assert_eq!(converter.pool().available(), 1);
        let _frame = converter.convert(&image, Rotation::Deg0).unwrap();
        assert_eq!(converter.pool().available(), 0);
    }
}
