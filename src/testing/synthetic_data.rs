//! Synthetic sensor images
//!
//! Builders for the two chroma layouts a camera delivers: fully planar images
//! with unit chroma pixel stride, and semi-planar NV12/NV21 images where U and
//! V share one interleaved plane. Pixel values come from closures taking
//! `(x, y)` in plane coordinates, so tests can check exact sample positions
//! after rotation.

use crate::platform::{CapturedImage, Plane};
use crate::types::YuvFrame;

/// Which chroma component sits at the lower address of an interleaved plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaOrder {
    /// NV12
    UFirst,
    /// NV21
    VFirst,
}

enum Chroma {
    Planar {
        u: Vec<u8>,
        v: Vec<u8>,
        row_stride: usize,
    },
    Interleaved {
        data: Vec<u8>,
        row_stride: usize,
        order: ChromaOrder,
    },
}

/// In-memory YUV 4:2:0 image implementing [`CapturedImage`]
pub struct SyntheticImage {
    width: u32,
    height: u32,
    luma: Vec<u8>,
    luma_stride: usize,
    chroma: Chroma,
    missing_plane: Option<usize>,
}

impl SyntheticImage {
    /// Pretend the backend returned no data for plane `index`
    pub fn without_plane(mut self, index: usize) -> Self {
        self.missing_plane = Some(index);
        self
    }

    /// Byte size of the luma plane including row padding
    pub fn luma_len(&self) -> usize {
        self.luma.len()
    }
}

impl CapturedImage for SyntheticImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn plane(&self, index: usize) -> Option<Plane<'_>> {
        if self.missing_plane == Some(index) {
            return None;
        }
        match (index, &self.chroma) {
            (0, _) => Some(Plane {
                data: &self.luma,
                row_stride: self.luma_stride,
                pixel_stride: 1,
            }),
            (1, Chroma::Planar { u, row_stride, .. }) => Some(Plane {
                data: u,
                row_stride: *row_stride,
                pixel_stride: 1,
            }),
            (2, Chroma::Planar { v, row_stride, .. }) => Some(Plane {
                data: v,
                row_stride: *row_stride,
                pixel_stride: 1,
            }),
            (1 | 2, Chroma::Interleaved {
                data,
                row_stride,
                order,
            }) => {
                let u_offset = match order {
                    ChromaOrder::UFirst => 0,
                    ChromaOrder::VFirst => 1,
                };
                let offset = if index == 1 { u_offset } else { 1 - u_offset };
                Some(Plane {
                    data: data.get(offset..)?,
                    row_stride: *row_stride,
                    pixel_stride: 2,
                })
            }
            _ => None,
        }
    }
}

fn fill_plane(
    width: usize,
    height: usize,
    row_stride: usize,
    pixel: impl Fn(u32, u32) -> u8,
) -> Vec<u8> {
    let mut data = vec![0u8; row_stride * height];
    for y in 0..height {
        for x in 0..width {
            data[y * row_stride + x] = pixel(x as u32, y as u32);
        }
    }
    data
}

/// Planar image (chroma pixel stride 1) with tightly packed rows
pub fn planar_image(
    width: u32,
    height: u32,
    luma: impl Fn(u32, u32) -> u8,
    u: impl Fn(u32, u32) -> u8,
    v: impl Fn(u32, u32) -> u8,
) -> SyntheticImage {
    padded_planar_image(width, height, 0, luma, u, v)
}

/// Planar image whose rows carry `padding` trailing bytes, as hardware often aligns rows
pub fn padded_planar_image(
    width: u32,
    height: u32,
    padding: usize,
    luma: impl Fn(u32, u32) -> u8,
    u: impl Fn(u32, u32) -> u8,
    v: impl Fn(u32, u32) -> u8,
) -> SyntheticImage {
    let (cw, ch) = YuvFrame::chroma_size(width, height);
    let luma_stride = width as usize + padding;
    let chroma_stride = cw as usize + padding;
    SyntheticImage {
        width,
        height,
        luma: fill_plane(width as usize, height as usize, luma_stride, luma),
        luma_stride,
        chroma: Chroma::Planar {
            u: fill_plane(cw as usize, ch as usize, chroma_stride, u),
            v: fill_plane(cw as usize, ch as usize, chroma_stride, v),
            row_stride: chroma_stride,
        },
        missing_plane: None,
    }
}

/// Semi-planar image (chroma pixel stride 2) in NV12 or NV21 order
pub fn semi_planar_image(
    width: u32,
    height: u32,
    order: ChromaOrder,
    luma: impl Fn(u32, u32) -> u8,
    u: impl Fn(u32, u32) -> u8,
    v: impl Fn(u32, u32) -> u8,
) -> SyntheticImage {
    let (cw, ch) = YuvFrame::chroma_size(width, height);
    let row_stride = cw as usize * 2;
    let mut data = vec![0u8; row_stride * ch as usize];
    for y in 0..ch {
        for x in 0..cw {
            let at = y as usize * row_stride + x as usize * 2;
            let (first, second) = match order {
                ChromaOrder::UFirst => (u(x, y), v(x, y)),
                ChromaOrder::VFirst => (v(x, y), u(x, y)),
            };
            data[at] = first;
            data[at + 1] = second;
        }
    }
    SyntheticImage {
        width,
        height,
        luma: fill_plane(width as usize, height as usize, width as usize, luma),
        luma_stride: width as usize,
        chroma: Chroma::Interleaved {
            data,
            row_stride,
            order,
        },
        missing_plane: None,
    }
}

/// Single-color planar image
pub fn solid_image(width: u32, height: u32, y: u8, u: u8, v: u8) -> SyntheticImage {
    planar_image(width, height, move |_, _| y, move |_, _| u, move |_, _| v)
}

/// Planar image with a luma gradient that shifts with `frame_number`
pub fn gradient_image(frame_number: u64, width: u32, height: u32) -> SyntheticImage {
    let base = (frame_number % 256) as u8;
    planar_image(
        width,
        height,
        move |x, y| base.wrapping_add(((x + y) % 256) as u8),
        |x, _| (x % 256) as u8,
        |_, y| (y % 256) as u8,
    )
}
