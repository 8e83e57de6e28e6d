//! Read-only video frame buffers and the sub-regions handed to segmentation.

use ndarray::{Array3, ArrayView3, s};

use crate::error::{Error, Result};
use crate::tracker::rect::BBox;

/// One decoded video frame, laid out height x width x channels.
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: Array3<u8>,
}

impl Frame {
    /// Wrap an existing pixel array. Empty frames are rejected.
    pub fn new(pixels: Array3<u8>) -> Result<Self> {
        let (h, w, c) = pixels.dim();
        if h == 0 || w == 0 || c == 0 {
            return Err(Error::InvalidFrame(format!(
                "frame must be non-empty, got {w}x{h}x{c}"
            )));
        }
        Ok(Self { pixels })
    }

    /// Build a frame from interleaved raw bytes.
    pub fn from_raw(data: Vec<u8>, width: usize, height: usize, channels: usize) -> Result<Self> {
        let len = data.len();
        let pixels = Array3::from_shape_vec((height, width, channels), data).map_err(|_| {
            Error::InvalidFrame(format!(
                "{len} bytes cannot be shaped as {width}x{height}x{channels}"
            ))
        })?;
        Self::new(pixels)
    }

    /// Uniformly filled frame.
    pub fn filled(width: usize, height: usize, channels: usize, value: u8) -> Result<Self> {
        Self::new(Array3::from_elem((height, width, channels), value))
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    /// `(width, height)`.
    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    /// The whole frame as a box.
    pub fn bounds(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    pub fn pixels(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }

    pub fn full_region(&self) -> FrameRegion<'_> {
        FrameRegion {
            pixels: self.pixels.view(),
            origin: [0, 0],
        }
    }

    /// Crop to `area`, rounded outward to whole pixels and clipped to the frame.
    /// An area that misses the frame entirely yields the full frame.
    pub fn region(&self, area: &BBox) -> FrameRegion<'_> {
        let (x0, y0, x1, y1) = area.clamp_to(self.width(), self.height()).pixel_window();
        let x1 = x1.min(self.width());
        let y1 = y1.min(self.height());
        if x1 <= x0 || y1 <= y0 {
            return self.full_region();
        }
        FrameRegion {
            pixels: self.pixels.slice(s![y0..y1, x0..x1, ..]),
            origin: [x0, y0],
        }
    }
}

/// A window of a frame plus where it sits in frame coordinates.
///
/// Prompts sent alongside a region are in region-local pixels; `origin` maps
/// them (and the returned masks) back onto the frame.
#[derive(Debug, Clone)]
pub struct FrameRegion<'a> {
    pub pixels: ArrayView3<'a, u8>,
    /// `[x, y]` of the region's top-left pixel in the frame.
    pub origin: [usize; 2],
}

impl FrameRegion<'_> {
    #[inline]
    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    /// The region in frame coordinates.
    pub fn bounds(&self) -> BBox {
        BBox::from_tlwh(
            self.origin[0] as f32,
            self.origin[1] as f32,
            self.width() as f32,
            self.height() as f32,
        )
    }

    #[inline]
    pub fn to_local(&self, p: [f32; 2]) -> [f32; 2] {
        [p[0] - self.origin[0] as f32, p[1] - self.origin[1] as f32]
    }

    #[inline]
    pub fn to_frame(&self, p: [f32; 2]) -> [f32; 2] {
        [p[0] + self.origin[0] as f32, p[1] + self.origin[1] as f32]
    }
}
