//! Burn inference backend for promptable segmentation.
//!
//! This module provides a `BurnSegmenter` that implements `SegmentationModel`
//! for running mask-decoder models built with the Burn framework.
//!
//! # Example
//!
//! ```ignore
//! use instrument_track_rs::integration::{BurnMaskModel, BurnSegmenter, RawMask};
//! use instrument_track_rs::tracker::{BBox, PromptPoint};
//! use burn::backend::NdArray;
//!
//! // Implement BurnMaskModel for your segmentation model
//! struct MySamDecoder { /* ... */ }
//!
//! impl BurnMaskModel<NdArray> for MySamDecoder {
//!     fn forward(
//!         &self,
//!         image: burn::tensor::Tensor<NdArray, 4>,
//!         points: &[PromptPoint],
//!         bbox: Option<BBox>,
//!     ) -> Vec<RawMask> {
//!         // Run inference
//!     }
//! }
//!
//! let model = MySamDecoder::load("decoder.bin");
//! let segmenter = BurnSegmenter::new(model, Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use ndarray::Array2;
use thiserror::Error;

use super::{MaskCandidate, SegmentationModel};
use crate::tracker::{BBox, FrameRegion, Mask, Prompt, PromptPoint};

/// Error type for Burn segmentation failures.
#[derive(Error, Debug, Clone)]
pub enum BurnSegmenterError {
    #[error("Invalid input channels: expected {expected}, got {got}")]
    InvalidInputChannels { expected: usize, got: usize },

    #[error("Mask shape mismatch: expected {expected:?}, got {got:?}")]
    MaskShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Mask has {got} logits for a {width}x{height} region")]
    LogitCount {
        width: usize,
        height: usize,
        got: usize,
    },
}

/// Raw mask output from the model before thresholding.
#[derive(Debug, Clone)]
pub struct RawMask {
    /// Row-major logits, one per region pixel.
    pub logits: Vec<f32>,
    pub width: usize,
    pub height: usize,
    /// Predicted mask quality
    pub score: f32,
}

/// Trait for Burn-based promptable segmentation models.
///
/// Implement this trait for your specific model architecture.
pub trait BurnMaskModel<B: Backend>: Send + Sync {
    /// Run forward pass on the cropped region.
    ///
    /// # Arguments
    /// * `image` - Input tensor of shape [1, channels, height, width], values in [0, 1]
    /// * `points` - Prompt points in region-local pixel coordinates
    /// * `bbox` - Optional box prompt in region-local pixel coordinates
    ///
    /// # Returns
    /// One raw mask per proposal, shaped like the input.
    fn forward(
        &self,
        image: Tensor<B, 4>,
        points: &[PromptPoint],
        bbox: Option<BBox>,
    ) -> Vec<RawMask>;

    /// Number of image channels the model expects.
    fn input_channels(&self) -> usize {
        3
    }
}

/// Burn-based segmenter implementing `SegmentationModel`.
pub struct BurnSegmenter<B: Backend, M: BurnMaskModel<B>> {
    model: M,
    device: B::Device,
    mask_threshold: f32,
}

impl<B: Backend, M: BurnMaskModel<B>> BurnSegmenter<B, M> {
    /// Create a new Burn segmenter with the given model and device.
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            mask_threshold: 0.0,
        }
    }

    /// Set the logit above which a pixel belongs to the mask.
    pub fn with_mask_threshold(mut self, threshold: f32) -> Self {
        self.mask_threshold = threshold;
        self
    }

    /// Convert a region's HWC bytes to a normalized [1, C, H, W] tensor.
    pub fn preprocess(
        &self,
        region: &FrameRegion<'_>,
    ) -> Result<Tensor<B, 4>, BurnSegmenterError> {
        let (h, w, c) = region.pixels.dim();
        let expected = self.model.input_channels();
        if c != expected {
            return Err(BurnSegmenterError::InvalidInputChannels { expected, got: c });
        }

        let mut data = Vec::with_capacity(h * w * c);
        for ch in 0..c {
            data.extend(
                region
                    .pixels
                    .index_axis(ndarray::Axis(2), ch)
                    .iter()
                    .map(|&v| v as f32 / 255.0),
            );
        }

        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([1, c, h, w]))
    }

    /// Threshold raw logits into region-shaped masks.
    fn postprocess(
        &self,
        raw: Vec<RawMask>,
        region: &FrameRegion<'_>,
    ) -> Result<Vec<MaskCandidate>, BurnSegmenterError> {
        let (height, width) = (region.height(), region.width());
        raw.into_iter()
            .map(|m| {
                if (m.height, m.width) != (height, width) {
                    return Err(BurnSegmenterError::MaskShapeMismatch {
                        expected: (height, width),
                        got: (m.height, m.width),
                    });
                }
                if m.logits.len() != width * height {
                    return Err(BurnSegmenterError::LogitCount {
                        width,
                        height,
                        got: m.logits.len(),
                    });
                }
                let mask: Mask = Array2::from_shape_fn((height, width), |(r, c)| {
                    m.logits[r * width + c] > self.mask_threshold
                });
                Ok(MaskCandidate::new(mask, m.score))
            })
            .collect()
    }
}

impl<B: Backend, M: BurnMaskModel<B>> SegmentationModel for BurnSegmenter<B, M> {
    type Error = BurnSegmenterError;

    fn segment(
        &self,
        region: &FrameRegion<'_>,
        prompt: &Prompt,
    ) -> Result<Vec<MaskCandidate>, Self::Error> {
        let tensor = self.preprocess(region)?;
        let raw = self.model.forward(tensor, &prompt.points, prompt.bbox);
        self.postprocess(raw, region)
    }
}
