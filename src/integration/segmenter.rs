//! Trait for promptable segmentation backends.

use crate::tracker::{FrameRegion, Mask, Prompt};

/// One mask proposed by the model.
#[derive(Debug, Clone)]
pub struct MaskCandidate {
    /// Region-local mask, `region.height() x region.width()`.
    pub mask: Mask,
    /// Model confidence in `[0, 1]`.
    pub confidence: f32,
}

impl MaskCandidate {
    pub fn new(mask: Mask, confidence: f32) -> Self {
        Self { mask, confidence }
    }
}

/// Trait for single-frame, stateless segmentation models.
///
/// Implement this trait to connect any promptable segmenter to the tracker.
/// The tracker only needs shared access, so one model instance can serve
/// every track of a frame in parallel.
///
/// # Example
///
/// ```ignore
/// use instrument_track_rs::{FrameRegion, MaskCandidate, Prompt, SegmentationModel};
///
/// struct MySegmenter {
///     // Your model here
/// }
///
/// impl SegmentationModel for MySegmenter {
///     type Error = std::io::Error;
///
///     fn segment(
///         &self,
///         region: &FrameRegion<'_>,
///         prompt: &Prompt,
///     ) -> Result<Vec<MaskCandidate>, Self::Error> {
///         // Run inference and return candidate masks
///         Ok(vec![])
///     }
/// }
/// ```
pub trait SegmentationModel {
    /// Error type for inference failures and timeouts.
    type Error: std::fmt::Display;

    /// Segment the object indicated by `prompt` inside `region`.
    ///
    /// # Arguments
    /// * `region` - Pixels to segment and their position in the frame
    /// * `prompt` - Points and optional box, in region-local coordinates
    ///
    /// # Returns
    /// Candidate masks shaped like the region. The most confident one is used;
    /// an empty list counts as a zero-confidence result.
    fn segment(
        &self,
        region: &FrameRegion<'_>,
        prompt: &Prompt,
    ) -> Result<Vec<MaskCandidate>, Self::Error>;
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for &M {
    type Error = M::Error;

    fn segment(
        &self,
        region: &FrameRegion<'_>,
        prompt: &Prompt,
    ) -> Result<Vec<MaskCandidate>, Self::Error> {
        (**self).segment(region, prompt)
    }
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for Box<M> {
    type Error = M::Error;

    fn segment(
        &self,
        region: &FrameRegion<'_>,
        prompt: &Prompt,
    ) -> Result<Vec<MaskCandidate>, Self::Error> {
        (**self).segment(region, prompt)
    }
}
