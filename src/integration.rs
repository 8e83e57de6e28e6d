//! Integration module for connecting segmentation backends with the tracker.
//!
//! This module provides the model seam, selection helpers and the
//! frame-driving session used to run the tracker end to end.

mod builder;
mod pipeline;
mod segmenter;

pub use builder::SelectionBuilder;
pub use pipeline::{CancelToken, FrameResult, Progress, TrackStream, TrackingSession};
pub use segmenter::{MaskCandidate, SegmentationModel};

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnMaskModel, BurnSegmenter, BurnSegmenterError, RawMask};
