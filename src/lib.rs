//! Mask-driven instrument tracking for recorded procedure video.
//!
//! An operator selects instruments on the first frame; every following frame
//! each track asks a promptable segmentation model for a mask inside an
//! adaptive search region, reduces that mask to rotated-box geometry and
//! commits it only when the model's confidence clears a per-track adaptive
//! threshold. Tracks coast on their last geometry through short dropouts and
//! are declared lost after a bounded number of missed frames.
//!
//! ```ignore
//! use instrument_track_rs::{Frame, SelectionBuilder, TrackingSession};
//!
//! let mut session = TrackingSession::with_default_config(my_segmenter)?;
//! let driver = SelectionBuilder::new()
//!     .tlbr(50.0, 50.0, 150.0, 150.0)
//!     .name("needle driver")
//!     .build();
//! session.initialize(&first, vec![driver])?;
//! for (i, frame) in frames.iter().enumerate() {
//!     for report in session.process_frame(frame, i as u64 + 1)? {
//!         println!("{} {:?} {:?}", report.name, report.state, report.bbox);
//!     }
//! }
//! ```

mod error;
pub mod integration;
pub mod tracker;

pub use error::{Error, Result};
pub use integration::{
    CancelToken, FrameResult, MaskCandidate, Progress, SegmentationModel, SelectionBuilder,
    TrackStream, TrackingSession,
};
pub use tracker::{
    BBox, Frame, FrameRegion, InitReport, InstrumentTracker, Mask, Prompt, PromptPoint,
    RotatedRect, Selection, SelectionKind, TrackId, TrackReport, TrackState, TrackedInstrument,
    TrackerConfig,
};
