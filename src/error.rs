use thiserror::Error;

use crate::tracker::TrackId;

/// Errors surfaced to the caller of the tracking engine.
///
/// Faults local to one track in one frame (segmentation failures, degenerate
/// masks, implausible size jumps) never show up here; they are absorbed by the
/// track controller and turn into a coasting frame.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Frame size mismatch: expected {expected:?}, got {got:?}")]
    FrameSizeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Frame {got} received after frame {last}; frames must be processed in order")]
    FrameOutOfOrder { last: u64, got: u64 },

    #[error("Invalid selection #{index}: {reason}")]
    InvalidSelection { index: usize, reason: String },

    #[error("No valid selections to initialize tracking from")]
    NoValidSelections,

    #[error("No frames supplied")]
    NoFrames,

    #[error("Session has no tracks; call initialize first")]
    NotInitialized,

    #[error("Unknown track id: {0}")]
    UnknownTrack(TrackId),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for tracking operations.
pub type Result<T> = std::result::Result<T, Error>;
