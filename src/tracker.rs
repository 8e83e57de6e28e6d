pub mod confidence;
mod frame;
pub mod geometry;
mod history;
mod instrument;
mod instrument_tracker;
pub mod prompt;
mod rect;
pub mod search_region;
mod selection;
mod store;
mod track_state;

pub use frame::{Frame, FrameRegion};
pub use geometry::{Mask, MaskGeometry};
pub use history::BoundedHistory;
pub use instrument::{Rgb, TrackId, TrackReport, TrackSeed, TrackedInstrument};
pub use instrument_tracker::{InitReport, InstrumentTracker, TrackerConfig};
pub use prompt::{PointLabel, Prompt, PromptPoint, PromptStrategy};
pub use rect::{BBox, RotatedRect, normalize_angle};
pub use selection::{Selection, SelectionKind};
pub use store::TrackStore;
pub use track_state::TrackState;
