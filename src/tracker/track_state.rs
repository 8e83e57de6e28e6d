use serde::{Deserialize, Serialize};

/// Track state enumeration for the instrument tracking lifecycle.
///
/// Transitions are `Active <-> Coasting -> Lost`. `Lost` is terminal: a lost
/// instrument keeps its last geometry but is never updated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum TrackState {
    /// Confirmed by a detection in the most recent processed frame
    #[default]
    Active,
    /// No confident detection for 1..=max_lost frames; last geometry is reused
    Coasting,
    /// Coasted past the limit, no longer updated
    Lost,
}

impl TrackState {
    /// Whether the controller still runs segmentation for this state.
    #[inline]
    pub fn is_live(self) -> bool {
        !matches!(self, TrackState::Lost)
    }
}
