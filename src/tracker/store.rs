//! In-memory registry of tracked instruments.

use log::debug;

use crate::error::{Error, Result};
use crate::tracker::instrument::{TrackId, TrackedInstrument};
use crate::tracker::track_state::TrackState;

/// All tracks of one session, in creation order.
///
/// Creation and removal need `&mut self`, so they are serialized by the
/// borrow checker; per-frame updates hand out disjoint `&mut` to each track.
#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: Vec<TrackedInstrument>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, track: TrackedInstrument) -> TrackId {
        let id = track.id();
        self.tracks.push(track);
        id
    }

    pub fn get(&self, id: TrackId) -> Option<&TrackedInstrument> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    /// Remove a track and free its history.
    pub fn remove(&mut self, id: TrackId) -> Result<TrackedInstrument> {
        let pos = self
            .tracks
            .iter()
            .position(|t| t.id() == id)
            .ok_or(Error::UnknownTrack(id))?;
        debug!("track {id} terminated");
        Ok(self.tracks.remove(pos))
    }

    pub fn clear(&mut self) {
        if !self.tracks.is_empty() {
            debug!("dropping {} track(s)", self.tracks.len());
        }
        self.tracks.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrackedInstrument> {
        self.tracks.iter()
    }

    pub(crate) fn tracks_mut(&mut self) -> &mut [TrackedInstrument] {
        &mut self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks still being updated (active or coasting).
    pub fn live_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.state().is_live()).count()
    }

    /// Tracks confirmed in the most recent frame.
    pub fn active_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.state() == TrackState::Active)
            .count()
    }
}
