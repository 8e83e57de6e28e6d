//! Single tracked instrument and its per-frame report.

use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::tracker::geometry::{Mask, MaskGeometry};
use crate::tracker::history::BoundedHistory;
use crate::tracker::instrument_tracker::TrackerConfig;
use crate::tracker::rect::{BBox, RotatedRect};
use crate::tracker::track_state::TrackState;

/// Stable track identifier.
pub type TrackId = u64;

/// Display color as RGB.
pub type Rgb = [u8; 3];

/// Global track ID counter; ids are never handed out twice in a process.
static TRACK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Get the next unique track ID.
pub(crate) fn next_track_id() -> TrackId {
    TRACK_ID_COUNTER.fetch_add(1, Ordering::SeqCst) + 1
}

/// Initial geometry for a new track.
#[derive(Debug, Clone)]
pub struct TrackSeed {
    pub bbox: BBox,
    pub rotated: RotatedRect,
    pub area_reduction_pct: f32,
    pub contour: Vec<[f32; 2]>,
    pub mask: Option<(Mask, [usize; 2])>,
    /// Whether the box describes the object's true extent (false for point seeds).
    pub confirmed: bool,
}

impl TrackSeed {
    /// Seed from a box only.
    pub fn from_bbox(bbox: BBox, confirmed: bool) -> Self {
        Self {
            bbox,
            rotated: RotatedRect::from_bbox(&bbox),
            area_reduction_pct: 0.0,
            contour: vec![
                [bbox.x1, bbox.y1],
                [bbox.x2, bbox.y1],
                [bbox.x2, bbox.y2],
                [bbox.x1, bbox.y2],
            ],
            mask: None,
            confirmed,
        }
    }
}

impl From<MaskGeometry> for TrackSeed {
    fn from(g: MaskGeometry) -> Self {
        Self {
            bbox: g.bbox,
            rotated: g.rotated,
            area_reduction_pct: g.area_reduction_pct,
            contour: g.contour,
            mask: Some((g.mask, g.origin)),
            confirmed: true,
        }
    }
}

/// One user-selected object under continuous tracking.
///
/// Geometry fields always describe the most recent accepted frame; coasting
/// only advances the trajectory and the lost counter.
#[derive(Debug, Clone)]
pub struct TrackedInstrument {
    pub(crate) id: TrackId,
    pub(crate) name: String,
    pub(crate) color: Rgb,
    pub(crate) state: TrackState,
    pub(crate) last_bbox: BBox,
    pub(crate) last_rotated_rect: RotatedRect,
    pub(crate) last_area_reduction_pct: f32,
    pub(crate) last_mask: Option<(Mask, [usize; 2])>,
    pub(crate) last_contour: Vec<[f32; 2]>,
    pub(crate) confidence_history: BoundedHistory<f32>,
    pub(crate) trajectory: BoundedHistory<[f32; 2]>,
    /// Centers of the last two accepted frames; coasting never touches it.
    pub(crate) accepted_centers: BoundedHistory<[f32; 2]>,
    pub(crate) lost_frame_count: u32,
    pub(crate) frames_since_full_redetection: u32,
    /// False until the size gate has a trustworthy reference box.
    pub(crate) geometry_confirmed: bool,
    pub(crate) last_confidence: f32,
    pub(crate) last_threshold: f32,
    pub(crate) last_full_frame: bool,
    pub(crate) frames_processed: u64,
}

impl TrackedInstrument {
    /// Create an active track with a fresh id and zero history.
    pub fn new(
        name: impl Into<String>,
        color: Rgb,
        seed: TrackSeed,
        config: &TrackerConfig,
    ) -> Self {
        let id = next_track_id();
        let name = name.into();
        debug!("track {id} ({name}) created at {:?}", seed.bbox.to_tlbr());
        Self {
            id,
            name,
            color,
            state: TrackState::Active,
            last_bbox: seed.bbox,
            last_rotated_rect: seed.rotated,
            last_area_reduction_pct: seed.area_reduction_pct,
            last_mask: seed.mask,
            last_contour: seed.contour,
            confidence_history: BoundedHistory::new(config.confidence_history_capacity),
            trajectory: BoundedHistory::new(config.trajectory_capacity),
            accepted_centers: BoundedHistory::new(2),
            lost_frame_count: 0,
            frames_since_full_redetection: 0,
            geometry_confirmed: seed.confirmed,
            last_confidence: 0.0,
            last_threshold: config.base_threshold,
            last_full_frame: false,
            frames_processed: 0,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_lost(&self) -> bool {
        self.state == TrackState::Lost
    }

    pub fn last_bbox(&self) -> BBox {
        self.last_bbox
    }

    pub fn last_rotated_rect(&self) -> &RotatedRect {
        &self.last_rotated_rect
    }

    /// Last accepted mask and the frame position of its top-left pixel.
    pub fn last_mask(&self) -> Option<(&Mask, [usize; 2])> {
        self.last_mask.as_ref().map(|(m, o)| (m, *o))
    }

    pub fn last_contour(&self) -> &[[f32; 2]] {
        &self.last_contour
    }

    pub fn confidence_history(&self) -> &BoundedHistory<f32> {
        &self.confidence_history
    }

    pub fn trajectory(&self) -> &BoundedHistory<[f32; 2]> {
        &self.trajectory
    }

    /// Centers of the most recent accepted frames, oldest first.
    pub fn accepted_centers(&self) -> &BoundedHistory<[f32; 2]> {
        &self.accepted_centers
    }

    pub fn lost_frame_count(&self) -> u32 {
        self.lost_frame_count
    }

    pub fn frames_since_full_redetection(&self) -> u32 {
        self.frames_since_full_redetection
    }

    /// Commit an accepted detection.
    pub(crate) fn accept(&mut self, geometry: MaskGeometry) {
        if self.state != TrackState::Active {
            debug!(
                "track {} recovered after {} frame(s)",
                self.id, self.lost_frame_count
            );
        }
        self.last_bbox = geometry.bbox;
        self.last_rotated_rect = geometry.rotated;
        self.last_area_reduction_pct = geometry.area_reduction_pct;
        self.last_contour = geometry.contour;
        self.last_mask = Some((geometry.mask, geometry.origin));
        self.trajectory.push(self.last_bbox.center());
        self.accepted_centers.push(self.last_bbox.center());
        self.lost_frame_count = 0;
        self.geometry_confirmed = true;
        self.state = TrackState::Active;
    }

    /// Record a frame without an accepted detection.
    pub(crate) fn coast(&mut self, max_lost: u32) {
        self.lost_frame_count += 1;
        if self.lost_frame_count > max_lost {
            self.mark_lost();
            return;
        }
        if self.state == TrackState::Active {
            debug!("track {} coasting", self.id);
        }
        self.state = TrackState::Coasting;
        self.trajectory.push(self.last_bbox.center());
    }

    pub(crate) fn mark_lost(&mut self) {
        debug!(
            "track {} lost after {} frame(s) without detection",
            self.id, self.lost_frame_count
        );
        self.state = TrackState::Lost;
    }

    /// Snapshot for downstream consumers.
    pub fn report(&self, frame_index: u64) -> TrackReport {
        TrackReport {
            id: self.id,
            name: self.name.clone(),
            color: self.color,
            state: self.state,
            lost: self.is_lost(),
            frame_index,
            bbox: self.last_bbox,
            rotated_bbox: self.last_rotated_rect.corners,
            rotation_angle: self.last_rotated_rect.angle,
            area_reduction_pct: self.last_area_reduction_pct,
            contour: self.last_contour.clone(),
            confidence: self.last_confidence,
            threshold: self.last_threshold,
            full_frame_search: self.last_full_frame,
            lost_frame_count: self.lost_frame_count,
        }
    }
}

/// Per-track, per-frame output.
///
/// Coasting and lost tracks report their last accepted geometry; `state` and
/// `lost` say how fresh it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackReport {
    pub id: TrackId,
    pub name: String,
    pub color: Rgb,
    pub state: TrackState,
    pub lost: bool,
    pub frame_index: u64,
    pub bbox: BBox,
    pub rotated_bbox: [[f32; 2]; 4],
    pub rotation_angle: f32,
    pub area_reduction_pct: f32,
    pub contour: Vec<[f32; 2]>,
    /// Confidence observed this frame (0 for faults, degenerate masks and lost tracks).
    pub confidence: f32,
    pub threshold: f32,
    pub full_frame_search: bool,
    pub lost_frame_count: u32,
}
