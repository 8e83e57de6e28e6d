//! Per-frame track controller.
//!
//! Every frame each live track runs search-region estimation, prompt
//! generation, segmentation, geometry reduction and confidence gating, then
//! either commits the detection or coasts on its last geometry.

use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::integration::SegmentationModel;
use crate::tracker::confidence;
use crate::tracker::frame::{Frame, FrameRegion};
use crate::tracker::geometry::{self, MaskGeometry};
use crate::tracker::instrument::{TrackId, TrackReport, TrackedInstrument};
use crate::tracker::prompt::{Prompt, build_prompt};
use crate::tracker::search_region::search_region;
use crate::tracker::selection::Selection;
use crate::tracker::store::TrackStore;

/// Configuration for the InstrumentTracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub confidence_history_capacity: usize,
    pub trajectory_capacity: usize,
    /// History length below which `base_threshold` applies.
    pub min_history_for_adaptive: usize,
    pub base_threshold: f32,
    /// Coefficient of variation below which the history counts as stable.
    pub stable_cv_limit: f32,
    pub stable_factor: f32,
    pub unstable_factor: f32,
    pub threshold_floor: f32,
    pub threshold_ceiling: f32,
    pub size_scale: f32,
    pub min_size_expansion: f32,
    pub motion_scale: f32,
    pub min_expansion: f32,
    pub max_expansion: f32,
    /// Rotated-rectangle aspect ratio above which axis prompts are used.
    pub elongation_ratio: f32,
    /// Largest accepted area change between accepted frames, either direction.
    pub max_size_ratio: f32,
    /// Coasting frames tolerated before a track is lost.
    pub max_lost: u32,
    /// Every n-th frame of a track searches the whole frame.
    pub redetection_interval: u32,
    /// Masks with fewer pixels are treated as empty.
    pub min_mask_area: usize,
    /// Side of the box seeded around a point selection.
    pub point_seed_size: f32,
    pub max_workers: usize,
    pub parallel: bool,
    /// Frames between progress callbacks in batch processing.
    pub progress_interval: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confidence_history_capacity: 5,
            trajectory_capacity: 30,
            min_history_for_adaptive: 3,
            base_threshold: 0.5,
            stable_cv_limit: 0.15,
            stable_factor: 0.85,
            unstable_factor: 0.7,
            threshold_floor: 0.3,
            threshold_ceiling: 0.7,
            size_scale: 0.3,
            min_size_expansion: 50.0,
            motion_scale: 1.5,
            min_expansion: 50.0,
            max_expansion: 200.0,
            elongation_ratio: 3.0,
            max_size_ratio: 3.0,
            max_lost: 50,
            redetection_interval: 15,
            min_mask_area: 4,
            point_seed_size: 50.0,
            max_workers: 10,
            parallel: true,
            progress_interval: 10,
        }
    }
}

impl TrackerConfig {
    /// Reject settings the controller cannot work with.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if self.confidence_history_capacity == 0 || self.trajectory_capacity == 0 {
            return fail("history capacities must be positive");
        }
        if !(0.0..=1.0).contains(&self.threshold_floor)
            || !(0.0..=1.0).contains(&self.threshold_ceiling)
            || self.threshold_floor > self.threshold_ceiling
        {
            return fail("threshold band must satisfy 0 <= floor <= ceiling <= 1");
        }
        if self.stable_factor <= 0.0 || self.unstable_factor <= 0.0 || self.stable_cv_limit < 0.0 {
            return fail("confidence factors must be positive");
        }
        if self.min_expansion < 0.0 || self.min_expansion > self.max_expansion {
            return fail("expansion range must satisfy 0 <= min <= max");
        }
        if self.size_scale < 0.0 || self.motion_scale < 0.0 {
            return fail("search scales must be non-negative");
        }
        if self.max_size_ratio < 1.0 {
            return fail("max_size_ratio must be at least 1");
        }
        if self.redetection_interval == 0 || self.progress_interval == 0 {
            return fail("intervals must be positive");
        }
        if self.point_seed_size <= 0.0 || !self.point_seed_size.is_finite() {
            return fail("point_seed_size must be positive");
        }
        Ok(())
    }
}

/// Result of [`InstrumentTracker::initialize`].
#[derive(Debug)]
pub struct InitReport {
    /// Ids of the tracks created, in selection order.
    pub tracks: Vec<TrackId>,
    /// One [`Error::InvalidSelection`] per skipped selection.
    pub rejected: Vec<Error>,
}

/// Segmentation outcome for one track in one frame.
struct Candidate {
    geometry: Option<MaskGeometry>,
    confidence: f32,
}

impl Candidate {
    fn empty() -> Self {
        Self {
            geometry: None,
            confidence: 0.0,
        }
    }
}

pub struct InstrumentTracker {
    store: TrackStore,
    config: TrackerConfig,
    frame_size: Option<(usize, usize)>,
    last_frame_index: Option<u64>,
    pool: Option<rayon::ThreadPool>,
}

impl InstrumentTracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: TrackStore::new(),
            config,
            frame_size: None,
            last_frame_index: None,
            pool: None,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn track(&self, id: TrackId) -> Option<&TrackedInstrument> {
        self.store.get(id)
    }

    /// Create one active track per valid selection.
    ///
    /// Invalid selections are skipped and listed in the report; the call only
    /// fails when none is valid or the frame does not match earlier ones.
    /// Calling it again adds tracks with fresh ids.
    pub fn initialize(&mut self, frame: &Frame, selections: Vec<Selection>) -> Result<InitReport> {
        if let Some(expected) = self.frame_size.filter(|&s| s != frame.size()) {
            return Err(Error::FrameSizeMismatch {
                expected,
                got: frame.size(),
            });
        }

        let mut tracks = Vec::new();
        let mut rejected = Vec::new();
        for (index, selection) in selections.into_iter().enumerate() {
            match selection.seed(frame, &self.config) {
                Ok(seed) => {
                    let track = TrackedInstrument::new(
                        selection.name,
                        selection.color,
                        seed,
                        &self.config,
                    );
                    tracks.push(self.store.insert(track));
                }
                Err(reason) => {
                    warn!("skipping selection #{index} ({}): {reason}", selection.name);
                    rejected.push(Error::InvalidSelection { index, reason });
                }
            }
        }

        if tracks.is_empty() {
            return Err(Error::NoValidSelections);
        }

        self.frame_size = Some(frame.size());
        self.rebuild_pool()?;
        Ok(InitReport { tracks, rejected })
    }

    fn rebuild_pool(&mut self) -> Result<()> {
        let workers = self.store.len().min(self.config.max_workers);
        self.pool = if self.config.parallel && workers > 1 {
            debug!("worker pool sized to {workers} thread(s)");
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("instrument-track-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        Ok(())
    }

    fn check_frame(&self, frame: &Frame, frame_index: u64) -> Result<()> {
        if self.store.is_empty() {
            return Err(Error::NotInitialized);
        }
        if let Some(expected) = self.frame_size.filter(|&s| s != frame.size()) {
            return Err(Error::FrameSizeMismatch {
                expected,
                got: frame.size(),
            });
        }
        if let Some(last) = self.last_frame_index.filter(|&last| frame_index <= last) {
            return Err(Error::FrameOutOfOrder {
                last,
                got: frame_index,
            });
        }
        Ok(())
    }

    /// Advance every track by one frame and report all tracks, lost ones included.
    ///
    /// Tracks are stepped on the worker pool when there is more than one live
    /// track; each owns disjoint state and only reads the shared frame.
    pub fn update<M>(
        &mut self,
        model: &M,
        frame: &Frame,
        frame_index: u64,
    ) -> Result<Vec<TrackReport>>
    where
        M: SegmentationModel + Sync,
    {
        self.check_frame(frame, frame_index)?;
        self.last_frame_index = Some(frame_index);

        let config = &self.config;
        match &self.pool {
            Some(pool) if self.store.live_count() > 1 => pool.install(|| {
                self.store
                    .tracks_mut()
                    .par_iter_mut()
                    .for_each(|track| step_track(track, model, frame, config));
            }),
            _ => {
                for track in self.store.tracks_mut() {
                    step_track(track, model, frame, config);
                }
            }
        }

        Ok(self.reports(frame_index))
    }

    /// Current state of every track, without advancing anything.
    pub fn reports(&self, frame_index: u64) -> Vec<TrackReport> {
        self.store.iter().map(|t| t.report(frame_index)).collect()
    }

    /// Stop tracking one instrument and free its history.
    pub fn terminate(&mut self, id: TrackId) -> Result<TrackedInstrument> {
        let track = self.store.remove(id)?;
        self.rebuild_pool()?;
        Ok(track)
    }

    /// Drop all tracks; the tracker can be initialized again afterwards.
    pub fn teardown(&mut self) {
        debug!("teardown");
        self.store.clear();
        self.pool = None;
        self.frame_size = None;
        self.last_frame_index = None;
    }
}

/// One state-machine step for a single track.
pub(crate) fn step_track<M>(
    track: &mut TrackedInstrument,
    model: &M,
    frame: &Frame,
    config: &TrackerConfig,
)
where
    M: SegmentationModel + ?Sized,
{
    if !track.state.is_live() {
        track.last_confidence = 0.0;
        track.last_full_frame = false;
        return;
    }
    track.frames_processed += 1;
    track.frames_since_full_redetection += 1;

    let full_frame = track.frames_since_full_redetection >= config.redetection_interval;
    let region = if full_frame {
        debug!(
            "track {}: full-frame re-detection at step {}",
            track.id, track.frames_processed
        );
        track.frames_since_full_redetection = 0;
        frame.full_region()
    } else {
        let area = search_region(
            &track.last_bbox,
            &track.accepted_centers,
            frame.size(),
            config,
        );
        trace!("track {}: search region {:?}", track.id, area.to_tlbr());
        frame.region(&area)
    };

    let prompt = build_prompt(
        &track.last_bbox,
        track.last_mask(),
        track.last_rotated_rect.aspect_ratio(),
        config,
    );
    let candidate = segment_candidate(model, &region, &prompt.to_region(&region), config, track.id);

    let decision =
        confidence::evaluate(&mut track.confidence_history, candidate.confidence, config);
    track.last_confidence = decision.confidence;
    track.last_threshold = decision.threshold;
    track.last_full_frame = full_frame;

    match candidate.geometry {
        Some(geometry) if decision.passes() && size_plausible(track, &geometry, config) => {
            track.accept(geometry);
        }
        _ => track.coast(config.max_lost),
    }
}

/// Run the model and reduce its best mask; every failure mode becomes an empty candidate.
fn segment_candidate<M>(
    model: &M,
    region: &FrameRegion<'_>,
    prompt: &Prompt,
    config: &TrackerConfig,
    id: TrackId,
) -> Candidate
where
    M: SegmentationModel + ?Sized,
{
    let candidates = match model.segment(region, prompt) {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!("track {id}: segmentation failed, treating as zero confidence: {e}");
            return Candidate::empty();
        }
    };

    let Some(best) = candidates
        .into_iter()
        .filter(|c| c.confidence.is_finite())
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    else {
        trace!("track {id}: no mask candidates");
        return Candidate::empty();
    };

    let expected = (region.height(), region.width());
    if best.mask.dim() != expected {
        warn!(
            "track {id}: mask shape {:?} does not match region {:?}, ignoring",
            best.mask.dim(),
            expected
        );
        return Candidate::empty();
    }

    let geometry = geometry::reduce_mask(&best.mask, region.origin);
    if geometry.area < config.min_mask_area.max(1) {
        trace!("track {id}: degenerate mask ({} px)", geometry.area);
        return Candidate::empty();
    }

    Candidate {
        geometry: Some(geometry),
        confidence: best.confidence,
    }
}

/// Reject area jumps beyond `max_size_ratio` relative to the last accepted box.
fn size_plausible(
    track: &TrackedInstrument,
    candidate: &MaskGeometry,
    config: &TrackerConfig,
) -> bool {
    if !track.geometry_confirmed {
        return true;
    }
    let previous = track.last_bbox.area();
    if previous <= 0.0 {
        return true;
    }
    let ratio = candidate.bbox.area() / previous;
    let plausible = ratio <= config.max_size_ratio && ratio >= 1.0 / config.max_size_ratio;
    if !plausible {
        debug!("track {}: rejected size jump x{ratio:.2}", track.id);
    }
    plausible
}
