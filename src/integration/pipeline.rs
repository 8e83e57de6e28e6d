//! TrackingSession for combining a segmentation model with the instrument tracker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracker::{
    Frame, InitReport, InstrumentTracker, Selection, TrackId, TrackReport, TrackedInstrument,
    TrackerConfig,
};

use super::SegmentationModel;

/// Progress of a batch run, reported every `progress_interval` frames and on
/// the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Zero-based position of the frame just processed within the batch.
    pub frame_index: usize,
    pub total_frames: usize,
    pub active_track_count: usize,
}

/// All track reports for one processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub frame_index: u64,
    pub tracks: Vec<TrackReport>,
}

/// Shared flag that stops a [`TrackStream`] before its next frame.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A tracking session that bundles a segmentation model with the tracker.
///
/// This struct provides a convenient way to run end-to-end tracking by
/// combining any `SegmentationModel` with the `InstrumentTracker`.
pub struct TrackingSession<M: SegmentationModel> {
    model: M,
    tracker: InstrumentTracker,
    next_frame_index: u64,
}

impl<M: SegmentationModel + Sync> TrackingSession<M> {
    /// Create a new session with the given model and tracker config.
    pub fn new(model: M, config: TrackerConfig) -> Result<Self> {
        Ok(Self {
            model,
            tracker: InstrumentTracker::new(config)?,
            next_frame_index: 0,
        })
    }

    /// Create a new session with default tracker configuration.
    pub fn with_default_config(model: M) -> Result<Self> {
        Self::new(model, TrackerConfig::default())
    }

    /// Start tracking one instrument per valid selection.
    pub fn initialize(&mut self, frame: &Frame, selections: Vec<Selection>) -> Result<InitReport> {
        self.tracker.initialize(frame, selections)
    }

    /// Process a single frame and return the reports of every track.
    ///
    /// # Arguments
    /// * `frame` - Decoded frame, same size as the initialization frame
    /// * `frame_index` - Must be larger than any index processed before
    pub fn process_frame(&mut self, frame: &Frame, frame_index: u64) -> Result<Vec<TrackReport>> {
        let reports = self.tracker.update(&self.model, frame, frame_index)?;
        self.next_frame_index = frame_index.saturating_add(1);
        Ok(reports)
    }

    /// Blocking batch run over `frames`, numbered on from the last processed frame.
    ///
    /// Fails up front when there is nothing to process or no track to update;
    /// per-track faults inside the run never abort it.
    pub fn process_video(
        &mut self,
        frames: &[Frame],
        mut progress: Option<&mut dyn FnMut(&Progress)>,
    ) -> Result<Vec<Vec<TrackReport>>> {
        if frames.is_empty() {
            return Err(Error::NoFrames);
        }
        if self.tracker.store().is_empty() {
            return Err(Error::NotInitialized);
        }

        let total = frames.len();
        let interval = self.tracker.config().progress_interval.max(1) as usize;
        let mut results = Vec::with_capacity(total);
        for (i, frame) in frames.iter().enumerate() {
            let index = self.next_frame_index;
            results.push(self.process_frame(frame, index)?);

            let due = (i + 1) % interval == 0 || i + 1 == total;
            if let Some(cb) = progress.as_mut().filter(|_| due) {
                cb(&Progress {
                    frame_index: i,
                    total_frames: total,
                    active_track_count: self.active_track_count(),
                });
            }
        }
        Ok(results)
    }

    /// Lazily process `frames`, one [`FrameResult`] per iteration.
    ///
    /// The stream checks `cancel` before every frame and ends once it is set,
    /// so cancellation never interrupts a frame midway.
    pub fn stream<I>(&mut self, frames: I, cancel: CancelToken) -> TrackStream<'_, M, I::IntoIter>
    where
        I: IntoIterator<Item = Frame>,
    {
        TrackStream {
            session: self,
            frames: frames.into_iter(),
            cancel,
            finished: false,
        }
    }

    /// Stop tracking one instrument.
    pub fn terminate(&mut self, id: TrackId) -> Result<TrackedInstrument> {
        self.tracker.terminate(id)
    }

    /// End the session's tracking; the model is kept for a new initialization.
    pub fn teardown(&mut self) {
        self.tracker.teardown();
        self.next_frame_index = 0;
    }

    /// Index the next batch or streamed frame will get.
    pub fn next_frame_index(&self) -> u64 {
        self.next_frame_index
    }

    /// All tracks, lost ones included, in creation order.
    pub fn tracks(&self) -> impl Iterator<Item = &TrackedInstrument> {
        self.tracker.store().iter()
    }

    pub fn track(&self, id: TrackId) -> Option<&TrackedInstrument> {
        self.tracker.track(id)
    }

    pub fn active_track_count(&self) -> usize {
        self.tracker.store().active_count()
    }

    /// Get a reference to the underlying model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Get a mutable reference to the underlying model.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Get a reference to the underlying tracker.
    pub fn tracker(&self) -> &InstrumentTracker {
        &self.tracker
    }
}

/// Streaming form of [`TrackingSession::process_video`].
pub struct TrackStream<'a, M: SegmentationModel, I> {
    session: &'a mut TrackingSession<M>,
    frames: I,
    cancel: CancelToken,
    finished: bool,
}

impl<M, I> Iterator for TrackStream<'_, M, I>
where
    M: SegmentationModel + Sync,
    I: Iterator<Item = Frame>,
{
    type Item = Result<FrameResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.cancel.is_cancelled() {
            debug!(
                "stream cancelled before frame {}",
                self.session.next_frame_index
            );
            self.finished = true;
            return None;
        }
        let Some(frame) = self.frames.next() else {
            self.finished = true;
            return None;
        };

        let frame_index = self.session.next_frame_index;
        let result = self
            .session
            .process_frame(&frame, frame_index)
            .map(|tracks| FrameResult { frame_index, tracks });
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::{MaskCandidate, SelectionBuilder};
    use crate::tracker::{FrameRegion, Prompt, TrackState};
    use ndarray::Array2;

    /// Segments whatever part of a fixed frame-space square falls in the region.
    struct SquareSegmenter {
        x0: usize,
        size: usize,
        confidence: f32,
    }

    impl SegmentationModel for SquareSegmenter {
        type Error = std::convert::Infallible;

        fn segment(
            &self,
            region: &FrameRegion<'_>,
            _prompt: &Prompt,
        ) -> std::result::Result<Vec<MaskCandidate>, Self::Error> {
            let [ox, oy] = region.origin;
            let (lo, hi) = (self.x0, self.x0 + self.size);
            let mask = Array2::from_shape_fn((region.height(), region.width()), |(r, c)| {
                (lo..hi).contains(&(c + ox)) && (lo..hi).contains(&(r + oy))
            });
            Ok(vec![MaskCandidate::new(mask, self.confidence)])
        }
    }

    fn session() -> (TrackingSession<SquareSegmenter>, Frame) {
        let frame = Frame::filled(120, 120, 3, 0).unwrap();
        let model = SquareSegmenter {
            x0: 40,
            size: 30,
            confidence: 0.9,
        };
        let mut session = TrackingSession::with_default_config(model).unwrap();
        session
            .initialize(
                &frame,
                vec![SelectionBuilder::new().tlbr(35.0, 35.0, 75.0, 75.0).name("hook").build()],
            )
            .unwrap();
        (session, frame)
    }

    #[test]
    fn test_tracking_session() {
        let (mut session, frame) = session();
        let reports = session.process_frame(&frame, 0).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].state, TrackState::Active);
        assert_eq!(session.next_frame_index(), 1);

        assert_eq!(session.active_track_count(), 1);
        let id = reports[0].id;
        assert_eq!(session.tracks().map(|t| t.id()).collect::<Vec<_>>(), vec![id]);
        assert_eq!(session.track(id).unwrap().name(), "hook");
    }

    #[test]
    fn test_process_video_reports_progress() {
        let (mut session, frame) = session();
        let frames = vec![frame; 25];
        let mut seen = Vec::new();
        let mut cb = |p: &Progress| seen.push(*p);
        let results = session.process_video(&frames, Some(&mut cb)).unwrap();

        assert_eq!(results.len(), 25);
        let positions: Vec<usize> = seen.iter().map(|p| p.frame_index).collect();
        assert_eq!(positions, vec![9, 19, 24]);
        assert!(seen.iter().all(|p| p.total_frames == 25 && p.active_track_count == 1));
    }

    #[test]
    fn test_process_video_rejects_empty_input() {
        let (mut session, _) = session();
        assert!(matches!(session.process_video(&[], None), Err(Error::NoFrames)));

        session.teardown();
        let frame = Frame::filled(120, 120, 3, 0).unwrap();
        assert!(matches!(
            session.process_video(&[frame], None),
            Err(Error::NotInitialized)
        ));
    }

    #[test]
    fn test_stream_stops_on_cancel() {
        let (mut session, frame) = session();
        let cancel = CancelToken::new();
        let frames = vec![frame; 10];
        let mut stream = session.stream(frames, cancel.clone());

        let first = stream.next().unwrap().unwrap();
        assert_eq!(first.frame_index, 0);
        let second = stream.next().unwrap().unwrap();
        assert_eq!(second.frame_index, 1);

        cancel.cancel();
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        drop(stream);
        assert_eq!(session.next_frame_index(), 2);
    }

    #[test]
    fn test_last_possible_frame_index() {
        let (mut session, frame) = session();
        session.process_frame(&frame, u64::MAX).unwrap();
        assert_eq!(session.next_frame_index(), u64::MAX);
    }

    #[test]
    fn test_terminate_unknown_track() {
        let (mut session, _) = session();
        assert!(matches!(session.terminate(u64::MAX), Err(Error::UnknownTrack(_))));
    }
}
