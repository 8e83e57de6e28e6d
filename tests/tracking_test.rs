use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_relative_eq;
use ndarray::{Array2, Array3};

use instrument_track_rs::tracker::{FrameRegion, PointLabel, Prompt};
use instrument_track_rs::{
    BBox, CancelToken, Error, Frame, InstrumentTracker, MaskCandidate, Progress, SegmentationModel,
    SelectionBuilder, TrackState, TrackerConfig, TrackingSession,
};

/// Flood-fills the bright blob under each foreground prompt point.
struct FloodSegmenter {
    confidence: f32,
    calls: AtomicUsize,
}

impl FloodSegmenter {
    fn new(confidence: f32) -> Self {
        Self {
            confidence,
            calls: AtomicUsize::new(0),
        }
    }
}

impl SegmentationModel for FloodSegmenter {
    type Error = std::convert::Infallible;

    fn segment(
        &self,
        region: &FrameRegion<'_>,
        prompt: &Prompt,
    ) -> Result<Vec<MaskCandidate>, Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (h, w) = (region.height(), region.width());
        let bright = |x: usize, y: usize| region.pixels[[y, x, 0]] > 128;

        let mut mask = Array2::from_elem((h, w), false);
        let mut queue = VecDeque::new();
        for p in prompt.points.iter().filter(|p| p.label == PointLabel::Foreground) {
            let (x, y) = (p.x.max(0.0) as usize, p.y.max(0.0) as usize);
            if x < w && y < h && bright(x, y) && !mask[[y, x]] {
                mask[[y, x]] = true;
                queue.push_back((x, y));
            }
        }
        while let Some((x, y)) = queue.pop_front() {
            let neighbours = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbours {
                if nx < w && ny < h && !mask[[ny, nx]] && bright(nx, ny) {
                    mask[[ny, nx]] = true;
                    queue.push_back((nx, ny));
                }
            }
        }

        if !mask.iter().any(|&v| v) {
            return Ok(vec![]);
        }
        Ok(vec![MaskCandidate::new(mask, self.confidence)])
    }
}

/// Never finds anything.
struct BlindSegmenter;

impl SegmentationModel for BlindSegmenter {
    type Error = std::convert::Infallible;

    fn segment(
        &self,
        _region: &FrameRegion<'_>,
        _prompt: &Prompt,
    ) -> Result<Vec<MaskCandidate>, Self::Error> {
        Ok(vec![])
    }
}

/// Flood-fills like [`FloodSegmenter`] but faults on prompts right of `fault_x`.
struct FaultyRightSegmenter {
    inner: FloodSegmenter,
    fault_x: f32,
}

impl SegmentationModel for FaultyRightSegmenter {
    type Error = String;

    fn segment(
        &self,
        region: &FrameRegion<'_>,
        prompt: &Prompt,
    ) -> Result<Vec<MaskCandidate>, Self::Error> {
        let faulty = prompt
            .points
            .iter()
            .any(|p| region.to_frame(p.position())[0] >= self.fault_x);
        if faulty {
            return Err("decoder timed out".to_string());
        }
        Ok(self.inner.segment(region, prompt).unwrap_or_default())
    }
}

/// Black frame with white axis-aligned squares given as `(x0, y0, side)`.
fn scene(width: usize, height: usize, squares: &[(usize, usize, usize)]) -> Frame {
    let pixels = Array3::from_shape_fn((height, width, 3), |(y, x, _)| {
        let inside = squares
            .iter()
            .any(|&(x0, y0, s)| (x0..x0 + s).contains(&x) && (y0..y0 + s).contains(&y));
        if inside { 255 } else { 0 }
    });
    Frame::new(pixels).unwrap()
}

#[test]
fn test_box_selection_shrinks_to_segmented_object() {
    let frame = scene(200, 200, &[(70, 70, 60)]);
    let mut session = TrackingSession::with_default_config(FloodSegmenter::new(0.95)).unwrap();
    let init = session
        .initialize(
            &frame,
            vec![SelectionBuilder::new().tlbr(50.0, 50.0, 150.0, 150.0).name("grasper").build()],
        )
        .unwrap();
    assert_eq!(init.tracks.len(), 1);

    for i in 1..=4 {
        session.process_frame(&frame, i).unwrap();
    }
    let last = session.process_frame(&frame, 5).unwrap();

    let report = &last[0];
    assert_eq!(report.state, TrackState::Active);
    assert_eq!(report.frame_index, 5);
    assert_relative_eq!(report.bbox.x1, 70.0);
    assert_relative_eq!(report.bbox.y1, 70.0);
    assert_relative_eq!(report.bbox.x2, 130.0);
    assert_relative_eq!(report.bbox.y2, 130.0);
    assert_relative_eq!(report.confidence, 0.95);
    assert!(report.threshold >= 0.3 && report.threshold <= 0.7);
}

#[test]
fn test_static_object_stays_put() {
    let frame = scene(200, 200, &[(70, 70, 60)]);
    let mut tracker = InstrumentTracker::new(TrackerConfig::default()).unwrap();
    let init = tracker
        .initialize(&frame, vec![SelectionBuilder::new().tlbr(70.0, 70.0, 130.0, 130.0).build()])
        .unwrap();
    let id = init.tracks[0];
    let model = FloodSegmenter::new(0.9);

    for i in 1..=40 {
        let reports = tracker.update(&model, &frame, i).unwrap();
        assert_eq!(reports[0].state, TrackState::Active, "frame {i}");
        assert_eq!(reports[0].bbox, BBox::new(70.0, 70.0, 130.0, 130.0));
        assert_relative_eq!(reports[0].area_reduction_pct, 0.0, epsilon = 1e-3);
    }

    let track = tracker.track(id).unwrap();
    assert_eq!(track.confidence_history().len(), 5);
    assert_eq!(track.trajectory().len(), 30);
    assert_eq!(track.lost_frame_count(), 0);
}

#[test]
fn test_moving_object_is_followed() {
    let start = scene(300, 200, &[(40, 80, 40)]);
    let mut tracker = InstrumentTracker::new(TrackerConfig::default()).unwrap();
    let init = tracker
        .initialize(&start, vec![SelectionBuilder::new().tlbr(40.0, 80.0, 80.0, 120.0).build()])
        .unwrap();
    let model = FloodSegmenter::new(0.9);

    for i in 1..=20u64 {
        let x0 = 40 + 4 * i as usize;
        let frame = scene(300, 200, &[(x0, 80, 40)]);
        let reports = tracker.update(&model, &frame, i).unwrap();
        assert_eq!(reports[0].state, TrackState::Active, "frame {i}");
        assert_eq!(reports[0].bbox, BBox::new(x0 as f32, 80.0, x0 as f32 + 40.0, 120.0));
    }

    let track = tracker.track(init.tracks[0]).unwrap();
    let trajectory = track.trajectory().to_vec();
    assert_eq!(trajectory.len(), 20);
    assert_relative_eq!(trajectory[19][0] - trajectory[18][0], 4.0);
}

#[test]
fn test_zero_confidence_coasts_then_loses_track() {
    let frame = scene(200, 200, &[(70, 70, 60)]);
    let mut tracker = InstrumentTracker::new(TrackerConfig::default()).unwrap();
    tracker
        .initialize(&frame, vec![SelectionBuilder::new().tlbr(70.0, 70.0, 130.0, 130.0).build()])
        .unwrap();

    let first = tracker.update(&BlindSegmenter, &frame, 1).unwrap();
    assert_eq!(first[0].state, TrackState::Coasting);
    assert_eq!(first[0].lost_frame_count, 1);
    assert!(!first[0].lost);

    for i in 2..=50 {
        let r = tracker.update(&BlindSegmenter, &frame, i).unwrap();
        assert_eq!(r[0].state, TrackState::Coasting, "frame {i}");
    }

    let lost = tracker.update(&BlindSegmenter, &frame, 51).unwrap();
    assert_eq!(lost[0].state, TrackState::Lost);
    assert!(lost[0].lost);
    assert_eq!(lost[0].lost_frame_count, 51);
    assert_eq!(lost[0].bbox, BBox::new(70.0, 70.0, 130.0, 130.0));

    // lost is terminal
    let model = FloodSegmenter::new(0.99);
    let after = tracker.update(&model, &frame, 52).unwrap();
    assert_eq!(after[0].state, TrackState::Lost);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_short_dropout_recovers() {
    let frame = scene(200, 200, &[(70, 70, 60)]);
    let mut tracker = InstrumentTracker::new(TrackerConfig::default()).unwrap();
    tracker
        .initialize(&frame, vec![SelectionBuilder::new().tlbr(70.0, 70.0, 130.0, 130.0).build()])
        .unwrap();
    let model = FloodSegmenter::new(0.9);

    for i in 1..=5 {
        tracker.update(&model, &frame, i).unwrap();
    }
    for i in 6..=8 {
        let r = tracker.update(&BlindSegmenter, &frame, i).unwrap();
        assert_eq!(r[0].state, TrackState::Coasting);
    }
    let r = tracker.update(&model, &frame, 9).unwrap();
    assert_eq!(r[0].state, TrackState::Active);
    assert_eq!(r[0].lost_frame_count, 0);
}

#[test]
fn test_several_instruments_in_parallel() {
    let squares = [(20, 20, 40), (300, 40, 50), (150, 200, 30)];
    let frame = scene(400, 300, &squares);
    let model = FloodSegmenter::new(0.9);
    let mut tracker = InstrumentTracker::new(TrackerConfig::default()).unwrap();

    let selections = squares
        .iter()
        .enumerate()
        .map(|(i, &(x, y, s))| {
            SelectionBuilder::new()
                .tlwh(x as f32 - 5.0, y as f32 - 5.0, s as f32 + 10.0, s as f32 + 10.0)
                .name(format!("tool-{i}"))
                .build()
        })
        .collect();
    let init = tracker.initialize(&frame, selections).unwrap();
    assert_eq!(init.tracks.len(), 3);
    assert!(init.rejected.is_empty());

    for i in 1..=20 {
        let reports = tracker.update(&model, &frame, i).unwrap();
        assert_eq!(reports.len(), 3);
        for (report, &(x, y, s)) in reports.iter().zip(&squares) {
            assert_eq!(report.state, TrackState::Active);
            let (x, y, s) = (x as f32, y as f32, s as f32);
            assert_eq!(report.bbox, BBox::new(x, y, x + s, y + s));
        }
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 60);
}

#[test]
fn test_invalid_selections_are_skipped() {
    let frame = scene(200, 200, &[(70, 70, 60)]);
    let mut tracker = InstrumentTracker::new(TrackerConfig::default()).unwrap();
    let init = tracker
        .initialize(
            &frame,
            vec![
                SelectionBuilder::new().tlbr(500.0, 500.0, 600.0, 600.0).name("off-screen").build(),
                SelectionBuilder::new().tlbr(70.0, 70.0, 130.0, 130.0).name("good").build(),
                SelectionBuilder::new().point(f32::NAN, 3.0).name("broken").build(),
            ],
        )
        .unwrap();

    assert_eq!(init.tracks.len(), 1);
    let indices: Vec<usize> = init
        .rejected
        .iter()
        .map(|e| match e {
            Error::InvalidSelection { index, .. } => *index,
            other => panic!("unexpected error {other}"),
        })
        .collect();
    assert_eq!(indices, vec![0, 2]);
    assert_eq!(tracker.track(init.tracks[0]).unwrap().name(), "good");

    let mut empty = InstrumentTracker::new(TrackerConfig::default()).unwrap();
    assert!(matches!(
        empty.initialize(&frame, vec![SelectionBuilder::new().build()]),
        Err(Error::NoValidSelections)
    ));
}

#[test]
fn test_process_video_with_progress() {
    let frame = scene(200, 200, &[(70, 70, 60)]);
    let config = TrackerConfig {
        progress_interval: 5,
        ..TrackerConfig::default()
    };
    let mut session = TrackingSession::new(FloodSegmenter::new(0.9), config).unwrap();
    session
        .initialize(&frame, vec![SelectionBuilder::new().tlbr(60.0, 60.0, 140.0, 140.0).build()])
        .unwrap();
    session.process_frame(&frame, 0).unwrap();

    let frames = vec![frame; 12];
    let mut seen = Vec::new();
    let mut on_progress =
        |p: &Progress| seen.push((p.frame_index, p.total_frames, p.active_track_count));
    let results = session.process_video(&frames, Some(&mut on_progress)).unwrap();

    assert_eq!(results.len(), 12);
    assert_eq!(results[0][0].frame_index, 1);
    assert_eq!(results[11][0].frame_index, 12);
    assert_eq!(seen, vec![(4, 12, 1), (9, 12, 1), (11, 12, 1)]);
}

#[test]
fn test_stream_can_be_cancelled() {
    let frame = scene(200, 200, &[(70, 70, 60)]);
    let mut session = TrackingSession::with_default_config(FloodSegmenter::new(0.9)).unwrap();
    session
        .initialize(&frame, vec![SelectionBuilder::new().tlbr(70.0, 70.0, 130.0, 130.0).build()])
        .unwrap();

    let cancel = CancelToken::new();
    let mut processed = Vec::new();
    for result in session.stream(std::iter::repeat(frame.clone()).take(100), cancel.clone()) {
        let result = result.unwrap();
        processed.push(result.frame_index);
        if processed.len() == 7 {
            cancel.cancel();
        }
    }

    assert_eq!(processed, (0..7).collect::<Vec<u64>>());
    assert_eq!(session.model().calls.load(Ordering::SeqCst), 7);
}

#[test]
fn test_stream_stops_after_error() {
    let frame = scene(200, 200, &[(70, 70, 60)]);
    let mut session = TrackingSession::with_default_config(FloodSegmenter::new(0.9)).unwrap();
    session
        .initialize(&frame, vec![SelectionBuilder::new().tlbr(70.0, 70.0, 130.0, 130.0).build()])
        .unwrap();

    let wrong_size = scene(100, 100, &[]);
    let frames = vec![frame.clone(), wrong_size, frame];
    let results: Vec<_> = session.stream(frames, CancelToken::new()).collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(Error::FrameSizeMismatch { .. })));
}

#[test]
fn test_terminate_and_teardown() {
    let frame = scene(400, 300, &[(20, 20, 40), (300, 40, 50)]);
    let mut session = TrackingSession::with_default_config(FloodSegmenter::new(0.9)).unwrap();
    let init = session
        .initialize(
            &frame,
            vec![
                SelectionBuilder::new().tlbr(20.0, 20.0, 60.0, 60.0).build(),
                SelectionBuilder::new().tlbr(300.0, 40.0, 350.0, 90.0).build(),
            ],
        )
        .unwrap();
    let (a, b) = (init.tracks[0], init.tracks[1]);

    session.process_frame(&frame, 1).unwrap();
    let removed = session.terminate(a).unwrap();
    assert_eq!(removed.id(), a);
    assert!(matches!(session.terminate(a), Err(Error::UnknownTrack(id)) if id == a));

    let reports = session.process_frame(&frame, 2).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].id, b);

    session.teardown();
    assert!(matches!(session.process_frame(&frame, 3), Err(Error::NotInitialized)));

    let again = session
        .initialize(&frame, vec![SelectionBuilder::new().tlbr(20.0, 20.0, 60.0, 60.0).build()])
        .unwrap();
    assert!(again.tracks[0] > b);
    assert_eq!(session.process_frame(&frame, 0).unwrap()[0].state, TrackState::Active);
}

#[test]
fn test_fault_in_one_track_leaves_others_alone() {
    let squares = [(20, 20, 40), (300, 40, 50), (150, 200, 30)];
    let frame = scene(400, 300, &squares);
    let model = FaultyRightSegmenter {
        inner: FloodSegmenter::new(0.9),
        fault_x: 250.0,
    };
    let mut tracker = InstrumentTracker::new(TrackerConfig::default()).unwrap();
    let selections = squares
        .iter()
        .map(|&(x, y, s)| {
            let (x, y, s) = (x as f32, y as f32, s as f32);
            SelectionBuilder::new().tlbr(x, y, x + s, y + s).build()
        })
        .collect();
    tracker.initialize(&frame, selections).unwrap();

    for i in 1..=20 {
        let reports = tracker.update(&model, &frame, i).unwrap();
        assert_eq!(reports[0].state, TrackState::Active, "frame {i}");
        assert_eq!(reports[2].state, TrackState::Active, "frame {i}");
        assert_eq!(reports[1].state, TrackState::Coasting, "frame {i}");
        assert_eq!(reports[1].confidence, 0.0);
        assert_eq!(reports[1].lost_frame_count, i as u32);
        assert_eq!(reports[1].bbox, BBox::new(300.0, 40.0, 350.0, 90.0));
    }
    assert_eq!(tracker.store().active_count(), 2);
}
