//! Motion- and size-adaptive search window around a track's last position.

use crate::tracker::history::BoundedHistory;
use crate::tracker::instrument_tracker::TrackerConfig;
use crate::tracker::rect::BBox;

/// Padding applied on every side of the last box.
///
/// `max(longer_side * size_scale, min_size_expansion) + last_displacement * motion_scale`,
/// clamped to `[min_expansion, max_expansion]`. `accepted` holds the centers of
/// accepted frames only, so coasting does not cancel the motion term.
pub fn expansion(
    bbox: &BBox,
    accepted: &BoundedHistory<[f32; 2]>,
    config: &TrackerConfig,
) -> f32 {
    let size_term = (bbox.longer_side() * config.size_scale).max(config.min_size_expansion);

    let motion_term = accepted
        .last_two()
        .map(|(prev, last)| {
            let (dx, dy) = (last[0] - prev[0], last[1] - prev[1]);
            (dx * dx + dy * dy).sqrt() * config.motion_scale
        })
        .filter(|m| m.is_finite())
        .unwrap_or(0.0);

    (size_term + motion_term).clamp(config.min_expansion, config.max_expansion)
}

/// The last box padded by [`expansion`] and intersected with the frame.
pub fn search_region(
    bbox: &BBox,
    accepted: &BoundedHistory<[f32; 2]>,
    frame_size: (usize, usize),
    config: &TrackerConfig,
) -> BBox {
    let pad = expansion(bbox, accepted, config);
    bbox.expand(pad).clamp_to(frame_size.0, frame_size.1)
}
