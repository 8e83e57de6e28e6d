//! User selections that start a track.

use ndarray::s;

use crate::tracker::frame::Frame;
use crate::tracker::geometry::{Mask, rasterize_polygon, reduce_mask};
use crate::tracker::instrument::{Rgb, TrackSeed};
use crate::tracker::instrument_tracker::TrackerConfig;
use crate::tracker::rect::BBox;

/// Geometric part of a selection, in frame pixel coordinates.
#[derive(Debug, Clone)]
pub enum SelectionKind {
    Point([f32; 2]),
    Box(BBox),
    Polygon(Vec<[f32; 2]>),
    /// Binary mask whose top-left pixel sits at `origin` (`[x, y]`).
    Mask { mask: Mask, origin: [usize; 2] },
}

/// One object picked by the operator.
#[derive(Debug, Clone)]
pub struct Selection {
    pub kind: SelectionKind,
    pub name: String,
    pub color: Rgb,
}

impl Selection {
    pub fn new(kind: SelectionKind, name: impl Into<String>, color: Rgb) -> Self {
        Self {
            kind,
            name: name.into(),
            color,
        }
    }

    /// Validate against `frame` and derive the track's initial geometry.
    pub(crate) fn seed(&self, frame: &Frame, config: &TrackerConfig) -> Result<TrackSeed, String> {
        let (w, h) = frame.size();
        match &self.kind {
            SelectionKind::Point(p) => {
                if !p.iter().all(|v| v.is_finite()) {
                    return Err("point has non-finite coordinates".into());
                }
                if p[0] < 0.0 || p[1] < 0.0 || p[0] >= w as f32 || p[1] >= h as f32 {
                    return Err(format!("point {p:?} lies outside the {w}x{h} frame"));
                }
                let size = config.point_seed_size;
                let bbox = BBox::from_xywh(p[0], p[1], size, size).clamp_to(w, h);
                Ok(TrackSeed::from_bbox(bbox, false))
            }
            SelectionKind::Box(b) => {
                if !b.is_finite() {
                    return Err("box has non-finite coordinates".into());
                }
                if b.x2 <= b.x1 || b.y2 <= b.y1 {
                    return Err(format!("box {:?} has no area", b.to_tlbr()));
                }
                let clamped = b.clamp_to(w, h);
                if clamped.is_degenerate() {
                    return Err(format!("box {:?} lies outside the {w}x{h} frame", b.to_tlbr()));
                }
                Ok(TrackSeed::from_bbox(clamped, true))
            }
            SelectionKind::Polygon(vertices) => {
                if vertices.len() < 3 {
                    return Err(format!(
                        "polygon needs at least 3 vertices, got {}",
                        vertices.len()
                    ));
                }
                if !vertices.iter().flatten().all(|v| v.is_finite()) {
                    return Err("polygon has non-finite coordinates".into());
                }
                let g = reduce_mask(&rasterize_polygon(vertices, w, h), [0, 0]);
                if g.is_empty() {
                    return Err("polygon covers no pixels inside the frame".into());
                }
                Ok(g.into())
            }
            SelectionKind::Mask { mask, origin } => {
                let (mh, mw) = mask.dim();
                // keep only the part that overlaps the frame
                let cw = mw.min(w.saturating_sub(origin[0]));
                let ch = mh.min(h.saturating_sub(origin[1]));
                if cw == 0 || ch == 0 {
                    return Err(format!(
                        "{mw}x{mh} mask at {origin:?} lies outside the {w}x{h} frame"
                    ));
                }
                let visible = mask.slice(s![..ch, ..cw]).to_owned();
                let g = reduce_mask(&visible, *origin);
                if g.is_empty() {
                    return Err("mask has no pixels inside the frame".into());
                }
                Ok(g.into())
            }
        }
    }
}
