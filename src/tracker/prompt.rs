//! Prompt generation for the segmentation model.
//!
//! A single center point tends to collapse onto the middle of slender tools,
//! so elongated objects get several points spread along their principal axis.

use serde::{Deserialize, Serialize};

use crate::tracker::frame::FrameRegion;
use crate::tracker::geometry::{Mask, mask_moments};
use crate::tracker::instrument_tracker::TrackerConfig;
use crate::tracker::rect::BBox;

/// Whether a prompt point marks the object or the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointLabel {
    Foreground,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromptPoint {
    pub x: f32,
    pub y: f32,
    pub label: PointLabel,
}

impl PromptPoint {
    #[inline]
    pub fn foreground(p: [f32; 2]) -> Self {
        Self {
            x: p[0],
            y: p[1],
            label: PointLabel::Foreground,
        }
    }

    #[inline]
    pub fn position(&self) -> [f32; 2] {
        [self.x, self.y]
    }
}

/// How a prompt was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptStrategy {
    /// No usable mask: box center plus the box itself
    BoxCenter,
    /// Compact object: mask centroid only
    Centroid,
    /// Elongated object: centroid plus points along the principal axis
    PrincipalAxis,
}

/// Geometric prompt for one segmentation call. Always carries at least one point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub points: Vec<PromptPoint>,
    pub bbox: Option<BBox>,
    pub strategy: PromptStrategy,
}

impl Prompt {
    /// Re-express frame coordinates relative to `region`, clipping points into it.
    pub fn to_region(&self, region: &FrameRegion<'_>) -> Prompt {
        let local_bounds = BBox::new(
            0.0,
            0.0,
            (region.width() as f32 - 1.0).max(0.0),
            (region.height() as f32 - 1.0).max(0.0),
        );
        let points = self
            .points
            .iter()
            .map(|p| {
                let [x, y] = local_bounds.clamp_point(region.to_local(p.position()));
                PromptPoint { x, y, label: p.label }
            })
            .collect();
        let bbox = self.bbox.map(|b| {
            b.translate(-(region.origin[0] as f32), -(region.origin[1] as f32))
                .clamp_to(region.width(), region.height())
        });
        Prompt {
            points,
            bbox: bbox.filter(|b| !b.is_degenerate()),
            strategy: self.strategy,
        }
    }
}

/// Fractions of the axis half-extent at which extra points are placed.
const AXIS_OFFSETS_NARROW: [f32; 2] = [-0.5, 0.5];
const AXIS_OFFSETS_SLENDER: [f32; 4] = [-0.6, -0.3, 0.3, 0.6];

/// Build a prompt from a track's last geometry.
///
/// `last_mask` is the last accepted mask with the frame position of its
/// top-left pixel; `aspect_ratio` is long side over short side of the object's
/// rotated rectangle. Points are in frame coordinates and lie inside `bbox`.
pub fn build_prompt(
    bbox: &BBox,
    last_mask: Option<(&Mask, [usize; 2])>,
    aspect_ratio: f32,
    config: &TrackerConfig,
) -> Prompt {
    let center = if bbox.is_finite() { bbox.center() } else { [0.0, 0.0] };

    let moments = last_mask
        .filter(|_| !bbox.is_degenerate() && bbox.is_finite())
        .and_then(|(mask, origin)| mask_moments(mask, origin));

    let Some(m) = moments else {
        return Prompt {
            points: vec![PromptPoint::foreground(center)],
            bbox: (!bbox.is_degenerate() && bbox.is_finite()).then_some(*bbox),
            strategy: PromptStrategy::BoxCenter,
        };
    };

    let centroid = bbox.clamp_point(m.centroid);
    let mut points = vec![PromptPoint::foreground(centroid)];

    if aspect_ratio > config.elongation_ratio {
        let offsets: &[f32] = if aspect_ratio > 2.0 * config.elongation_ratio {
            &AXIS_OFFSETS_SLENDER
        } else {
            &AXIS_OFFSETS_NARROW
        };
        let (lo, hi) = m.extent;
        for &f in offsets {
            let t = if f < 0.0 { -f * lo } else { f * hi };
            let p = [m.centroid[0] + m.axis[0] * t, m.centroid[1] + m.axis[1] * t];
            points.push(PromptPoint::foreground(bbox.clamp_point(p)));
        }
        return Prompt {
            points,
            bbox: None,
            strategy: PromptStrategy::PrincipalAxis,
        };
    }

    Prompt {
        points,
        bbox: None,
        strategy: PromptStrategy::Centroid,
    }
}
