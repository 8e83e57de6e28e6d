//! Mask-to-geometry reduction.
//!
//! Turns a raw segmentation mask into the geometry the controller works with:
//! a noise-filtered axis-aligned box, the minimum-area rotated rectangle, the
//! outer contour and first/second order moments.

use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use imageproc::region_labelling::{Connectivity, connected_components};
use nalgebra::{Matrix2, Point2, Vector2};
use ndarray::Array2;

use crate::tracker::rect::{BBox, RotatedRect, normalize_angle};

/// Binary segmentation mask, indexed `[row, col]`.
pub type Mask = Array2<bool>;

/// Largest connected component of a mask.
#[derive(Debug, Clone)]
pub struct RefinedMask {
    /// Same shape as the input, only the surviving component set.
    pub mask: Mask,
    /// Pixel-edge bound of the surviving component; all zeros when empty.
    pub bbox: BBox,
    pub area: usize,
}

/// Everything derived from one accepted mask, in frame coordinates.
#[derive(Debug, Clone)]
pub struct MaskGeometry {
    pub bbox: BBox,
    pub rotated: RotatedRect,
    /// `100 * (1 - rotated_area / bbox_area)`, diagnostic only.
    pub area_reduction_pct: f32,
    pub contour: Vec<[f32; 2]>,
    pub centroid: [f32; 2],
    pub area: usize,
    /// Refined mask in region-local pixels.
    pub mask: Mask,
    /// `[x, y]` of the mask's top-left pixel in the frame.
    pub origin: [usize; 2],
}

impl MaskGeometry {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.area == 0
    }
}

/// Centroid and principal axis of a mask, in frame coordinates.
#[derive(Debug, Clone, Copy)]
pub struct MaskMoments {
    pub area: usize,
    pub centroid: [f32; 2],
    /// Unit vector along the direction of largest spread.
    pub axis: [f32; 2],
    /// Extreme projections of pixel centers onto `axis`, relative to the centroid.
    pub extent: (f32, f32),
}

fn to_gray(mask: &Mask) -> GrayImage {
    let (h, w) = mask.dim();
    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        Luma([if mask[[y as usize, x as usize]] { 255 } else { 0 }])
    })
}

/// Keep only the largest 8-connected component and bound it.
pub fn refine_mask(mask: &Mask) -> RefinedMask {
    let (h, w) = mask.dim();
    if !mask.iter().any(|&v| v) {
        return RefinedMask {
            mask: Array2::from_elem((h, w), false),
            bbox: BBox::default(),
            area: 0,
        };
    }

    let labels = connected_components(&to_gray(mask), Connectivity::Eight, Luma([0u8]));
    let mut areas: Vec<usize> = Vec::new();
    for px in labels.pixels() {
        let label = px.0[0] as usize;
        if label == 0 {
            continue;
        }
        if label >= areas.len() {
            areas.resize(label + 1, 0);
        }
        areas[label] += 1;
    }

    // ties go to the lowest label, i.e. the component met first in raster order
    let (best, area) = areas
        .iter()
        .enumerate()
        .skip(1)
        .fold((0usize, 0usize), |acc, (label, &a)| if a > acc.1 { (label, a) } else { acc });

    let refined = Array2::from_shape_fn((h, w), |(r, c)| {
        labels.get_pixel(c as u32, r as u32).0[0] as usize == best
    });

    let (mut x0, mut y0, mut x1, mut y1) = (usize::MAX, usize::MAX, 0usize, 0usize);
    for ((r, c), &on) in refined.indexed_iter() {
        if on {
            x0 = x0.min(c);
            y0 = y0.min(r);
            x1 = x1.max(c);
            y1 = y1.max(r);
        }
    }

    RefinedMask {
        mask: refined,
        bbox: BBox::new(x0 as f32, y0 as f32, (x1 + 1) as f32, (y1 + 1) as f32),
        area,
    }
}

/// Outer boundary of the mask as pixel coordinates, longest outer border wins.
pub fn extract_contour(mask: &Mask) -> Vec<[usize; 2]> {
    if !mask.iter().any(|&v| v) {
        return Vec::new();
    }
    find_contours::<i32>(&to_gray(mask))
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer))
        .max_by_key(|c| c.points.len())
        .map(|c| {
            c.points
                .iter()
                .map(|p| [p.x.max(0) as usize, p.y.max(0) as usize])
                .collect()
        })
        .unwrap_or_default()
}

/// Minimum-area enclosing rectangle of integer lattice points.
///
/// The hull comes from imageproc; rotating calipers over its edges pick the
/// orientation, computed in floating point so corners are not rounded.
pub fn min_area_rect(points: &[[i32; 2]]) -> RotatedRect {
    let mut unique = points.to_vec();
    unique.sort_unstable();
    unique.dedup();
    let lattice: Vec<Point<i32>> = unique.iter().map(|p| Point::new(p[0], p[1])).collect();
    let hull: Vec<Point2<f64>> = convex_hull(&lattice[..])
        .into_iter()
        .map(|p| Point2::new(p.x as f64, p.y as f64))
        .collect();
    match hull.len() {
        0 => return RotatedRect::default(),
        1 | 2 => {
            let pts: Vec<[f32; 2]> = hull.iter().map(|p| [p.x as f32, p.y as f32]).collect();
            return RotatedRect::from_bbox(&BBox::bounding(&pts).unwrap_or_default());
        }
        _ => {}
    }

    let mut best: Option<(f64, Vector2<f64>, [f64; 4])> = None;
    for i in 0..hull.len() {
        let edge = hull[(i + 1) % hull.len()] - hull[i];
        let len = edge.norm();
        if len <= f64::EPSILON {
            continue;
        }
        let u = edge / len;
        let v = Vector2::new(-u.y, u.x);

        let (mut u_min, mut u_max, mut v_min, mut v_max) =
            (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for p in &hull {
            let d = p.coords;
            let (pu, pv) = (d.dot(&u), d.dot(&v));
            u_min = u_min.min(pu);
            u_max = u_max.max(pu);
            v_min = v_min.min(pv);
            v_max = v_max.max(pv);
        }

        let area = (u_max - u_min) * (v_max - v_min);
        if best.as_ref().is_none_or(|(a, _, _)| area < a - 1e-9) {
            best = Some((area, u, [u_min, u_max, v_min, v_max]));
        }
    }

    let Some((_, u, [u_min, u_max, v_min, v_max])) = best else {
        return RotatedRect::default();
    };
    let v = Vector2::new(-u.y, u.x);
    let corner = |a: f64, b: f64| {
        let p = u * a + v * b;
        [p.x as f32, p.y as f32]
    };
    let corners = [
        corner(u_min, v_min),
        corner(u_max, v_min),
        corner(u_max, v_max),
        corner(u_min, v_max),
    ];
    let center = corner((u_min + u_max) / 2.0, (v_min + v_max) / 2.0);

    let (len_u, len_v) = (u_max - u_min, v_max - v_min);
    let (width, height, dir) = if len_u >= len_v {
        (len_u, len_v, u)
    } else {
        (len_v, len_u, v)
    };

    RotatedRect {
        center,
        width: width as f32,
        height: height as f32,
        angle: normalize_angle(dir.y.atan2(dir.x).to_degrees() as f32),
        corners,
    }
}

/// Centroid and principal axis from second-order central moments.
///
/// `origin` is the frame position of the mask's top-left pixel. Returns `None`
/// for an empty mask.
pub fn mask_moments(mask: &Mask, origin: [usize; 2]) -> Option<MaskMoments> {
    let mut n = 0usize;
    let (mut sx, mut sy) = (0.0f64, 0.0f64);
    for ((r, c), &on) in mask.indexed_iter() {
        if on {
            n += 1;
            sx += c as f64 + 0.5;
            sy += r as f64 + 0.5;
        }
    }
    if n == 0 {
        return None;
    }
    let (mx, my) = (sx / n as f64, sy / n as f64);

    let (mut cxx, mut cxy, mut cyy) = (0.0f64, 0.0f64, 0.0f64);
    for ((r, c), &on) in mask.indexed_iter() {
        if on {
            let dx = c as f64 + 0.5 - mx;
            let dy = r as f64 + 0.5 - my;
            cxx += dx * dx;
            cxy += dx * dy;
            cyy += dy * dy;
        }
    }

    let eig = Matrix2::new(cxx, cxy, cxy, cyy).symmetric_eigen();
    let major = if eig.eigenvalues[0] >= eig.eigenvalues[1] { 0 } else { 1 };
    let axis = eig.eigenvectors.column(major).into_owned();
    let axis = if axis.norm() > f64::EPSILON {
        axis.normalize()
    } else {
        Vector2::new(1.0, 0.0)
    };

    let (mut lo, mut hi) = (0.0f64, 0.0f64);
    for ((r, c), &on) in mask.indexed_iter() {
        if on {
            let d = Vector2::new(c as f64 + 0.5 - mx, r as f64 + 0.5 - my);
            let t = d.dot(&axis);
            lo = lo.min(t);
            hi = hi.max(t);
        }
    }

    Some(MaskMoments {
        area: n,
        centroid: [(mx + origin[0] as f64) as f32, (my + origin[1] as f64) as f32],
        axis: [axis.x as f32, axis.y as f32],
        extent: (lo as f32, hi as f32),
    })
}

/// Full reduction of a region-local mask whose top-left pixel sits at `origin`.
///
/// An empty mask reduces to all-zero geometry with `area == 0`.
pub fn reduce_mask(mask: &Mask, origin: [usize; 2]) -> MaskGeometry {
    let refined = refine_mask(mask);
    let (ox, oy) = (origin[0] as f32, origin[1] as f32);

    if refined.area == 0 {
        return MaskGeometry {
            bbox: BBox::default(),
            rotated: RotatedRect::default(),
            area_reduction_pct: 0.0,
            contour: Vec::new(),
            centroid: [0.0, 0.0],
            area: 0,
            mask: refined.mask,
            origin,
        };
    }

    let boundary = extract_contour(&refined.mask);
    let contour: Vec<[f32; 2]> = boundary
        .iter()
        .map(|p| [p[0] as f32 + ox, p[1] as f32 + oy])
        .collect();

    // every boundary pixel contributes its whole square so the rectangle covers the bbox
    let bbox = refined.bbox.translate(ox, oy);
    let mut squares = Vec::with_capacity(boundary.len() * 4);
    for p in &boundary {
        let (x, y) = ((p[0] + origin[0]) as i32, (p[1] + origin[1]) as i32);
        squares.extend([[x, y], [x + 1, y], [x, y + 1], [x + 1, y + 1]]);
    }
    let rotated = if squares.is_empty() {
        RotatedRect::from_bbox(&bbox)
    } else {
        min_area_rect(&squares)
    };

    let area_reduction_pct = if bbox.area() > 0.0 {
        ((1.0 - rotated.area() / bbox.area()) * 100.0).max(0.0)
    } else {
        0.0
    };

    let centroid = mask_moments(&refined.mask, origin)
        .map(|m| m.centroid)
        .unwrap_or_else(|| bbox.center());

    MaskGeometry {
        bbox,
        rotated,
        area_reduction_pct,
        contour,
        centroid,
        area: refined.area,
        mask: refined.mask,
        origin,
    }
}

/// Rasterize a polygon (even-odd rule at pixel centers) into a frame-sized mask.
pub fn rasterize_polygon(vertices: &[[f32; 2]], width: usize, height: usize) -> Mask {
    let mut mask = Array2::from_elem((height, width), false);
    if vertices.len() < 3 {
        return mask;
    }
    let Some(bounds) = BBox::bounding(vertices) else {
        return mask;
    };
    let (x0, y0, x1, y1) = bounds.clamp_to(width, height).pixel_window();

    for r in y0..y1.min(height) {
        let py = r as f32 + 0.5;
        for c in x0..x1.min(width) {
            let px = c as f32 + 0.5;
            let mut inside = false;
            let mut j = vertices.len() - 1;
            for i in 0..vertices.len() {
                let (a, b) = (vertices[i], vertices[j]);
                if (a[1] > py) != (b[1] > py)
                    && px < (b[0] - a[0]) * (py - a[1]) / (b[1] - a[1]) + a[0]
                {
                    inside = !inside;
                }
                j = i;
            }
            mask[[r, c]] = inside;
        }
    }
    mask
}
