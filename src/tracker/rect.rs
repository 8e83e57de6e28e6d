use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in frame pixel coordinates.
///
/// Stored in TLBR format (x1, y1, x2, y2) with pixel-edge semantics: a mask
/// covering columns 70..=129 has `x1 = 70.0` and `x2 = 130.0`.
///
/// Conversions are provided for the other common formats:
/// - TLWH: Top-Left X, Top-Left Y, Width, Height
/// - XYWH: Center X, Center Y, Width, Height
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    /// Create a box from TLBR coordinates.
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a box from top-left coordinates and dimensions (TLWH format).
    #[inline]
    pub fn from_tlwh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Create a box from center and dimensions (XYWH format).
    #[inline]
    pub fn from_xywh(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    /// Smallest box containing every point, or `None` for an empty slice.
    pub fn bounding(points: &[[f32; 2]]) -> Option<Self> {
        let first = points.first()?;
        let mut b = Self::new(first[0], first[1], first[0], first[1]);
        for p in &points[1..] {
            b.x1 = b.x1.min(p[0]);
            b.y1 = b.y1.min(p[1]);
            b.x2 = b.x2.max(p[0]);
            b.y2 = b.y2.max(p[1]);
        }
        Some(b)
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Convert to TLWH format: (x, y, width, height).
    #[inline]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x1, self.y1, self.width(), self.height()]
    }

    #[inline]
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    #[inline]
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    #[inline]
    pub fn longer_side(&self) -> f32 {
        self.width().max(self.height())
    }

    /// Width over height; `None` when the box has no height.
    #[inline]
    pub fn aspect_ratio(&self) -> Option<f32> {
        let h = self.height();
        (h > 0.0).then(|| self.width() / h)
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> [f32; 2] {
        [(self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0]
    }

    /// Get the area of the bounding box.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// A box with no area (including the all-zero box returned for empty masks).
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.area() <= 0.0
    }

    /// Whether every coordinate is a finite number.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.to_tlbr().iter().all(|v| v.is_finite())
    }

    /// Pad every side by `pad` pixels.
    #[inline]
    pub fn expand(&self, pad: f32) -> Self {
        Self::new(self.x1 - pad, self.y1 - pad, self.x2 + pad, self.y2 + pad)
    }

    /// Shift by `(dx, dy)`.
    #[inline]
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }

    /// Intersect with the frame `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: usize, height: usize) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self::new(
            self.x1.clamp(0.0, w),
            self.y1.clamp(0.0, h),
            self.x2.clamp(0.0, w),
            self.y2.clamp(0.0, h),
        )
    }

    /// Whether `b` lies entirely inside `self`, with `tol` pixels of slack.
    pub fn contains_box(&self, b: &BBox, tol: f32) -> bool {
        b.x1 >= self.x1 - tol
            && b.y1 >= self.y1 - tol
            && b.x2 <= self.x2 + tol
            && b.y2 <= self.y2 + tol
    }

    /// Whether the point lies inside the box (edges included).
    #[inline]
    pub fn contains_point(&self, p: [f32; 2]) -> bool {
        p[0] >= self.x1 && p[0] <= self.x2 && p[1] >= self.y1 && p[1] <= self.y2
    }

    /// Nearest point inside the box.
    #[inline]
    pub fn clamp_point(&self, p: [f32; 2]) -> [f32; 2] {
        [
            p[0].clamp(self.x1, self.x2.max(self.x1)),
            p[1].clamp(self.y1, self.y2.max(self.y1)),
        ]
    }

    /// Integer pixel window `(x0, y0, x1, y1)` covering the box, half-open.
    pub fn pixel_window(&self) -> (usize, usize, usize, usize) {
        let x0 = self.x1.max(0.0).floor() as usize;
        let y0 = self.y1.max(0.0).floor() as usize;
        let x1 = self.x2.max(0.0).ceil() as usize;
        let y1 = self.y2.max(0.0).ceil() as usize;
        (x0, y0, x1.max(x0), y1.max(y0))
    }
}

/// Minimum-area rectangle at an arbitrary angle.
///
/// `width` is always the longer side and `angle` is its direction in degrees,
/// normalized to `[-90, 90)`, with 0° meaning the longer side is horizontal.
/// Positive angles turn clockwise on screen since image y grows downward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RotatedRect {
    pub center: [f32; 2],
    pub width: f32,
    pub height: f32,
    pub angle: f32,
    /// Corners in order around the rectangle.
    pub corners: [[f32; 2]; 4],
}

impl RotatedRect {
    /// Rectangle of a plain axis-aligned box, angle 0 when wider than tall.
    pub fn from_bbox(b: &BBox) -> Self {
        let corners = [[b.x1, b.y1], [b.x2, b.y1], [b.x2, b.y2], [b.x1, b.y2]];
        let (width, height, angle) = if b.width() >= b.height() {
            (b.width(), b.height(), 0.0)
        } else {
            (b.height(), b.width(), -90.0)
        };
        Self {
            center: b.center(),
            width,
            height,
            angle,
            corners,
        }
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Longer side over shorter side; infinite for a zero-thickness rectangle.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else if self.width > 0.0 {
            f32::INFINITY
        } else {
            1.0
        }
    }

    /// Axis-aligned bound of the four corners.
    pub fn bounding_box(&self) -> BBox {
        BBox::bounding(&self.corners).unwrap_or_default()
    }
}

/// Fold an angle in degrees into `[-90, 90)`.
pub fn normalize_angle(mut deg: f32) -> f32 {
    deg %= 180.0;
    if deg >= 90.0 {
        deg -= 180.0;
    } else if deg < -90.0 {
        deg += 180.0;
    }
    deg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_conversions() {
        let b = BBox::from_tlwh(10.0, 20.0, 30.0, 40.0);

        assert_eq!(b.to_tlwh(), [10.0, 20.0, 30.0, 40.0]);
        assert_eq!(b.to_tlbr(), [10.0, 20.0, 40.0, 60.0]);
        assert_eq!(b.center(), [25.0, 40.0]);
        assert!((b.aspect_ratio().unwrap() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_from_xywh() {
        let b = BBox::from_xywh(25.0, 40.0, 30.0, 40.0);
        assert_eq!(b.to_tlbr(), [10.0, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn test_clamp_to_frame() {
        let b = BBox::new(-20.0, 10.0, 250.0, 90.0).clamp_to(200, 100);
        assert_eq!(b.to_tlbr(), [0.0, 10.0, 200.0, 90.0]);

        let outside = BBox::new(300.0, 300.0, 400.0, 400.0).clamp_to(200, 100);
        assert!(outside.is_degenerate());
    }

    #[test]
    fn test_pixel_window_rounds_outward() {
        let b = BBox::new(10.4, 2.0, 20.2, 7.9);
        assert_eq!(b.pixel_window(), (10, 2, 21, 8));
    }

    #[test]
    fn test_rotated_from_tall_bbox() {
        let r = RotatedRect::from_bbox(&BBox::new(0.0, 0.0, 10.0, 40.0));
        assert_eq!(r.width, 40.0);
        assert_eq!(r.height, 10.0);
        assert_eq!(r.angle, -90.0);
        assert_eq!(r.bounding_box(), BBox::new(0.0, 0.0, 10.0, 40.0));
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(90.0), -90.0);
        assert_eq!(normalize_angle(135.0), -45.0);
        assert_eq!(normalize_angle(-135.0), 45.0);
        assert_eq!(normalize_angle(-90.0), -90.0);
        assert_eq!(normalize_angle(30.0), 30.0);
    }
}
