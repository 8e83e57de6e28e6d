//! Builder for creating Selection objects from various input formats.

use crate::tracker::{BBox, Mask, Rgb, Selection, SelectionKind};

/// Builder for creating `Selection` objects from various input formats.
///
/// A builder without any geometry produces an empty box, which
/// initialization rejects like any other malformed selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionBuilder {
    kind: Option<SelectionKind>,
    name: String,
    color: Rgb,
}

impl SelectionBuilder {
    /// Create a new selection builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Operator-facing name of the instrument.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Display color as RGB.
    pub fn color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    /// Set a box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.kind = Some(SelectionKind::Box(BBox::new(x1, y1, x2, y2)));
        self
    }

    /// Set a box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.kind = Some(SelectionKind::Box(BBox::from_xywh(cx, cy, w, h)));
        self
    }

    /// Set a box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.kind = Some(SelectionKind::Box(BBox::from_tlwh(x, y, w, h)));
        self
    }

    /// Select by a single click on the instrument.
    pub fn point(mut self, x: f32, y: f32) -> Self {
        self.kind = Some(SelectionKind::Point([x, y]));
        self
    }

    /// Select by an outline drawn around the instrument.
    pub fn polygon(mut self, vertices: impl IntoIterator<Item = [f32; 2]>) -> Self {
        self.kind = Some(SelectionKind::Polygon(vertices.into_iter().collect()));
        self
    }

    /// Select by a pre-computed mask whose top-left pixel sits at `origin` (`[x, y]`).
    pub fn mask(mut self, mask: Mask, origin: [usize; 2]) -> Self {
        self.kind = Some(SelectionKind::Mask { mask, origin });
        self
    }

    /// Build the final `Selection`.
    pub fn build(self) -> Selection {
        let kind = self
            .kind
            .unwrap_or_else(|| SelectionKind::Box(BBox::default()));
        Selection::new(kind, self.name, self.color)
    }
}
