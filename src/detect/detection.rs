/// Corner-form box, normalized to the model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corners {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Center-form box, normalized to the model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CenterBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl CenterBox {
    pub fn corners(&self) -> Corners {
        Corners {
            x1: self.cx - self.w / 2.0,
            y1: self.cy - self.h / 2.0,
            x2: self.cx + self.w / 2.0,
            y2: self.cy + self.h / 2.0,
        }
    }
}

/// One decoded object.
///
/// The center form is canonical; the corner form is derived once at
/// construction so that both are always consistent.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    center: CenterBox,
    corners: Corners,
    confidence: f32,
    class_index: usize,
    class_name: String,
}

impl Detection {
    /// Build a detection from center-form coordinates.
    ///
    /// Negative extents are clamped to zero.
    pub fn from_center(
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        confidence: f32,
        class_index: usize,
        class_name: impl Into<String>,
    ) -> Self {
        let center = CenterBox {
            cx,
            cy,
            w: w.max(0.0),
            h: h.max(0.0),
        };
        Self {
            corners: center.corners(),
            center,
            confidence,
            class_index,
            class_name: class_name.into(),
        }
    }

    pub fn center(&self) -> CenterBox {
        self.center
    }

    pub fn corners(&self) -> Corners {
        self.corners
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn class_index(&self) -> usize {
        self.class_index
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn area(&self) -> f32 {
        self.center.w * self.center.h
    }

    /// True when every corner lies inside the unit square.
    pub fn is_inside_frame(&self) -> bool {
        let c = self.corners;
        [c.x1, c.y1, c.x2, c.y2]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }

    /// Same box, reassigned to another class.
    pub fn with_class(&self, class_index: usize, class_name: impl Into<String>) -> Self {
        Self {
            class_index,
            class_name: class_name.into(),
            ..self.clone()
        }
    }

    pub fn intersection_area(&self, other: &Detection) -> f32 {
        let a = self.corners;
        let b = other.corners;
        let w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
        let h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
        w * h
    }

    /// Intersection over union. Zero when the union is empty.
    pub fn iou(&self, other: &Detection) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(cx: f32, cy: f32, w: f32, h: f32) -> Detection {
        Detection::from_center(cx, cy, w, h, 0.9, 0, "person")
    }

    #[test]
    fn corners_follow_center() {
        let d = det(0.5, 0.25, 0.2, 0.1);
        let c = d.corners();
        assert!((c.x1 - 0.4).abs() < 1e-6);
        assert!((c.y1 - 0.2).abs() < 1e-6);
        assert!((c.x2 - 0.6).abs() < 1e-6);
        assert!((c.y2 - 0.3).abs() < 1e-6);
    }

    #[test]
    fn iou_is_symmetric_and_reflexive() {
        let a = det(0.5, 0.5, 0.4, 0.4);
        let b = det(0.6, 0.55, 0.3, 0.5);
        assert_eq!(a.iou(&b), b.iou(&a));
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&det(0.05, 0.05, 0.05, 0.05)), 0.0);
    }

    #[test]
    fn degenerate_box_has_zero_iou() {
        let point = det(0.5, 0.5, 0.0, 0.0);
        let a = det(0.5, 0.5, 0.4, 0.4);
        assert_eq!(point.iou(&a), 0.0);
        assert_eq!(point.iou(&point), 0.0);
    }

    #[test]
    fn partial_overlap_matches_hand_computation() {
        // [0,0.5]x[0,0.5] vs [0.25,0.75]x[0,0.5]: inter 0.125, union 0.375
        let a = Detection::from_center(0.25, 0.25, 0.5, 0.5, 0.9, 0, "a");
        let b = Detection::from_center(0.5, 0.25, 0.5, 0.5, 0.8, 0, "b");
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn negative_extent_is_clamped() {
        let d = det(0.5, 0.5, -0.1, 0.2);
        assert_eq!(d.center().w, 0.0);
        assert_eq!(d.area(), 0.0);
    }

    #[test]
    fn reassigning_class_keeps_geometry() {
        let d = det(0.5, 0.5, 0.2, 0.2);
        let cat = d.with_class(15, "cat");
        assert_eq!(cat.class_index(), 15);
        assert_eq!(cat.class_name(), "cat");
        assert_eq!(cat.corners(), d.corners());
        assert_eq!(cat.confidence(), d.confidence());
    }
}
