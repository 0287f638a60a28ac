use std::cmp::Ordering;

use serde::Deserialize;

use crate::detect::detection::Detection;

/// Which candidates may suppress each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionScope {
    /// Geometry only; one location keeps one box regardless of class.
    #[default]
    ClassAgnostic,
    /// Only boxes of the same class index compete.
    PerClass,
}

impl SuppressionScope {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "class_agnostic" | "agnostic" => Some(Self::ClassAgnostic),
            "per_class" | "class" => Some(Self::PerClass),
            _ => None,
        }
    }

    fn competes(self, a: &Detection, b: &Detection) -> bool {
        match self {
            Self::ClassAgnostic => true,
            Self::PerClass => a.class_index() == b.class_index(),
        }
    }
}

/// Greedy non-max suppression.
///
/// Output is confidence-descending; equal confidences keep input order.
pub fn suppress(
    mut detections: Vec<Detection>,
    iou_threshold: f32,
    scope: SuppressionScope,
) -> Vec<Detection> {
    // `sort_by` is stable.
    detections.sort_by(|a, b| {
        b.confidence()
            .partial_cmp(&a.confidence())
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    'candidates: for candidate in detections {
        for accepted in &kept {
            if scope.competes(accepted, &candidate) && accepted.iou(&candidate) >= iou_threshold {
                continue 'candidates;
            }
        }
        kept.push(candidate);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(cx: f32, cy: f32, size: f32, confidence: f32, class: usize) -> Detection {
        Detection::from_center(cx, cy, size, size, confidence, class, format!("c{}", class))
    }

    #[test]
    fn keeps_best_of_overlapping_cluster() {
        let input = vec![
            det(0.50, 0.50, 0.2, 0.70, 0),
            det(0.51, 0.50, 0.2, 0.95, 0),
            det(0.20, 0.20, 0.1, 0.60, 0),
            det(0.52, 0.51, 0.2, 0.80, 0),
        ];
        let out = suppress(input.clone(), 0.5, SuppressionScope::ClassAgnostic);
        assert_eq!(out.len(), 2);
        assert!((out[0].confidence() - 0.95).abs() < 1e-6);
        assert!((out[1].confidence() - 0.60).abs() < 1e-6);

        for pair in out.windows(2) {
            assert!(pair[0].confidence() >= pair[1].confidence());
        }
        for (i, a) in out.iter().enumerate() {
            assert!(input.contains(a));
            for b in out.iter().skip(i + 1) {
                assert!(a.iou(b) < 0.5);
            }
        }
    }

    #[test]
    fn iou_equal_to_threshold_is_suppressed() {
        let a = Detection::from_center(0.25, 0.25, 0.5, 0.5, 0.9, 0, "a");
        let b = Detection::from_center(0.5, 0.25, 0.5, 0.5, 0.8, 0, "b");
        let iou = a.iou(&b);
        let out = suppress(vec![a, b], iou, SuppressionScope::ClassAgnostic);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn equal_confidence_keeps_decode_order() {
        let first = det(0.2, 0.2, 0.1, 0.8, 1);
        let second = det(0.7, 0.7, 0.1, 0.8, 2);
        let out = suppress(
            vec![first.clone(), second.clone()],
            0.5,
            SuppressionScope::ClassAgnostic,
        );
        assert_eq!(out, vec![first, second]);
    }

    #[test]
    fn per_class_scope_keeps_overlapping_other_classes() {
        let person = det(0.5, 0.5, 0.3, 0.9, 0);
        let dog = det(0.5, 0.5, 0.3, 0.8, 16);
        let agnostic = suppress(
            vec![person.clone(), dog.clone()],
            0.5,
            SuppressionScope::ClassAgnostic,
        );
        assert_eq!(agnostic, vec![person.clone()]);

        let per_class = suppress(vec![dog.clone(), person.clone()], 0.5, SuppressionScope::PerClass);
        assert_eq!(per_class, vec![person, dog]);
    }

    #[test]
    fn empty_input() {
        assert!(suppress(Vec::new(), 0.5, SuppressionScope::PerClass).is_empty());
    }

    #[test]
    fn parse_scope_names() {
        assert_eq!(
            SuppressionScope::parse("per_class"),
            Some(SuppressionScope::PerClass)
        );
        assert_eq!(
            SuppressionScope::parse("Agnostic"),
            Some(SuppressionScope::ClassAgnostic)
        );
        assert_eq!(SuppressionScope::parse("none"), None);
    }
}
