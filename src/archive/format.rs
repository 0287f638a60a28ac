//! Label line format for saved artifacts.
//!
//! One line per box: `classId cx cy w h`, coordinates normalized to `0..1`
//! against the reference resolution, single spaces, `\n` after every line.
//! Downstream tooling parses these lines byte for byte, so numbers are
//! rendered the way the JVM renders a `float` (`0.5`, `1.0`, `1.0E-4`).

use crate::detect::{Detection, LabelSet};

/// Render all detections as label lines.
pub fn label_lines(detections: &[Detection]) -> String {
    let mut out = String::new();
    for det in detections {
        out.push_str(&label_line(det));
        out.push('\n');
    }
    out
}

/// Render one detection without a trailing newline.
pub fn label_line(det: &Detection) -> String {
    let c = det.center();
    format!(
        "{} {} {} {} {}",
        det.class_index(),
        format_float(c.cx),
        format_float(c.cy),
        format_float(c.w),
        format_float(c.h)
    )
}

/// Parse label lines back into detections.
///
/// Lines with fewer than five fields or unparseable coordinates are skipped.
/// A non-numeric class id maps to class 0. Parsed boxes carry confidence 1.0
/// and take their name from `labels`, or `class_<id>` past the end of it.
pub fn parse_label_lines(body: &str, labels: &LabelSet) -> Vec<Detection> {
    body.lines()
        .filter_map(|line| parse_label_line(line, labels))
        .collect()
}

pub fn parse_label_line(line: &str, labels: &LabelSet) -> Option<Detection> {
    let parts: Vec<&str> = line.trim().split(' ').collect();
    if parts.len() < 5 {
        return None;
    }
    let class_index = parts[0].parse::<usize>().unwrap_or(0);
    let mut coords = [0f32; 4];
    for (slot, raw) in coords.iter_mut().zip(&parts[1..5]) {
        match raw.parse::<f32>() {
            Ok(v) => *slot = v,
            Err(e) => {
                log::warn!("skipping label line {:?}: {}", line, e);
                return None;
            }
        }
    }
    let [cx, cy, w, h] = coords;
    Some(Detection::from_center(
        cx,
        cy,
        w,
        h,
        1.0,
        class_index,
        labels.resolve_or_synthesize(class_index),
    ))
}

/// Shortest round-trip rendering in JVM `Float.toString` style.
pub fn format_float(value: f32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let magnitude = value.abs();
    if (1e-3..1e7).contains(&magnitude) {
        let plain = format!("{}", value);
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        // `{:e}` yields e.g. `1.5e-4` or `1e7`.
        let sci = format!("{:e}", value);
        let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
        if mantissa.contains('.') {
            format!("{}E{}", mantissa, exponent)
        } else {
            format!("{}.0E{}", mantissa, exponent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_jvm_style_floats() {
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(0.123_456_79), "0.12345679");
        assert_eq!(format_float(0.0001), "1.0E-4");
        assert_eq!(format_float(0.000_15), "1.5E-4");
        assert_eq!(format_float(12_000_000.0), "1.2E7");
    }

    #[test]
    fn label_line_layout() {
        let dets = vec![
            Detection::from_center(0.5, 0.25, 0.2, 0.1, 0.91, 0, "person"),
            Detection::from_center(0.75, 0.5, 0.125, 1.0, 0.8, 16, "dog"),
        ];
        assert_eq!(
            label_lines(&dets),
            "0 0.5 0.25 0.2 0.1\n16 0.75 0.5 0.125 1.0\n"
        );
    }

    #[test]
    fn parses_lines_with_fallback_names() {
        let labels = LabelSet::new(["person", "cat"]);
        let parsed = parse_label_lines("1 0.5 0.5 0.2 0.2\nbogus\n7 0.1 0.1 0.05 0.05\n", &labels);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].class_name(), "cat");
        assert_eq!(parsed[0].confidence(), 1.0);
        assert_eq!(parsed[1].class_name(), "class_7");
        assert!(parse_label_line("0 0.5 x 0.2 0.2", &labels).is_none());
    }
}
