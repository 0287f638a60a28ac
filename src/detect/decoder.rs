//! Raw output tensor decoding.
//!
//! The model emits a channel-major `[num_channels, num_anchors]` buffer
//! (batch dimension stripped). Channels `0..4` hold `cx, cy, w, h` in
//! model-input pixels; the remaining channels hold one score row per class.

use anyhow::Result;

use crate::detect::detection::Detection;
use crate::detect::labels::LabelSet;
use crate::error::SentinelError;

/// Number of leading box-geometry channels.
pub const BOX_CHANNELS: usize = 4;

/// Immutable model geometry, fixed at engine initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelGeometry {
    pub input_width: u32,
    pub input_height: u32,
    pub num_channels: usize,
    pub num_anchors: usize,
}

impl ModelGeometry {
    /// Derive geometry from the declared input size and output shape
    /// `[1, num_channels, num_anchors]`.
    pub fn from_output_shape(input_width: u32, input_height: u32, shape: &[usize]) -> Result<Self> {
        let (num_channels, num_anchors) = match shape {
            [1, channels, anchors] => (*channels, *anchors),
            [channels, anchors] => (*channels, *anchors),
            other => {
                return Err(SentinelError::configuration(format!(
                    "unsupported output shape {:?}; expected [1, 4 + classes, anchors]",
                    other
                )))
            }
        };
        let geometry = Self {
            input_width,
            input_height,
            num_channels,
            num_anchors,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(SentinelError::configuration(format!(
                "model input size {}x{} must be non-zero",
                self.input_width, self.input_height
            )));
        }
        if self.num_channels <= BOX_CHANNELS {
            return Err(SentinelError::configuration(format!(
                "output has {} channels; need {} box channels plus at least one class",
                self.num_channels, BOX_CHANNELS
            )));
        }
        if self.num_anchors == 0 {
            return Err(SentinelError::configuration("output has zero anchors"));
        }
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.num_channels - BOX_CHANNELS
    }

    pub fn tensor_len(&self) -> usize {
        self.num_channels * self.num_anchors
    }
}

/// A raw output buffer whose length has been checked against a geometry.
#[derive(Clone, Copy, Debug)]
pub struct TensorView<'a> {
    data: &'a [f32],
    geometry: ModelGeometry,
}

impl<'a> TensorView<'a> {
    pub fn new(data: &'a [f32], geometry: ModelGeometry) -> Result<Self> {
        if data.len() != geometry.tensor_len() {
            return Err(SentinelError::configuration(format!(
                "tensor has {} elements, geometry {}x{} expects {}",
                data.len(),
                geometry.num_channels,
                geometry.num_anchors,
                geometry.tensor_len()
            )));
        }
        Ok(Self { data, geometry })
    }

    pub fn geometry(&self) -> ModelGeometry {
        self.geometry
    }

    #[inline]
    fn at(&self, channel: usize, anchor: usize) -> f32 {
        self.data[channel * self.geometry.num_anchors + anchor]
    }
}

/// What to do with decoded boxes that extend past the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutOfFramePolicy {
    /// Keep coordinates as decoded, even outside `[0, 1]`.
    #[default]
    Keep,
    /// Drop any box with a corner outside `[0, 1]`.
    Discard,
}

/// Turns a validated output tensor into labeled candidate detections.
#[derive(Clone, Debug)]
pub struct TensorDecoder {
    labels: LabelSet,
    out_of_frame: OutOfFramePolicy,
}

impl TensorDecoder {
    pub fn new(labels: LabelSet) -> Self {
        Self {
            labels,
            out_of_frame: OutOfFramePolicy::default(),
        }
    }

    pub fn with_out_of_frame(mut self, policy: OutOfFramePolicy) -> Self {
        self.out_of_frame = policy;
        self
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Decode every anchor whose best class score is strictly above
    /// `confidence_threshold`. Results keep anchor order.
    pub fn decode(&self, tensor: TensorView<'_>, confidence_threshold: f32) -> Vec<Detection> {
        let geometry = tensor.geometry();
        let width = geometry.input_width as f32;
        let height = geometry.input_height as f32;
        let mut out = Vec::new();

        for anchor in 0..geometry.num_anchors {
            let mut best_score = f32::NEG_INFINITY;
            let mut best_class = 0usize;
            for class in 0..geometry.num_classes() {
                let score = tensor.at(BOX_CHANNELS + class, anchor);
                if score > best_score {
                    best_score = score;
                    best_class = class;
                }
            }

            if best_score <= confidence_threshold {
                continue;
            }

            let detection = Detection::from_center(
                tensor.at(0, anchor) / width,
                tensor.at(1, anchor) / height,
                tensor.at(2, anchor) / width,
                tensor.at(3, anchor) / height,
                best_score,
                best_class,
                self.labels.resolve(best_class),
            );

            if self.out_of_frame == OutOfFramePolicy::Discard && !detection.is_inside_frame() {
                log::debug!(
                    "discarding out-of-frame {} at anchor {}",
                    detection.class_name(),
                    anchor
                );
                continue;
            }
            out.push(detection);
        }

        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds channel-major tensors anchor by anchor.
    pub(crate) struct TensorBuilder {
        geometry: ModelGeometry,
        data: Vec<f32>,
    }

    impl TensorBuilder {
        pub(crate) fn new(size: u32, classes: usize, anchors: usize) -> Self {
            let geometry = ModelGeometry {
                input_width: size,
                input_height: size,
                num_channels: BOX_CHANNELS + classes,
                num_anchors: anchors,
            };
            Self {
                geometry,
                data: vec![0.0; geometry.tensor_len()],
            }
        }

        pub(crate) fn anchor(mut self, anchor: usize, xywh: [f32; 4], scores: &[f32]) -> Self {
            let n = self.geometry.num_anchors;
            for (channel, value) in xywh.iter().chain(scores.iter()).enumerate() {
                self.data[channel * n + anchor] = *value;
            }
            self
        }

        pub(crate) fn geometry(&self) -> ModelGeometry {
            self.geometry
        }

        pub(crate) fn build(self) -> Vec<f32> {
            self.data
        }
    }

    fn coco_like() -> LabelSet {
        LabelSet::new(["person", "bicycle", "car"])
    }

    #[test]
    fn geometry_from_output_shape() {
        let g = ModelGeometry::from_output_shape(640, 640, &[1, 84, 8400]).unwrap();
        assert_eq!(g.num_classes(), 80);
        assert_eq!(g.tensor_len(), 84 * 8400);
        assert!(ModelGeometry::from_output_shape(640, 640, &[1, 4, 8400]).is_err());
        assert!(ModelGeometry::from_output_shape(640, 640, &[1, 2, 84, 8400]).is_err());
        assert!(ModelGeometry::from_output_shape(0, 640, &[1, 84, 8400]).is_err());
    }

    #[test]
    fn wrong_tensor_length_is_a_configuration_error() {
        let builder = TensorBuilder::new(320, 3, 4);
        let geometry = builder.geometry();
        let short = vec![0.0; geometry.tensor_len() - 1];
        let err = TensorView::new(&short, geometry).unwrap_err();
        assert!(matches!(
            SentinelError::classify(&err),
            Some(SentinelError::Configuration(_))
        ));
    }

    #[test]
    fn decodes_best_class_and_normalizes() {
        let builder = TensorBuilder::new(320, 3, 3)
            .anchor(0, [160.0, 80.0, 64.0, 32.0], &[0.1, 0.2, 0.9])
            .anchor(1, [10.0, 10.0, 4.0, 4.0], &[0.2, 0.1, 0.1])
            .anchor(2, [32.0, 32.0, 16.0, 16.0], &[0.6, 0.3, 0.0]);
        let geometry = builder.geometry();
        let data = builder.build();
        let view = TensorView::new(&data, geometry).unwrap();

        let dets = TensorDecoder::new(coco_like()).decode(view, 0.5);
        assert_eq!(dets.len(), 2);

        let car = &dets[0];
        assert_eq!(car.class_index(), 2);
        assert_eq!(car.class_name(), "car");
        assert!((car.confidence() - 0.9).abs() < 1e-6);
        let c = car.center();
        assert!((c.cx - 0.5).abs() < 1e-6);
        assert!((c.cy - 0.25).abs() < 1e-6);
        assert!((c.w - 0.2).abs() < 1e-6);
        assert!((c.h - 0.1).abs() < 1e-6);
        let k = car.corners();
        assert!((k.x1 - 0.4).abs() < 1e-6);
        assert!((k.y2 - 0.3).abs() < 1e-6);

        assert_eq!(dets[1].class_name(), "person");
        for d in &dets {
            assert!(d.confidence() > 0.5);
        }
    }

    #[test]
    fn threshold_is_strict_and_ties_pick_lowest_class() {
        let builder = TensorBuilder::new(100, 3, 2)
            .anchor(0, [50.0, 50.0, 10.0, 10.0], &[0.5, 0.5, 0.5])
            .anchor(1, [50.0, 50.0, 10.0, 10.0], &[0.2, 0.7, 0.7]);
        let geometry = builder.geometry();
        let data = builder.build();
        let view = TensorView::new(&data, geometry).unwrap();

        let dets = TensorDecoder::new(coco_like()).decode(view, 0.5);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_index(), 1);
    }

    #[test]
    fn all_below_threshold_is_empty() {
        let builder = TensorBuilder::new(100, 2, 16);
        let geometry = builder.geometry();
        let data = builder.build();
        let view = TensorView::new(&data, geometry).unwrap();
        assert!(TensorDecoder::new(LabelSet::default())
            .decode(view, 0.25)
            .is_empty());
    }

    #[test]
    fn unknown_class_name_for_short_label_list() {
        let builder =
            TensorBuilder::new(100, 5, 1).anchor(0, [50.0, 50.0, 10.0, 10.0], &[0.0, 0.0, 0.0, 0.0, 0.8]);
        let geometry = builder.geometry();
        let data = builder.build();
        let view = TensorView::new(&data, geometry).unwrap();
        let dets = TensorDecoder::new(coco_like()).decode(view, 0.3);
        assert_eq!(dets[0].class_index(), 4);
        assert_eq!(dets[0].class_name(), "Unknown");
    }

    #[test]
    fn out_of_frame_policy() {
        let builder = TensorBuilder::new(100, 1, 2)
            .anchor(0, [5.0, 50.0, 20.0, 10.0], &[0.9])
            .anchor(1, [50.0, 50.0, 20.0, 10.0], &[0.9]);
        let geometry = builder.geometry();
        let data = builder.build();
        let view = TensorView::new(&data, geometry).unwrap();

        let keep = TensorDecoder::new(LabelSet::default()).decode(view, 0.5);
        assert_eq!(keep.len(), 2);
        assert!(keep[0].corners().x1 < 0.0);

        let discard = TensorDecoder::new(LabelSet::default())
            .with_out_of_frame(OutOfFramePolicy::Discard)
            .decode(view, 0.5);
        assert_eq!(discard.len(), 1);
        assert!((discard[0].center().cx - 0.5).abs() < 1e-6);
    }
}
