use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::backend::ModelRuntime;

/// Scripted runtime for tests and dry runs.
///
/// Each call to `infer` pops the next scripted response. When the script is
/// exhausted it returns an all-zero tensor, which decodes to no detections.
pub struct StubRuntime {
    input_width: u32,
    input_height: u32,
    num_channels: usize,
    num_anchors: usize,
    script: VecDeque<Result<Vec<f32>, String>>,
    calls: u64,
}

impl StubRuntime {
    pub fn new(input_width: u32, input_height: u32, num_classes: usize, num_anchors: usize) -> Self {
        Self {
            input_width,
            input_height,
            num_channels: 4 + num_classes,
            num_anchors,
            script: VecDeque::new(),
            calls: 0,
        }
    }

    /// Queue a raw output tensor.
    pub fn push_output(&mut self, tensor: Vec<f32>) {
        self.script.push_back(Ok(tensor));
    }

    /// Queue a runtime failure.
    pub fn push_failure(&mut self, message: impl Into<String>) {
        self.script.push_back(Err(message.into()));
    }

    pub fn with_output(mut self, tensor: Vec<f32>) -> Self {
        self.push_output(tensor);
        self
    }

    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.push_failure(message);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn tensor_len(&self) -> usize {
        self.num_channels * self.num_anchors
    }
}

impl ModelRuntime for StubRuntime {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![1, self.num_channels, self.num_anchors]
    }

    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.calls += 1;
        let expected = 3 * self.input_width as usize * self.input_height as usize;
        if input.len() != expected {
            return Err(anyhow!(
                "stub runtime expected {} input values, received {}",
                expected,
                input.len()
            ));
        }
        match self.script.pop_front() {
            Some(Ok(tensor)) => Ok(tensor),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(vec![0.0; self.tensor_len()]),
        }
    }
}
