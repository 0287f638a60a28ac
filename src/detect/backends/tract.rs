#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::ModelRuntime;

type Plan = RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// Tract-based ONNX runtime.
///
/// Loads a local model file; performs no network I/O.
pub struct TractRuntime {
    plan: Plan,
    width: u32,
    height: u32,
    output_shape: Vec<usize>,
    optimized: bool,
}

impl TractRuntime {
    /// Load an ONNX model, preferring an optimized plan.
    ///
    /// When optimization fails the partially built model is dropped and the
    /// file is reloaded into a plain typed plan.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let (plan, optimized) = match load_plan(model_path, width, height, true) {
            Ok(plan) => (plan, true),
            Err(e) => {
                log::warn!(
                    "optimized plan for {} failed ({:#}); falling back to unoptimized plan",
                    model_path.display(),
                    e
                );
                (load_plan(model_path, width, height, false)?, false)
            }
        };

        let output_fact = plan
            .model()
            .output_fact(0)
            .context("model declares no outputs")?;
        let output_shape = output_fact
            .shape
            .as_concrete()
            .ok_or_else(|| anyhow!("model output shape is not concrete: {:?}", output_fact.shape))?
            .to_vec();

        log::info!(
            "tract runtime ready: {} input={}x{} output={:?} optimized={}",
            model_path.display(),
            width,
            height,
            output_shape,
            optimized
        );

        Ok(Self {
            plan,
            width,
            height,
            output_shape,
            optimized,
        })
    }

    pub fn is_optimized(&self) -> bool {
        self.optimized
    }
}

fn load_plan(model_path: &Path, width: u32, height: u32, optimize: bool) -> Result<Plan> {
    let model = tract_onnx::onnx()
        .model_for_path(model_path)
        .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(
                f32::datum_type(),
                tvec!(1, 3, height as usize, width as usize),
            ),
        )
        .context("failed to set input fact")?;

    let typed = if optimize {
        model
            .into_optimized()
            .context("failed to optimize ONNX model")?
    } else {
        model
            .into_typed()
            .context("failed to type ONNX model")?
            .into_decluttered()
            .context("failed to declutter ONNX model")?
    };

    typed
        .into_runnable()
        .context("failed to build runnable ONNX model")
}

impl ModelRuntime for TractRuntime {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn output_shape(&self) -> Vec<usize> {
        self.output_shape.clone()
    }

    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let shape = [1, 3, self.height as usize, self.width as usize];
        let tensor = Tensor::from_shape(&shape, input).context("failed to build input tensor")?;
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        Ok(view.iter().copied().collect())
    }
}
