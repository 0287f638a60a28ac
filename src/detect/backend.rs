use anyhow::Result;

/// Black-box model runtime.
///
/// # Contract
///
/// - `input_size` and `output_shape` are fixed for the lifetime of the
///   runtime and are read once when the detection engine is built.
/// - `infer` receives a planar RGB tensor `[1, 3, height, width]` with values
///   in `0..=1` and returns the flat output buffer for `output_shape`.
/// - Any native handle the runtime owns is released when it is dropped.
pub trait ModelRuntime: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Expected input `(width, height)` in pixels.
    fn input_size(&self) -> (u32, u32);

    /// Declared output shape, normally `[1, 4 + classes, anchors]`.
    fn output_shape(&self) -> Vec<usize>;

    /// Run one inference.
    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
