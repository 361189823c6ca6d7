//! Low-rank adaptation of linear layers.

pub use super::*;

use burn::nn::{Initializer, Linear, LinearConfig};

/// The configuration for [`LoraLinear`].
#[derive(Config, Copy, Debug)]
pub struct LoraLinearConfig {
    /// Input dimension.
    pub dim_input: usize,
    /// Output dimension.
    pub dim_output: usize,
    /// Adapter rank. `0` disables the adapter.
    #[config(default = 0)]
    pub rank: usize,
    /// Adapter scale numerator, i.e., the scale is `alpha / rank`.
    #[config(default = 1.0)]
    pub alpha: f32,
    /// With bias.
    #[config(default = true)]
    pub bias: bool,
}

/// A linear layer with an optional low-rank adapter.
///
/// `W * input + B + (alpha / rank) * U * (D * input)`
///
/// ## Details
///
/// With an adapter, the base weights are frozen and
/// only `D` (down) and `U` (up) are trainable.
/// `U` starts from zeros, so the layer starts as the base layer.
#[derive(Debug, Module)]
pub struct LoraLinear<B: Backend> {
    pub base: Linear<B>,
    pub adapter: Option<LoraAdapter<B>>,
}

/// The trainable part of [`LoraLinear`].
#[derive(Debug, Module)]
pub struct LoraAdapter<B: Backend> {
    pub down: Linear<B>,
    pub up: Linear<B>,
    pub scale: f32,
}

impl LoraLinearConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> LoraLinear<B> {
        let base = LinearConfig::new(self.dim_input, self.dim_output)
            .with_bias(self.bias)
            .init(device);
        if self.rank == 0 {
            return LoraLinear {
                base,
                adapter: None,
            };
        }

        let down = LinearConfig::new(self.dim_input, self.rank)
            .with_bias(false)
            .init(device);
        let up = LinearConfig::new(self.rank, self.dim_output)
            .with_bias(false)
            .with_initializer(Initializer::Zeros)
            .init(device);
        LoraLinear {
            base: base.no_grad(),
            adapter: Some(LoraAdapter {
                down,
                up,
                scale: self.alpha / self.rank as f32,
            }),
        }
    }
}

impl<B: Backend> LoraLinear<B> {
    /// ## Shapes
    ///
    /// * `input` - [`[..., dim_input]`](LoraLinearConfig::dim_input)
    /// * `output` - [`[..., dim_output]`](LoraLinearConfig::dim_output)
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match &self.adapter {
            None => self.base.forward(input),
            Some(adapter) => {
                let delta = adapter.up.forward(adapter.down.forward(input.clone()));
                self.base.forward(input) + delta.mul_scalar(adapter.scale)
            },
        }
    }
}
