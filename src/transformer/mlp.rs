//! Feed-forward network.

pub use super::*;
pub use lora::{LoraLinear, LoraLinearConfig};

use burn::nn::Gelu;

/// The configuration for [`Mlp`].
#[derive(Config, Copy, Debug)]
pub struct MlpConfig {
    /// Input and output dimension.
    pub dim: usize,
    /// Hidden dimension over `dim`.
    #[config(default = 4)]
    pub ratio: usize,
    /// Adapter rank of the linear layers.
    #[config(default = 0)]
    pub lora_rank: usize,
}

/// `fc2(GELU(fc1(input)))`
#[derive(Debug, Module)]
pub struct Mlp<B: Backend> {
    pub fc1: LoraLinear<B>,
    pub ac1: Gelu,
    pub fc2: LoraLinear<B>,
}

impl MlpConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Mlp<B> {
        let dim_hidden = self.dim * self.ratio;
        Mlp {
            fc1: LoraLinearConfig::new(self.dim, dim_hidden)
                .with_rank(self.lora_rank)
                .init(device),
            ac1: Gelu::new(),
            fc2: LoraLinearConfig::new(dim_hidden, self.dim)
                .with_rank(self.lora_rank)
                .init(device),
        }
    }
}

impl<B: Backend> Mlp<B> {
    pub fn forward<const D: usize>(
        &self,
        mut input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        input = self.fc1.forward(input);
        input = self.ac1.forward(input);
        input = self.fc2.forward(input);
        input
    }
}
