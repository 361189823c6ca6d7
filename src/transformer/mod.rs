//! Transformer decoding triplane tokens from image features and camera embeddings.

pub mod attention;
pub mod lora;
pub mod mlp;
pub mod modulation;

pub use crate::backend::Backend;
pub use burn::{config::Config, module::Module, tensor::Tensor};
pub use modulation::{ConditionModulationBlock, ConditionModulationBlockConfig};

use burn::nn::{LayerNorm, LayerNormConfig};

/// The interface of a triplane token decoder.
pub trait TriplaneDecoder<B: Backend> {
    /// Decode the tokens conditioned on `cond` and modulated by `modulation`.
    ///
    /// ## Shapes
    ///
    /// * `tokens` - `[N, L, D]`
    /// * `cond` - `[N, L', D_cond]`
    /// * `modulation` - `[N, D_mod]`
    /// * `output` - `[N, L, D]`
    fn decode(
        &self,
        tokens: Tensor<B, 3>,
        cond: Tensor<B, 3>,
        modulation: Tensor<B, 2>,
    ) -> Tensor<B, 3>;
}

/// The configuration for [`TriplaneTransformer`].
#[derive(Config, Copy, Debug)]
pub struct TriplaneTransformerConfig {
    /// Token dimension `D`.
    pub dim: usize,
    /// Block count.
    pub layer_count: usize,
    /// Head count.
    pub head_count: usize,
    /// Image feature dimension.
    pub dim_cond: usize,
    /// Camera embedding dimension.
    pub dim_mod: usize,
    /// Adapter rank.
    ///
    /// `0` trains every parameter.
    /// Above `0`, the base weights are frozen and only the adapters are trainable.
    #[config(default = 0)]
    pub lora_rank: usize,
}

/// Stacked [`ConditionModulationBlock`]s with a final layer normalization.
#[derive(Debug, Module)]
pub struct TriplaneTransformer<B: Backend> {
    pub blocks: Vec<ConditionModulationBlock<B>>,
    pub norm: LayerNorm<B>,
}

impl TriplaneTransformerConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> TriplaneTransformer<B> {
        let block = ConditionModulationBlockConfig::new(
            self.dim,
            self.dim_cond,
            self.dim_mod,
            self.head_count,
        )
        .with_lora_rank(self.lora_rank);
        let blocks = (0..self.layer_count).map(|_| block.init(device)).collect();
        let mut norm = LayerNormConfig::new(self.dim).with_epsilon(1e-6).init(device);
        if self.lora_rank > 0 {
            norm = norm.no_grad();
        }

        TriplaneTransformer { blocks, norm }
    }
}

impl<B: Backend> TriplaneDecoder<B> for TriplaneTransformer<B> {
    fn decode(
        &self,
        tokens: Tensor<B, 3>,
        cond: Tensor<B, 3>,
        modulation: Tensor<B, 2>,
    ) -> Tensor<B, 3> {
        let tokens = self.blocks.iter().fold(tokens, |tokens, block| {
            block.forward(tokens, cond.clone(), modulation.clone())
        });
        self.norm.forward(tokens)
    }
}
