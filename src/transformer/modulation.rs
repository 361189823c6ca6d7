//! Condition-modulation blocks.

pub use super::*;
pub use attention::{Attention, AttentionConfig};
pub use mlp::{Mlp, MlpConfig};

use burn::{
    nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig},
    tensor::activation,
};

/// The configuration for [`ModLn`].
#[derive(Config, Copy, Debug)]
pub struct ModLnConfig {
    /// Token dimension.
    pub dim: usize,
    /// Modulation dimension.
    pub dim_mod: usize,
    #[config(default = 1e-6)]
    pub epsilon: f64,
}

/// Layer normalization modulated by a conditioning vector.
///
/// `LN(input) * (1 + scale) + shift`, where `[shift, scale] = W * SiLU(mod) + B`.
#[derive(Debug, Module)]
pub struct ModLn<B: Backend> {
    pub norm: LayerNorm<B>,
    pub proj: Linear<B>,
}

impl ModLnConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ModLn<B> {
        ModLn {
            norm: LayerNormConfig::new(self.dim)
                .with_epsilon(self.epsilon)
                .init(device),
            proj: LinearConfig::new(self.dim_mod, self.dim * 2).init(device),
        }
    }
}

impl<B: Backend> ModLn<B> {
    /// ## Shapes
    ///
    /// * `input` - `[N, L, D]`
    /// * `modulation` - `[N, E]`
    /// * `output` - `[N, L, D]`
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        modulation: Tensor<B, 2>,
    ) -> Tensor<B, 3> {
        let dim = input.dims()[2];
        let params = self.proj.forward(activation::silu(modulation));
        let shift = params.clone().narrow(1, 0, dim).unsqueeze_dim::<3>(1);
        let scale = params.narrow(1, dim, dim).unsqueeze_dim::<3>(1);
        self.norm.forward(input) * scale.add_scalar(1.0) + shift
    }
}

/// The configuration for [`ConditionModulationBlock`].
#[derive(Config, Copy, Debug)]
pub struct ConditionModulationBlockConfig {
    /// Token dimension.
    pub dim: usize,
    /// Cross-attention condition dimension.
    pub dim_cond: usize,
    /// Modulation dimension.
    pub dim_mod: usize,
    /// Head count.
    pub head_count: usize,
    #[config(default = 4)]
    pub mlp_ratio: usize,
    /// Adapter rank. Above `0`, only the adapters are trainable.
    #[config(default = 0)]
    pub lora_rank: usize,
    #[config(default = 1e-6)]
    pub epsilon: f64,
}

/// A transformer block with cross-attention to the condition,
/// self-attention, and a feed-forward network,
/// each preceded by [`ModLn`] and followed by a residual connection.
#[derive(Debug, Module)]
pub struct ConditionModulationBlock<B: Backend> {
    pub norm1: ModLn<B>,
    pub cross_attn: Attention<B>,
    pub norm2: ModLn<B>,
    pub self_attn: Attention<B>,
    pub norm3: ModLn<B>,
    pub mlp: Mlp<B>,
}

impl ConditionModulationBlockConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConditionModulationBlock<B> {
        let norm = || {
            let norm = ModLnConfig::new(self.dim, self.dim_mod)
                .with_epsilon(self.epsilon)
                .init(device);
            if self.lora_rank > 0 {
                norm.no_grad()
            } else {
                norm
            }
        };

        ConditionModulationBlock {
            norm1: norm(),
            cross_attn: AttentionConfig::new(self.dim, self.dim_cond, self.head_count)
                .with_lora_rank(self.lora_rank)
                .init(device),
            norm2: norm(),
            self_attn: AttentionConfig::new(self.dim, self.dim, self.head_count)
                .with_lora_rank(self.lora_rank)
                .init(device),
            norm3: norm(),
            mlp: MlpConfig::new(self.dim)
                .with_ratio(self.mlp_ratio)
                .with_lora_rank(self.lora_rank)
                .init(device),
        }
    }
}

impl<B: Backend> ConditionModulationBlock<B> {
    /// ## Shapes
    ///
    /// * `input` - `[N, L, D]`
    /// * `cond` - `[N, L', D_cond]`
    /// * `modulation` - `[N, D_mod]`
    /// * `output` - `[N, L, D]`
    pub fn forward(
        &self,
        mut input: Tensor<B, 3>,
        cond: Tensor<B, 3>,
        modulation: Tensor<B, 2>,
    ) -> Tensor<B, 3> {
        let normed = self.norm1.forward(input.clone(), modulation.clone());
        input = input + self.cross_attn.forward(normed, cond, None);

        let normed = self.norm2.forward(input.clone(), modulation.clone());
        input = input + self.self_attn.forward(normed.clone(), normed, None);

        let normed = self.norm3.forward(input.clone(), modulation);
        input + self.mlp.forward(normed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, module::Param};

    type B = NdArray<f32>;

    #[test]
    fn mod_ln_without_modulation_is_layer_norm() {
        let device = &Default::default();
        let mut norm = ModLnConfig::new(4, 3).init::<B>(device);
        norm.proj.weight = Param::from_tensor(Tensor::zeros([3, 8], device));
        norm.proj.bias = Some(Param::from_tensor(Tensor::zeros([8], device)));

        let input = Tensor::<B, 3>::from_data(
            [[[1.0, 2.0, 3.0, 4.0], [-1.0, 0.0, 1.0, 5.0]]],
            device,
        );
        let modulation = Tensor::<B, 2>::from_data([[0.3, -0.7, 2.0]], device);
        let output = norm.forward(input.clone(), modulation);
        output
            .into_data()
            .assert_approx_eq_diff(&norm.norm.forward(input).into_data(), 1e-6);
    }

    #[test]
    fn block_shapes() {
        let device = &Default::default();
        let block = ConditionModulationBlockConfig::new(8, 6, 5, 2).init::<B>(device);

        let output = block.forward(
            Tensor::ones([2, 12, 8], device),
            Tensor::ones([2, 3, 6], device),
            Tensor::ones([2, 5], device),
        );
        assert_eq!(output.dims(), [2, 12, 8]);
    }
}
