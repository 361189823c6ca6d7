//! Multi-head attention with separate query and context dimensions.

pub use super::*;
pub use lora::{LoraLinear, LoraLinearConfig};

use burn::tensor::{activation, Bool, Shape};

/// The configuration for [`Attention`].
#[derive(Config, Copy, Debug)]
pub struct AttentionConfig {
    /// Query and output dimension.
    pub dim: usize,
    /// Context (key and value) dimension.
    pub dim_context: usize,
    /// Head count.
    pub head_count: usize,
    /// With bias in the projections.
    #[config(default = false)]
    pub bias: bool,
    /// Adapter rank of the projections.
    #[config(default = 0)]
    pub lora_rank: usize,
}

/// Scaled dot-product attention over `head_count` heads.
#[derive(Debug, Module)]
pub struct Attention<B: Backend> {
    pub query: LoraLinear<B>,
    pub key: LoraLinear<B>,
    pub value: LoraLinear<B>,
    pub output: LoraLinear<B>,
    pub head_count: usize,
}

impl AttentionConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Attention<B> {
        let projection = |dim_input| {
            LoraLinearConfig::new(dim_input, self.dim)
                .with_bias(self.bias)
                .with_rank(self.lora_rank)
                .init(device)
        };
        Attention {
            query: projection(self.dim),
            key: projection(self.dim_context),
            value: projection(self.dim_context),
            output: projection(self.dim),
            head_count: self.head_count,
        }
    }
}

impl<B: Backend> Attention<B> {
    /// Attend from `query` to `context`.
    ///
    /// ## Shapes
    ///
    /// * `query` - `[N, L_q, D]`
    /// * `context` - `[N, L_k, D_c]`
    /// * `mask` - `[N, L_q, L_k]`, where `true` excludes the key from the query.
    /// * `output` - `[N, L_q, D]`
    pub fn forward(
        &self,
        query: Tensor<B, 3>,
        context: Tensor<B, 3>,
        mask: Option<Tensor<B, 3, Bool>>,
    ) -> Tensor<B, 3> {
        let [n, length_q, dim] = query.dims();
        let length_k = context.dims()[1];
        let heads = self.head_count;
        let dim_head = dim / heads;

        let split_heads = |x: Tensor<B, 3>, length: usize| {
            x.reshape([n, length, heads, dim_head]).swap_dims(1, 2)
        };
        // [N, h, L_q, D / h]
        let q = split_heads(self.query.forward(query), length_q);
        // [N, h, L_k, D / h]
        let k = split_heads(self.key.forward(context.clone()), length_k);
        let v = split_heads(self.value.forward(context), length_k);

        // [N, h, L_q, L_k]
        let mut scores = q
            .matmul(k.swap_dims(2, 3))
            .div_scalar((dim_head as f32).sqrt());
        if let Some(mask) = mask {
            let mask = mask
                .unsqueeze_dim::<4>(1)
                .expand(Shape::new([n, heads, length_q, length_k]));
            scores = scores.mask_fill(mask, -1.0e9);
        }
        let weights = activation::softmax(scores, 3);

        // [N, L_q, D]
        let output = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([n, length_q, dim]);
        self.output.forward(output)
    }
}
