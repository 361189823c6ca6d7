//! Shifted-window cross-attention fusion.

pub use super::*;
pub use crate::transformer::{
    attention::{Attention, AttentionConfig},
    mlp::{Mlp, MlpConfig},
};

use crate::function::TensorFloatExtension;
use burn::{
    nn::{LayerNorm, LayerNormConfig},
    tensor::{Bool, Shape},
};

/// The configuration for [`CrossAttentionFusion`].
#[derive(Config, Copy, Debug)]
pub struct CrossAttentionFusionConfig {
    /// Token dimension. It should be the triplane channel count.
    #[config(default = 32)]
    pub dim: usize,
    /// Block count.
    #[config(default = 2)]
    pub depth: usize,
    /// Head count.
    #[config(default = 8)]
    pub head_count: usize,
    /// Window side length in pixels.
    #[config(default = 2)]
    pub window_size: usize,
}

/// Fuse front and back planes by windowed cross-attention,
/// where the front tokens query the back tokens.
///
/// ## Details
///
/// Odd blocks shift their windows by half a window,
/// unless a single window already covers a whole plane.
#[derive(Debug, Module)]
pub struct CrossAttentionFusion<B: Backend> {
    pub blocks: Vec<WindowCrossAttentionBlock<B>>,
    pub resolution: usize,
    pub window_size: usize,
}

/// One block of [`CrossAttentionFusion`].
///
/// `x = front + Attn(LN(front), LN(back))`, then `x + MLP(LN(x))`.
#[derive(Debug, Module)]
pub struct WindowCrossAttentionBlock<B: Backend> {
    pub norm_query: LayerNorm<B>,
    pub norm_context: LayerNorm<B>,
    pub attention: Attention<B>,
    pub norm_mlp: LayerNorm<B>,
    pub mlp: Mlp<B>,
    pub shift: usize,
}

impl CrossAttentionFusionConfig {
    /// Initialize for triplanes with `dim` channels and `resolution` pixels per side.
    pub fn init<B: Backend>(
        &self,
        dim: usize,
        resolution: usize,
        device: &B::Device,
    ) -> Result<CrossAttentionFusion<B>, Error> {
        if self.dim != dim {
            return Err(Error::InvalidConfig(
                format!("fusion.dim ({})", self.dim),
                format!("the triplane dimension ({dim})"),
            ));
        }
        if self.head_count == 0 || self.dim % self.head_count != 0 {
            return Err(Error::InvalidConfig(
                format!("fusion.head_count ({})", self.head_count),
                format!("a divisor of fusion.dim ({})", self.dim),
            ));
        }
        if self.window_size == 0 || resolution % self.window_size != 0 {
            return Err(Error::InvalidConfig(
                format!("fusion.window_size ({})", self.window_size),
                format!("a divisor of the triplane resolution ({resolution})"),
            ));
        }

        let window_size = self.window_size.min(resolution);
        let blocks = (0..self.depth)
            .map(|index| {
                let shift = if index % 2 == 1 && resolution > window_size {
                    window_size / 2
                } else {
                    0
                };
                WindowCrossAttentionBlock {
                    norm_query: LayerNormConfig::new(dim).init(device),
                    norm_context: LayerNormConfig::new(dim).init(device),
                    attention: AttentionConfig::new(dim, dim, self.head_count)
                        .with_bias(true)
                        .init(device),
                    norm_mlp: LayerNormConfig::new(dim).init(device),
                    mlp: MlpConfig::new(dim).init(device),
                    shift,
                }
            })
            .collect();

        Ok(CrossAttentionFusion {
            blocks,
            resolution,
            window_size,
        })
    }
}

impl<B: Backend> WindowCrossAttentionBlock<B> {
    /// ## Shapes
    ///
    /// * `front` - `[N, H, W, C]`
    /// * `back` - `[N, H, W, C]`
    /// * `mask` - `[(H / S) * (W / S), S * S, S * S]`, used only by shifted blocks.
    /// * `output` - `[N, H, W, C]`
    pub fn forward(
        &self,
        front: Tensor<B, 4>,
        back: Tensor<B, 4>,
        window_size: usize,
        mask: Option<Tensor<B, 3, Bool>>,
    ) -> Tensor<B, 4> {
        let [n, h, w, _] = front.dims();
        let shift = self.shift as isize;

        let mut query = self.norm_query.forward(front.clone());
        let mut context = self.norm_context.forward(back);
        if shift != 0 {
            query = query.roll_dim(-shift, 1).roll_dim(-shift, 2);
            context = context.roll_dim(-shift, 1).roll_dim(-shift, 2);
        }

        let mask = mask.filter(|_| shift != 0).map(|mask| {
            let [windows, area, _] = mask.dims();
            mask.unsqueeze_dim::<4>(0)
                .expand::<4, Shape>(Shape::new([n, windows, area, area]))
                .reshape([n * windows, area, area])
        });
        let attended = self.attention.forward(
            window::partition(query, window_size),
            window::partition(context, window_size),
            mask,
        );
        let mut attended = window::reverse(attended, window_size, [n, h, w]);
        if shift != 0 {
            attended = attended.roll_dim(shift, 1).roll_dim(shift, 2);
        }

        let x = front + attended;
        x.clone() + self.mlp.forward(self.norm_mlp.forward(x))
    }
}

impl<B: Backend> FuseTriplanes<B> for CrossAttentionFusion<B> {
    fn fuse(
        &self,
        front: Tensor<B, 5>,
        back: Tensor<B, 5>,
    ) -> Result<Tensor<B, 5>, Error> {
        let [n, planes, d, h, w] = check_pair(&front, &back, self.resolution)?;

        // [N * 3, D, H, W] -> [N * 3, H * W, D] -> [N * 3, H, W, D]
        let into_tokens = |planes_side: Tensor<B, 5>| {
            planes_side
                .reshape([n * planes, d, h * w])
                .swap_dims(1, 2)
                .reshape([n * planes, h, w, d])
        };
        let front = into_tokens(front);
        let back = into_tokens(back);

        let shifted = self.blocks.iter().find(|block| block.shift != 0);
        let mask = shifted.map(|block| {
            window::shifted_mask::<B>([h, w], self.window_size, block.shift, &front.device())
        });
        let fused = self.blocks.iter().fold(front, |front, block| {
            block.forward(front, back.clone(), self.window_size, mask.clone())
        });

        Ok(fused
            .reshape([n * planes, h * w, d])
            .swap_dims(1, 2)
            .reshape([n, planes, d, h, w]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type B = NdArray<f32>;

    fn config() -> CrossAttentionFusionConfig {
        CrossAttentionFusionConfig::new()
            .with_dim(4)
            .with_head_count(2)
            .with_window_size(2)
    }

    #[test]
    fn init_shifts_odd_blocks() {
        let device = &Default::default();
        let fusion = config().with_depth(3).init::<B>(4, 4, device).unwrap();
        let shifts = fusion.blocks.iter().map(|block| block.shift).collect::<Vec<_>>();
        assert_eq!(shifts, vec![0, 1, 0]);

        let fusion = config().with_window_size(4).init::<B>(4, 4, device).unwrap();
        assert!(fusion.blocks.iter().all(|block| block.shift == 0));
    }

    #[test]
    fn init_rejects_mismatches() {
        let device = &Default::default();
        assert!(matches!(
            config().init::<B>(8, 4, device),
            Err(Error::InvalidConfig(..))
        ));
        assert!(matches!(
            config().with_head_count(3).init::<B>(4, 4, device),
            Err(Error::InvalidConfig(..))
        ));
        assert!(matches!(
            config().with_window_size(3).init::<B>(4, 4, device),
            Err(Error::InvalidConfig(..))
        ));
    }

    #[test]
    fn fuse_preserves_shape() {
        let device = &Default::default();
        let fusion = config().init::<B>(4, 4, device).unwrap();

        let front = Tensor::<B, 5>::random([2, 3, 4, 4, 4], Distribution::Default, device);
        let back = Tensor::<B, 5>::random([2, 3, 4, 4, 4], Distribution::Default, device);
        let output = fusion.fuse(front, back).unwrap();
        assert_eq!(output.dims(), [2, 3, 4, 4, 4]);
    }

    #[test]
    fn fuse_depends_on_back() {
        let device = &Default::default();
        let fusion = config().init::<B>(4, 4, device).unwrap();

        let front = Tensor::<B, 5>::random([1, 3, 4, 4, 4], Distribution::Default, device);
        let back = Tensor::<B, 5>::random([1, 3, 4, 4, 4], Distribution::Default, device);
        let output_1 = fusion.fuse(front.clone(), back.clone()).unwrap();
        let output_2 = fusion.fuse(front, back.mul_scalar(-2.0).add_scalar(1.0)).unwrap();

        let difference = (output_1 - output_2).abs().sum().into_scalar();
        assert!(difference > 1e-4, "difference: {difference}");
    }
}
