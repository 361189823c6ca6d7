//! Convolutional fusion.

pub use super::*;

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    Gelu, LayerNorm, LayerNormConfig, PaddingConfig2d,
};

/// The configuration for [`ConvFusion`].
#[derive(Config, Copy, Debug)]
pub struct ConvFusionConfig {
    /// Hidden channel count over the triplane channel count.
    #[config(default = 4)]
    pub channel_multiplier: usize,
}

/// Fuse front and back planes by a convolution stack.
///
/// `conv3(GELU(LN(conv2(GELU(LN(conv1([front, back])))))))`
///
/// ## Details
///
/// Every convolution is `3 x 3` with stride 1 and padding 1,
/// so the resolution is preserved.
/// Each layer normalization covers a whole `[C, H, W]` feature map.
#[derive(Debug, Module)]
pub struct ConvFusion<B: Backend> {
    /// `2 * D -> k * D`
    pub conv1: Conv2d<B>,
    pub norm1: LayerNorm<B>,
    pub ac1: Gelu,
    /// `k * D -> k * D`
    pub conv2: Conv2d<B>,
    pub norm2: LayerNorm<B>,
    pub ac2: Gelu,
    /// `k * D -> D`
    pub conv3: Conv2d<B>,
    pub resolution: usize,
}

impl ConvFusionConfig {
    /// Initialize for triplanes with `dim` channels and `resolution` pixels per side.
    pub fn init<B: Backend>(
        &self,
        dim: usize,
        resolution: usize,
        device: &B::Device,
    ) -> Result<ConvFusion<B>, Error> {
        if self.channel_multiplier == 0 {
            return Err(Error::InvalidConfig(
                "fusion.channel_multiplier".into(),
                "positive".into(),
            ));
        }

        let dim_hidden = dim * self.channel_multiplier;
        let conv = |channels: [usize; 2]| {
            Conv2dConfig::new(channels, [3, 3])
                .with_stride([1, 1])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };
        let norm = || LayerNormConfig::new(dim_hidden * resolution * resolution).init(device);

        Ok(ConvFusion {
            conv1: conv([dim * 2, dim_hidden]),
            norm1: norm(),
            ac1: Gelu::new(),
            conv2: conv([dim_hidden, dim_hidden]),
            norm2: norm(),
            ac2: Gelu::new(),
            conv3: conv([dim_hidden, dim]),
            resolution,
        })
    }
}

impl<B: Backend> ConvFusion<B> {
    /// Normalize each feature map over all of its channels and pixels.
    fn norm_map(
        norm: &LayerNorm<B>,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let dims = input.dims();
        norm.forward(input.flatten::<2>(1, 3)).reshape(dims)
    }
}

impl<B: Backend> FuseTriplanes<B> for ConvFusion<B> {
    fn fuse(
        &self,
        front: Tensor<B, 5>,
        back: Tensor<B, 5>,
    ) -> Result<Tensor<B, 5>, Error> {
        let [n, planes, d, h, w] = check_pair(&front, &back, self.resolution)?;

        // [N * 3, 2 * D, H, W]
        let mut x = Tensor::cat(vec![front, back], 2).reshape([n * planes, d * 2, h, w]);
        x = self.conv1.forward(x);
        x = self.ac1.forward(Self::norm_map(&self.norm1, x));
        x = self.conv2.forward(x);
        x = self.ac2.forward(Self::norm_map(&self.norm2, x));
        x = self.conv3.forward(x);

        Ok(x.reshape([n, planes, d, h, w]))
    }
}
