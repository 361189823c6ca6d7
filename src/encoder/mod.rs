//! Image feature encoders.
//!
//! A vision transformer turns an image batch into patch tokens,
//! prefixed by a class token.

pub mod position;

pub use crate::{backend::Backend, error::Error};
pub use burn::{
    config::Config,
    module::{Module, Param},
    tensor::Tensor,
};

use crate::{function::random, SEED};
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        LayerNorm, LayerNormConfig,
    },
    tensor::Shape,
};
use std::{fmt, str::FromStr};

/// The per-channel mean of ImageNet images.
pub const PIXEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// The per-channel standard deviation of ImageNet images.
pub const PIXEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// The interface of an image feature encoder.
pub trait ImageFeatureEncoder<B: Backend> {
    /// The size of the last dimension of [`Self::encode`].
    fn feature_dim(&self) -> usize;

    /// Encode the image batch.
    ///
    /// ## Shapes
    ///
    /// * `image` - `[N, C, H, W]`
    /// * `output` - `[N, L', F]`
    fn encode(
        &self,
        image: Tensor<B, 4>,
    ) -> Result<Tensor<B, 3>, Error>;
}

/// The registered encoder variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EncoderKind {
    /// DINO backbone with 16-pixel patches.
    Dino,
    /// DINOv2 backbone with 14-pixel patches.
    Dinov2,
}

impl EncoderKind {
    /// All variants with their type identifiers.
    pub const REGISTRY: [(&'static str, Self); 2] =
        [("dino", Self::Dino), ("dinov2", Self::Dinov2)];

    /// The type identifier.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Dino => "dino",
            Self::Dinov2 => "dinov2",
        }
    }

    /// The side length of a patch in pixels.
    pub const fn patch_size(&self) -> usize {
        match self {
            Self::Dino => 16,
            Self::Dinov2 => 14,
        }
    }

    /// The encoder configuration of this variant.
    pub fn preset(
        &self,
        feature_dim: usize,
        layer_count: usize,
        head_count: usize,
    ) -> ImageEncoderConfig {
        ImageEncoderConfig::new(feature_dim, layer_count, head_count, self.patch_size())
    }
}

impl FromStr for EncoderKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.to_lowercase();
        Self::REGISTRY
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| {
                Error::UnsupportedEncoder(
                    name,
                    Self::REGISTRY.iter().map(|(key, _)| *key).collect(),
                )
            })
    }
}

impl fmt::Display for EncoderKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The configuration for [`ImageEncoder`].
#[derive(Config, Debug)]
pub struct ImageEncoderConfig {
    /// Token dimension `F`.
    pub feature_dim: usize,
    /// Transformer layer count.
    pub layer_count: usize,
    /// Attention head count.
    pub head_count: usize,
    /// Patch side length in pixels.
    pub patch_size: usize,
    /// Image channel count `C`.
    #[config(default = 3)]
    pub channel_count: usize,
    /// Hidden dimension of the feed-forward layers over `F`.
    #[config(default = 4)]
    pub mlp_ratio: usize,
}

/// Vision transformer encoder.
#[derive(Debug, Module)]
pub struct ImageEncoder<B: Backend> {
    /// Patch embedding, `[C, p, p] -> [F]`.
    pub patch_embed: Conv2d<B>,
    /// `[1, 1, F]`
    pub cls_token: Param<Tensor<B, 3>>,
    pub blocks: TransformerEncoder<B>,
    pub norm: LayerNorm<B>,
    pub channel_count: usize,
    pub feature_dim: usize,
    pub patch_size: usize,
}

impl ImageEncoderConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ImageEncoder<B> {
        let patch_embed = Conv2dConfig::new(
            [self.channel_count, self.feature_dim],
            [self.patch_size, self.patch_size],
        )
        .with_stride([self.patch_size, self.patch_size])
        .init(device);
        let cls_token =
            Param::from_tensor(random::normal([1, 1, self.feature_dim], 0.02, SEED + 1, device));
        let blocks = TransformerEncoderConfig::new(
            self.feature_dim,
            self.feature_dim * self.mlp_ratio,
            self.head_count,
            self.layer_count,
        )
        .with_dropout(0.0)
        .with_norm_first(true)
        .init(device);
        let norm = LayerNormConfig::new(self.feature_dim)
            .with_epsilon(1e-6)
            .init(device);

        ImageEncoder {
            patch_embed,
            cls_token,
            blocks,
            norm,
            channel_count: self.channel_count,
            feature_dim: self.feature_dim,
            patch_size: self.patch_size,
        }
    }
}

impl<B: Backend> ImageEncoder<B> {
    /// Normalize RGB pixels in `[0, 1]` by the ImageNet statistics.
    fn normalize(
        &self,
        image: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        if self.channel_count != 3 {
            return image;
        }
        let device = image.device();
        let mean = Tensor::<B, 1>::from_floats(PIXEL_MEAN, &device).reshape([1, 3, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(PIXEL_STD, &device).reshape([1, 3, 1, 1]);
        (image - mean) / std
    }
}

impl<B: Backend> ImageFeatureEncoder<B> for ImageEncoder<B> {
    #[inline]
    fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    fn encode(
        &self,
        image: Tensor<B, 4>,
    ) -> Result<Tensor<B, 3>, Error> {
        let [n, c, h, w] = image.dims();
        Error::ensure_dimension("image channels", self.channel_count, c)?;
        if h < self.patch_size || w < self.patch_size {
            return Err(Error::MismatchedShape(
                "image",
                vec![n, c, self.patch_size, self.patch_size],
                vec![n, c, h, w],
            ));
        }

        // [N, F, h, w]
        let patches = self.patch_embed.forward(self.normalize(image));
        let [_, f, grid_h, grid_w] = patches.dims();
        let positions = position::sincos_2d::<B>(grid_h, grid_w, f, &patches.device());
        // [N, h * w, F]
        let patches = patches.flatten::<3>(2, 3).swap_dims(1, 2) + positions.unsqueeze_dim(0);
        // [N, 1 + h * w, F]
        let tokens = Tensor::cat(
            vec![self.cls_token.val().expand(Shape::new([n, 1, f])), patches],
            1,
        );

        let tokens = self.blocks.forward(TransformerEncoderInput::new(tokens));
        Ok(self.norm.forward(tokens))
    }
}
