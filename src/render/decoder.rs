//! Point feature decoder.

pub use super::*;
pub use burn::nn::{Linear, Relu};

use burn::{nn::LinearConfig, tensor::activation};

/// The configuration for [`PointDecoder`].
#[derive(Config, Copy, Debug)]
pub struct PointDecoderConfig {
    /// Channel count of each plane.
    pub dim_plane: usize,
    /// Hidden layer dimension.
    #[config(default = 64)]
    pub dim_hidden: usize,
    /// Linear layer count.
    #[config(default = 4)]
    pub layer_count: usize,
}

/// Decoder from concatenated plane features to density and color,
/// using linear layers with ReLU activations in between.
///
/// `[3 * D] -> [H] -> ... -> [H] -> [1 + 3]`
#[derive(Debug, Module)]
pub struct PointDecoder<B: Backend> {
    pub layers: Vec<Linear<B>>,
    pub activation: Relu,
    pub dim_plane: usize,
}

/// The output of [`PointDecoder::forward`].
#[derive(Clone, Debug)]
pub struct PointDecoderOutput<B: Backend> {
    /// `[..., 1]`
    pub sigmas: Tensor<B, 3>,
    /// `[..., 3]`, in `[-0.001, 1.001]`.
    pub colors_rgb: Tensor<B, 3>,
}

impl PointDecoderConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> PointDecoder<B> {
        let dim_input = self.dim_plane * PLANE_COUNT;
        let mut dims = vec![dim_input];
        dims.extend(std::iter::repeat(self.dim_hidden).take(self.layer_count - 1));
        dims.push(4);

        let layers = dims
            .windows(2)
            .map(|dims| LinearConfig::new(dims[0], dims[1]).init(device))
            .collect();

        PointDecoder {
            layers,
            activation: Relu::new(),
            dim_plane: self.dim_plane,
        }
    }
}

impl<B: Backend> PointDecoder<B> {
    /// ## Shapes
    ///
    /// * `features` - `[N, P, 3 * D]`
    pub fn forward(
        &self,
        features: Tensor<B, 3>,
    ) -> PointDecoderOutput<B> {
        let last = self.layers.len() - 1;
        let mut x = features;
        for (index, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x);
            if index < last {
                x = self.activation.forward(x);
            }
        }

        let sigmas = x.clone().narrow(2, 0, 1);
        let colors_rgb = activation::sigmoid(x.narrow(2, 1, 3))
            .mul_scalar(1.0 + 2.0 * 0.001)
            .sub_scalar(0.001);

        PointDecoderOutput { sigmas, colors_rgb }
    }
}
