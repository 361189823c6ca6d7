//! Triplane generation from one image and its source camera.

pub use super::*;

use crate::{
    embedder::{CameraEmbedder, CameraEmbedderConfig, CameraEmbedding},
    encoder::{ImageEncoder, ImageEncoderConfig, ImageFeatureEncoder},
    function::random,
    transformer::{TriplaneDecoder, TriplaneTransformer, TriplaneTransformerConfig},
    triplane::PLANE_COUNT,
    SEED,
};
use burn::{
    module::Param,
    nn::conv::{ConvTranspose2d, ConvTranspose2dConfig},
    tensor::Shape,
};

/// The configuration for [`PlaneGenerator`].
#[derive(Config, Debug)]
pub struct PlaneGeneratorConfig {
    pub encoder: ImageEncoderConfig,
    pub camera_embed_dim: usize,
    pub transformer: TriplaneTransformerConfig,
    /// Side length `r` of the positional token grid of each plane.
    pub triplane_low_res: usize,
    /// Channel count `D'` of the output planes.
    pub triplane_dim: usize,
}

/// Generator of a triplane from an image and a source camera.
///
/// ## Details
///
/// 1. The image is encoded into features and the camera is embedded.
/// 2. The learned positional tokens are decoded,
///    conditioned on the features and modulated by the embeddings.
/// 3. The tokens are arranged into plane grids and upsampled twice.
#[derive(Debug, Module)]
pub struct PlaneGenerator<B: Backend> {
    pub encoder: ImageEncoder<B>,
    pub camera_embedder: CameraEmbedder<B>,
    /// `[1, 3 * r * r, D]`
    pub pos_embed: Param<Tensor<B, 3>>,
    pub transformer: TriplaneTransformer<B>,
    /// `D -> D'`, doubling the resolution.
    pub upsampler: ConvTranspose2d<B>,
    pub encoder_feat_dim: usize,
    pub camera_embed_dim: usize,
    pub triplane_low_res: usize,
    pub triplane_dim: usize,
}

impl PlaneGeneratorConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> PlaneGenerator<B> {
        let dim = self.transformer.dim;
        let length = PLANE_COUNT * self.triplane_low_res * self.triplane_low_res;

        let encoder = self.encoder.init(device);
        let camera_embedder = CameraEmbedderConfig::new(self.camera_embed_dim).init(device);
        let pos_embed = Param::from_tensor(random::normal(
            [1, length, dim],
            (dim as f32).sqrt().recip(),
            SEED,
            device,
        ));
        let transformer = self.transformer.init(device);
        let upsampler = ConvTranspose2dConfig::new([dim, self.triplane_dim], [2, 2])
            .with_stride([2, 2])
            .init(device);

        PlaneGenerator {
            encoder,
            camera_embedder,
            pos_embed,
            transformer,
            upsampler,
            encoder_feat_dim: self.encoder.feature_dim,
            camera_embed_dim: self.camera_embed_dim,
            triplane_low_res: self.triplane_low_res,
            triplane_dim: self.triplane_dim,
        }
    }
}

impl<B: Backend> PlaneGenerator<B> {
    /// ## Shapes
    ///
    /// * `image` - `[N, C, H, W]`
    /// * `camera` - `[N, 16]`
    /// * `output` - `[N, 3, D', 2 * r, 2 * r]`
    pub fn forward(
        &self,
        image: Tensor<B, 4>,
        camera: Tensor<B, 2>,
    ) -> Result<Tensor<B, 5>, Error> {
        #[cfg(debug_assertions)]
        log::debug!(target: "triplane_lrm::model", "PlaneGenerator::forward");

        let n = image.dims()[0];
        Error::ensure_batch_size("source_camera", n, camera.dims()[0])?;

        let image_feats = self.encoder.encode(image)?;
        Error::ensure_dimension("image_feats", self.encoder_feat_dim, image_feats.dims()[2])?;
        let camera_embeddings = self.camera_embedder.embed(camera)?;
        Error::ensure_dimension(
            "camera_embeddings",
            self.camera_embed_dim,
            camera_embeddings.dims()[1],
        )?;

        let [_, length, dim] = self.pos_embed.dims();
        let tokens = self.pos_embed.val().expand(Shape::new([n, length, dim]));
        let tokens = self.transformer.decode(tokens, image_feats, camera_embeddings);

        let grids = tokens_to_plane_grids(tokens, self.triplane_low_res);
        let planes = plane_grids_to_triplane(self.upsampler.forward(grids), n);

        let dims = planes.dims();
        if dims[0] != n || dims[1] != PLANE_COUNT {
            let mut expected = dims.to_vec();
            expected[0] = n;
            expected[1] = PLANE_COUNT;
            return Err(Error::MismatchedShape("planes", expected, dims.to_vec()));
        }

        Ok(planes)
    }
}

/// Arrange the triplane tokens into plane-major feature grids.
///
/// ## Shapes
///
/// * `tokens` - `[N, 3 * r * r, F]`
/// * `output` - `[3 * N, F, r, r]`, where the plane index is the slower one.
pub fn tokens_to_plane_grids<B: Backend>(
    tokens: Tensor<B, 3>,
    resolution: usize,
) -> Tensor<B, 4> {
    let [n, _, f] = tokens.dims();
    let r = resolution;
    tokens
        .reshape([n, PLANE_COUNT, r, r, f])
        .permute([1, 0, 4, 2, 3])
        .reshape([PLANE_COUNT * n, f, r, r])
}

/// Regroup the plane-major grids by batch.
///
/// ## Shapes
///
/// * `grids` - `[3 * N, D, H, W]`
/// * `output` - `[N, 3, D, H, W]`
pub fn plane_grids_to_triplane<B: Backend>(
    grids: Tensor<B, 4>,
    batch_size: usize,
) -> Tensor<B, 5> {
    let [_, d, h, w] = grids.dims();
    grids
        .reshape([PLANE_COUNT, batch_size, d, h, w])
        .swap_dims(0, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderKind;
    use burn::{
        backend::NdArray,
        tensor::{Distribution, Int},
    };

    type B = NdArray<f32>;

    fn config() -> PlaneGeneratorConfig {
        PlaneGeneratorConfig::new(
            EncoderKind::Dino.preset(16, 1, 2),
            8,
            TriplaneTransformerConfig::new(12, 1, 2, 16, 8),
            2,
            4,
        )
    }

    #[test]
    fn forward_shapes() {
        let device = &Default::default();
        let generator = config().init::<B>(device);
        assert_eq!(generator.pos_embed.dims(), [1, 3 * 2 * 2, 12]);

        for n in [1, 2, 3] {
            let image = Tensor::<B, 4>::random([n, 3, 32, 32], Distribution::Default, device);
            let camera = Tensor::<B, 2>::random([n, 16], Distribution::Default, device);
            let planes = generator.forward(image, camera).unwrap();
            assert_eq!(planes.dims(), [n, 3, 4, 4, 4]);
        }
    }

    #[test]
    fn forward_is_repeatable() {
        let device = &Default::default();
        let generator = config().init::<B>(device);

        let image = Tensor::<B, 4>::random([2, 3, 32, 32], Distribution::Default, device);
        let camera = Tensor::<B, 2>::random([2, 16], Distribution::Default, device);
        let planes_1 = generator.forward(image.clone(), camera.clone()).unwrap();
        let planes_2 = generator.forward(image, camera).unwrap();
        planes_1.into_data().assert_eq(&planes_2.into_data(), true);
    }

    #[test]
    fn forward_rejects_camera() {
        let device = &Default::default();
        let generator = config().init::<B>(device);

        let image = Tensor::<B, 4>::zeros([2, 3, 32, 32], device);
        assert!(matches!(
            generator.forward(image.clone(), Tensor::zeros([3, 16], device)),
            Err(Error::MismatchedBatchSize("source_camera", 2, 3))
        ));
        assert!(matches!(
            generator.forward(image, Tensor::zeros([2, 12], device)),
            Err(Error::MismatchedDimension("source_camera", 16, 12))
        ));
    }

    #[test]
    fn forward_checks_collaborator_dimensions() {
        let device = &Default::default();
        let image = Tensor::<B, 4>::zeros([2, 3, 32, 32], device);
        let camera = Tensor::<B, 2>::zeros([2, 16], device);

        let mut generator = config().init::<B>(device);
        generator.encoder_feat_dim = 99;
        assert!(matches!(
            generator.forward(image.clone(), camera.clone()),
            Err(Error::MismatchedDimension("image_feats", 99, 16))
        ));

        let mut generator = config().init::<B>(device);
        generator.camera_embed_dim = 7;
        assert!(matches!(
            generator.forward(image, camera),
            Err(Error::MismatchedDimension("camera_embeddings", 7, 8))
        ));
    }

    #[test]
    fn pos_embed_is_seeded() {
        let device = &Default::default();
        let generator_1 = config().init::<B>(device);
        let generator_2 = config().init::<B>(device);
        generator_1
            .pos_embed
            .val()
            .into_data()
            .assert_eq(&generator_2.pos_embed.val().into_data(), true);
    }

    #[test]
    fn plane_grids_ordering() {
        let device = &Default::default();
        let (n, r, f) = (2, 2, 3);
        let tokens = Tensor::<B, 1, Int>::arange(0..(n * 3 * r * r * f) as i64, device)
            .float()
            .reshape([n, 3 * r * r, f]);

        let grids = tokens_to_plane_grids(tokens.clone(), r);
        assert_eq!(grids.dims(), [3 * n, f, r, r]);

        let tokens = tokens.into_data().to_vec::<f32>().unwrap();
        let grids = grids.into_data().to_vec::<f32>().unwrap();
        for plane in 0..3 {
            for batch in 0..n {
                for channel in 0..f {
                    for y in 0..r {
                        for x in 0..r {
                            let token = plane * r * r + y * r + x;
                            let source = (batch * 3 * r * r + token) * f + channel;
                            let target = (((plane * n + batch) * f + channel) * r + y) * r + x;
                            assert_eq!(grids[target], tokens[source]);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn plane_grids_regroup_by_batch() {
        let device = &Default::default();
        let (n, d, h, w) = (2, 2, 2, 3);
        let grids = Tensor::<B, 1, Int>::arange(0..(3 * n * d * h * w) as i64, device)
            .float()
            .reshape([3 * n, d, h, w]);

        let planes = plane_grids_to_triplane(grids.clone(), n);
        assert_eq!(planes.dims(), [n, 3, d, h, w]);

        for plane in 0..3 {
            for batch in 0..n {
                let grid = grids.clone().narrow(0, plane * n + batch, 1).reshape([d, h, w]);
                let target = planes
                    .clone()
                    .narrow(0, batch, 1)
                    .narrow(1, plane, 1)
                    .reshape([d, h, w]);
                grid.into_data().assert_eq(&target.into_data(), true);
            }
        }
    }
}
