//! Differentiable triplane rendering.

pub mod decoder;
pub mod march;
pub mod ray;
pub mod sample;

pub use crate::{backend::Backend, error::Error, triplane::PLANE_COUNT};
pub use burn::{
    config::Config,
    module::{Ignored, Module},
    tensor::Tensor,
};
pub use decoder::{PointDecoder, PointDecoderConfig};

use burn::tensor::Int;

/// The render camera dimension.
///
/// A row-major `4 x 4` camera-to-world matrix followed by
/// a row-major normalized `3 x 3` intrinsic matrix.
pub const RENDER_CAMERA_DIM: usize = 16 + 9;

/// The interface of a triplane renderer.
pub trait TriplaneRenderer<B: Backend> {
    /// Render the views of `request` from the triplanes.
    ///
    /// ## Shapes
    ///
    /// * `planes` - `[N, 3, D, H, W]`
    fn render(
        &self,
        planes: Tensor<B, 5>,
        request: &RenderRequest<B>,
    ) -> Result<TriplaneRenderOutput<B>, Error>;
}

/// The views to render for each triplane.
#[derive(Clone, Debug)]
pub struct RenderRequest<B: Backend> {
    /// `[N, M, 25]`
    pub cameras: Tensor<B, 3>,
    /// `[N, M, 2]`, the `(y, x)` pixel offsets of the regions.
    pub anchors: Tensor<B, 3>,
    /// `[N, M, 1]`, the full image resolutions in pixels.
    pub resolutions: Tensor<B, 3>,
    /// `[N, M, 1]`, the gray levels in `[0, 1]`.
    pub bg_colors: Tensor<B, 3>,
    /// The side length `S` of each square region.
    pub region_size: usize,
}

/// The rendered views.
#[derive(Clone, Debug)]
pub struct TriplaneRenderOutput<B: Backend> {
    /// `[N, M, 3, S, S]`, in `[-1, 1]`.
    pub images_rgb: Tensor<B, 5>,
    /// `[N, M, 1, S, S]`
    pub images_depth: Tensor<B, 5>,
    /// `[N, M, 1, S, S]`, in `[0, 1]`.
    pub images_weight: Tensor<B, 5>,
}

impl<B: Backend> RenderRequest<B> {
    /// Request whole images of `resolution` pixels on a uniform background.
    pub fn full(
        cameras: Tensor<B, 3>,
        resolution: usize,
        bg_color: f32,
    ) -> Self {
        let [n, m, _] = cameras.dims();
        let device = cameras.device();
        Self {
            anchors: Tensor::zeros([n, m, 2], &device),
            resolutions: Tensor::full([n, m, 1], resolution as f32, &device),
            bg_colors: Tensor::full([n, m, 1], bg_color, &device),
            cameras,
            region_size: resolution,
        }
    }

    /// The batch size of every request tensor, in the order of
    /// cameras, anchors, resolutions and background colors.
    pub fn batch_sizes(&self) -> [(&'static str, usize); 4] {
        [
            ("render_cameras", self.cameras.dims()[0]),
            ("render_anchors", self.anchors.dims()[0]),
            ("render_resolutions", self.resolutions.dims()[0]),
            ("render_bg_colors", self.bg_colors.dims()[0]),
        ]
    }

    /// Check the shapes and return `[N, M]`.
    pub fn dims(&self) -> Result<[usize; 2], Error> {
        let [n, m, dim] = self.cameras.dims();
        Error::ensure_dimension("render_cameras", RENDER_CAMERA_DIM, dim)?;

        for (name, tensor, dim) in [
            ("render_anchors", &self.anchors, 2),
            ("render_resolutions", &self.resolutions, 1),
            ("render_bg_colors", &self.bg_colors, 1),
        ] {
            let dims = tensor.dims();
            if dims != [n, m, dim] {
                return Err(Error::MismatchedShape(name, vec![n, m, dim], dims.to_vec()));
            }
        }
        if self.region_size == 0 {
            return Err(Error::InvalidConfig(
                "render region_size".into(),
                "positive".into(),
            ));
        }

        Ok([n, m])
    }
}

/// The configuration for [`TriplaneSynthesizer`].
#[derive(Config, Debug)]
pub struct TriplaneSynthesizerOptions {
    /// The side length of the cube covered by the triplane.
    #[config(default = 2.0)]
    pub box_warp: f32,
    /// The lower bound of the ray box on each axis.
    #[config(default = "-1.0")]
    pub bbox_min: f32,
    /// The upper bound of the ray box on each axis.
    #[config(default = 1.0)]
    pub bbox_max: f32,
    #[config(default = 64)]
    pub decoder_hidden_dim: usize,
    #[config(default = 4)]
    pub decoder_layers: usize,
}

/// Volume renderer sampling a triplane along camera rays.
///
/// ## Details
///
/// Each ray takes `samples_per_ray` evenly spaced samples between
/// its entry to and exit from the box, so rendering is deterministic.
#[derive(Debug, Module)]
pub struct TriplaneSynthesizer<B: Backend> {
    pub decoder: PointDecoder<B>,
    pub options: Ignored<TriplaneSynthesizerOptions>,
    pub samples_per_ray: usize,
}

impl TriplaneSynthesizerOptions {
    /// Initialize for triplanes with `dim` channels.
    pub fn init<B: Backend>(
        &self,
        dim: usize,
        samples_per_ray: usize,
        device: &B::Device,
    ) -> Result<TriplaneSynthesizer<B>, Error> {
        if samples_per_ray < 2 {
            return Err(Error::InvalidConfig(
                format!("rendering_samples_per_ray ({samples_per_ray})"),
                "at least 2".into(),
            ));
        }
        if self.box_warp <= 0.0 {
            return Err(Error::InvalidConfig(
                format!("render.box_warp ({})", self.box_warp),
                "positive".into(),
            ));
        }
        if self.bbox_min >= self.bbox_max {
            return Err(Error::InvalidConfig(
                format!("render.bbox_min ({})", self.bbox_min),
                format!("less than render.bbox_max ({})", self.bbox_max),
            ));
        }
        if self.decoder_layers == 0 {
            return Err(Error::InvalidConfig(
                "render.decoder_layers (0)".into(),
                "positive".into(),
            ));
        }

        let decoder = PointDecoderConfig::new(dim)
            .with_dim_hidden(self.decoder_hidden_dim)
            .with_layer_count(self.decoder_layers)
            .init(device);

        Ok(TriplaneSynthesizer {
            decoder,
            options: Ignored(self.to_owned()),
            samples_per_ray,
        })
    }
}

impl<B: Backend> TriplaneRenderer<B> for TriplaneSynthesizer<B> {
    fn render(
        &self,
        planes: Tensor<B, 5>,
        request: &RenderRequest<B>,
    ) -> Result<TriplaneRenderOutput<B>, Error> {
        #[cfg(debug_assertions)]
        log::debug!(target: "triplane_lrm::render", "TriplaneSynthesizer::render");

        let [n, m] = request.dims()?;
        let dims = planes.dims();
        let [_, plane_count, d, _, _] = dims;
        Error::ensure_batch_size("planes", n, dims[0])?;
        if plane_count != PLANE_COUNT {
            let mut expected = dims.to_vec();
            expected[1] = PLANE_COUNT;
            return Err(Error::MismatchedShape("planes", expected, dims.to_vec()));
        }
        Error::ensure_dimension("planes", self.decoder.dim_plane, d)?;

        let s = request.region_size;
        let r = s * s;
        let k = self.samples_per_ray;
        let device = planes.device();

        let rays = ray::generate(
            request.cameras.clone(),
            request.anchors.clone(),
            request.resolutions.clone(),
            s,
        );
        let [near, far] =
            ray::intersect_box(&rays, self.options.bbox_min, self.options.bbox_max);

        // [N, M, R, K, 1]
        let steps = Tensor::<B, 1, Int>::arange(0..k as i64, &device)
            .float()
            .div_scalar((k - 1) as f32)
            .reshape([1, 1, 1, k, 1]);
        let near = near.unsqueeze_dim::<5>(3);
        let depths = near.clone() + (far.unsqueeze_dim::<5>(3) - near) * steps;

        // [N, M * R * K, 3]
        let points = (rays.origins.unsqueeze_dim::<5>(3)
            + rays.directions.unsqueeze_dim::<5>(3) * depths.clone())
        .reshape([n, m * r * k, 3])
        .mul_scalar(2.0 / self.options.box_warp);

        let features = sample::sample_planes(planes, points);
        let decoded = self.decoder.forward(features);
        let marched = march::march(
            decoded.colors_rgb.reshape([n, m, r, k, 3]),
            decoded.sigmas.reshape([n, m, r, k, 1]),
            depths,
            request.bg_colors.clone().reshape([n, m, 1, 1, 1]),
        );

        // [N, M, R, C] -> [N, M, C, S, S]
        let into_images = |x: Tensor<B, 4>| {
            let c = x.dims()[3];
            x.reshape([n, m, s, s, c]).permute([0, 1, 4, 2, 3])
        };

        Ok(TriplaneRenderOutput {
            images_rgb: into_images(marched.colors_rgb),
            images_depth: into_images(marched.depths),
            images_weight: into_images(marched.weights),
        })
    }
}

impl Default for TriplaneSynthesizerOptions {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
