//! Single-view and dual-view triplane reconstruction.

pub mod config;
pub mod freeze;
pub mod plane;

pub use crate::{
    backend::Backend,
    error::Error,
    fusion::{FuseTriplanes, FusionConfig, PlaneFusion},
    render::{
        RenderRequest, TriplaneRenderOutput, TriplaneRenderer, TriplaneSynthesizer,
        TriplaneSynthesizerOptions,
    },
};
pub use burn::{
    config::Config,
    module::{Ignored, Module},
    tensor::Tensor,
};
pub use config::ReconstructorConfig;
pub use freeze::FreezePolicy;
pub use plane::{PlaneGenerator, PlaneGeneratorConfig};

use humansize::{format_size, BINARY};
use std::fmt;

/// Reconstruction of triplanes from images, rendered into novel views.
#[derive(Module)]
pub struct Reconstructor<B: Backend> {
    pub planes: PlaneGenerator<B>,
    /// `None` for single-view models.
    pub fuser: Option<PlaneFusion<B>>,
    pub synthesizer: TriplaneSynthesizer<B>,
    pub freeze: Ignored<FreezePolicy>,
}

/// The input of [`Reconstructor::forward`].
#[derive(Clone, Debug)]
pub struct ReconstructorInput<B: Backend> {
    /// `[N, C, H, W]`
    pub image: Tensor<B, 4>,
    /// `[N, C, H, W]`, seen from the opposite side of [`Self::image`].
    pub image_back: Option<Tensor<B, 4>>,
    /// `[N, 16]`
    pub source_camera: Tensor<B, 2>,
    pub render: RenderRequest<B>,
}

/// The output of [`Reconstructor::forward`].
#[derive(Clone, Debug)]
pub struct ReconstructorOutput<B: Backend> {
    /// `[N, 3, D', H', W']`
    pub planes: Tensor<B, 5>,
    /// `[N, M, 3, S, S]`
    pub images_rgb: Tensor<B, 5>,
    /// `[N, M, 1, S, S]`
    pub images_depth: Tensor<B, 5>,
    /// `[N, M, 1, S, S]`
    pub images_weight: Tensor<B, 5>,
}

impl<B: Backend> Reconstructor<B> {
    /// Reconstruct the triplanes and render the requested views.
    ///
    /// Every batch size is checked before any computation.
    /// With a back image, the triplanes of both images are fused.
    pub fn forward(
        &self,
        input: ReconstructorInput<B>,
    ) -> Result<ReconstructorOutput<B>, Error> {
        #[cfg(debug_assertions)]
        log::debug!(target: "triplane_lrm::model", "Reconstructor::forward");

        let ReconstructorInput {
            image,
            image_back,
            source_camera,
            render,
        } = input;

        let n = image.dims()[0];
        Error::ensure_batch_size("source_camera", n, source_camera.dims()[0])?;
        for (name, batch_size) in render.batch_sizes() {
            Error::ensure_batch_size(name, n, batch_size)?;
        }
        if let Some(image_back) = &image_back {
            if image_back.dims() != image.dims() {
                return Err(Error::MismatchedShape(
                    "image_back",
                    image.dims().to_vec(),
                    image_back.dims().to_vec(),
                ));
            }
        }
        let [_, m] = render.dims()?;

        let planes = match image_back {
            None => self.planes.forward(image, source_camera)?,
            Some(image_back) => {
                let fuser = self.fuser.as_ref().ok_or(Error::MissingFusion)?;
                let front = self.planes.forward(image, source_camera.clone())?;
                let back = self.planes.forward(image_back, source_camera)?;
                fuser.fuse(front, back)?
            },
        };

        let TriplaneRenderOutput {
            images_rgb,
            images_depth,
            images_weight,
        } = self.synthesizer.render(planes.clone(), &render)?;

        let dims = images_rgb.dims();
        if dims[0] != n || dims[1] != m {
            let mut expected = dims.to_vec();
            expected[0] = n;
            expected[1] = m;
            return Err(Error::MismatchedShape("images_rgb", expected, dims.to_vec()));
        }

        Ok(ReconstructorOutput {
            planes,
            images_rgb,
            images_depth,
            images_weight,
        })
    }

    /// Whether a back image can be fused.
    #[inline]
    pub fn is_dual_view(&self) -> bool {
        self.fuser.is_some()
    }

    /// Size of the parameters in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.num_params() * size_of::<B::FloatElem>()
    }

    /// Readable size of the parameters.
    #[inline]
    pub fn size_readable(&self) -> String {
        format_size(self.size(), BINARY.decimal_places(1))
    }
}

impl<B: Backend> fmt::Debug for Reconstructor<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("Reconstructor")
            .field("devices", &self.devices())
            .field("size_readable()", &self.size_readable())
            .field("planes.triplane_dim", &self.planes.triplane_dim)
            .field("planes.triplane_low_res", &self.planes.triplane_low_res)
            .field("is_dual_view()", &self.is_dual_view())
            .field("freeze", &*self.freeze)
            .finish()
    }
}
