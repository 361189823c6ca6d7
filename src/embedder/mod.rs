//! Source camera embedding.

pub use crate::{backend::Backend, error::Error};
pub use burn::{
    config::Config,
    module::Module,
    tensor::Tensor,
};

use burn::nn::{Linear, LinearConfig};

/// The raw source camera dimension.
///
/// A row-major `3 x 4` camera-to-world matrix followed by
/// normalized intrinsics `[f_x, f_y, c_x, c_y]`.
pub const RAW_CAMERA_DIM: usize = 12 + 4;

/// The interface of a camera embedding.
pub trait CameraEmbedding<B: Backend> {
    /// The size of the last dimension of [`Self::embed`].
    fn embed_dim(&self) -> usize;

    /// Embed the raw cameras.
    ///
    /// ## Shapes
    ///
    /// * `camera` - `[N, D_raw]`
    /// * `output` - `[N, E]`
    fn embed(
        &self,
        camera: Tensor<B, 2>,
    ) -> Result<Tensor<B, 2>, Error>;
}

/// The configuration for [`CameraEmbedder`].
#[derive(Config, Copy, Debug)]
pub struct CameraEmbedderConfig {
    /// Output dimension `E`.
    pub embed_dim: usize,
    /// Input dimension.
    #[config(default = "RAW_CAMERA_DIM")]
    pub raw_dim: usize,
}

/// Linear embedding of raw camera parameters.
#[derive(Debug, Module)]
pub struct CameraEmbedder<B: Backend> {
    pub proj: Linear<B>,
    pub raw_dim: usize,
    pub embed_dim: usize,
}

impl CameraEmbedderConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> CameraEmbedder<B> {
        CameraEmbedder {
            proj: LinearConfig::new(self.raw_dim, self.embed_dim).init(device),
            raw_dim: self.raw_dim,
            embed_dim: self.embed_dim,
        }
    }
}

impl<B: Backend> CameraEmbedding<B> for CameraEmbedder<B> {
    #[inline]
    fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    fn embed(
        &self,
        camera: Tensor<B, 2>,
    ) -> Result<Tensor<B, 2>, Error> {
        Error::ensure_dimension("source_camera", self.raw_dim, camera.dims()[1])?;
        Ok(self.proj.forward(camera))
    }
}
