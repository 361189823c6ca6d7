//! Front and back triplane fusion.

pub mod conv;
pub mod cross_attention;
pub mod flip;
pub mod window;

pub use crate::{backend::Backend, error::Error};
pub use burn::{config::Config, module::Module, tensor::Tensor};
pub use conv::{ConvFusion, ConvFusionConfig};
pub use cross_attention::{CrossAttentionFusion, CrossAttentionFusionConfig};
pub use flip::flip_back_planes;

/// The interface of a triplane fuser.
pub trait FuseTriplanes<B: Backend> {
    /// Fuse two triplanes into one.
    ///
    /// ## Shapes
    ///
    /// * `front` - `[N, 3, D, H, W]`
    /// * `back` - `[N, 3, D, H, W]`
    /// * `output` - `[N, 3, D, H, W]`
    fn fuse(
        &self,
        front: Tensor<B, 5>,
        back: Tensor<B, 5>,
    ) -> Result<Tensor<B, 5>, Error>;
}

/// The fusion strategy.
#[derive(Config, Debug)]
pub enum FusionConfig {
    /// Convolution stack over the concatenated planes.
    Convolution(ConvFusionConfig),
    /// Shifted-window cross-attention from front to back.
    CrossAttention(CrossAttentionFusionConfig),
    /// Single view only.
    Disabled,
}

/// The fuser of a dual-view model.
#[derive(Debug, Module)]
pub enum PlaneFusion<B: Backend> {
    Convolution(ConvFusion<B>),
    CrossAttention(CrossAttentionFusion<B>),
}

impl FusionConfig {
    /// Whether a fuser is built.
    #[inline]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// The name used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Convolution(_) => "convolution",
            Self::CrossAttention(_) => "cross-attention",
            Self::Disabled => "disabled",
        }
    }

    /// Initialize for triplanes with `dim` channels and `resolution` pixels per side.
    ///
    /// It returns `None` if the fusion is disabled.
    pub fn init<B: Backend>(
        &self,
        dim: usize,
        resolution: usize,
        device: &B::Device,
    ) -> Result<Option<PlaneFusion<B>>, Error> {
        Ok(match self {
            Self::Convolution(config) => Some(PlaneFusion::Convolution(
                config.init(dim, resolution, device)?,
            )),
            Self::CrossAttention(config) => Some(PlaneFusion::CrossAttention(
                config.init(dim, resolution, device)?,
            )),
            Self::Disabled => None,
        })
    }
}

impl<B: Backend> FuseTriplanes<B> for PlaneFusion<B> {
    /// The back planes are mirrored by [`flip_back_planes`] before fusing.
    fn fuse(
        &self,
        front: Tensor<B, 5>,
        back: Tensor<B, 5>,
    ) -> Result<Tensor<B, 5>, Error> {
        #[cfg(debug_assertions)]
        log::debug!(target: "triplane_lrm::fusion", "PlaneFusion::fuse");

        let back = flip_back_planes(back);
        match self {
            Self::Convolution(fusion) => fusion.fuse(front, back),
            Self::CrossAttention(fusion) => fusion.fuse(front, back),
        }
    }
}

/// Check that both triplanes have the same square shape at `resolution`.
///
/// It returns the dimensions `[N, 3, D, H, W]`.
pub fn check_pair<B: Backend>(
    front: &Tensor<B, 5>,
    back: &Tensor<B, 5>,
    resolution: usize,
) -> Result<[usize; 5], Error> {
    let dims = front.dims();
    let [n, planes, d, h, w] = dims;
    if back.dims() != dims {
        return Err(Error::MismatchedShape(
            "back planes",
            dims.to_vec(),
            back.dims().to_vec(),
        ));
    }
    if h != resolution || w != resolution {
        return Err(Error::MismatchedShape(
            "front planes",
            vec![n, planes, d, resolution, resolution],
            dims.to_vec(),
        ));
    }
    Ok(dims)
}
