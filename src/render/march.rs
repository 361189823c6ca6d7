//! Volumetric ray marching.

pub use super::*;

use crate::function::TensorFloatExtension;
use burn::tensor::activation;

/// The output of [`march`].
#[derive(Clone, Debug)]
pub struct MarchOutput<B: Backend> {
    /// `[N, M, R, 3]`, in `[-1, 1]`.
    pub colors_rgb: Tensor<B, 4>,
    /// `[N, M, R, 1]`
    pub depths: Tensor<B, 4>,
    /// `[N, M, R, 1]`, the accumulated opacities.
    pub weights: Tensor<B, 4>,
}

/// Composite the samples along each ray at the interval midpoints.
///
/// ## Shapes
///
/// * `colors_rgb` - `[N, M, R, K, 3]`
/// * `sigmas` - `[N, M, R, K, 1]`
/// * `depths` - `[N, M, R, K, 1]`, ascending along each ray.
/// * `backgrounds` - `[N, M, 1, 1, 1]`
///
/// ## Details
///
/// * `density = softplus(sigma - 1)`
/// * `alpha = 1 - exp(-density * delta)`
/// * `weight_i = alpha_i * prod_{j < i}(1 - alpha_j)`
pub fn march<B: Backend>(
    colors_rgb: Tensor<B, 5>,
    sigmas: Tensor<B, 5>,
    depths: Tensor<B, 5>,
    backgrounds: Tensor<B, 5>,
) -> MarchOutput<B> {
    let [n, m, r, k, _] = depths.dims();
    let midpoints =
        |x: Tensor<B, 5>| (x.clone().narrow(3, 0, k - 1) + x.narrow(3, 1, k - 1)).mul_scalar(0.5);

    let deltas = depths.clone().narrow(3, 1, k - 1) - depths.clone().narrow(3, 0, k - 1);
    // Linear above 20 to stay finite
    let shifted = midpoints(sigmas).sub_scalar(1.0);
    let linear = shifted.clone().greater_elem(20.0);
    let densities = activation::softplus(shifted.clone().clamp_max(20.0), 1.0)
        .mask_where(linear, shifted);
    let alphas = (densities * deltas).neg().exp().neg().add_scalar(1.0);
    let transmittances = alphas
        .clone()
        .neg()
        .add_scalar(1.0 + 1e-10)
        .prod_cumulative_exclusive(3);
    // [N, M, R, K - 1, 1]
    let weights = alphas * transmittances;

    // [N, M, R, 1, 1]
    let weights_total = weights.clone().sum_dim(3);
    let colors_rgb = (weights.clone() * midpoints(colors_rgb)).sum_dim(3)
        + backgrounds * weights_total.clone().neg().add_scalar(1.0);

    let depths_near = depths.clone().narrow(3, 0, 1);
    let depths_far = depths.clone().narrow(3, k - 1, 1);
    let depths = (weights * midpoints(depths)).sum_dim(3)
        / weights_total.clone().clamp_min(1e-10);
    let depths = depths.clone().mask_where(depths.clone().lower(depths_near.clone()), depths_near);
    let depths = depths.clone().mask_where(depths.greater(depths_far.clone()), depths_far);

    MarchOutput {
        colors_rgb: colors_rgb.mul_scalar(2.0).sub_scalar(1.0).reshape([n, m, r, 3]),
        depths: depths.reshape([n, m, r, 1]),
        weights: weights_total.reshape([n, m, r, 1]),
    }
}
