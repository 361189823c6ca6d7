//! Camera rays.

pub use super::*;

use crate::function::TensorFloatExtension;
use burn::tensor::{Shape, TensorData};

/// Rays through the pixel centers of the render regions.
#[derive(Clone, Debug)]
pub struct RayBundle<B: Backend> {
    /// `[N, M, R, 3]`
    pub origins: Tensor<B, 4>,
    /// `[N, M, R, 3]`, normalized.
    pub directions: Tensor<B, 4>,
}

/// Generate the rays of every render region.
///
/// ## Shapes
///
/// * `cameras` - `[N, M, 25]`
/// * `anchors` - `[N, M, 2]`
/// * `resolutions` - `[N, M, 1]`
/// * `output` - `R = region_size * region_size` rays per view, in row-major order.
///
/// ## Details
///
/// A pixel at `(y, x)` of the full image lies at `((y + 0.5) / res, (x + 0.5) / res)`
/// in normalized image coordinates.
/// It is lifted to depth 1 through the normalized intrinsics (with skew),
/// then moved to the world by the camera-to-world matrix.
pub fn generate<B: Backend>(
    cameras: Tensor<B, 3>,
    anchors: Tensor<B, 3>,
    resolutions: Tensor<B, 3>,
    region_size: usize,
) -> RayBundle<B> {
    let [n, m, _] = cameras.dims();
    let s = region_size;
    let r = s * s;
    let device = cameras.device();

    // [N, M, 4, 4]
    let cam_to_world = cameras.clone().narrow(2, 0, 16).reshape([n, m, 4, 4]);
    // [N, M, 1]
    let intrinsic = |index: usize| cameras.clone().narrow(2, 16 + index, 1);
    let focal_x = intrinsic(0);
    let skew = intrinsic(1);
    let center_x = intrinsic(2);
    let focal_y = intrinsic(4);
    let center_y = intrinsic(5);

    // [1, 1, R]
    let (offsets_y, offsets_x): (Vec<f32>, Vec<f32>) = (0..r)
        .map(|index| ((index / s) as f32 + 0.5, (index % s) as f32 + 0.5))
        .unzip();
    let offsets_y = Tensor::<B, 3>::from_data(TensorData::new(offsets_y, [1, 1, r]), &device);
    let offsets_x = Tensor::<B, 3>::from_data(TensorData::new(offsets_x, [1, 1, r]), &device);

    // [N, M, R]
    let y = (offsets_y + anchors.clone().narrow(2, 0, 1)) / resolutions.clone();
    let x = (offsets_x + anchors.narrow(2, 1, 1)) / resolutions;
    let y_lifted = (y.clone() - center_y.clone()) / focal_y.clone();
    let x_lifted = (x - center_x + (center_y - y) * skew / focal_y) / focal_x;

    // [N, M, 4, R]
    let ones = Tensor::<B, 3>::ones([n, m, r], &device);
    let points_camera =
        Tensor::stack::<4>(vec![x_lifted, y_lifted, ones.clone(), ones], 2);
    // [N, M, R, 3]
    let points_world = cam_to_world
        .clone()
        .matmul_batched(points_camera)
        .swap_dims(2, 3)
        .narrow(3, 0, 3);

    // [N, M, 1, 3]
    let origins = cam_to_world.narrow(2, 0, 3).narrow(3, 3, 1).swap_dims(2, 3);
    let directions = points_world - origins.clone();
    let lengths = directions
        .clone()
        .powf_scalar(2.0)
        .sum_dim(3)
        .sqrt()
        .clamp_min(1e-12);

    RayBundle {
        origins: origins.expand(Shape::new([n, m, r, 3])),
        directions: directions / lengths,
    }
}

/// Intersect the rays with the axis-aligned box `[bbox_min, bbox_max]^3`.
///
/// It returns the `[near, far]` depths, each `[N, M, R, 1]`.
/// The rays missing the box get `[0, 0]`.
pub fn intersect_box<B: Backend>(
    rays: &RayBundle<B>,
    bbox_min: f32,
    bbox_max: f32,
) -> [Tensor<B, 4>; 2] {
    let directions = rays.directions.clone();
    let parallel = directions.clone().abs().lower_elem(1e-9);
    let directions = directions.mask_fill(parallel, 1e-9);

    // [N, M, R, 3]
    let depths_1 =
        rays.origins.clone().neg().add_scalar(bbox_min) / directions.clone();
    let depths_2 = rays.origins.clone().neg().add_scalar(bbox_max) / directions;
    let swapped = depths_2.clone().lower(depths_1.clone());
    let entries = depths_1.clone().mask_where(swapped.clone(), depths_2.clone());
    let exits = depths_2.mask_where(swapped, depths_1);

    // [N, M, R, 1]
    let near = entries.max_dim(3).clamp_min(0.0);
    let far = exits.min_dim(3);
    let missed = far.clone().lower_equal(near.clone());

    [near.mask_fill(missed.clone(), 0.0), far.mask_fill(missed, 0.0)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    /// Identity rotation at `(0, 0, -2)`, focal length 1 and centered.
    fn camera(device: &<B as Backend>::Device) -> Tensor<B, 3> {
        Tensor::from_data(
            [[[
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, -2.0, //
                0.0, 0.0, 0.0, 1.0, //
                1.0, 0.0, 0.5, //
                0.0, 1.0, 0.5, //
                0.0, 0.0, 1.0,
            ]]],
            device,
        )
    }

    #[test]
    fn generate_center_ray() {
        let device = &Default::default();
        let anchors = Tensor::<B, 3>::zeros([1, 1, 2], device);
        let resolutions = Tensor::<B, 3>::ones([1, 1, 1], device);

        let rays = generate(camera(device), anchors, resolutions, 1);
        rays.origins.into_data().assert_approx_eq_diff(
            &Tensor::<B, 4>::from_data([[[[0.0, 0.0, -2.0]]]], device).into_data(),
            1e-6,
        );
        rays.directions.into_data().assert_approx_eq_diff(
            &Tensor::<B, 4>::from_data([[[[0.0, 0.0, 1.0]]]], device).into_data(),
            1e-6,
        );
    }

    #[test]
    fn generate_row_major_pixels() {
        let device = &Default::default();
        let anchors = Tensor::<B, 3>::zeros([1, 1, 2], device);
        let resolutions = Tensor::<B, 3>::from_data([[[2.0]]], device);

        let rays = generate(camera(device), anchors, resolutions, 2);
        assert_eq!(rays.directions.dims(), [1, 1, 4, 3]);

        // Pixels at (0.25, 0.25), (0.25, 0.75), (0.75, 0.25), (0.75, 0.75)
        let length = (0.25f32 * 0.25 * 2.0 + 1.0).sqrt();
        let a = 0.25 / length;
        let c = 1.0 / length;
        rays.directions.into_data().assert_approx_eq_diff(
            &Tensor::<B, 4>::from_data(
                [[[[-a, -a, c], [a, -a, c], [-a, a, c], [a, a, c]]]],
                device,
            )
            .into_data(),
            1e-6,
        );
    }

    #[test]
    fn intersect_box_bounds() {
        let device = &Default::default();
        let rays = RayBundle {
            origins: Tensor::<B, 4>::from_data(
                [[[[0.0, 0.0, -2.0], [0.0, 3.0, -2.0], [0.0, 0.0, 0.0]]]],
                device,
            ),
            directions: Tensor::<B, 4>::from_data(
                [[[[0.0, 0.0, 1.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]]],
                device,
            ),
        };

        let [near, far] = intersect_box(&rays, -1.0, 1.0);
        near.into_data().assert_approx_eq_diff(
            &Tensor::<B, 4>::from_data([[[[1.0], [0.0], [0.0]]]], device).into_data(),
            1e-5,
        );
        far.into_data().assert_approx_eq_diff(
            &Tensor::<B, 4>::from_data([[[[3.0], [0.0], [1.0]]]], device).into_data(),
            1e-5,
        );
    }
}
