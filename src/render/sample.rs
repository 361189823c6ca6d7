//! Triplane feature sampling.

pub use super::*;

use burn::tensor::Shape;

/// Project the points onto the planes and sample their features.
///
/// ## Shapes
///
/// * `planes` - `[N, 3, D, H, W]`
/// * `points` - `[N, P, 3]`, where the planes span `[-1, 1]` on each axis.
/// * `output` - `[N, P, 3 * D]`, ordered by plane.
///
/// ## Details
///
/// | Plane | `(u, v)` |
/// |-------|----------|
/// | XY    | `(x, y)` |
/// | XZ    | `(x, z)` |
/// | YZ    | `(z, y)` |
pub fn sample_planes<B: Backend>(
    planes: Tensor<B, 5>,
    points: Tensor<B, 3>,
) -> Tensor<B, 3> {
    let [n, _, d, h, w] = planes.dims();
    let p = points.dims()[1];

    // [N, P, 1]
    let axis = |index: usize| points.clone().narrow(2, index, 1);
    let (x, y, z) = (axis(0), axis(1), axis(2));

    // [N * 3, P, 2]
    let coords = Tensor::stack::<4>(
        vec![
            Tensor::cat(vec![x.clone(), y.clone()], 2),
            Tensor::cat(vec![x, z.clone()], 2),
            Tensor::cat(vec![z, y], 2),
        ],
        1,
    )
    .reshape([n * PLANE_COUNT, p, 2]);
    // [N * 3, H * W, D]
    let features = planes
        .reshape([n * PLANE_COUNT, d, h * w])
        .swap_dims(1, 2);

    bilinear(features, coords, [h, w])
        .reshape([n, PLANE_COUNT, p, d])
        .swap_dims(1, 2)
        .reshape([n, p, PLANE_COUNT * d])
}

/// Sample the feature maps bilinearly with zero padding.
///
/// ## Shapes
///
/// * `features` - `[N, H * W, D]`, in row-major order.
/// * `coords` - `[N, P, 2]`, where `(-1, -1)` and `(1, 1)` are the outer corners
///   of the top-left and bottom-right pixels.
/// * `output` - `[N, P, D]`
pub fn bilinear<B: Backend>(
    features: Tensor<B, 3>,
    coords: Tensor<B, 3>,
    size: [usize; 2],
) -> Tensor<B, 3> {
    let [n, _, d] = features.dims();
    let p = coords.dims()[1];
    let [h, w] = size;

    // [N, P]
    let to_pixel = |index: usize, length: usize| {
        coords
            .clone()
            .narrow(2, index, 1)
            .reshape([n, p])
            .add_scalar(1.0)
            .mul_scalar(length as f32 / 2.0)
            .sub_scalar(0.5)
            .clamp(-1.0, length as f32)
    };
    let floor = |x: Tensor<B, 2>| x.add_scalar(1.0).int().float().sub_scalar(1.0);

    let x = to_pixel(0, w);
    let y = to_pixel(1, h);
    let x0 = floor(x.clone());
    let y0 = floor(y.clone());
    let x1 = x0.clone().add_scalar(1.0);
    let y1 = y0.clone().add_scalar(1.0);
    let weight_x1 = x - x0.clone();
    let weight_y1 = y - y0.clone();
    let weight_x0 = weight_x1.clone().neg().add_scalar(1.0);
    let weight_y0 = weight_y1.clone().neg().add_scalar(1.0);

    let corner = |x: Tensor<B, 2>, y: Tensor<B, 2>, weight: Tensor<B, 2>| {
        let inside = x.clone().greater_equal_elem(0.0).float()
            * x.clone().lower_equal_elem((w - 1) as f32).float()
            * y.clone().greater_equal_elem(0.0).float()
            * y.clone().lower_equal_elem((h - 1) as f32).float();
        let index = (y.clamp(0.0, (h - 1) as f32).mul_scalar(w as f32)
            + x.clamp(0.0, (w - 1) as f32))
        .int()
        .reshape([n, p, 1])
        .expand(Shape::new([n, p, d]));
        features.clone().gather(1, index) * (weight * inside).reshape([n, p, 1])
    };

    corner(x0.clone(), y0.clone(), weight_x0.clone() * weight_y0.clone())
        + corner(x1.clone(), y0, weight_x1.clone() * weight_y0)
        + corner(x0, y1.clone(), weight_x0 * weight_y1.clone())
        + corner(x1, y1, weight_x1 * weight_y1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn bilinear_pixels_and_padding() {
        let device = &Default::default();
        // [[1, 2], [3, 4]]
        let features = Tensor::<B, 3>::from_data([[[1.0], [2.0], [3.0], [4.0]]], device);
        let coords = Tensor::<B, 3>::from_data(
            [[
                [-0.5, -0.5],
                [0.5, -0.5],
                [-0.5, 0.5],
                [0.0, 0.0],
                [1.0, 0.5],
                [3.0, 3.0],
            ]],
            device,
        );

        let output = bilinear(features, coords, [2, 2]);
        output.into_data().assert_approx_eq_diff(
            &Tensor::<B, 3>::from_data(
                [[[1.0], [2.0], [3.0], [2.5], [2.0], [0.0]]],
                device,
            )
            .into_data(),
            1e-6,
        );
    }

    #[test]
    fn sample_planes_projects_axes() {
        let device = &Default::default();
        // 100 * plane + 10 * row + column
        let planes = Tensor::<B, 5>::from_data(
            [[
                [[[0.0, 1.0], [10.0, 11.0]]],
                [[[100.0, 101.0], [110.0, 111.0]]],
                [[[200.0, 201.0], [210.0, 211.0]]],
            ]],
            device,
        );
        let points = Tensor::<B, 3>::from_data([[[0.5, -0.5, 0.5]]], device);

        let output = sample_planes(planes, points);
        output.into_data().assert_approx_eq_diff(
            &Tensor::<B, 3>::from_data([[[1.0, 111.0, 201.0]]], device).into_data(),
            1e-5,
        );
    }
}
