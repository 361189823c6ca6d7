//! Fixed position encoding of patch grids.

pub use super::*;

use burn::tensor::TensorData;

/// 2D sine-cosine position encoding of a `grid_h x grid_w` patch grid.
///
/// ## Shapes
///
/// * `output` - `[grid_h * grid_w, dim]`
///
/// ## Details
///
/// The first half of `dim` encodes the row and the second half encodes the column.
/// Each half is `[sin(p * w_0), ..., sin(p * w_k), cos(p * w_0), ..., cos(p * w_k)]`,
/// where `w_i = 10000^(-i / k)` and `k = dim / 4`.
///
/// `dim` should be a multiple of 4.
pub fn sincos_2d<B: Backend>(
    grid_h: usize,
    grid_w: usize,
    dim: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    debug_assert_eq!(dim % 4, 0, "dim should be a multiple of 4");

    let quarter = dim / 4;
    let omegas = (0..quarter)
        .map(|i| 10000_f32.powf(-(i as f32) / quarter as f32))
        .collect::<Vec<_>>();
    let encode = |position: usize, values: &mut Vec<f32>| {
        let position = position as f32;
        values.extend(omegas.iter().map(|omega| (position * omega).sin()));
        values.extend(omegas.iter().map(|omega| (position * omega).cos()));
    };

    let mut values = Vec::with_capacity(grid_h * grid_w * dim);
    for row in 0..grid_h {
        for col in 0..grid_w {
            encode(row, &mut values);
            encode(col, &mut values);
        }
    }

    Tensor::from_data(TensorData::new(values, [grid_h * grid_w, dim]), device)
}
