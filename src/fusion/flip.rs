//! Back-view alignment.

pub use super::*;

use crate::triplane::{PLANE_XY, PLANE_XZ, PLANE_YZ};

/// Mirror the planes of a back-view triplane into the front-view frame.
///
/// ## Shapes
///
/// * `planes` - `[N, 3, D, H, W]`
/// * `output` - `[N, 3, D, H, W]`
///
/// ## Details
///
/// | Plane | Flipped axes     |
/// |-------|------------------|
/// | XY    | height and width |
/// | XZ    | width            |
/// | YZ    | height           |
pub fn flip_back_planes<B: Backend>(planes: Tensor<B, 5>) -> Tensor<B, 5> {
    let xy = planes.clone().narrow(1, PLANE_XY, 1).flip([3, 4]);
    let xz = planes.clone().narrow(1, PLANE_XZ, 1).flip([4]);
    let yz = planes.narrow(1, PLANE_YZ, 1).flip([3]);
    Tensor::cat(vec![xy, xz, yz], 1)
}
