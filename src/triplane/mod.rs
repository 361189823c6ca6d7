//! Triplane layout.
//!
//! A triplane is a tensor of shape `[N, 3, D, H, W]`.
//! The plane axis is always ordered as XY, XZ and YZ.
//! Every projection, flip and fusion depends on this order.

/// The plane count.
pub const PLANE_COUNT: usize = 3;

/// The index of the XY plane, sampled at `(x, y)`.
pub const PLANE_XY: usize = 0;

/// The index of the XZ plane, sampled at `(x, z)`.
pub const PLANE_XZ: usize = 1;

/// The index of the YZ plane, sampled at `(z, y)`.
pub const PLANE_YZ: usize = 2;
