#![allow(clippy::excessive_precision)]
#![allow(missing_docs)]

pub mod backend;
pub mod embedder;
pub mod encoder;
pub mod error;
pub mod function;
pub mod fusion;
pub mod model;
pub mod render;
pub mod transformer;
pub mod triplane;

pub use error::Error;
pub use model::{Reconstructor, ReconstructorConfig, ReconstructorInput, ReconstructorOutput};

/// The seed of every randomly initialized parameter owned by this crate.
pub const SEED: u64 = 0x3D65;
