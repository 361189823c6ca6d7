pub mod random;
pub mod tensor_extensions;

pub use tensor_extensions::*;
