//! Seeded parameter initialization.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Samples a tensor from `N(0, std^2)` with a fixed seed.
///
/// The same `seed` always yields the same values on every backend.
pub fn normal<B: Backend, const D: usize>(
    dims: [usize; D],
    std: f32,
    seed: u64,
    device: &B::Device,
) -> Tensor<B, D> {
    let count = dims.iter().product::<usize>();
    let samples = StandardNormal
        .sample_iter(&mut StdRng::seed_from_u64(seed))
        .take(count)
        .map(|sample: f32| sample * std)
        .collect::<Vec<_>>();
    Tensor::from_data(TensorData::new(samples, dims), device)
}

#[cfg(test)]
mod tests {
    #[test]
    fn normal_is_seeded() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let a = normal::<B, 2>([4, 8], 0.5, 7, device);
        let b = normal::<B, 2>([4, 8], 0.5, 7, device);
        let c = normal::<B, 2>([4, 8], 0.5, 8, device);
        assert_eq!(a.dims(), [4, 8]);
        a.clone().into_data().assert_eq(&b.into_data(), true);
        assert_ne!(
            a.into_data().to_vec::<f32>().unwrap(),
            c.into_data().to_vec::<f32>().unwrap()
        );
    }
}
