use burn::tensor::{backend, Float, Shape, Tensor};

pub trait TensorFloatExtension {
    /// Matrix multiplication over the last two dimensions,
    /// split into chunks when the batch is too large for a single dispatch.
    fn matmul_batched(
        self,
        rhs: Self,
    ) -> Self;

    /// `output[i] = input[0] * ... * input[i - 1]` along `dim`, with `output[0] = 1`.
    fn prod_cumulative_exclusive(
        self,
        dim: usize,
    ) -> Self;

    /// Cyclically shift the elements along `dim`, i.e., `output[i] = input[(i - shift) mod n]`.
    fn roll_dim(
        self,
        shift: isize,
        dim: usize,
    ) -> Self;
}

impl<B: backend::Backend, const D: usize> TensorFloatExtension
    for Tensor<B, D, Float>
{
    fn matmul_batched(
        self,
        rhs: Self,
    ) -> Self {
        const BATCH_SIZE_MAX: usize = (1 << 16) - 1;

        if D < 3 {
            return self.matmul(rhs);
        }

        let dims_lhs = self.dims();
        let dims_rhs = rhs.dims();
        assert_eq!(
            dims_lhs[D - 1],
            dims_rhs[D - 2],
            "The inner dimensions of matmul should be compatible, \
            but got self.dims() = {dims_lhs:?} and rhs.dims() = {dims_rhs:?}",
        );

        let mut dims_lhs_outer = dims_lhs;
        let mut dims_rhs_outer = dims_rhs;
        for dim in 0..D - 2 {
            let size = dims_lhs[dim].max(dims_rhs[dim]);
            dims_lhs_outer[dim] = size;
            dims_rhs_outer[dim] = size;
        }
        let count = dims_lhs_outer[..D - 2].iter().product::<usize>();
        if count <= BATCH_SIZE_MAX {
            return self.matmul(rhs);
        }

        let mut dims_output = dims_lhs_outer;
        dims_output[D - 1] = dims_rhs[D - 1];
        let lhs = self.expand::<D, Shape>(Shape::new(dims_lhs_outer)).flatten::<3>(0, D - 3);
        let rhs = rhs.expand::<D, Shape>(Shape::new(dims_rhs_outer)).flatten::<3>(0, D - 3);

        let chunks = (0..count)
            .step_by(BATCH_SIZE_MAX)
            .map(|start| {
                let range = [start..(start + BATCH_SIZE_MAX).min(count)];
                lhs.clone().slice(range.clone()).matmul(rhs.clone().slice(range))
            })
            .collect();

        Tensor::cat(chunks, 0).reshape(dims_output)
    }

    fn prod_cumulative_exclusive(
        self,
        dim: usize,
    ) -> Self {
        assert!(dim < D, "dim should be less than {D}, but got {dim}");

        let length = self.dims()[dim];
        if length == 0 {
            return self;
        }

        let mut state = self.clone().narrow(dim, 0, 1).ones_like();
        let mut products = Vec::with_capacity(length);
        for value in self.iter_dim(dim) {
            products.push(state.clone());
            state = state * value;
        }

        Tensor::cat(products, dim)
    }

    fn roll_dim(
        self,
        shift: isize,
        dim: usize,
    ) -> Self {
        assert!(dim < D, "dim should be less than {D}, but got {dim}");

        let size = self.dims()[dim];
        if size == 0 {
            return self;
        }
        let shift = shift.rem_euclid(size as isize) as usize;
        if shift == 0 {
            return self;
        }

        let head = self.clone().narrow(dim, size - shift, shift);
        let tail = self.narrow(dim, 0, size - shift);
        Tensor::cat(vec![head, tail], dim)
    }
}
