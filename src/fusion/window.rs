//! Window partitioning for shifted-window attention.

pub use super::*;

use burn::tensor::{Bool, TensorData};

/// Split feature maps into non-overlapping square windows.
///
/// ## Shapes
///
/// * `input` - `[N, H, W, C]`
/// * `output` - `[N * (H / S) * (W / S), S * S, C]`, where `S` is `window_size`.
pub fn partition<B: Backend>(
    input: Tensor<B, 4>,
    window_size: usize,
) -> Tensor<B, 3> {
    let [n, h, w, c] = input.dims();
    let s = window_size;
    input
        .reshape([n, h / s, s, w / s, s, c])
        .permute([0, 1, 3, 2, 4, 5])
        .reshape([n * (h / s) * (w / s), s * s, c])
}

/// Merge windows made by [`partition`] back into feature maps.
///
/// ## Shapes
///
/// * `windows` - `[N * (H / S) * (W / S), S * S, C]`
/// * `output` - `[N, H, W, C]`
pub fn reverse<B: Backend>(
    windows: Tensor<B, 3>,
    window_size: usize,
    size: [usize; 3],
) -> Tensor<B, 4> {
    let [n, h, w] = size;
    let c = windows.dims()[2];
    let s = window_size;
    windows
        .reshape([n, h / s, w / s, s, s, c])
        .permute([0, 1, 3, 2, 4, 5])
        .reshape([n, h, w, c])
}

/// The attention mask of cyclically shifted windows.
///
/// ## Shapes
///
/// * `output` - `[(H / S) * (W / S), S * S, S * S]`
///
/// ## Details
///
/// After a shift, a window may hold pixels from up to 4 separate regions.
/// A pixel only attends to pixels of its own region, i.e., `true` marks a pair
/// from different regions.
pub fn shifted_mask<B: Backend>(
    resolution: [usize; 2],
    window_size: usize,
    shift: usize,
    device: &B::Device,
) -> Tensor<B, 3, Bool> {
    let [h, w] = resolution;
    let s = window_size;
    let region = |position: usize, size: usize| {
        if position < size - s {
            0
        } else if position < size - shift {
            1
        } else {
            2
        }
    };

    let window_count = (h / s) * (w / s);
    let area = s * s;
    let mut values = Vec::with_capacity(window_count * area * area);
    for window_y in 0..h / s {
        for window_x in 0..w / s {
            let regions = (0..area)
                .map(|i| {
                    let y = window_y * s + i / s;
                    let x = window_x * s + i % s;
                    region(y, h) * 3 + region(x, w)
                })
                .collect::<Vec<_>>();
            for query in &regions {
                values.extend(regions.iter().map(|key| key != query));
            }
        }
    }

    Tensor::from_data(TensorData::new(values, [window_count, area, area]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Int};

    type B = NdArray<f32>;

    #[test]
    fn partition_order() {
        let device = &Default::default();
        let input = Tensor::<B, 1, Int>::arange(0..16, device)
            .float()
            .reshape([1, 4, 4, 1]);

        let windows = partition(input.clone(), 2);
        assert_eq!(windows.dims(), [4, 4, 1]);
        windows.clone().into_data().assert_eq(
            &Tensor::<B, 3>::from_data(
                [
                    [[0.0], [1.0], [4.0], [5.0]],
                    [[2.0], [3.0], [6.0], [7.0]],
                    [[8.0], [9.0], [12.0], [13.0]],
                    [[10.0], [11.0], [14.0], [15.0]],
                ],
                device,
            )
            .into_data(),
            true,
        );

        reverse(windows, 2, [1, 4, 4])
            .into_data()
            .assert_eq(&input.into_data(), true);
    }

    #[test]
    fn shifted_mask_regions() {
        let device = &Default::default();
        let mask = shifted_mask::<B>([4, 4], 2, 1, device);
        assert_eq!(mask.dims(), [4, 4, 4]);

        let values = mask.into_data().to_vec::<bool>().unwrap();
        let window = |index: usize| &values[index * 16..(index + 1) * 16];

        // The top-left window lies in a single region.
        assert!(window(0).iter().all(|masked| !masked));
        // Every pixel of the bottom-right window lies in its own region.
        for (index, masked) in window(3).iter().enumerate() {
            assert_eq!(*masked, index / 4 != index % 4);
        }
        // The top-right window is split by column.
        assert_eq!(
            window(1),
            &[
                false, true, false, true, //
                true, false, true, false, //
                false, true, false, true, //
                true, false, true, false,
            ]
        );
    }
}
