use burn::backend::NdArray;
use divan::Bencher;
use triplane_lrm::{
    model::{ReconstructorInput, TriplaneSynthesizerOptions},
    render::{RenderRequest, RENDER_CAMERA_DIM},
    Reconstructor, ReconstructorConfig,
};

type B = NdArray<f32>;

fn main() {
    divan::main();
}

mod cpu {
    use super::*;

    #[divan::bench(sample_count = 20, sample_size = 1)]
    fn plane_generation(bencher: Bencher) {
        let model = data::model();
        bencher
            .with_inputs(data::input(1, 1))
            .bench_local_values(|input| {
                model
                    .planes
                    .forward(input.image, input.source_camera)
                    .map(|planes| planes.into_data())
            });
    }

    #[divan::bench(sample_count = 20, sample_size = 1)]
    fn reconstruction(bencher: Bencher) {
        let model = data::model();
        bencher
            .with_inputs(data::input(1, 2))
            .bench_local_values(|input| {
                model
                    .forward(input)
                    .map(|output| output.images_rgb.into_data())
            });
    }
}

mod data {
    use super::*;
    use burn::tensor::{Distribution, Shape, Tensor};

    const IMAGE_SIZE: usize = 64;
    const REGION_SIZE: usize = 8;

    pub fn model() -> Reconstructor<B> {
        ReconstructorConfig::new(32, 16, 64, 2, 4, 4, 8, 16)
            .with_encoder_feat_dim(64)
            .with_encoder_layers(2)
            .with_encoder_heads(4)
            .with_render(TriplaneSynthesizerOptions::new().with_decoder_hidden_dim(32))
            .init(&Default::default())
            .expect("A valid configuration")
    }

    pub fn input(
        n: usize,
        m: usize,
    ) -> impl Fn() -> ReconstructorInput<B> {
        move || {
            let device = Default::default();
            let camera = [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, -2.0, //
                0.0, 0.0, 0.0, 1.0, //
                0.75, 0.0, 0.5, //
                0.0, 0.75, 0.5, //
                0.0, 0.0, 1.0,
            ];
            let cameras = Tensor::<B, 1>::from_floats(camera, &device)
                .reshape([1, 1, RENDER_CAMERA_DIM])
                .expand(Shape::new([n, m, RENDER_CAMERA_DIM]));

            ReconstructorInput {
                image: Tensor::random(
                    [n, 3, IMAGE_SIZE, IMAGE_SIZE],
                    Distribution::Default,
                    &device,
                ),
                image_back: None,
                source_camera: Tensor::random([n, 16], Distribution::Default, &device),
                render: RenderRequest::full(cameras, REGION_SIZE, 1.0),
            }
        }
    }
}
