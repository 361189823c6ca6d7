//! Trainability of the model components.

pub use super::*;

/// The components excluded from training.
///
/// It is derived once from [`ReconstructorConfig`] and applied by [`Module::no_grad`].
/// The adapters of the transformer are handled by
/// [`lora_rank`](ReconstructorConfig::model_lora_rank) instead.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct FreezePolicy {
    pub encoder: bool,
    pub camera_embedder: bool,
    pub pos_embed: bool,
    pub transformer: bool,
    pub upsampler: bool,
    pub synthesizer: bool,
}

impl FreezePolicy {
    /// A fused model trains only the fuser and the components after the encoder
    /// and camera embedder.
    pub fn from_config(config: &ReconstructorConfig) -> Self {
        let fused = config.fusion.is_enabled();
        Self {
            encoder: config.encoder_freeze || fused,
            camera_embedder: fused,
            ..Default::default()
        }
    }

    /// The names of the frozen components.
    pub fn frozen(&self) -> Vec<&'static str> {
        [
            ("encoder", self.encoder),
            ("camera_embedder", self.camera_embedder),
            ("pos_embed", self.pos_embed),
            ("transformer", self.transformer),
            ("upsampler", self.upsampler),
            ("synthesizer", self.synthesizer),
        ]
        .into_iter()
        .filter_map(|(name, frozen)| frozen.then_some(name))
        .collect()
    }

    /// Freeze the components of the generator.
    pub fn apply_to_planes<B: Backend>(
        &self,
        mut planes: PlaneGenerator<B>,
    ) -> PlaneGenerator<B> {
        if self.encoder {
            planes.encoder = planes.encoder.no_grad();
        }
        if self.camera_embedder {
            planes.camera_embedder = planes.camera_embedder.no_grad();
        }
        if self.pos_embed {
            planes.pos_embed = planes.pos_embed.no_grad();
        }
        if self.transformer {
            planes.transformer = planes.transformer.no_grad();
        }
        if self.upsampler {
            planes.upsampler = planes.upsampler.no_grad();
        }
        planes
    }

    /// Freeze the synthesizer.
    pub fn apply_to_synthesizer<B: Backend>(
        &self,
        synthesizer: TriplaneSynthesizer<B>,
    ) -> TriplaneSynthesizer<B> {
        if self.synthesizer {
            synthesizer.no_grad()
        } else {
            synthesizer
        }
    }
}
