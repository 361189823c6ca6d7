//! Reconstructor configuration.

pub use super::*;

use crate::{encoder::EncoderKind, transformer::TriplaneTransformerConfig};

/// The configuration for [`Reconstructor`].
#[derive(Config, Debug)]
pub struct ReconstructorConfig {
    pub camera_embed_dim: usize,
    /// It should be at least 2.
    pub rendering_samples_per_ray: usize,
    pub transformer_dim: usize,
    pub transformer_layers: usize,
    pub transformer_heads: usize,
    pub triplane_low_res: usize,
    /// It should be twice [`triplane_low_res`](Self::triplane_low_res).
    pub triplane_high_res: usize,
    pub triplane_dim: usize,

    #[config(default = true)]
    pub encoder_freeze: bool,
    /// One of the names in [`EncoderKind::REGISTRY`].
    #[config(default = "String::from(\"dino\")")]
    pub encoder_type: String,
    /// The pretrained backbone identifier. It is only recorded.
    #[config(default = "String::from(\"facebook/dino-vitb16\")")]
    pub encoder_model_name: String,
    #[config(default = 768)]
    pub encoder_feat_dim: usize,
    #[config(default = 12)]
    pub encoder_layers: usize,
    #[config(default = 12)]
    pub encoder_heads: usize,
    /// `0` trains every transformer parameter.
    #[config(default = 0)]
    pub model_lora_rank: usize,
    #[config(default = "FusionConfig::Disabled")]
    pub fusion: FusionConfig,
    /// Whether a back image is expected. It needs a fusion strategy.
    #[config(default = false)]
    pub dual_view: bool,
    #[config(default = "TriplaneSynthesizerOptions::default()")]
    pub render: TriplaneSynthesizerOptions,
}

impl ReconstructorConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<Reconstructor<B>, Error> {
        let encoder_kind = self.validate()?;
        log::info!(
            target: "triplane_lrm::model",
            "Using {encoder_kind} ({}) as the encoder",
            self.encoder_model_name,
        );

        let freeze = FreezePolicy::from_config(self);
        let planes = freeze.apply_to_planes(self.plane_generator(encoder_kind).init(device));
        let fuser = self
            .fusion
            .init(self.triplane_dim, self.triplane_high_res, device)?;
        let synthesizer = freeze.apply_to_synthesizer(self.render.init(
            self.triplane_dim,
            self.rendering_samples_per_ray,
            device,
        )?);

        log::info!(
            target: "triplane_lrm::model",
            "Using {} fusion, freezing {:?}",
            self.fusion.name(),
            freeze.frozen(),
        );

        Ok(Reconstructor {
            planes,
            fuser,
            synthesizer,
            freeze: Ignored(freeze),
        })
    }

    /// The configuration of the triplane generator.
    pub fn plane_generator(
        &self,
        encoder_kind: EncoderKind,
    ) -> PlaneGeneratorConfig {
        PlaneGeneratorConfig::new(
            encoder_kind.preset(self.encoder_feat_dim, self.encoder_layers, self.encoder_heads),
            self.camera_embed_dim,
            TriplaneTransformerConfig::new(
                self.transformer_dim,
                self.transformer_layers,
                self.transformer_heads,
                self.encoder_feat_dim,
                self.camera_embed_dim,
            )
            .with_lora_rank(self.model_lora_rank),
            self.triplane_low_res,
            self.triplane_dim,
        )
    }

    /// Check the consistency of the configuration and resolve the encoder.
    pub fn validate(&self) -> Result<EncoderKind, Error> {
        let encoder_kind = self.encoder_type.parse::<EncoderKind>()?;

        if self.triplane_low_res == 0 {
            return Err(Error::InvalidConfig(
                "triplane_low_res (0)".into(),
                "positive".into(),
            ));
        }
        if self.triplane_high_res != self.triplane_low_res * 2 {
            return Err(Error::InvalidConfig(
                format!("triplane_high_res ({})", self.triplane_high_res),
                format!("twice triplane_low_res ({})", self.triplane_low_res),
            ));
        }
        if self.transformer_heads == 0 || self.transformer_dim % self.transformer_heads != 0 {
            return Err(Error::InvalidConfig(
                format!("transformer_heads ({})", self.transformer_heads),
                format!("a divisor of transformer_dim ({})", self.transformer_dim),
            ));
        }
        if self.encoder_heads == 0 || self.encoder_feat_dim % self.encoder_heads != 0 {
            return Err(Error::InvalidConfig(
                format!("encoder_heads ({})", self.encoder_heads),
                format!("a divisor of encoder_feat_dim ({})", self.encoder_feat_dim),
            ));
        }
        if self.encoder_feat_dim == 0 || self.encoder_feat_dim % 4 != 0 {
            return Err(Error::InvalidConfig(
                format!("encoder_feat_dim ({})", self.encoder_feat_dim),
                "a positive multiple of 4".into(),
            ));
        }
        if self.dual_view && !self.fusion.is_enabled() {
            return Err(Error::MissingFusion);
        }

        Ok(encoder_kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::CrossAttentionFusionConfig;

    fn config() -> ReconstructorConfig {
        ReconstructorConfig::new(8, 4, 16, 1, 2, 2, 4, 4)
            .with_encoder_feat_dim(16)
            .with_encoder_layers(1)
            .with_encoder_heads(2)
    }

    #[test]
    fn defaults() {
        let config = ReconstructorConfig::new(1024, 96, 1024, 16, 16, 32, 64, 80);
        assert!(config.encoder_freeze);
        assert_eq!(config.encoder_type, "dino");
        assert_eq!(config.encoder_model_name, "facebook/dino-vitb16");
        assert_eq!(config.encoder_feat_dim, 768);
        assert_eq!(config.encoder_layers, 12);
        assert_eq!(config.encoder_heads, 12);
        assert_eq!(config.model_lora_rank, 0);
        assert!(!config.fusion.is_enabled());
        assert!(!config.dual_view);
        assert_eq!(config.render.box_warp, 2.0);
        assert_eq!(config.render.bbox_min, -1.0);
        assert_eq!(config.render.bbox_max, 1.0);
        assert_eq!(config.render.decoder_hidden_dim, 64);
        assert_eq!(config.render.decoder_layers, 4);
        assert_eq!(config.validate().unwrap(), EncoderKind::Dino);
    }

    #[test]
    fn validate_encoder_type() {
        assert_eq!(
            config().with_encoder_type("DINOv2".into()).validate().unwrap(),
            EncoderKind::Dinov2
        );
        assert!(matches!(
            config().with_encoder_type("sam".into()).validate(),
            Err(Error::UnsupportedEncoder(..))
        ));
    }

    #[test]
    fn validate_dimensions() {
        let small_encoder = |config: ReconstructorConfig| {
            config
                .with_encoder_feat_dim(16)
                .with_encoder_layers(1)
                .with_encoder_heads(2)
        };
        let invalids = [
            small_encoder(ReconstructorConfig::new(8, 4, 16, 1, 2, 2, 6, 4)),
            small_encoder(ReconstructorConfig::new(8, 4, 16, 1, 3, 2, 4, 4)),
            small_encoder(ReconstructorConfig::new(8, 4, 16, 1, 2, 0, 0, 4)),
            config().with_encoder_heads(3),
            config().with_encoder_feat_dim(18).with_encoder_heads(2),
        ];
        for config in invalids {
            assert!(
                matches!(config.validate(), Err(Error::InvalidConfig(..))),
                "{config:?}"
            );
        }
    }

    #[test]
    fn validate_dual_view() {
        assert!(matches!(
            config().with_dual_view(true).validate(),
            Err(Error::MissingFusion)
        ));
        assert!(config()
            .with_dual_view(true)
            .with_fusion(FusionConfig::CrossAttention(
                CrossAttentionFusionConfig::new().with_dim(4).with_head_count(2)
            ))
            .validate()
            .is_ok());
    }

    #[test]
    fn init_rejects_fusion_dim() {
        let device = &Default::default();
        let result = config()
            .with_fusion(FusionConfig::CrossAttention(CrossAttentionFusionConfig::new()))
            .init::<burn::backend::NdArray<f32>>(device);
        assert!(matches!(result, Err(Error::InvalidConfig(..))));
    }
}
