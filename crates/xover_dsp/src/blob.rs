//! Configuration Blobs
//!
//! Opaque, fixed-layout byte images of module settings for preset storage
//! and bulk transfer:
//!
//! ```text
//! +--------+---------+------------------------------------+
//! | tag(4) | ver (1) | bincode payload (fixint, LE)       |
//! +--------+---------+------------------------------------+
//! ```
//!
//! Loaded settings are always clamped before use, so a blob from an older
//! or foreign writer can never push a parameter out of range.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::compressor::CompressorConfig;
use crate::config::{PipelineConfig, Targets};
use crate::crossover::CrossoverConfig;
use crate::delay::DelayConfig;
use crate::eq::EqConfig;
use crate::error::DspError;
use crate::gain::GainConfig;
use crate::limiter::LimiterConfig;
use crate::routing::RoutingConfig;

pub const BLOB_VERSION: u8 = 1;
const HEADER_LEN: usize = 5;
/// Upper bound for any payload; the whole pipeline is well under this
const MAX_PAYLOAD_LEN: u64 = 16 * 1024;

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_PAYLOAD_LEN)
        .reject_trailing_bytes()
}

/// A settings type with a tagged blob representation
pub trait ConfigBlob: Serialize + DeserializeOwned {
    const TAG: [u8; 4];

    /// Clamp every field into range
    fn sanitize(self) -> Self;

    fn to_blob(&self) -> Result<Vec<u8>, DspError> {
        let payload = codec()
            .serialize(self)
            .map_err(|e| DspError::InvalidBlob(e.to_string()))?;
        let mut blob = Vec::with_capacity(HEADER_LEN + payload.len());
        blob.extend_from_slice(&Self::TAG);
        blob.push(BLOB_VERSION);
        blob.extend_from_slice(&payload);
        Ok(blob)
    }

    fn from_blob(bytes: &[u8]) -> Result<Self, DspError> {
        if bytes.len() < HEADER_LEN {
            return Err(DspError::InvalidBlob(format!(
                "{} bytes is shorter than the header",
                bytes.len()
            )));
        }
        let found = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if found != Self::TAG {
            return Err(DspError::BlobTagMismatch {
                expected: Self::TAG,
                found,
            });
        }
        if bytes[4] != BLOB_VERSION {
            return Err(DspError::BlobVersion(bytes[4]));
        }
        let config: Self = codec()
            .deserialize(&bytes[HEADER_LEN..])
            .map_err(|e| DspError::InvalidBlob(e.to_string()))?;
        Ok(config.sanitize())
    }
}

macro_rules! impl_config_blob {
    ($ty:ty, $tag:expr) => {
        impl ConfigBlob for $ty {
            const TAG: [u8; 4] = *$tag;

            fn sanitize(self) -> Self {
                self.sanitized()
            }
        }
    };
}

impl_config_blob!(RoutingConfig, b"ROUT");
impl_config_blob!(CrossoverConfig, b"XOVR");
impl_config_blob!(EqConfig, b"PEQ ");
impl_config_blob!(CompressorConfig, b"COMP");
impl_config_blob!(LimiterConfig, b"LIMT");
impl_config_blob!(DelayConfig, b"DLAY");
impl_config_blob!(GainConfig, b"GAIN");
impl_config_blob!(PipelineConfig, b"PIPE");

/// Addressable module for per-module blob exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Module {
    /// Global; the channel argument is ignored
    Routing,
    Crossover,
    Eq,
    Compressor,
    Limiter,
    Delay,
    Gain,
}

impl PipelineConfig {
    /// Blob of one module's settings on `channel`
    pub fn module_blob(&self, module: Module, channel: usize) -> Result<Vec<u8>, DspError> {
        match module {
            Module::Routing => self.routing.to_blob(),
            Module::Crossover => self.channel(channel)?.crossover.to_blob(),
            Module::Eq => self.channel(channel)?.eq.to_blob(),
            Module::Compressor => self.channel(channel)?.compressor.to_blob(),
            Module::Limiter => self.channel(channel)?.limiter.to_blob(),
            Module::Delay => self.channel(channel)?.delay.to_blob(),
            Module::Gain => self.channel(channel)?.gain.to_blob(),
        }
    }

    /// Load one module's settings onto `channel` (mirrored when linked).
    /// Returns the channels whose chain changed, `None` for routing.
    ///
    /// The blob is fully decoded before anything is changed.
    pub fn load_module_blob(
        &mut self,
        module: Module,
        channel: usize,
        bytes: &[u8],
    ) -> Result<Option<Targets>, DspError> {
        if module != Module::Routing {
            self.targets(channel)?;
        }
        let targets = match module {
            Module::Routing => {
                self.set_routing(RoutingConfig::from_blob(bytes)?);
                return Ok(None);
            }
            Module::Crossover => self.set_crossover(channel, CrossoverConfig::from_blob(bytes)?)?,
            Module::Eq => self.set_eq(channel, EqConfig::from_blob(bytes)?)?,
            Module::Compressor => self.set_compressor(channel, CompressorConfig::from_blob(bytes)?)?,
            Module::Limiter => self.set_limiter(channel, LimiterConfig::from_blob(bytes)?)?,
            Module::Delay => self.set_delay(channel, DelayConfig::from_blob(bytes)?)?,
            Module::Gain => self.set_gain(channel, GainConfig::from_blob(bytes)?)?,
        };
        Ok(Some(targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::BandType;
    use crate::eq::Band;
    use crate::gain::ClipMode;
    use crate::routing::Source;

    #[test]
    fn test_blob_header() {
        let blob = CrossoverConfig::highpass(120.0).to_blob().unwrap();
        assert_eq!(&blob[..4], b"XOVR");
        assert_eq!(blob[4], BLOB_VERSION);
    }

    #[test]
    fn test_blob_layout_is_fixed() {
        let a = CompressorConfig::default().to_blob().unwrap();
        let mut config = CompressorConfig::default();
        config.threshold_db = -42.5;
        config.enabled = true;
        let b = config.to_blob().unwrap();
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn test_clip_mode_keeps_blob_length() {
        let hard = GainConfig::default();
        let soft = GainConfig {
            clip: ClipMode::soft(),
            ..hard
        };
        let hard_blob = hard.to_blob().unwrap();
        let soft_blob = soft.to_blob().unwrap();
        assert_eq!(hard_blob.len(), soft_blob.len());
        assert_eq!(GainConfig::from_blob(&soft_blob).unwrap(), soft);
        assert_eq!(GainConfig::from_blob(&hard_blob).unwrap(), hard);

        let mut config = PipelineConfig::default();
        let plain = config.to_blob().unwrap();
        config.set_gain(0, soft).unwrap();
        config.set_stereo_link(1, false).unwrap();
        config.set_source(2, Source::Mix).unwrap();
        config.set_eq_band(3, 4, Band::new(BandType::HighShelf, 8000.0, 0.7)).unwrap();
        config.set_crossover(3, CrossoverConfig::bandpass(40.0, 120.0)).unwrap();
        assert_eq!(config.to_blob().unwrap().len(), plain.len());
    }

    #[test]
    fn test_pipeline_blob_survives_link_edits() {
        let mut config = PipelineConfig::default();
        config.set_stereo_link(0, false).unwrap();
        config.set_crossover(1, CrossoverConfig::highpass(300.0)).unwrap();
        config
            .set_gain(1, GainConfig {
                gain_db: -3.0,
                clip: ClipMode::soft(),
                ..GainConfig::default()
            })
            .unwrap();
        let blob = config.to_blob().unwrap();
        assert_eq!(PipelineConfig::from_blob(&blob).unwrap(), config);

        let mut routing = config.routing;
        routing.stereo_link[0] = true;
        config.set_routing(routing);
        let blob = config.to_blob().unwrap();
        assert_eq!(PipelineConfig::from_blob(&blob).unwrap(), config);

        config.set_stereo_link(1, false).unwrap();
        config.set_compressor(3, CompressorConfig::default()).unwrap();
        config.set_stereo_link(1, true).unwrap();
        let blob = config.to_blob().unwrap();
        assert_eq!(PipelineConfig::from_blob(&blob).unwrap(), config);
    }

    #[test]
    fn test_pipeline_blob_restores_config() {
        let mut config = PipelineConfig::default();
        config.set_crossover(2, CrossoverConfig::bandpass(40.0, 120.0)).unwrap();
        config.set_eq_settings(0, -3.0, true).unwrap();

        let blob = config.to_blob().unwrap();
        assert_eq!(PipelineConfig::from_blob(&blob).unwrap(), config);
    }

    #[test]
    fn test_rejects_wrong_tag() {
        let blob = EqConfig::default().to_blob().unwrap();
        assert_eq!(
            CrossoverConfig::from_blob(&blob),
            Err(DspError::BlobTagMismatch {
                expected: *b"XOVR",
                found: *b"PEQ ",
            })
        );
    }

    #[test]
    fn test_rejects_bad_version_and_length() {
        let mut blob = DelayConfig::default().to_blob().unwrap();
        blob[4] = 9;
        assert_eq!(DelayConfig::from_blob(&blob), Err(DspError::BlobVersion(9)));

        assert!(matches!(
            DelayConfig::from_blob(b"DLA"),
            Err(DspError::InvalidBlob(_))
        ));

        let blob = DelayConfig::default().to_blob().unwrap();
        assert!(matches!(
            DelayConfig::from_blob(&blob[..blob.len() - 1]),
            Err(DspError::InvalidBlob(_))
        ));

        let mut long = blob.clone();
        long.push(0);
        assert!(matches!(
            DelayConfig::from_blob(&long),
            Err(DspError::InvalidBlob(_))
        ));
    }

    #[test]
    fn test_loaded_values_are_clamped() {
        let mut limiter = LimiterConfig::default();
        limiter.threshold_db = -30.0;
        limiter.lookahead_ms = 50.0;
        let blob = limiter.to_blob().unwrap();

        let loaded = LimiterConfig::from_blob(&blob).unwrap();
        assert_eq!(loaded.threshold_db, -6.0);
        assert_eq!(loaded.lookahead_ms, 5.0);
    }

    #[test]
    fn test_module_blob_copies_between_channels() {
        let mut config = PipelineConfig::default();
        config.set_stereo_link(1, false).unwrap();

        let blob = config.module_blob(Module::Crossover, 0).unwrap();
        let targets = config.load_module_blob(Module::Crossover, 3, &blob).unwrap();
        assert_eq!(targets.map(|t| t.partner), Some(None));
        assert_eq!(config.channels[3].crossover, config.channels[0].crossover);
        assert_ne!(config.channels[2].crossover, config.channels[0].crossover);
    }

    #[test]
    fn test_module_blob_errors_leave_config_untouched() {
        let mut config = PipelineConfig::default();
        let before = config;
        let blob = config.module_blob(Module::Eq, 0).unwrap();

        assert_eq!(
            config.module_blob(Module::Eq, 4),
            Err(DspError::InvalidChannel(4))
        );
        assert_eq!(
            config.load_module_blob(Module::Eq, 7, &blob),
            Err(DspError::InvalidChannel(7))
        );
        assert!(config.load_module_blob(Module::Limiter, 0, &blob).is_err());
        assert_eq!(config, before);
    }

    #[test]
    fn test_routing_blob_ignores_channel() {
        let mut config = PipelineConfig::default();
        let mut routing = RoutingConfig::default();
        routing.mute = [false, false, true, true];
        let blob = routing.to_blob().unwrap();

        assert_eq!(config.load_module_blob(Module::Routing, 99, &blob), Ok(None));
        assert!(config.channels[3].gain.muted);
        assert_eq!(config.module_blob(Module::Routing, 99).unwrap(), blob);
    }
}
