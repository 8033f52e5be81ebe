//! Message Types for Thread Communication
//!
//! Commands flow from the control thread -> audio thread through a
//! lock-free SPSC ring. Every command is `Copy` and already carries its
//! designed coefficients, so installing one never allocates and never
//! touches a transcendental function.

use xover_dsp::{
    AudioPipeline, Band, BiquadCoefficients, ChannelConfig, ChannelDesign, CompressorConfig,
    CompressorDesign, CrossoverConfig, CrossoverDesign, DelayConfig, EqConfig, EqDesign, GainConfig,
    LimiterConfig, LimiterDesign, RoutingConfig,
};

/// Precomputed parameter update for the audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(clippy::large_enum_variant)] // moved through the ring by value, never boxed
pub enum Command {
    /// Replace the routing matrix (sources, mixes, mutes, links, input gains)
    Routing(RoutingConfig),

    /// Replace a whole channel chain and clear its state
    Channel {
        channel: usize,
        config: ChannelConfig,
        design: ChannelDesign,
    },

    Crossover {
        channel: usize,
        config: CrossoverConfig,
        design: CrossoverDesign,
    },

    Eq {
        channel: usize,
        config: EqConfig,
        design: EqDesign,
    },

    /// Replace a single EQ band; only that band's filter state is cleared
    EqBand {
        channel: usize,
        band_index: usize,
        band: Band,
        coefficients: BiquadCoefficients,
    },

    /// EQ pre-gain and enable flag
    EqSettings {
        channel: usize,
        pre_gain_db: f32,
        enabled: bool,
        pre_gain_linear: f32,
    },

    Compressor {
        channel: usize,
        config: CompressorConfig,
        design: CompressorDesign,
    },

    Limiter {
        channel: usize,
        config: LimiterConfig,
        design: LimiterDesign,
    },

    Delay { channel: usize, config: DelayConfig },

    Gain { channel: usize, config: GainConfig },

    /// Clear all delay lines (alignment changes without stale tails)
    FlushDelays,

    /// Clear every filter, detector and delay state
    Reset,
}

impl Command {
    /// Install this update. Real-time safe.
    #[inline]
    pub fn apply(&self, pipeline: &mut AudioPipeline) {
        match *self {
            Self::Routing(routing) => pipeline.apply_routing(routing),
            Self::Channel {
                channel,
                config,
                ref design,
            } => pipeline.apply_channel(channel, config, design),
            Self::Crossover {
                channel,
                config,
                ref design,
            } => pipeline.apply_crossover(channel, config, design),
            Self::Eq {
                channel,
                config,
                ref design,
            } => pipeline.apply_eq(channel, config, design),
            Self::EqBand {
                channel,
                band_index,
                band,
                coefficients,
            } => pipeline.apply_eq_band(channel, band_index, band, coefficients),
            Self::EqSettings {
                channel,
                pre_gain_db,
                enabled,
                pre_gain_linear,
            } => pipeline.apply_eq_settings(channel, pre_gain_db, enabled, pre_gain_linear),
            Self::Compressor {
                channel,
                config,
                ref design,
            } => pipeline.apply_compressor(channel, config, design),
            Self::Limiter {
                channel,
                config,
                ref design,
            } => pipeline.apply_limiter(channel, config, design),
            Self::Delay { channel, config } => pipeline.apply_delay(channel, config),
            Self::Gain { channel, config } => pipeline.apply_gain(channel, config),
            Self::FlushDelays => pipeline.flush_delays(),
            Self::Reset => pipeline.reset(),
        }
    }

    /// Short label for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Routing(_) => "routing",
            Self::Channel { .. } => "channel",
            Self::Crossover { .. } => "crossover",
            Self::Eq { .. } => "eq",
            Self::EqBand { .. } => "eq_band",
            Self::EqSettings { .. } => "eq_settings",
            Self::Compressor { .. } => "compressor",
            Self::Limiter { .. } => "limiter",
            Self::Delay { .. } => "delay",
            Self::Gain { .. } => "gain",
            Self::FlushDelays => "flush_delays",
            Self::Reset => "reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xover_dsp::{CrossoverMode, Source};

    const FS: f32 = 48000.0;

    #[test]
    fn test_command_is_copy() {
        let command = Command::FlushDelays;
        let copy = command;
        assert_eq!(command, copy);
        assert_eq!(copy.name(), "flush_delays");
    }

    #[test]
    fn test_apply_crossover() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        let config = CrossoverConfig::bandpass(200.0, 2000.0);
        let design = CrossoverDesign::compute(&config, FS).unwrap();

        Command::Crossover {
            channel: 2,
            config,
            design,
        }
        .apply(&mut pipeline);

        let installed = pipeline.channel(2).unwrap().crossover().config();
        assert_eq!(installed.mode, CrossoverMode::BandPass);
        assert_eq!(pipeline.config().channels[2].crossover, config);
        // The partner is only touched by its own command
        assert_eq!(
            pipeline.channel(3).unwrap().crossover().config().mode,
            CrossoverMode::LowPass
        );
    }

    #[test]
    fn test_apply_routing_syncs_mutes() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        let mut routing = RoutingConfig::default();
        routing.mute[1] = true;
        routing.sources[0] = Source::MonoSum;

        Command::Routing(routing).apply(&mut pipeline);
        assert!(pipeline.channel(1).unwrap().gain().is_muted());
        assert_eq!(pipeline.config().routing.sources[0], Source::MonoSum);
    }

    #[test]
    fn test_apply_channel_replaces_chain() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        let mut config = ChannelConfig::default();
        config.crossover = CrossoverConfig::highpass(500.0);
        config.delay.set_delay_ms(1.0);
        let design = ChannelDesign::compute(&config, FS).unwrap();

        Command::Channel {
            channel: 0,
            config,
            design,
        }
        .apply(&mut pipeline);
        assert_eq!(pipeline.config().channels[0], config);
        assert_eq!(pipeline.channel(0).unwrap().delay().delay_samples(), 48.0);
    }

    #[test]
    fn test_out_of_range_channel_is_ignored() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        let before = *pipeline.config();
        Command::Gain {
            channel: 9,
            config: GainConfig::default(),
        }
        .apply(&mut pipeline);
        assert_eq!(*pipeline.config(), before);
    }
}
