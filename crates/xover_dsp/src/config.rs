//! Pipeline Configuration Model
//!
//! Plain-data description of the whole four-output path. Every setter
//! validates indices before touching anything, clamps values, and mirrors
//! the change onto the linked partner channel. Delay and polarity are never
//! mirrored; they belong to the individual driver.

use serde::{Deserialize, Serialize};

use crate::compressor::CompressorConfig;
use crate::crossover::{CrossoverConfig, DEFAULT_CROSSOVER_HZ};
use crate::delay::DelayConfig;
use crate::eq::{Band, EqConfig, PEQ_BANDS};
use crate::error::DspError;
use crate::gain::GainConfig;
use crate::limiter::LimiterConfig;
use crate::routing::{partner_of, RoutingConfig, Source, OUTPUT_CHANNELS, STEREO_PAIRS};

/// Settings of one output channel chain
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub crossover: CrossoverConfig,
    pub eq: EqConfig,
    pub compressor: CompressorConfig,
    pub limiter: LimiterConfig,
    pub delay: DelayConfig,
    pub gain: GainConfig,
}

impl ChannelConfig {
    pub fn sanitized(self) -> Self {
        Self {
            crossover: self.crossover.sanitized(),
            eq: self.eq.sanitized(),
            compressor: self.compressor.sanitized(),
            limiter: self.limiter.sanitized(),
            delay: self.delay.sanitized(),
            gain: self.gain.sanitized(),
        }
    }

    /// Equal apart from the mute flag, which follows the routing
    pub fn same_processing(&self, other: &ChannelConfig) -> bool {
        let mut this = *self;
        this.gain.muted = other.gain.muted;
        this == *other
    }

    /// Copy everything a stereo link shares (all but delay and polarity)
    fn link_from(&mut self, other: &ChannelConfig) {
        self.crossover = other.crossover;
        self.eq = other.eq;
        self.compressor = other.compressor;
        self.limiter = other.limiter;
        self.gain = other.gain;
    }
}

/// The channel a change was addressed to and, when linked, its partner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Targets {
    pub channel: usize,
    pub partner: Option<usize>,
}

impl Targets {
    /// Every affected channel, addressed channel first
    pub fn iter(self) -> impl Iterator<Item = usize> {
        std::iter::once(self.channel).chain(self.partner)
    }

    fn single(channel: usize) -> Self {
        Self {
            channel,
            partner: None,
        }
    }
}

/// Complete configuration: routing plus four channel chains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub routing: RoutingConfig,
    pub channels: [ChannelConfig; OUTPUT_CHANNELS],
}

impl Default for PipelineConfig {
    /// Satellites on OUT1/OUT2 (high-pass), subwoofer on OUT3/OUT4
    /// (low-pass), both at 80 Hz LR4. Keeps tweeters safe at power-up.
    fn default() -> Self {
        let mut channels = [ChannelConfig::default(); OUTPUT_CHANNELS];
        channels[0].crossover = CrossoverConfig::highpass(DEFAULT_CROSSOVER_HZ);
        channels[1].crossover = CrossoverConfig::highpass(DEFAULT_CROSSOVER_HZ);
        channels[2].crossover = CrossoverConfig::lowpass(DEFAULT_CROSSOVER_HZ);
        channels[3].crossover = CrossoverConfig::lowpass(DEFAULT_CROSSOVER_HZ);
        Self {
            routing: RoutingConfig::default(),
            channels,
        }
    }
}

impl PipelineConfig {
    fn check_channel(channel: usize) -> Result<(), DspError> {
        if channel < OUTPUT_CHANNELS {
            Ok(())
        } else {
            Err(DspError::InvalidChannel(channel))
        }
    }

    /// Channels affected by a linked change to `channel`
    pub fn targets(&self, channel: usize) -> Result<Targets, DspError> {
        Self::check_channel(channel)?;
        Ok(Targets {
            channel,
            partner: self.routing.linked_partner(channel),
        })
    }

    pub fn channel(&self, channel: usize) -> Result<&ChannelConfig, DspError> {
        Self::check_channel(channel)?;
        Ok(&self.channels[channel])
    }

    /// Replace the routing; mutes are copied into the gain stages. Every
    /// linked pair takes the even channel's processing, as with
    /// [`set_stereo_link`](Self::set_stereo_link).
    pub fn set_routing(&mut self, routing: RoutingConfig) {
        self.routing = routing.sanitized();
        self.link_pairs();
        self.sync_mutes();
    }

    /// Mute or unmute an output (and its linked partner)
    pub fn set_mute(&mut self, channel: usize, muted: bool) -> Result<Targets, DspError> {
        let targets = self.targets(channel)?;
        self.routing.set_mute(channel, muted)?;
        self.sync_mutes();
        Ok(targets)
    }

    /// Link or unlink an output pair. Linking copies the even channel's
    /// routing and processing onto the odd one, keeping the odd channel's
    /// delay and polarity.
    pub fn set_stereo_link(&mut self, pair: usize, linked: bool) -> Result<Targets, DspError> {
        self.routing.set_stereo_link(pair, linked)?;
        let (left, right) = (pair * 2, pair * 2 + 1);
        if linked {
            let source = self.channels[left];
            self.channels[right].link_from(&source);
        }
        self.sync_mutes();
        Ok(Targets {
            channel: left,
            partner: Some(right),
        })
    }

    pub fn set_crossover(&mut self, channel: usize, config: CrossoverConfig) -> Result<Targets, DspError> {
        let targets = self.targets(channel)?;
        let config = config.sanitized();
        for ch in targets.iter() {
            self.channels[ch].crossover = config;
        }
        Ok(targets)
    }

    pub fn set_eq(&mut self, channel: usize, config: EqConfig) -> Result<Targets, DspError> {
        let targets = self.targets(channel)?;
        let config = config.sanitized();
        for ch in targets.iter() {
            self.channels[ch].eq = config;
        }
        Ok(targets)
    }

    pub fn set_eq_band(&mut self, channel: usize, band_index: usize, band: Band) -> Result<Targets, DspError> {
        let targets = self.targets(channel)?;
        if band_index >= PEQ_BANDS {
            return Err(DspError::InvalidBandIndex(band_index));
        }
        let band = band.sanitized();
        for ch in targets.iter() {
            self.channels[ch].eq.bands[band_index] = band;
        }
        Ok(targets)
    }

    /// Pre-gain and enable flag of the EQ, leaving the bands alone
    pub fn set_eq_settings(&mut self, channel: usize, pre_gain_db: f32, enabled: bool) -> Result<Targets, DspError> {
        let targets = self.targets(channel)?;
        for ch in targets.iter() {
            let eq = &mut self.channels[ch].eq;
            eq.set_pre_gain_db(pre_gain_db);
            eq.enabled = enabled;
        }
        Ok(targets)
    }

    pub fn set_compressor(&mut self, channel: usize, config: CompressorConfig) -> Result<Targets, DspError> {
        let targets = self.targets(channel)?;
        let config = config.sanitized();
        for ch in targets.iter() {
            self.channels[ch].compressor = config;
        }
        Ok(targets)
    }

    pub fn set_limiter(&mut self, channel: usize, config: LimiterConfig) -> Result<Targets, DspError> {
        let targets = self.targets(channel)?;
        let config = config.sanitized();
        for ch in targets.iter() {
            self.channels[ch].limiter = config;
        }
        Ok(targets)
    }

    /// Delay is per-driver: never mirrored
    pub fn set_delay(&mut self, channel: usize, config: DelayConfig) -> Result<Targets, DspError> {
        Self::check_channel(channel)?;
        self.channels[channel].delay = config.sanitized();
        Ok(Targets::single(channel))
    }

    /// Trim and clip mode. The mute flag always follows the routing mute.
    pub fn set_gain(&mut self, channel: usize, config: GainConfig) -> Result<Targets, DspError> {
        let targets = self.targets(channel)?;
        let config = config.sanitized();
        for ch in targets.iter() {
            self.channels[ch].gain = GainConfig {
                muted: self.routing.mute[ch],
                ..config
            };
        }
        Ok(targets)
    }

    pub fn set_input_gain(&mut self, input: usize, gain: f32) -> Result<(), DspError> {
        self.routing.set_input_gain(input, gain)
    }

    /// Clamp everything, re-establish link mirroring and mute sync
    /// (used after loading a blob)
    pub fn sanitized(mut self) -> Self {
        self.routing = self.routing.sanitized();
        for channel in &mut self.channels {
            *channel = channel.sanitized();
        }
        self.link_pairs();
        self.sync_mutes();
        self
    }

    fn link_pairs(&mut self) {
        for pair in 0..STEREO_PAIRS {
            if self.routing.stereo_link[pair] {
                let source = self.channels[pair * 2];
                self.channels[partner_of(pair * 2)].link_from(&source);
            }
        }
    }

    fn sync_mutes(&mut self) {
        for (channel, &muted) in self.channels.iter_mut().zip(self.routing.mute.iter()) {
            channel.gain.muted = muted;
        }
    }

    pub fn set_source(&mut self, channel: usize, source: Source) -> Result<Targets, DspError> {
        let targets = self.targets(channel)?;
        self.routing.set_source(channel, source)?;
        Ok(targets)
    }

    pub fn set_mix_ratio(&mut self, channel: usize, ratio: f32) -> Result<Targets, DspError> {
        let targets = self.targets(channel)?;
        self.routing.set_mix_ratio(channel, ratio)?;
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crossover::CrossoverMode;
    use crate::design::BandType;

    #[test]
    fn test_default_topology() {
        let config = PipelineConfig::default();
        assert_eq!(config.channels[0].crossover.mode, CrossoverMode::HighPass);
        assert_eq!(config.channels[1].crossover.mode, CrossoverMode::HighPass);
        assert_eq!(config.channels[2].crossover.mode, CrossoverMode::LowPass);
        assert_eq!(config.channels[3].crossover.mode, CrossoverMode::LowPass);
        assert_eq!(config.channels[2].crossover.lowpass_hz, 80.0);
        assert_eq!(config.channels[0].crossover.order, 4);
    }

    #[test]
    fn test_invalid_channel_mutates_nothing() {
        let mut config = PipelineConfig::default();
        let before = config;
        assert_eq!(
            config.set_crossover(4, CrossoverConfig::lowpass(1000.0)),
            Err(DspError::InvalidChannel(4))
        );
        assert_eq!(
            config.set_eq_band(0, 5, Band::new(BandType::Bell, 1000.0, 1.0)),
            Err(DspError::InvalidBandIndex(5))
        );
        assert_eq!(config.set_stereo_link(2, true), Err(DspError::InvalidPairIndex(2)));
        assert_eq!(config, before);
    }

    #[test]
    fn test_linked_pair_mirrors_processing() {
        let mut config = PipelineConfig::default();
        let targets = config
            .set_crossover(1, CrossoverConfig::highpass(120.0))
            .unwrap();
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec![1, 0]);
        assert_eq!(config.channels[0].crossover.highpass_hz, 120.0);

        let mut compressor = CompressorConfig::default();
        compressor.enabled = true;
        config.set_compressor(2, compressor).unwrap();
        assert!(config.channels[3].compressor.enabled);
        assert!(!config.channels[0].compressor.enabled);
    }

    #[test]
    fn test_delay_not_mirrored() {
        let mut config = PipelineConfig::default();
        let mut delay = DelayConfig::default();
        delay.set_delay_ms(2.5);
        delay.phase_invert = true;
        let targets = config.set_delay(0, delay).unwrap();
        assert_eq!(targets.partner, None);
        assert_eq!(config.channels[1].delay, DelayConfig::default());
    }

    #[test]
    fn test_unlinked_pair_independent() {
        let mut config = PipelineConfig::default();
        config.set_stereo_link(1, false).unwrap();
        config
            .set_eq_band(2, 0, Band::new(BandType::LowShelf, 60.0, 0.7).with_gain(6.0))
            .unwrap();
        assert_eq!(config.channels[2].eq.bands[0].gain_db, 6.0);
        assert_eq!(config.channels[3].eq.bands[0].gain_db, 0.0);
    }

    #[test]
    fn test_linking_copies_even_channel() {
        let mut config = PipelineConfig::default();
        config.set_stereo_link(0, false).unwrap();
        config.set_gain(0, GainConfig { gain_db: -6.0, ..GainConfig::default() }).unwrap();
        let mut delay = DelayConfig::default();
        delay.set_delay_ms(1.0);
        config.set_delay(1, delay).unwrap();
        config.set_source(0, Source::LeftTap).unwrap();

        config.set_stereo_link(0, true).unwrap();
        assert_eq!(config.channels[1].gain.gain_db, -6.0);
        assert_eq!(config.channels[1].delay.delay_ms, 1.0);
        assert_eq!(config.routing.sources[1], Source::RightTap);
    }

    #[test]
    fn test_relinking_through_routing_copies_processing() {
        let mut config = PipelineConfig::default();
        config.set_stereo_link(0, false).unwrap();
        config.set_crossover(1, CrossoverConfig::highpass(300.0)).unwrap();
        let mut delay = DelayConfig::default();
        delay.set_delay_ms(0.5);
        config.set_delay(1, delay).unwrap();

        let mut routing = config.routing;
        routing.stereo_link[0] = true;
        config.set_routing(routing);

        assert_eq!(config.channels[1].crossover, config.channels[0].crossover);
        assert_eq!(config.channels[1].delay.delay_ms, 0.5);
        assert_eq!(config.sanitized(), config);
    }

    #[test]
    fn test_mute_synced_into_gain() {
        let mut config = PipelineConfig::default();
        config.set_mute(2, true).unwrap();
        assert!(config.channels[2].gain.muted);
        assert!(config.channels[3].gain.muted);
        assert!(!config.channels[0].gain.muted);

        config.set_gain(3, GainConfig::default()).unwrap();
        assert!(config.channels[3].gain.muted);
    }

    #[test]
    fn test_clamp_idempotence() {
        let mut config = PipelineConfig::default();
        let mut eq = EqConfig::default();
        eq.pre_gain_db = 40.0;
        eq.bands[1].q = 0.0;
        eq.bands[2].frequency = f32::NAN;
        config.set_eq(0, eq).unwrap();

        let once = config;
        let twice = config.sanitized();
        assert_eq!(once.channels[0].eq, twice.channels[0].eq);
        assert_eq!(config.channels[0].eq.pre_gain_db, 12.0);
        assert_eq!(config.channels[0].eq.bands[1].q, 0.1);
        assert_eq!(config.channels[0].eq.bands[2].frequency, 20.0);
    }

    #[test]
    fn test_config_serializes_to_json() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
