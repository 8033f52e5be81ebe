//! Input Routing Matrix
//!
//! Maps the two inputs onto the four output chains. Each output picks a
//! [`Source`]; the matrix folds source choice, mix ratio, per-input gain and
//! the global mono-sum switch into one pair of weights per output, so
//! routing costs two multiply-adds per output sample.

use serde::{Deserialize, Serialize};

use crate::error::DspError;
use crate::level::clamp_param;

pub const INPUT_CHANNELS: usize = 2;
pub const OUTPUT_CHANNELS: usize = 4;
/// Output pairs that can be stereo-linked: (0, 1) and (2, 3)
pub const STEREO_PAIRS: usize = OUTPUT_CHANNELS / 2;
pub const MAX_INPUT_GAIN: f32 = 4.0;

/// Signal source for one output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    /// Hard silence
    Silence,
    In1,
    In2,
    /// `ratio * IN1 + (1 - ratio) * IN2`
    Mix,
    /// `(IN1 + IN2) / 2`
    MonoSum,
    /// Raw IN1, unaffected by the global mono-sum switch
    LeftTap,
    /// Raw IN2, unaffected by the global mono-sum switch
    RightTap,
}

impl Source {
    /// Source a stereo-linked partner channel receives
    pub fn mirrored(self) -> Self {
        match self {
            Self::In1 => Self::In2,
            Self::In2 => Self::In1,
            Self::LeftTap => Self::RightTap,
            Self::RightTap => Self::LeftTap,
            other => other,
        }
    }
}

/// Partner of `channel` within its stereo pair
#[inline]
pub fn partner_of(channel: usize) -> usize {
    channel ^ 1
}

/// Routing configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub sources: [Source; OUTPUT_CHANNELS],
    /// Weight of IN1 for [`Source::Mix`], 0.0 - 1.0
    pub mix_ratio: [f32; OUTPUT_CHANNELS],
    /// Linear gain per input, 0.0 - 4.0
    pub input_gain: [f32; INPUT_CHANNELS],
    pub mute: [bool; OUTPUT_CHANNELS],
    pub stereo_link: [bool; STEREO_PAIRS],
    /// Fold both inputs to mono before source selection
    pub mono_sum: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            sources: [Source::In1, Source::In2, Source::In1, Source::In2],
            mix_ratio: [0.5; OUTPUT_CHANNELS],
            input_gain: [1.0; INPUT_CHANNELS],
            mute: [false; OUTPUT_CHANNELS],
            stereo_link: [true; STEREO_PAIRS],
            mono_sum: false,
        }
    }
}

impl RoutingConfig {
    fn check_channel(channel: usize) -> Result<(), DspError> {
        if channel < OUTPUT_CHANNELS {
            Ok(())
        } else {
            Err(DspError::InvalidChannel(channel))
        }
    }

    /// Linked partner of `channel`, if its pair is linked
    pub fn linked_partner(&self, channel: usize) -> Option<usize> {
        (channel < OUTPUT_CHANNELS && self.stereo_link[channel / 2]).then(|| partner_of(channel))
    }

    pub fn set_source(&mut self, channel: usize, source: Source) -> Result<(), DspError> {
        Self::check_channel(channel)?;
        self.sources[channel] = source;
        if let Some(partner) = self.linked_partner(channel) {
            self.sources[partner] = source.mirrored();
        }
        Ok(())
    }

    pub fn set_mix_ratio(&mut self, channel: usize, ratio: f32) -> Result<(), DspError> {
        Self::check_channel(channel)?;
        let ratio = clamp_param(ratio, 0.0, 1.0);
        self.mix_ratio[channel] = ratio;
        if let Some(partner) = self.linked_partner(channel) {
            self.mix_ratio[partner] = ratio;
        }
        Ok(())
    }

    pub fn set_mute(&mut self, channel: usize, muted: bool) -> Result<(), DspError> {
        Self::check_channel(channel)?;
        self.mute[channel] = muted;
        if let Some(partner) = self.linked_partner(channel) {
            self.mute[partner] = muted;
        }
        Ok(())
    }

    pub fn set_input_gain(&mut self, input: usize, gain: f32) -> Result<(), DspError> {
        if input >= INPUT_CHANNELS {
            return Err(DspError::InvalidInputIndex(input));
        }
        self.input_gain[input] = clamp_param(gain, 0.0, MAX_INPUT_GAIN);
        Ok(())
    }

    /// Link or unlink an output pair. Linking copies the even channel's
    /// routing onto the odd one.
    pub fn set_stereo_link(&mut self, pair: usize, linked: bool) -> Result<(), DspError> {
        if pair >= STEREO_PAIRS {
            return Err(DspError::InvalidPairIndex(pair));
        }
        self.stereo_link[pair] = linked;
        if linked {
            let (left, right) = (pair * 2, pair * 2 + 1);
            self.sources[right] = self.sources[left].mirrored();
            self.mix_ratio[right] = self.mix_ratio[left];
            self.mute[right] = self.mute[left];
        }
        Ok(())
    }

    pub fn set_mono_sum(&mut self, enabled: bool) {
        self.mono_sum = enabled;
    }

    /// Clamp every field into range (used after loading a blob)
    pub fn sanitized(mut self) -> Self {
        for ratio in &mut self.mix_ratio {
            *ratio = clamp_param(*ratio, 0.0, 1.0);
        }
        for gain in &mut self.input_gain {
            *gain = clamp_param(*gain, 0.0, MAX_INPUT_GAIN);
        }
        self
    }

    /// (IN1, IN2) weights for one output
    fn weights(&self, channel: usize) -> (f32, f32) {
        let ratio = self.mix_ratio[channel];
        let (w1, w2) = match (self.sources[channel], self.mono_sum) {
            (Source::Silence, _) => (0.0, 0.0),
            (Source::MonoSum, _) => (0.5, 0.5),
            (Source::In1 | Source::In2 | Source::Mix, true) => (0.5, 0.5),
            (Source::In1, false) | (Source::LeftTap, _) => (1.0, 0.0),
            (Source::In2, false) | (Source::RightTap, _) => (0.0, 1.0),
            (Source::Mix, false) => (ratio, 1.0 - ratio),
        };
        (w1 * self.input_gain[0], w2 * self.input_gain[1])
    }
}

/// Real-time routing stage
#[derive(Debug, Clone)]
pub struct RoutingMatrix {
    config: RoutingConfig,
    weights: [(f32, f32); OUTPUT_CHANNELS],
}

impl RoutingMatrix {
    pub fn new(config: RoutingConfig) -> Self {
        let mut matrix = Self {
            config,
            weights: [(0.0, 0.0); OUTPUT_CHANNELS],
        };
        matrix.set_config(config);
        matrix
    }

    /// Install a new routing. Arithmetic only, safe at a block boundary.
    pub fn set_config(&mut self, config: RoutingConfig) {
        let config = config.sanitized();
        self.weights = core::array::from_fn(|ch| config.weights(ch));
        self.config = config;
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Route one input sample pair to the four outputs
    #[inline]
    pub fn route(&self, in1: f32, in2: f32) -> [f32; OUTPUT_CHANNELS] {
        core::array::from_fn(|ch| {
            let (w1, w2) = self.weights[ch];
            w1 * in1 + w2 * in2
        })
    }

    /// Route planar input blocks into the four output blocks
    ///
    /// Processes `min` of all buffer lengths.
    #[inline]
    pub fn process(&self, inputs: [&[f32]; INPUT_CHANNELS], outputs: &mut [&mut [f32]; OUTPUT_CHANNELS]) {
        for (ch, out) in outputs.iter_mut().enumerate() {
            let (w1, w2) = self.weights[ch];
            for ((o, &a), &b) in out.iter_mut().zip(inputs[0]).zip(inputs[1]) {
                *o = w1 * a + w2 * b;
            }
        }
    }
}

impl Default for RoutingMatrix {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routing() {
        let matrix = RoutingMatrix::default();
        assert_eq!(matrix.route(0.3, -0.6), [0.3, -0.6, 0.3, -0.6]);
        assert!(matrix.config().stereo_link.iter().all(|&l| l));
    }

    #[test]
    fn test_mix_half_cancels_opposite_inputs() {
        let mut config = RoutingConfig::default();
        config.set_source(0, Source::Mix).unwrap();
        config.set_mix_ratio(0, 0.5).unwrap();
        let matrix = RoutingMatrix::new(config);
        assert_eq!(matrix.route(1.0, -1.0)[0], 0.0);
    }

    #[test]
    fn test_mix_ratio_weights() {
        let mut config = RoutingConfig::default();
        config.stereo_link = [false; STEREO_PAIRS];
        config.set_source(2, Source::Mix).unwrap();
        config.set_mix_ratio(2, 0.75).unwrap();
        let matrix = RoutingMatrix::new(config);
        assert!((matrix.route(1.0, 0.0)[2] - 0.75).abs() < 1e-7);
        assert!((matrix.route(0.0, 1.0)[2] - 0.25).abs() < 1e-7);
    }

    #[test]
    fn test_silence_and_mono_sum_sources() {
        let mut config = RoutingConfig::default();
        config.stereo_link = [false; STEREO_PAIRS];
        config.set_source(0, Source::Silence).unwrap();
        config.set_source(1, Source::MonoSum).unwrap();
        let matrix = RoutingMatrix::new(config);
        let out = matrix.route(0.8, 0.2);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 0.5).abs() < 1e-7);
    }

    #[test]
    fn test_global_mono_sum_spares_taps() {
        let mut config = RoutingConfig::default();
        config.stereo_link = [false; STEREO_PAIRS];
        config.set_mono_sum(true);
        config.set_source(2, Source::LeftTap).unwrap();
        config.set_source(3, Source::RightTap).unwrap();
        let matrix = RoutingMatrix::new(config);
        let out = matrix.route(1.0, 0.0);
        assert_eq!(out[0], 0.5);
        assert_eq!(out[1], 0.5);
        assert_eq!(out[2], 1.0);
        assert_eq!(out[3], 0.0);
    }

    #[test]
    fn test_input_gain_applied_before_mix() {
        let mut config = RoutingConfig::default();
        config.set_input_gain(0, 2.0).unwrap();
        let matrix = RoutingMatrix::new(config);
        assert_eq!(matrix.route(0.25, 0.25), [0.5, 0.25, 0.5, 0.25]);
    }

    #[test]
    fn test_stereo_link_mirrors_source_mix_and_mute() {
        let mut config = RoutingConfig::default();
        config.set_source(2, Source::LeftTap).unwrap();
        assert_eq!(config.sources[3], Source::RightTap);

        config.set_mix_ratio(1, 0.2).unwrap();
        assert_eq!(config.mix_ratio[0], 0.2);

        config.set_mute(3, true).unwrap();
        assert!(config.mute[2]);
        assert!(!config.mute[0]);
    }

    #[test]
    fn test_unlinked_pair_is_independent() {
        let mut config = RoutingConfig::default();
        config.set_stereo_link(0, false).unwrap();
        config.set_source(0, Source::MonoSum).unwrap();
        assert_eq!(config.sources[1], Source::In2);
        assert_eq!(config.linked_partner(0), None);
        assert_eq!(config.linked_partner(2), Some(3));
    }

    #[test]
    fn test_linking_copies_even_channel() {
        let mut config = RoutingConfig::default();
        config.set_stereo_link(1, false).unwrap();
        config.set_source(2, Source::MonoSum).unwrap();
        config.set_mute(2, true).unwrap();
        config.set_stereo_link(1, true).unwrap();
        assert_eq!(config.sources[3], Source::MonoSum);
        assert!(config.mute[3]);
    }

    #[test]
    fn test_invalid_indices_leave_config_untouched() {
        let mut config = RoutingConfig::default();
        let before = config;
        assert_eq!(config.set_source(4, Source::In2), Err(DspError::InvalidChannel(4)));
        assert_eq!(config.set_input_gain(2, 1.0), Err(DspError::InvalidInputIndex(2)));
        assert_eq!(config.set_stereo_link(2, false), Err(DspError::InvalidPairIndex(2)));
        assert_eq!(config, before);
    }

    #[test]
    fn test_clamp_idempotence() {
        let mut config = RoutingConfig::default();
        config.set_input_gain(1, 10.0).unwrap();
        assert_eq!(config.input_gain[1], MAX_INPUT_GAIN);
        let snapshot = config;
        config.set_input_gain(1, config.input_gain[1]).unwrap();
        assert_eq!(config, snapshot);

        config.set_mix_ratio(0, -3.0).unwrap();
        assert_eq!(config.mix_ratio[0], 0.0);
    }

    #[test]
    fn test_planar_process_matches_route() {
        let matrix = RoutingMatrix::default();
        let in1 = [0.1, 0.2, 0.3];
        let in2 = [-0.1, -0.2, -0.3];
        let mut o0 = [0.0; 3];
        let mut o1 = [0.0; 3];
        let mut o2 = [0.0; 3];
        let mut o3 = [0.0; 3];
        let mut outputs = [&mut o0[..], &mut o1[..], &mut o2[..], &mut o3[..]];
        matrix.process([&in1, &in2], &mut outputs);
        assert_eq!(o0, in1);
        assert_eq!(o3, in2);
    }
}
