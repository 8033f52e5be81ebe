//! Built-in Presets
//!
//! Speaker topologies (routing plus crossover for all four outputs) and
//! compressor characters.

use serde::{Deserialize, Serialize};

use crate::compressor::CompressorConfig;
use crate::config::PipelineConfig;
use crate::crossover::CrossoverConfig;
use crate::design::FilterResponse;
use crate::routing::Source;

/// Common four-output speaker layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    /// Stereo satellites above 80 Hz, stereo subs below
    TwoWay,
    /// Mid/high section of a stereo 3-way: tweeters above 2.5 kHz on
    /// OUT1/OUT2, mids 250 Hz - 2.5 kHz on OUT3/OUT4. No output carries the
    /// woofer band; the woofers need their own low-pass and amplifier.
    ThreeWay,
    /// Gently rolled-off stereo mains plus a mono-summed subwoofer pair
    SubPlusFullRange,
    /// Stereo bi-amped monitors split at 1.2 kHz
    BiAmp,
    /// One mono tri-amped speaker plus subwoofer
    TriAmp,
}

/// List of built-in topologies
pub const TOPOLOGIES: &[Topology] = &[
    Topology::TwoWay,
    Topology::ThreeWay,
    Topology::SubPlusFullRange,
    Topology::BiAmp,
    Topology::TriAmp,
];

impl Topology {
    pub fn name(self) -> &'static str {
        match self {
            Self::TwoWay => "2-Way 80 Hz",
            Self::ThreeWay => "3-Way Mid/High",
            Self::SubPlusFullRange => "Subwoofer + Full Range",
            Self::BiAmp => "Bi-Amp 1.2 kHz",
            Self::TriAmp => "Tri-Amp + Sub",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        TOPOLOGIES.iter().copied().find(|t| t.name() == name)
    }

    /// Routing sources, stereo links and per-channel crossovers
    fn layout(self) -> ([Source; 4], [bool; 2], [CrossoverConfig; 4]) {
        const STEREO: [Source; 4] = [Source::In1, Source::In2, Source::In1, Source::In2];

        match self {
            Self::TwoWay => (
                STEREO,
                [true, true],
                [
                    CrossoverConfig::highpass(80.0),
                    CrossoverConfig::highpass(80.0),
                    CrossoverConfig::lowpass(80.0),
                    CrossoverConfig::lowpass(80.0),
                ],
            ),
            Self::ThreeWay => (
                STEREO,
                [true, true],
                [
                    CrossoverConfig::highpass(2500.0),
                    CrossoverConfig::highpass(2500.0),
                    CrossoverConfig::bandpass(250.0, 2500.0),
                    CrossoverConfig::bandpass(250.0, 2500.0),
                ],
            ),
            Self::SubPlusFullRange => {
                let mains = CrossoverConfig::highpass(80.0).with_response(FilterResponse::Butterworth, 2);
                let sub = CrossoverConfig::lowpass(80.0).with_response(FilterResponse::Butterworth, 4);
                (
                    [Source::In1, Source::In2, Source::MonoSum, Source::MonoSum],
                    [true, true],
                    [mains, mains, sub, sub],
                )
            }
            Self::BiAmp => (
                STEREO,
                [true, true],
                [
                    CrossoverConfig::highpass(1200.0),
                    CrossoverConfig::highpass(1200.0),
                    CrossoverConfig::lowpass(1200.0),
                    CrossoverConfig::lowpass(1200.0),
                ],
            ),
            Self::TriAmp => (
                [Source::MonoSum; 4],
                [false, false],
                [
                    CrossoverConfig::highpass(3000.0),
                    CrossoverConfig::bandpass(500.0, 3000.0),
                    CrossoverConfig::bandpass(80.0, 500.0),
                    CrossoverConfig::lowpass(80.0),
                ],
            ),
        }
    }

    /// Rewrite routing sources, links and crossovers; EQ, dynamics, delay,
    /// gain, mutes and input gains are kept.
    pub fn apply(self, config: &mut PipelineConfig) {
        let (sources, links, crossovers) = self.layout();
        config.routing.sources = sources;
        config.routing.stereo_link = links;
        for (channel, crossover) in config.channels.iter_mut().zip(crossovers) {
            channel.crossover = crossover;
        }
    }

    /// Default pipeline with this topology applied
    pub fn config(self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        self.apply(&mut config);
        config
    }
}

/// Compressor characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressorPreset {
    Gentle,
    Moderate,
    Aggressive,
    Limiting,
    Vocal,
    Bass,
}

impl CompressorPreset {
    /// Enabled compressor settings for this character. Detection mode is
    /// left at the default.
    pub fn config(self) -> CompressorConfig {
        // (threshold, ratio, knee, attack, release, makeup)
        let (threshold_db, ratio, knee_width_db, attack_ms, release_ms, makeup_gain_db) = match self {
            Self::Gentle => (-20.0, 2.0, 10.0, 25.0, 150.0, 3.0),
            Self::Moderate => (-25.0, 4.0, 8.0, 15.0, 120.0, 6.0),
            Self::Aggressive => (-30.0, 8.0, 4.0, 5.0, 80.0, 10.0),
            Self::Limiting => (-3.0, 20.0, 1.0, 0.5, 50.0, 0.0),
            Self::Vocal => (-18.0, 3.0, 6.0, 8.0, 100.0, 4.0),
            Self::Bass => (-25.0, 5.0, 5.0, 10.0, 150.0, 5.0),
        };
        CompressorConfig {
            threshold_db,
            ratio,
            attack_ms,
            release_ms,
            knee_width_db,
            makeup_gain_db,
            enabled: true,
            ..CompressorConfig::default()
        }
    }
}
