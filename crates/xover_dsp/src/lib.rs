//! Xover DSP - Digital Signal Processing Module
//!
//! This crate provides the audio path of a 2-input / 4-output active
//! crossover, including:
//! - Butterworth, Linkwitz-Riley and Bessel crossover filters (up to 8th order)
//! - 5-band parametric equalizer per output
//! - Soft-knee compressor and lookahead peak limiter
//! - Fractional-sample alignment delay with polarity switch
//! - Routing matrix with stereo linking and mono summing
//! - Tagged configuration blobs and speaker topology presets
//!
//! # Architecture
//!
//! The DSP chain follows a strict "no allocation in audio callback" rule.
//! Every module splits into a plain configuration (clamped, serializable), a
//! `*Design` holding the precomputed coefficients, and the runtime processor
//! that installs a design with `apply` and never does filter math itself.
//! That split lets a control thread design coefficients while the audio
//! thread only swaps them in between blocks.

mod biquad;
mod blob;
mod compressor;
mod config;
mod crossover;
mod delay;
mod design;
mod eq;
mod error;
mod gain;
mod level;
mod limiter;
mod pipeline;
mod presets;
mod processor;
mod routing;
mod soft_clip;

#[cfg(test)]
mod test_utils;

pub use self::biquad::{Biquad, BiquadCoefficients, BiquadState, Cascade, CascadeCoefficients, MAX_SECTIONS};
pub use blob::{ConfigBlob, Module, BLOB_VERSION};
pub use compressor::{
    Compressor, CompressorConfig, CompressorDesign, CompressorPhase, DetectionMode, RMS_WINDOW,
};
pub use config::{ChannelConfig, PipelineConfig, Targets};
pub use crossover::{Crossover, CrossoverConfig, CrossoverDesign, CrossoverMode, DEFAULT_CROSSOVER_HZ};
pub use delay::{
    speed_of_sound, DelayConfig, DelayLine, DistanceUnit, Interpolation, DELAY_BUFFER_LEN, MAX_DELAY_MS,
};
pub use design::{
    design_band, design_pass, BandType, FilterResponse, PassKind, MAX_FREQUENCY_HZ, MAX_ORDER, MAX_Q,
    MAX_SAMPLE_RATE, MIN_FREQUENCY_HZ, MIN_ORDER, MIN_Q, MIN_SAMPLE_RATE,
};
pub use eq::{Band, EqConfig, EqDesign, ParametricEq, PEQ_BANDS};
pub use error::DspError;
pub use gain::{ClipMode, GainConfig, GainStage};
pub use level::{db_to_linear, linear_to_db, LevelMeter, SILENCE_DB};
pub use limiter::{Limiter, LimiterConfig, LimiterDesign, LOOKAHEAD_BUFFER_LEN};
pub use pipeline::{
    AudioFrame, AudioPipeline, ChannelDesign, ChannelMeter, ChannelPipeline, InputFrame, OutputFrame,
    MAX_FRAME_LEN,
};
pub use presets::{CompressorPreset, Topology, TOPOLOGIES};
pub use processor::ChannelProcessor;
pub use routing::{RoutingConfig, RoutingMatrix, Source, INPUT_CHANNELS, OUTPUT_CHANNELS, STEREO_PAIRS};
pub use soft_clip::SoftClipper;
