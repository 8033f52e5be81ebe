//! Xover Core - Crossover Engine
//!
//! This crate wraps the `xover_dsp` pipeline for use from an audio driver:
//! - Non-real-time control API with clamping, stereo-link mirroring and
//!   coefficient design
//! - Lock-free, allocation-free parameter hand-off to the audio thread
//! - Block-synchronized installs so a channel never runs half-updated
//! - Atomic telemetry (levels, gain reduction, counters) for meters
//! - Preset exchange as tagged blobs or JSON
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Control Thread(s)                       │
//! │   UI / remote ──▶ Controller (shadow config, design coeffs) │
//! └─────────────────────────────────────────────────────────────┘
//!              │ rtrb (Copy commands)      ▲ atomics
//!              ▼                           │ (SharedTelemetry)
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │   drain ──▶ Routing ──▶ 4 × Channel Chain ──▶ OUT1..OUT4    │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod controller;
mod engine;
mod error;
mod message;
mod processor;
mod telemetry;

pub use config::{
    EngineConfig, StreamConfig, MAX_QUEUE_CAPACITY, MIN_QUEUE_CAPACITY, SAMPLE_RATE_RANGE,
};
pub use controller::{Controller, SharedController};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use message::Command;
pub use processor::AudioProcessor;
pub use telemetry::{OutputLevels, SharedTelemetry, TelemetrySnapshot};

// Re-export DSP types for convenience
pub use xover_dsp::{
    Band, BandType, ChannelConfig, CompressorConfig, CompressorPreset, CrossoverConfig, CrossoverMode,
    DelayConfig, DspError, EqConfig, FilterResponse, GainConfig, LimiterConfig, Module, PipelineConfig,
    RoutingConfig, Source, Topology, OUTPUT_CHANNELS, PEQ_BANDS,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Verify public API is accessible
        let _config = EngineConfig::default();
        let (controller, _processor) = Engine::new().unwrap().into_parts();
        assert_eq!(controller.config(), &PipelineConfig::default());
    }
}
