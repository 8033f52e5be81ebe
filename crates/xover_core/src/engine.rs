//! Engine construction
//!
//! Builds the matched pair of halves: a [`Controller`] for the control side
//! and an [`AudioProcessor`] to be moved into the audio callback. They share
//! only the command queue and the telemetry block.

use std::sync::Arc;

use rtrb::RingBuffer;
use tracing::info;
use xover_dsp::{AudioPipeline, PipelineConfig};

use crate::config::EngineConfig;
use crate::controller::Controller;
use crate::error::{EngineError, EngineResult};
use crate::processor::AudioProcessor;
use crate::telemetry::SharedTelemetry;

/// A freshly built engine, not yet split across threads
pub struct Engine {
    config: EngineConfig,
    controller: Controller,
    processor: AudioProcessor,
}

impl Engine {
    /// Engine with default configuration and the power-up pipeline
    pub fn new() -> EngineResult<Self> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> EngineResult<Self> {
        Self::with_pipeline(config, PipelineConfig::default())
    }

    /// Engine starting from saved pipeline settings
    pub fn with_pipeline(config: EngineConfig, pipeline: PipelineConfig) -> EngineResult<Self> {
        config.validate().map_err(EngineError::ConfigError)?;

        let sample_rate = config.stream.sample_rate as f32;
        let pipeline = AudioPipeline::with_config(sample_rate, pipeline)?;
        let (producer, consumer) = RingBuffer::new(config.command_queue_capacity);
        let telemetry = Arc::new(SharedTelemetry::new());

        let controller = Controller::new(
            sample_rate,
            *pipeline.config(),
            producer,
            Arc::clone(&telemetry),
        );
        let processor = AudioProcessor::new(pipeline, consumer, telemetry, config.stream.block_size);

        info!(
            "Crossover engine built: {} Hz, {} frame blocks ({:.2}ms), queue of {}",
            config.stream.sample_rate,
            config.stream.block_size,
            config.stream.latency_ms(),
            config.command_queue_capacity
        );

        Ok(Self {
            config,
            controller,
            processor,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn controller(&mut self) -> &mut Controller {
        &mut self.controller
    }

    /// Split into the control half and the audio-thread half
    pub fn into_parts(self) -> (Controller, AudioProcessor) {
        (self.controller, self.processor)
    }
}
