//! Engine and Stream Configuration

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use xover_dsp::MAX_FRAME_LEN;

/// Supported rates, matching the filter designer
pub const SAMPLE_RATE_RANGE: RangeInclusive<u32> = 8000..=192000;

/// Smallest command queue that still fits one whole-pipeline update
/// (routing plus one install per output)
pub const MIN_QUEUE_CAPACITY: usize = 8;
pub const MAX_QUEUE_CAPACITY: usize = 4096;

/// Block timing of the audio callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Hz; the whole pipeline runs at one rate
    pub sample_rate: u32,

    /// Frames per processing block; commands are drained once per block
    pub block_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 32,
        }
    }
}

impl StreamConfig {
    /// Duration of one block in milliseconds (worst-case update delay)
    pub fn latency_ms(&self) -> f32 {
        self.block_size as f32 * 1000.0 / self.sample_rate as f32
    }

    pub fn validate(&self) -> Result<(), String> {
        if !SAMPLE_RATE_RANGE.contains(&self.sample_rate) {
            return Err(format!("Unsupported sample rate: {} Hz", self.sample_rate));
        }
        if !(1..=MAX_FRAME_LEN).contains(&self.block_size) {
            return Err(format!(
                "Invalid block size: {} (must be 1-{})",
                self.block_size, MAX_FRAME_LEN
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub stream: StreamConfig,

    /// Capacity of the control -> audio command queue
    pub command_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            command_queue_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Small blocks: parameter changes land within a third of a millisecond
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                block_size: 16, // ~0.33ms per block
            },
            command_queue_capacity: 128,
        }
    }

    /// Largest blocks the pipeline accepts, cheapest per frame
    pub fn stable() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                block_size: MAX_FRAME_LEN, // ~5.3ms per block
            },
            command_queue_capacity: 64,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.stream.validate()?;
        if !(MIN_QUEUE_CAPACITY..=MAX_QUEUE_CAPACITY).contains(&self.command_queue_capacity) {
            return Err(format!(
                "Invalid command queue capacity: {}",
                self.command_queue_capacity
            ));
        }
        Ok(())
    }
}
