//! Real-time Audio Processor
//!
//! The audio-thread half of the engine. It owns the [`AudioPipeline`] and
//! the consumer end of the command queue. Pending commands are installed
//! only between blocks, so every channel runs a block with one complete
//! parameter set. Buffers longer than the configured block size are split.
//!
//! Nothing in here allocates, locks or logs.

use std::sync::Arc;

use rtrb::Consumer;
use xover_dsp::{AudioPipeline, INPUT_CHANNELS, OUTPUT_CHANNELS};

use crate::message::Command;
use crate::telemetry::SharedTelemetry;

pub struct AudioProcessor {
    pipeline: AudioPipeline,
    consumer: Consumer<Command>,
    telemetry: Arc<SharedTelemetry>,
    block_size: usize,
}

impl AudioProcessor {
    pub(crate) fn new(
        pipeline: AudioPipeline,
        consumer: Consumer<Command>,
        telemetry: Arc<SharedTelemetry>,
        block_size: usize,
    ) -> Self {
        Self {
            pipeline,
            consumer,
            telemetry,
            block_size: block_size.max(1),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.pipeline.sample_rate()
    }

    /// Largest number of frames processed between two command drains
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The running pipeline, as of the last installed command
    pub fn pipeline(&self) -> &AudioPipeline {
        &self.pipeline
    }

    /// Install every pending command; returns how many were applied
    pub fn drain_commands(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.consumer.pop() {
            command.apply(&mut self.pipeline);
            applied += 1;
        }
        if applied > 0 {
            self.telemetry.record_commands(applied as u64);
        }
        applied
    }

    /// Process planar buffers. Only the shortest buffer's length is used;
    /// an empty buffer makes the call a no-op (commands stay queued).
    pub fn process(&mut self, inputs: [&[f32]; INPUT_CHANNELS], outputs: &mut [&mut [f32]; OUTPUT_CHANNELS]) {
        let frames = inputs
            .iter()
            .map(|ch| ch.len())
            .chain(outputs.iter().map(|ch| ch.len()))
            .min()
            .unwrap_or(0);

        let mut start = 0;
        while start < frames {
            let end = (start + self.block_size).min(frames);
            self.drain_commands();

            let [in1, in2] = inputs;
            let [out1, out2, out3, out4] = &mut *outputs;
            let mut block: [&mut [f32]; OUTPUT_CHANNELS] = [
                &mut out1[start..end],
                &mut out2[start..end],
                &mut out3[start..end],
                &mut out4[start..end],
            ];
            self.pipeline
                .process([&in1[start..end], &in2[start..end]], &mut block);
            self.telemetry.publish(&self.pipeline);
            start = end;
        }
    }

    /// Process interleaved buffers (2 channels in, 4 channels out)
    pub fn process_interleaved(&mut self, input: &[f32], output: &mut [f32]) {
        let frames = (input.len() / INPUT_CHANNELS).min(output.len() / OUTPUT_CHANNELS);
        let input = &input[..frames * INPUT_CHANNELS];
        let output = &mut output[..frames * OUTPUT_CHANNELS];

        for (input, output) in input
            .chunks(self.block_size * INPUT_CHANNELS)
            .zip(output.chunks_mut(self.block_size * OUTPUT_CHANNELS))
        {
            self.drain_commands();
            self.pipeline.process_interleaved(input, output);
            self.telemetry.publish(&self.pipeline);
        }
    }
}
