//! Shared Telemetry
//!
//! Read-only view of the audio thread for meters and diagnostics. The audio
//! thread publishes once per block; any number of readers may poll.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use xover_dsp::{AudioPipeline, INPUT_CHANNELS, OUTPUT_CHANNELS};

/// f32 stored as raw bits
///
/// Rust pattern: AtomicF32 doesn't exist, so we use bit-casting. Relaxed
/// ordering is fine: every value is an independent meter reading.
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[derive(Debug, Default)]
struct ChannelLevels {
    peak: AtomicF32,
    rms: AtomicF32,
    gain_reduction_db: AtomicF32,
}

/// State shared between the audio thread (writer) and control side (readers)
#[derive(Debug, Default)]
pub struct SharedTelemetry {
    outputs: [ChannelLevels; OUTPUT_CHANNELS],
    input_peaks: [AtomicF32; INPUT_CHANNELS],
    blocks_processed: AtomicU64,
    commands_applied: AtomicU64,
    dropped_updates: AtomicU64,
}

impl SharedTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the pipeline meters out. Called by the audio thread after each
    /// block; lock-free and allocation-free.
    pub fn publish(&self, pipeline: &AudioPipeline) {
        for (levels, meter) in self.outputs.iter().zip(pipeline.meters()) {
            levels.peak.store(meter.peak);
            levels.rms.store(meter.rms);
            levels.gain_reduction_db.store(meter.gain_reduction_db);
        }
        for (slot, peak) in self.input_peaks.iter().zip(pipeline.input_peaks()) {
            slot.store(peak);
        }
        self.blocks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commands(&self, count: u64) {
        self.commands_applied.fetch_add(count, Ordering::Relaxed);
    }

    /// An update rejected because the command queue was full
    pub fn record_dropped(&self) {
        self.dropped_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn output_peak(&self, channel: usize) -> Option<f32> {
        self.outputs.get(channel).map(|levels| levels.peak.load())
    }

    pub fn gain_reduction_db(&self, channel: usize) -> Option<f32> {
        self.outputs
            .get(channel)
            .map(|levels| levels.gain_reduction_db.load())
    }

    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed.load(Ordering::Relaxed)
    }

    pub fn dropped_updates(&self) -> u64 {
        self.dropped_updates.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            outputs: core::array::from_fn(|ch| OutputLevels {
                peak: self.outputs[ch].peak.load(),
                rms: self.outputs[ch].rms.load(),
                gain_reduction_db: self.outputs[ch].gain_reduction_db.load(),
            }),
            input_peaks: core::array::from_fn(|i| self.input_peaks[i].load()),
            blocks_processed: self.blocks_processed.load(Ordering::Relaxed),
            commands_applied: self.commands_applied.load(Ordering::Relaxed),
            dropped_updates: self.dropped_updates.load(Ordering::Relaxed),
        }
    }
}

/// Levels of one output at the last published block
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputLevels {
    /// Linear peak with per-block decay
    pub peak: f32,
    pub rms: f32,
    /// Compressor plus limiter reduction, positive dB
    pub gain_reduction_db: f32,
}

/// Point-in-time copy of [`SharedTelemetry`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub outputs: [OutputLevels; OUTPUT_CHANNELS],
    pub input_peaks: [f32; INPUT_CHANNELS],
    pub blocks_processed: u64,
    pub commands_applied: u64,
    pub dropped_updates: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_defaults() {
        let telemetry = SharedTelemetry::new();
        assert_eq!(telemetry.snapshot(), TelemetrySnapshot::default());
        assert_eq!(telemetry.output_peak(0), Some(0.0));
        assert_eq!(telemetry.output_peak(4), None);
    }

    #[test]
    fn test_publish_copies_meters() {
        let mut pipeline = AudioPipeline::new(48000.0).unwrap();
        let input = [0.5_f32; 64];
        let mut outs = [[0.0_f32; 64]; OUTPUT_CHANNELS];
        let [a, b, c, d] = &mut outs;
        let mut refs: [&mut [f32]; OUTPUT_CHANNELS] = [a, b, c, d];
        pipeline.process([&input, &input], &mut refs);

        let telemetry = SharedTelemetry::new();
        telemetry.publish(&pipeline);
        let snapshot = telemetry.snapshot();

        assert_eq!(snapshot.blocks_processed, 1);
        assert_eq!(snapshot.input_peaks, pipeline.input_peaks());
        for (levels, meter) in snapshot.outputs.iter().zip(pipeline.meters()) {
            assert_eq!(levels.peak, meter.peak);
            assert_eq!(levels.rms, meter.rms);
        }
    }

    #[test]
    fn test_counters() {
        let telemetry = SharedTelemetry::new();
        telemetry.record_commands(3);
        telemetry.record_dropped();
        telemetry.record_dropped();

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.commands_applied, 3);
        assert_eq!(snapshot.dropped_updates, 2);
        assert_eq!(telemetry.dropped_updates(), 2);
    }

    #[test]
    fn test_snapshot_serialization() {
        let telemetry = SharedTelemetry::new();
        telemetry.record_commands(1);
        let json = serde_json::to_string(&telemetry.snapshot()).unwrap();
        assert!(json.contains("\"commands_applied\":1"));

        let restored: TelemetrySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, telemetry.snapshot());
    }
}
