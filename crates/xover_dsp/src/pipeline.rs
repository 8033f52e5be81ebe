//! Audio Pipeline
//!
//! Routing -> per-output channel chain, once per block:
//!
//! ```text
//!            +---------+   +-----------+  +----+  +------+  +-------+  +-------+  +------+
//! IN1 ---+-->| Routing |-->| Crossover |->| EQ |->| Comp |->| Limit |->| Delay |->| Gain |--> OUTn
//! IN2 ---+   +---------+   +-----------+  +----+  +------+  +-------+  +-------+  +------+
//! ```
//!
//! The four channel chains are independent. Mute forces a hard zero and the
//! gain stage keeps every output sample in [-1, 1].
//!
//! Two families of setters exist. `set_*` methods are for non-real-time
//! callers: they clamp, mirror linked pairs, design coefficients and install
//! them in one step. `apply_*` methods install settings that were already
//! designed elsewhere and do no filter math, so they are safe to call from
//! the audio thread at a block boundary.

use crate::biquad::BiquadCoefficients;
use crate::blob::{ConfigBlob, Module};
use crate::compressor::{Compressor, CompressorConfig, CompressorDesign};
use crate::config::{ChannelConfig, PipelineConfig, Targets};
use crate::crossover::{Crossover, CrossoverConfig, CrossoverDesign};
use crate::delay::{DelayConfig, DelayLine};
use crate::design;
use crate::eq::{Band, EqConfig, EqDesign, ParametricEq};
use crate::error::DspError;
use crate::gain::{GainConfig, GainStage};
use crate::level::{db_to_linear, LevelMeter};
use crate::limiter::{Limiter, LimiterConfig, LimiterDesign};
use crate::presets::Topology;
use crate::routing::{RoutingConfig, RoutingMatrix, Source, INPUT_CHANNELS, OUTPUT_CHANNELS};

/// Capacity of one [`AudioFrame`] channel
pub const MAX_FRAME_LEN: usize = 256;

/// Fixed-capacity planar block of `CH` channels
#[derive(Debug, Clone)]
pub struct AudioFrame<const CH: usize> {
    samples: [[f32; MAX_FRAME_LEN]; CH],
    len: usize,
}

pub type InputFrame = AudioFrame<INPUT_CHANNELS>;
pub type OutputFrame = AudioFrame<OUTPUT_CHANNELS>;

impl<const CH: usize> AudioFrame<CH> {
    /// Silent frame of `len` samples (at most [`MAX_FRAME_LEN`])
    pub fn new(len: usize) -> Self {
        Self {
            samples: [[0.0; MAX_FRAME_LEN]; CH],
            len: len.min(MAX_FRAME_LEN),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(MAX_FRAME_LEN);
    }

    pub fn channel(&self, channel: usize) -> Option<&[f32]> {
        self.samples.get(channel).map(|c| &c[..self.len])
    }

    pub fn channel_mut(&mut self, channel: usize) -> Option<&mut [f32]> {
        let len = self.len;
        self.samples.get_mut(channel).map(|c| &mut c[..len])
    }

    pub fn channels(&self) -> [&[f32]; CH] {
        self.samples.each_ref().map(|c| &c[..self.len])
    }

    pub fn channels_mut(&mut self) -> [&mut [f32]; CH] {
        let len = self.len;
        self.samples.each_mut().map(|c| &mut c[..len])
    }
}

impl<const CH: usize> Default for AudioFrame<CH> {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Precomputed coefficients of every filtering stage of one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelDesign {
    pub crossover: CrossoverDesign,
    pub eq: EqDesign,
    pub compressor: CompressorDesign,
    pub limiter: LimiterDesign,
}

impl ChannelDesign {
    pub fn compute(config: &ChannelConfig, sample_rate: f32) -> Result<Self, DspError> {
        Ok(Self {
            crossover: CrossoverDesign::compute(&config.crossover, sample_rate)?,
            eq: EqDesign::compute(&config.eq, sample_rate)?,
            compressor: CompressorDesign::compute(&config.compressor, sample_rate),
            limiter: LimiterDesign::compute(&config.limiter, sample_rate),
        })
    }
}

/// Processing chain of one output
#[derive(Debug, Clone)]
pub struct ChannelPipeline {
    crossover: Crossover,
    eq: ParametricEq,
    compressor: Compressor,
    limiter: Limiter,
    delay: DelayLine,
    gain: GainStage,
}

impl ChannelPipeline {
    /// Full-range, flat channel
    pub fn new(sample_rate: f32) -> Result<Self, DspError> {
        Ok(Self {
            crossover: Crossover::new(sample_rate, CrossoverConfig::full_range())?,
            eq: ParametricEq::new(sample_rate)?,
            compressor: Compressor::new(sample_rate)?,
            limiter: Limiter::new(sample_rate)?,
            delay: DelayLine::new(sample_rate)?,
            gain: GainStage::new(),
        })
    }

    /// Design and install a whole channel configuration
    pub fn configure(&mut self, config: &ChannelConfig) -> Result<(), DspError> {
        let config = config.sanitized();
        let design = ChannelDesign::compute(&config, self.crossover.sample_rate())?;
        self.apply(&config, &design);
        Ok(())
    }

    /// Install a precomputed channel design. Filter and detector state is
    /// kept; call [`reset`](Self::reset) for a clean start.
    pub fn apply(&mut self, config: &ChannelConfig, design: &ChannelDesign) {
        self.crossover.apply(config.crossover, &design.crossover);
        self.eq.apply(config.eq, &design.eq);
        self.compressor.apply(config.compressor, &design.compressor);
        self.limiter.apply(config.limiter, &design.limiter);
        self.delay.apply(config.delay);
        self.gain.apply(config.gain);
    }

    pub fn crossover(&self) -> &Crossover {
        &self.crossover
    }

    pub fn eq(&self) -> &ParametricEq {
        &self.eq
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    pub fn limiter(&self) -> &Limiter {
        &self.limiter
    }

    pub fn delay(&self) -> &DelayLine {
        &self.delay
    }

    pub fn gain(&self) -> &GainStage {
        &self.gain
    }

    /// Combined compressor and limiter gain reduction (positive dB)
    pub fn gain_reduction_db(&self) -> f32 {
        let mut reduction = 0.0;
        if self.compressor.config().enabled {
            reduction += self.compressor.gain_reduction_db();
        }
        if self.limiter.config().enabled {
            reduction += self.limiter.gain_reduction_db();
        }
        reduction
    }

    /// Lookahead plus delay, in samples
    pub fn latency_samples(&self) -> f32 {
        self.limiter.latency_samples() as f32 + self.delay.delay_samples()
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let x = self.crossover.process_sample(input);
        let x = self.eq.process_sample(x);
        let x = self.compressor.process_sample(x);
        let x = self.limiter.process_sample(x);
        let x = self.delay.process_sample(x);
        self.gain.process_sample(x)
    }

    #[inline]
    pub fn process_block(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.crossover.reset();
        self.eq.reset();
        self.compressor.reset();
        self.limiter.reset();
        self.delay.reset();
    }
}

/// Output-side telemetry of one channel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelMeter {
    pub peak: f32,
    pub rms: f32,
    pub gain_reduction_db: f32,
}

/// The complete 2-in / 4-out processor
#[derive(Debug, Clone)]
pub struct AudioPipeline {
    sample_rate: f32,
    routing: RoutingMatrix,
    channels: [ChannelPipeline; OUTPUT_CHANNELS],
    config: PipelineConfig,
    input_meters: [LevelMeter; INPUT_CHANNELS],
    output_meters: [LevelMeter; OUTPUT_CHANNELS],
}

impl AudioPipeline {
    /// Pipeline with the power-up defaults (2-way at 80 Hz)
    pub fn new(sample_rate: f32) -> Result<Self, DspError> {
        Self::with_config(sample_rate, PipelineConfig::default())
    }

    pub fn with_config(sample_rate: f32, config: PipelineConfig) -> Result<Self, DspError> {
        let sample_rate = design::validate_sample_rate(sample_rate)?;
        let prototype = ChannelPipeline::new(sample_rate)?;
        let mut pipeline = Self {
            sample_rate,
            routing: RoutingMatrix::default(),
            channels: core::array::from_fn(|_| prototype.clone()),
            config: PipelineConfig::default(),
            input_meters: [LevelMeter::new(); INPUT_CHANNELS],
            output_meters: [LevelMeter::new(); OUTPUT_CHANNELS],
        };
        pipeline.set_config(config)?;
        Ok(pipeline)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn channel(&self, channel: usize) -> Result<&ChannelPipeline, DspError> {
        self.channels
            .get(channel)
            .ok_or(DspError::InvalidChannel(channel))
    }

    // ---------------------------------------------------------------------
    // Processing
    // ---------------------------------------------------------------------

    /// Process planar blocks
    ///
    /// Handles `min` of all buffer lengths; an empty buffer makes the call
    /// a no-op.
    ///
    /// # Real-time Safety
    /// No allocations, no locks, O(n) in the block length.
    pub fn process(&mut self, inputs: [&[f32]; INPUT_CHANNELS], outputs: &mut [&mut [f32]; OUTPUT_CHANNELS]) {
        let len = inputs
            .iter()
            .map(|b| b.len())
            .chain(outputs.iter().map(|b| b.len()))
            .min()
            .unwrap_or(0);
        if len == 0 {
            return;
        }

        let inputs = [&inputs[0][..len], &inputs[1][..len]];
        for (meter, input) in self.input_meters.iter_mut().zip(inputs) {
            meter.update(input);
        }

        self.routing.process(inputs, outputs);

        for ((channel, meter), output) in self
            .channels
            .iter_mut()
            .zip(self.output_meters.iter_mut())
            .zip(outputs.iter_mut())
        {
            let block = &mut output[..len];
            channel.process_block(block);
            meter.update(block);
        }
    }

    /// Process one fixed-capacity frame; the output takes the input length
    pub fn process_frame(&mut self, input: &InputFrame, output: &mut OutputFrame) {
        output.set_len(input.len());
        let mut outputs = output.channels_mut();
        self.process(input.channels(), &mut outputs);
    }

    /// Process interleaved buffers: `[L, R, L, R, ...]` in, four samples
    /// per frame out. Handles as many whole frames as both buffers hold.
    pub fn process_interleaved(&mut self, input: &[f32], output: &mut [f32]) {
        let frames = (input.len() / INPUT_CHANNELS).min(output.len() / OUTPUT_CHANNELS);
        let mut scratch_in = InputFrame::new(MAX_FRAME_LEN);
        let mut scratch_out = OutputFrame::new(MAX_FRAME_LEN);

        let mut start = 0;
        while start < frames {
            let n = (frames - start).min(MAX_FRAME_LEN);
            scratch_in.set_len(n);

            let in_chunk = &input[start * INPUT_CHANNELS..(start + n) * INPUT_CHANNELS];
            let [left, right] = scratch_in.channels_mut();
            for ((frame, l), r) in in_chunk.chunks_exact(INPUT_CHANNELS).zip(left).zip(right) {
                *l = frame[0];
                *r = frame[1];
            }

            self.process_frame(&scratch_in, &mut scratch_out);

            let out_chunk = &mut output[start * OUTPUT_CHANNELS..(start + n) * OUTPUT_CHANNELS];
            let channels = scratch_out.channels();
            for (i, frame) in out_chunk.chunks_exact_mut(OUTPUT_CHANNELS).enumerate() {
                for (sample, channel) in frame.iter_mut().zip(channels.iter()) {
                    *sample = channel[i];
                }
            }
            start += n;
        }
    }

    /// Clear all filter, dynamics and delay state
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        for meter in self.input_meters.iter_mut().chain(self.output_meters.iter_mut()) {
            meter.reset();
        }
    }

    /// Zero every delay buffer (e.g. after a large alignment change)
    pub fn flush_delays(&mut self) {
        for channel in &mut self.channels {
            channel.delay.flush();
        }
    }

    // ---------------------------------------------------------------------
    // Telemetry
    // ---------------------------------------------------------------------

    pub fn meters(&self) -> [ChannelMeter; OUTPUT_CHANNELS] {
        core::array::from_fn(|ch| ChannelMeter {
            peak: self.output_meters[ch].peak(),
            rms: self.output_meters[ch].rms(),
            gain_reduction_db: self.channels[ch].gain_reduction_db(),
        })
    }

    pub fn input_peaks(&self) -> [f32; INPUT_CHANNELS] {
        core::array::from_fn(|i| self.input_meters[i].peak())
    }

    // ---------------------------------------------------------------------
    // Installing precomputed settings (real-time safe)
    // ---------------------------------------------------------------------

    /// Install routing and mutes only. A newly linked partner's processing
    /// arrives as its own channel update.
    pub fn apply_routing(&mut self, routing: RoutingConfig) {
        let routing = routing.sanitized();
        self.config.routing = routing;
        self.routing.set_config(routing);
        for (ch, &muted) in routing.mute.iter().enumerate() {
            self.channels[ch].gain.set_muted(muted);
            self.config.channels[ch].gain.muted = muted;
        }
    }

    pub fn apply_crossover(&mut self, channel: usize, config: CrossoverConfig, design: &CrossoverDesign) {
        if let Some(chain) = self.channels.get_mut(channel) {
            chain.crossover.apply(config, design);
            self.config.channels[channel].crossover = config;
        }
    }

    pub fn apply_eq(&mut self, channel: usize, config: EqConfig, design: &EqDesign) {
        if let Some(chain) = self.channels.get_mut(channel) {
            chain.eq.apply(config, design);
            self.config.channels[channel].eq = config;
        }
    }

    /// Install one band; only that band's filter state is cleared
    pub fn apply_eq_band(&mut self, channel: usize, band_index: usize, band: Band, coeffs: BiquadCoefficients) {
        if let Some(chain) = self.channels.get_mut(channel) {
            chain.eq.apply_band(band_index, band, coeffs);
            self.config.channels[channel].eq = *chain.eq.config();
        }
    }

    pub fn apply_eq_settings(&mut self, channel: usize, pre_gain_db: f32, enabled: bool, pre_gain_linear: f32) {
        if let Some(chain) = self.channels.get_mut(channel) {
            chain.eq.apply_settings(pre_gain_db, enabled, pre_gain_linear);
            self.config.channels[channel].eq = *chain.eq.config();
        }
    }

    pub fn apply_compressor(&mut self, channel: usize, config: CompressorConfig, design: &CompressorDesign) {
        if let Some(chain) = self.channels.get_mut(channel) {
            chain.compressor.apply(config, design);
            self.config.channels[channel].compressor = config;
        }
    }

    pub fn apply_limiter(&mut self, channel: usize, config: LimiterConfig, design: &LimiterDesign) {
        if let Some(chain) = self.channels.get_mut(channel) {
            chain.limiter.apply(config, design);
            self.config.channels[channel].limiter = config;
        }
    }

    /// Install a whole channel and clear its state
    pub fn apply_channel(&mut self, channel: usize, config: ChannelConfig, design: &ChannelDesign) {
        if let Some(chain) = self.channels.get_mut(channel) {
            chain.apply(&config, design);
            chain.reset();
            self.config.channels[channel] = config;
        }
    }

    /// Delay changes keep the buffer contents
    pub fn apply_delay(&mut self, channel: usize, config: DelayConfig) {
        if let Some(chain) = self.channels.get_mut(channel) {
            chain.delay.apply(config);
            self.config.channels[channel].delay = *chain.delay.config();
        }
    }

    pub fn apply_gain(&mut self, channel: usize, config: GainConfig) {
        if let Some(chain) = self.channels.get_mut(channel) {
            chain.gain.apply(config);
            self.config.channels[channel].gain = *chain.gain.config();
        }
    }

    // ---------------------------------------------------------------------
    // Control (non-real-time)
    // ---------------------------------------------------------------------

    /// Replace the whole configuration. Every channel is redesigned and its
    /// state cleared; nothing changes if any design fails.
    pub fn set_config(&mut self, config: PipelineConfig) -> Result<(), DspError> {
        let config = config.sanitized();
        let mut channels = self.channels.clone();
        for (chain, channel_config) in channels.iter_mut().zip(config.channels.iter()) {
            chain.configure(channel_config)?;
            chain.reset();
        }
        self.channels = channels;
        self.routing.set_config(config.routing);
        self.config = config;
        Ok(())
    }

    /// Replace the routing. A pair linked here takes the even channel's
    /// processing, and the odd channel restarts from a clean state.
    pub fn set_routing(&mut self, routing: RoutingConfig) -> Result<(), DspError> {
        let mut next = self.config;
        next.set_routing(routing);
        self.adopt_routing(next)
    }

    fn adopt_routing(&mut self, next: PipelineConfig) -> Result<(), DspError> {
        let mut chains = self.channels.clone();
        for (ch, chain) in chains.iter_mut().enumerate() {
            if !next.channels[ch].same_processing(&self.config.channels[ch]) {
                chain.configure(&next.channels[ch])?;
                chain.reset();
            }
        }
        self.channels = chains;
        self.config.channels = next.channels;
        self.apply_routing(next.routing);
        Ok(())
    }

    pub fn set_source(&mut self, channel: usize, source: Source) -> Result<Targets, DspError> {
        let mut next = self.config;
        let targets = next.set_source(channel, source)?;
        self.apply_routing(next.routing);
        Ok(targets)
    }

    pub fn set_mix_ratio(&mut self, channel: usize, ratio: f32) -> Result<Targets, DspError> {
        let mut next = self.config;
        let targets = next.set_mix_ratio(channel, ratio)?;
        self.apply_routing(next.routing);
        Ok(targets)
    }

    pub fn set_input_gain(&mut self, input: usize, gain: f32) -> Result<(), DspError> {
        let mut next = self.config;
        next.set_input_gain(input, gain)?;
        self.apply_routing(next.routing);
        Ok(())
    }

    pub fn set_mute(&mut self, channel: usize, muted: bool) -> Result<Targets, DspError> {
        let mut next = self.config;
        let targets = next.set_mute(channel, muted)?;
        self.apply_routing(next.routing);
        Ok(targets)
    }

    pub fn set_mono_sum(&mut self, enabled: bool) {
        let mut routing = self.config.routing;
        routing.set_mono_sum(enabled);
        self.apply_routing(routing);
    }

    /// Link or unlink a pair; linking redesigns the odd channel from the
    /// even one
    pub fn set_stereo_link(&mut self, pair: usize, linked: bool) -> Result<(), DspError> {
        let mut next = self.config;
        let targets = next.set_stereo_link(pair, linked)?;
        if linked {
            if let Some(partner) = targets.partner {
                let mut chain = self.channels[partner].clone();
                chain.configure(&next.channels[partner])?;
                chain.reset();
                self.channels[partner] = chain;
            }
        }
        self.config.channels = next.channels;
        self.apply_routing(next.routing);
        Ok(())
    }

    pub fn set_crossover(&mut self, channel: usize, config: CrossoverConfig) -> Result<Targets, DspError> {
        let mut next = self.config;
        let targets = next.set_crossover(channel, config)?;
        let config = next.channels[channel].crossover;
        let design = CrossoverDesign::compute(&config, self.sample_rate)?;
        for ch in targets.iter() {
            self.apply_crossover(ch, config, &design);
        }
        Ok(targets)
    }

    pub fn set_eq(&mut self, channel: usize, config: EqConfig) -> Result<Targets, DspError> {
        let mut next = self.config;
        let targets = next.set_eq(channel, config)?;
        let config = next.channels[channel].eq;
        let design = EqDesign::compute(&config, self.sample_rate)?;
        for ch in targets.iter() {
            self.apply_eq(ch, config, &design);
        }
        Ok(targets)
    }

    pub fn set_eq_band(&mut self, channel: usize, band_index: usize, band: Band) -> Result<Targets, DspError> {
        let mut next = self.config;
        let targets = next.set_eq_band(channel, band_index, band)?;
        let band = next.channels[channel].eq.bands[band_index];
        let coeffs = band.to_coefficients(self.sample_rate)?;
        for ch in targets.iter() {
            self.apply_eq_band(ch, band_index, band, coeffs);
        }
        Ok(targets)
    }

    pub fn set_eq_settings(&mut self, channel: usize, pre_gain_db: f32, enabled: bool) -> Result<Targets, DspError> {
        let mut next = self.config;
        let targets = next.set_eq_settings(channel, pre_gain_db, enabled)?;
        let pre_gain_db = next.channels[channel].eq.pre_gain_db;
        for ch in targets.iter() {
            self.apply_eq_settings(ch, pre_gain_db, enabled, db_to_linear(pre_gain_db));
        }
        Ok(targets)
    }

    pub fn set_compressor(&mut self, channel: usize, config: CompressorConfig) -> Result<Targets, DspError> {
        let mut next = self.config;
        let targets = next.set_compressor(channel, config)?;
        let config = next.channels[channel].compressor;
        let design = CompressorDesign::compute(&config, self.sample_rate);
        for ch in targets.iter() {
            self.apply_compressor(ch, config, &design);
        }
        Ok(targets)
    }

    pub fn set_limiter(&mut self, channel: usize, config: LimiterConfig) -> Result<Targets, DspError> {
        let mut next = self.config;
        let targets = next.set_limiter(channel, config)?;
        let config = next.channels[channel].limiter;
        let design = LimiterDesign::compute(&config, self.sample_rate);
        for ch in targets.iter() {
            self.apply_limiter(ch, config, &design);
        }
        Ok(targets)
    }

    pub fn set_delay(&mut self, channel: usize, config: DelayConfig) -> Result<Targets, DspError> {
        let mut next = self.config;
        let targets = next.set_delay(channel, config)?;
        self.apply_delay(channel, next.channels[channel].delay);
        Ok(targets)
    }

    pub fn set_gain(&mut self, channel: usize, config: GainConfig) -> Result<Targets, DspError> {
        let mut next = self.config;
        let targets = next.set_gain(channel, config)?;
        for ch in targets.iter() {
            self.apply_gain(ch, next.channels[ch].gain);
        }
        Ok(targets)
    }

    /// Rewrite routing and crossovers for a speaker layout
    pub fn apply_topology(&mut self, topology: Topology) -> Result<(), DspError> {
        let mut next = self.config;
        topology.apply(&mut next);
        self.set_config(next)
    }

    // ---------------------------------------------------------------------
    // Blobs
    // ---------------------------------------------------------------------

    pub fn config_blob(&self) -> Result<Vec<u8>, DspError> {
        self.config.to_blob()
    }

    pub fn load_config_blob(&mut self, bytes: &[u8]) -> Result<(), DspError> {
        let config = PipelineConfig::from_blob(bytes)?;
        self.set_config(config)
    }

    pub fn module_blob(&self, module: Module, channel: usize) -> Result<Vec<u8>, DspError> {
        self.config.module_blob(module, channel)
    }

    /// Load one module's settings; the affected chains are redesigned
    pub fn load_module_blob(&mut self, module: Module, channel: usize, bytes: &[u8]) -> Result<(), DspError> {
        let mut next = self.config;
        match next.load_module_blob(module, channel, bytes)? {
            None => self.adopt_routing(next)?,
            Some(targets) => {
                let mut chains = self.channels.clone();
                for ch in targets.iter() {
                    chains[ch].configure(&next.channels[ch])?;
                }
                self.channels = chains;
                self.config = next;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crossover::CrossoverMode;
    use crate::test_utils::{impulse, peak_after, sine, white_noise};

    const FS: f32 = 48000.0;

    fn run(pipeline: &mut AudioPipeline, in1: &[f32], in2: &[f32]) -> [Vec<f32>; OUTPUT_CHANNELS] {
        let len = in1.len().min(in2.len());
        let mut outs: [Vec<f32>; OUTPUT_CHANNELS] = core::array::from_fn(|_| vec![0.0; len]);
        let [a, b, c, d] = &mut outs;
        let mut refs = [a.as_mut_slice(), b.as_mut_slice(), c.as_mut_slice(), d.as_mut_slice()];
        pipeline.process([in1, in2], &mut refs);
        outs
    }

    fn full_range() -> AudioPipeline {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        for ch in [0, 2] {
            pipeline
                .set_crossover(ch, CrossoverConfig::full_range())
                .unwrap();
        }
        pipeline
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        assert!(matches!(
            AudioPipeline::new(1000.0),
            Err(DspError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn test_default_split() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        let tone = sine(2000.0, FS, 0.5, 4800);
        let outs = run(&mut pipeline, &tone, &tone);

        assert!((peak_after(&outs[0], 2400) - 0.5).abs() < 0.01);
        assert!((peak_after(&outs[1], 2400) - 0.5).abs() < 0.01);
        assert!(peak_after(&outs[2], 2400) < 0.001);
        assert!(peak_after(&outs[3], 2400) < 0.001);
    }

    #[test]
    fn test_lr4_split_sums_flat() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        for freq in [40.0, 80.0, 160.0, 1000.0] {
            pipeline.reset();
            let tone = sine(freq, FS, 0.5, 48000);
            let outs = run(&mut pipeline, &tone, &tone);
            let sum: Vec<f32> = outs[0].iter().zip(&outs[2]).map(|(h, l)| h + l).collect();
            let gain_db = 20.0 * (peak_after(&sum, 24000) / 0.5).log10();
            assert!(gain_db.abs() < 0.5, "{freq} Hz summed to {gain_db} dB");
        }
    }

    #[test]
    fn test_flat_pipeline_is_identity() {
        let mut pipeline = full_range();
        let in1 = white_noise(512, 0.9, 1);
        let in2 = white_noise(512, 0.9, 2);
        let outs = run(&mut pipeline, &in1, &in2);
        assert_eq!(outs[0], in1);
        assert_eq!(outs[1], in2);
        assert_eq!(outs[2], in1);
        assert_eq!(outs[3], in2);
    }

    #[test]
    fn test_outputs_always_bounded() {
        let mut pipeline = full_range();
        pipeline.set_input_gain(0, 4.0).unwrap();
        pipeline.set_input_gain(1, 4.0).unwrap();
        pipeline
            .set_eq_band(0, 2, Band::new(crate::design::BandType::Bell, 1000.0, 1.0).with_gain(12.0))
            .unwrap();

        let in1 = white_noise(4096, 1.0, 3);
        let in2 = sine(1000.0, FS, 1.0, 4096);
        let outs = run(&mut pipeline, &in1, &in2);
        for out in &outs {
            assert!(out.iter().all(|s| s.abs() <= 1.0));
        }
    }

    #[test]
    fn test_mute_precedence() {
        let mut pipeline = full_range();
        pipeline.set_stereo_link(0, false).unwrap();
        pipeline.set_gain(0, GainConfig { gain_db: 12.0, ..GainConfig::default() }).unwrap();
        let mut compressor = CompressorConfig::default();
        compressor.makeup_gain_db = 24.0;
        compressor.enabled = true;
        pipeline.set_compressor(0, compressor).unwrap();
        pipeline.set_mute(0, true).unwrap();

        let tone = sine(440.0, FS, 0.8, 1024);
        let outs = run(&mut pipeline, &tone, &tone);
        assert!(outs[0].iter().all(|&s| s == 0.0));
        assert!(peak_after(&outs[1], 0) > 0.5);
        assert_eq!(pipeline.meters()[0].peak, 0.0);
    }

    #[test]
    fn test_zero_length_is_noop() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        let before = pipeline.meters();
        let mut out = vec![0.25; 16];
        let (mut a, mut b, mut c) = (vec![0.25; 16], vec![0.25; 16], vec![0.25; 16]);
        let mut outs = [out.as_mut_slice(), a.as_mut_slice(), b.as_mut_slice(), c.as_mut_slice()];
        pipeline.process([&[], &[]], &mut outs);

        assert!(outs.iter().all(|o| o.iter().all(|&s| s == 0.25)));
        assert_eq!(pipeline.meters(), before);
        assert_eq!(pipeline.input_peaks(), [0.0, 0.0]);

        let mut empty: [&mut [f32]; OUTPUT_CHANNELS] = [&mut [], &mut [], &mut [], &mut []];
        pipeline.process([&[1.0_f32], &[1.0_f32]], &mut empty);
        assert_eq!(pipeline.input_peaks(), [0.0, 0.0]);
    }

    #[test]
    fn test_uses_shortest_buffer() {
        let mut pipeline = full_range();
        let in1 = [0.5; 8];
        let in2 = [0.5; 4];
        let mut outs: [Vec<f32>; OUTPUT_CHANNELS] = core::array::from_fn(|_| vec![9.0; 8]);
        let [a, b, c, d] = &mut outs;
        let mut refs = [a.as_mut_slice(), b.as_mut_slice(), c.as_mut_slice(), d.as_mut_slice()];
        pipeline.process([&in1, &in2], &mut refs);

        assert_eq!(&outs[0][..4], &[0.5; 4]);
        assert_eq!(&outs[0][4..], &[9.0; 4]);
    }

    #[test]
    fn test_delay_exactness_through_pipeline() {
        let mut pipeline = full_range();
        let mut delay = DelayConfig::default();
        delay.set_delay_samples(10.0, FS);
        pipeline.set_delay(1, delay).unwrap();

        let pulse = impulse(64);
        let outs = run(&mut pipeline, &pulse, &pulse);
        assert_eq!(outs[0][0], 1.0);
        assert_eq!(outs[1][10], 1.0);
        assert!(outs[1].iter().enumerate().all(|(i, &s)| i == 10 || s == 0.0));
    }

    #[test]
    fn test_channels_independent() {
        let mut reference = AudioPipeline::new(FS).unwrap();
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        pipeline.set_stereo_link(1, false).unwrap();
        pipeline
            .set_eq_band(3, 0, Band::new(crate::design::BandType::LowShelf, 60.0, 0.7).with_gain(-12.0))
            .unwrap();
        pipeline.set_crossover(2, CrossoverConfig::lowpass(200.0)).unwrap();

        let in1 = white_noise(2048, 0.5, 4);
        let in2 = white_noise(2048, 0.5, 5);
        let expected = run(&mut reference, &in1, &in2);
        let outs = run(&mut pipeline, &in1, &in2);
        assert_eq!(outs[0], expected[0]);
        assert_eq!(outs[1], expected[1]);
        assert_ne!(outs[3], expected[3]);
    }

    #[test]
    fn test_linked_setter_redesigns_partner() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        let targets = pipeline
            .set_crossover(0, CrossoverConfig::highpass(250.0))
            .unwrap();
        assert_eq!(targets.partner, Some(1));
        assert_eq!(pipeline.channel(1).unwrap().crossover().config().highpass_hz, 250.0);
        assert_eq!(pipeline.config().channels[1].crossover.highpass_hz, 250.0);
    }

    #[test]
    fn test_invalid_index_leaves_state() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        let before = *pipeline.config();
        assert_eq!(
            pipeline.set_crossover(4, CrossoverConfig::full_range()),
            Err(DspError::InvalidChannel(4))
        );
        assert_eq!(
            pipeline.set_eq_band(0, 9, Band::new(crate::design::BandType::Bell, 1000.0, 1.0)),
            Err(DspError::InvalidBandIndex(9))
        );
        assert_eq!(pipeline.set_input_gain(2, 1.0), Err(DspError::InvalidInputIndex(2)));
        assert!(pipeline.channel(4).is_err());
        assert_eq!(*pipeline.config(), before);
    }

    #[test]
    fn test_interleaved_matches_planar() {
        let mut planar = AudioPipeline::new(FS).unwrap();
        let mut interleaved = AudioPipeline::new(FS).unwrap();
        let in1 = white_noise(600, 0.5, 6);
        let in2 = white_noise(600, 0.5, 7);
        let expected = run(&mut planar, &in1, &in2);

        let input: Vec<f32> = in1.iter().zip(&in2).flat_map(|(&a, &b)| [a, b]).collect();
        let mut output = vec![0.0; 600 * OUTPUT_CHANNELS];
        interleaved.process_interleaved(&input, &mut output);

        for (i, frame) in output.chunks_exact(OUTPUT_CHANNELS).enumerate() {
            for ch in 0..OUTPUT_CHANNELS {
                assert_eq!(frame[ch], expected[ch][i]);
            }
        }
    }

    #[test]
    fn test_process_frame() {
        let mut pipeline = full_range();
        let mut input = InputFrame::new(32);
        if let Some(left) = input.channel_mut(0) {
            left[0] = 0.5;
        }
        let mut output = OutputFrame::default();
        pipeline.process_frame(&input, &mut output);

        assert_eq!(output.len(), 32);
        assert_eq!(output.channel(2).map(|c| c[0]), Some(0.5));
        assert_eq!(output.channel(1).map(|c| c[0]), Some(0.0));
        assert!(output.channel(4).is_none());
    }

    #[test]
    fn test_meters_track_levels() {
        let mut pipeline = full_range();
        let tone = sine(1000.0, FS, 0.5, 256);
        run(&mut pipeline, &tone, &tone);

        let meters = pipeline.meters();
        assert!((meters[0].peak - 0.5).abs() < 0.01);
        assert!(meters[0].rms > 0.0);
        assert_eq!(meters[0].gain_reduction_db, 0.0);
        assert!((pipeline.input_peaks()[0] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_config_blob_restores_processing() {
        let mut source = AudioPipeline::new(FS).unwrap();
        source.apply_topology(Topology::ThreeWay).unwrap();
        source
            .set_eq_band(2, 1, Band::new(crate::design::BandType::Bell, 800.0, 2.0).with_gain(4.0))
            .unwrap();
        let blob = source.config_blob().unwrap();

        let mut restored = AudioPipeline::new(FS).unwrap();
        restored.load_config_blob(&blob).unwrap();
        assert_eq!(restored.config(), source.config());

        source.reset();
        let in1 = white_noise(1024, 0.5, 8);
        let a = run(&mut source, &in1, &in1);
        let b = run(&mut restored, &in1, &in1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_module_blob_between_channels() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        pipeline.set_stereo_link(1, false).unwrap();
        let blob = pipeline.module_blob(Module::Crossover, 0).unwrap();
        pipeline.load_module_blob(Module::Crossover, 3, &blob).unwrap();
        assert_eq!(
            pipeline.channel(3).unwrap().crossover().config().mode,
            CrossoverMode::HighPass
        );
        assert_eq!(
            pipeline.channel(2).unwrap().crossover().config().mode,
            CrossoverMode::LowPass
        );
    }

    #[test]
    fn test_topology_tri_amp() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        pipeline.apply_topology(Topology::TriAmp).unwrap();
        assert_eq!(
            pipeline.channel(1).unwrap().crossover().config().mode,
            CrossoverMode::BandPass
        );
        assert_eq!(pipeline.config().routing.sources, [Source::MonoSum; 4]);
    }

    #[test]
    fn test_stereo_link_copies_processing() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        pipeline.set_stereo_link(0, false).unwrap();
        pipeline.set_crossover(0, CrossoverConfig::highpass(300.0)).unwrap();
        assert_eq!(pipeline.channel(1).unwrap().crossover().config().highpass_hz, 80.0);

        pipeline.set_stereo_link(0, true).unwrap();
        assert_eq!(pipeline.channel(1).unwrap().crossover().config().highpass_hz, 300.0);
        assert!(pipeline.config().routing.stereo_link[0]);
    }

    #[test]
    fn test_routing_link_redesigns_partner() {
        let mut pipeline = AudioPipeline::new(FS).unwrap();
        pipeline.set_stereo_link(0, false).unwrap();
        pipeline.set_crossover(1, CrossoverConfig::highpass(300.0)).unwrap();

        let mut routing = pipeline.config().routing;
        routing.stereo_link[0] = true;
        pipeline.set_routing(routing).unwrap();

        assert_eq!(pipeline.channel(1).unwrap().crossover().config().highpass_hz, 80.0);
        assert_eq!(pipeline.config().channels[1].crossover.highpass_hz, 80.0);
    }

    #[test]
    fn test_apply_channel_matches_set_config() {
        let target = Topology::ThreeWay.config();
        let mut reference = AudioPipeline::new(FS).unwrap();
        reference.set_config(target).unwrap();

        let mut pipeline = AudioPipeline::new(FS).unwrap();
        pipeline.apply_routing(target.routing);
        for (ch, channel) in target.channels.iter().enumerate() {
            let design = ChannelDesign::compute(channel, FS).unwrap();
            pipeline.apply_channel(ch, *channel, &design);
        }
        assert_eq!(pipeline.config(), reference.config());

        let input = white_noise(512, 0.5, 7);
        assert_eq!(
            run(&mut pipeline, &input, &input),
            run(&mut reference, &input, &input)
        );
    }
}
