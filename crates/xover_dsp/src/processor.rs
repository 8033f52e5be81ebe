//! Channel Processor Trait
//!
//! Common interface of every per-output stage, so a channel chain can be
//! driven, reset and inspected uniformly (Crossover -> EQ -> Compressor ->
//! Limiter -> Delay -> Gain).

use crate::compressor::Compressor;
use crate::crossover::{Crossover, CrossoverMode};
use crate::delay::DelayLine;
use crate::eq::ParametricEq;
use crate::gain::GainStage;
use crate::limiter::Limiter;
use crate::pipeline::ChannelPipeline;

/// A mono, in-place stage of an output channel
///
/// # Real-time Safety
///
/// `process_sample` runs on the audio thread for every output sample. It
/// must take constant time and must not allocate, lock or do I/O; anything
/// expensive belongs in the `*Design` types computed off-thread.
pub trait ChannelProcessor: Send {
    fn process_sample(&mut self, input: f32) -> f32;

    /// Process a block in place
    #[inline]
    fn process_block(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset internal state (filter memories, envelopes, delay lines)
    fn reset(&mut self);

    /// Stage label for diagnostics
    fn name(&self) -> &'static str;

    /// Whether this stage currently alters the signal
    fn is_enabled(&self) -> bool {
        true
    }
}

impl ChannelProcessor for Crossover {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        Crossover::process_sample(self, input)
    }

    fn reset(&mut self) {
        Crossover::reset(self);
    }

    fn name(&self) -> &'static str {
        "Crossover"
    }

    fn is_enabled(&self) -> bool {
        self.config().mode != CrossoverMode::Bypass
    }
}

impl ChannelProcessor for ParametricEq {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        ParametricEq::process_sample(self, input)
    }

    fn reset(&mut self) {
        ParametricEq::reset(self);
    }

    fn name(&self) -> &'static str {
        "5-Band Parametric EQ"
    }

    fn is_enabled(&self) -> bool {
        self.config().enabled
    }
}

impl ChannelProcessor for Compressor {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        Compressor::process_sample(self, input)
    }

    fn reset(&mut self) {
        Compressor::reset(self);
    }

    fn name(&self) -> &'static str {
        "Compressor"
    }

    fn is_enabled(&self) -> bool {
        self.config().enabled
    }
}

impl ChannelProcessor for Limiter {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        Limiter::process_sample(self, input)
    }

    fn reset(&mut self) {
        Limiter::reset(self);
    }

    fn name(&self) -> &'static str {
        "Limiter"
    }

    fn is_enabled(&self) -> bool {
        self.config().enabled
    }
}

impl ChannelProcessor for DelayLine {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        DelayLine::process_sample(self, input)
    }

    fn reset(&mut self) {
        DelayLine::reset(self);
    }

    fn name(&self) -> &'static str {
        "Delay"
    }

    fn is_enabled(&self) -> bool {
        self.config().enabled
    }
}

impl ChannelProcessor for GainStage {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        GainStage::process_sample(self, input)
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "Output Gain"
    }
}

impl ChannelProcessor for ChannelPipeline {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        ChannelPipeline::process_sample(self, input)
    }

    fn reset(&mut self) {
        ChannelPipeline::reset(self);
    }

    fn name(&self) -> &'static str {
        "Channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::white_noise;

    const FS: f32 = 48000.0;

    /// Test processor that just inverts audio
    struct InvertProcessor;

    impl ChannelProcessor for InvertProcessor {
        fn process_sample(&mut self, input: f32) -> f32 {
            -input
        }

        fn reset(&mut self) {}

        fn name(&self) -> &'static str {
            "Inverter"
        }
    }

    fn assert_identity<P: ChannelProcessor>(mut processor: P) {
        let input = white_noise(512, 0.9, 21);
        let mut block = input.clone();
        processor.process_block(&mut block);
        assert_eq!(block, input, "{} is not transparent", processor.name());
    }

    #[test]
    fn test_bypassed_stages_are_identity() {
        use crate::crossover::CrossoverConfig;

        assert_identity(Crossover::new(FS, CrossoverConfig::full_range()).unwrap());
        assert_identity(ParametricEq::new(FS).unwrap());
        assert_identity(Compressor::new(FS).unwrap());
        assert_identity(Limiter::new(FS).unwrap());
        assert_identity(DelayLine::new(FS).unwrap());
        assert_identity(GainStage::new());
    }

    #[test]
    fn test_flat_channel_is_identity() {
        assert_identity(ChannelPipeline::new(FS).unwrap());
    }

    #[test]
    fn test_disabled_flags() {
        use crate::crossover::CrossoverConfig;

        let crossover = Crossover::new(FS, CrossoverConfig::highpass(80.0)).unwrap();
        assert!(crossover.is_enabled());
        assert!(!Crossover::new(FS, CrossoverConfig::full_range()).unwrap().is_enabled());
        assert!(!Compressor::new(FS).unwrap().is_enabled());
        assert!(!Limiter::new(FS).unwrap().is_enabled());
        assert!(ParametricEq::new(FS).unwrap().is_enabled());
    }

    #[test]
    fn test_dyn_chain_order() {
        let mut chain: Vec<Box<dyn ChannelProcessor>> = vec![
            Box::new(InvertProcessor),
            Box::new(DelayLine::new(FS).unwrap()),
            Box::new(InvertProcessor),
        ];

        let mut block = vec![0.5, -0.25, 0.125];
        for stage in chain.iter_mut() {
            stage.process_block(&mut block);
        }
        assert_eq!(block, vec![0.5, -0.25, 0.125]);

        for stage in chain.iter_mut() {
            stage.reset();
        }
    }

    #[test]
    fn test_empty_block_is_noop() {
        let mut delay = DelayLine::new(FS).unwrap();
        delay.set_delay_samples(4.0);
        let mut empty: [f32; 0] = [];
        delay.process_block(&mut empty);

        let mut block = [1.0, 0.0, 0.0, 0.0, 0.0];
        delay.process_block(&mut block);
        assert_eq!(block, [0.0, 0.0, 0.0, 0.0, 1.0]);
    }
}
