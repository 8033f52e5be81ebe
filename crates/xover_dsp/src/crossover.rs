//! Crossover Filters
//!
//! Band-splits one output channel. A channel holds a high-pass cascade and
//! a low-pass cascade; the mode decides which of them carry sections:
//!
//! | mode      | high-pass cascade | low-pass cascade |
//! |-----------|-------------------|------------------|
//! | Bypass    | empty             | empty            |
//! | LowPass   | empty             | `lowpass_hz`     |
//! | HighPass  | `highpass_hz`     | empty            |
//! | BandPass  | `highpass_hz`     | `lowpass_hz`     |
//!
//! Empty cascades are pass-through, so processing is the same two-stage call
//! in every mode.

use serde::{Deserialize, Serialize};

use crate::biquad::{Cascade, CascadeCoefficients};
use crate::design::{
    self, clamp_order, design_pass, effective_order, FilterResponse, PassKind, MAX_FREQUENCY_HZ,
    MIN_FREQUENCY_HZ,
};
use crate::error::DspError;
use crate::level::clamp_param;

/// Minimum distance between the corners of a band-pass channel
pub const MIN_BANDPASS_SPAN_HZ: f32 = 10.0;

/// Default satellite/subwoofer split frequency
pub const DEFAULT_CROSSOVER_HZ: f32 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrossoverMode {
    #[default]
    Bypass,
    LowPass,
    HighPass,
    BandPass,
}

/// Crossover settings for one output channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossoverConfig {
    pub mode: CrossoverMode,
    pub response: FilterResponse,
    /// Filter order 1-8; always even for Linkwitz-Riley
    pub order: u8,
    /// Low-pass corner (upper edge of the passband)
    pub lowpass_hz: f32,
    /// High-pass corner (lower edge of the passband)
    pub highpass_hz: f32,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self::full_range()
    }
}

impl CrossoverConfig {
    /// No filtering
    pub fn full_range() -> Self {
        Self {
            mode: CrossoverMode::Bypass,
            response: FilterResponse::LinkwitzRiley,
            order: 4,
            lowpass_hz: MAX_FREQUENCY_HZ,
            highpass_hz: MIN_FREQUENCY_HZ,
        }
    }

    /// 4th-order Linkwitz-Riley high-pass
    pub fn highpass(frequency: f32) -> Self {
        Self {
            mode: CrossoverMode::HighPass,
            highpass_hz: frequency,
            ..Self::full_range()
        }
        .sanitized()
    }

    /// 4th-order Linkwitz-Riley low-pass
    pub fn lowpass(frequency: f32) -> Self {
        Self {
            mode: CrossoverMode::LowPass,
            lowpass_hz: frequency,
            ..Self::full_range()
        }
        .sanitized()
    }

    /// 4th-order Linkwitz-Riley band-pass from `highpass_hz` to `lowpass_hz`
    pub fn bandpass(highpass_hz: f32, lowpass_hz: f32) -> Self {
        Self {
            mode: CrossoverMode::BandPass,
            highpass_hz,
            lowpass_hz,
            ..Self::full_range()
        }
        .sanitized()
    }

    /// Replace the filter family and order
    pub fn with_response(mut self, response: FilterResponse, order: u8) -> Self {
        self.response = response;
        self.order = order;
        self.sanitized()
    }

    /// Clamp every field and restore the band-pass corner ordering
    pub fn sanitized(mut self) -> Self {
        self.order = effective_order(self.response, clamp_order(self.order));
        self.lowpass_hz = clamp_param(self.lowpass_hz, MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ);
        self.highpass_hz = clamp_param(self.highpass_hz, MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ);

        if self.mode == CrossoverMode::BandPass
            && self.highpass_hz > self.lowpass_hz - MIN_BANDPASS_SPAN_HZ
        {
            self.lowpass_hz = self
                .lowpass_hz
                .max(MIN_FREQUENCY_HZ + MIN_BANDPASS_SPAN_HZ);
            self.highpass_hz = self.lowpass_hz - MIN_BANDPASS_SPAN_HZ;
        }
        self
    }

    pub fn set_mode(&mut self, mode: CrossoverMode) {
        self.mode = mode;
        *self = self.sanitized();
    }

    pub fn set_response(&mut self, response: FilterResponse) {
        self.response = response;
        *self = self.sanitized();
    }

    pub fn set_order(&mut self, order: u8) {
        self.order = order;
        *self = self.sanitized();
    }

    /// Set the low-pass corner. In band-pass mode it cannot go below the
    /// high-pass corner plus [`MIN_BANDPASS_SPAN_HZ`].
    pub fn set_lowpass_hz(&mut self, frequency: f32) {
        let mut frequency = clamp_param(frequency, MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ);
        if self.mode == CrossoverMode::BandPass {
            frequency = frequency.max(self.highpass_hz + MIN_BANDPASS_SPAN_HZ);
        }
        self.lowpass_hz = frequency;
    }

    /// Set the high-pass corner. In band-pass mode it cannot go above the
    /// low-pass corner minus [`MIN_BANDPASS_SPAN_HZ`].
    pub fn set_highpass_hz(&mut self, frequency: f32) {
        let mut frequency = clamp_param(frequency, MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ);
        if self.mode == CrossoverMode::BandPass {
            frequency = frequency.min(self.lowpass_hz - MIN_BANDPASS_SPAN_HZ);
        }
        self.highpass_hz = frequency;
    }

    /// Fixed output scaling for the response family
    pub fn gain_compensation(&self) -> f32 {
        if self.mode == CrossoverMode::Bypass {
            return 1.0;
        }
        match (self.response, effective_order(self.response, self.order)) {
            (FilterResponse::LinkwitzRiley, 2) => 0.9,
            (FilterResponse::Bessel, order) if order >= 4 => 1.05,
            _ => 1.0,
        }
    }
}

/// Precomputed coefficients for one crossover channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossoverDesign {
    pub highpass: CascadeCoefficients,
    pub lowpass: CascadeCoefficients,
    pub compensation: f32,
}

impl CrossoverDesign {
    /// Design both cascades for `config`. Uses trig; call off the audio path.
    pub fn compute(config: &CrossoverConfig, sample_rate: f32) -> Result<Self, DspError> {
        let config = config.sanitized();
        let design_for = |kind, frequency| {
            design_pass(kind, config.response, config.order, frequency, sample_rate)
        };

        let (highpass, lowpass) = match config.mode {
            CrossoverMode::Bypass => (CascadeCoefficients::EMPTY, CascadeCoefficients::EMPTY),
            CrossoverMode::LowPass => (
                CascadeCoefficients::EMPTY,
                design_for(PassKind::LowPass, config.lowpass_hz)?,
            ),
            CrossoverMode::HighPass => (
                design_for(PassKind::HighPass, config.highpass_hz)?,
                CascadeCoefficients::EMPTY,
            ),
            CrossoverMode::BandPass => (
                design_for(PassKind::HighPass, config.highpass_hz)?,
                design_for(PassKind::LowPass, config.lowpass_hz)?,
            ),
        };

        Ok(Self {
            highpass,
            lowpass,
            compensation: config.gain_compensation(),
        })
    }

    /// Combined magnitude response in dB, including compensation
    pub fn magnitude_db(&self, frequency: f32, sample_rate: f32) -> f32 {
        self.highpass.magnitude_db(frequency, sample_rate)
            + self.lowpass.magnitude_db(frequency, sample_rate)
            + 20.0 * self.compensation.log10()
    }
}

/// Crossover processor for one output channel
#[derive(Debug, Clone)]
pub struct Crossover {
    config: CrossoverConfig,
    highpass: Cascade,
    lowpass: Cascade,
    compensation: f32,
    sample_rate: f32,
}

impl Crossover {
    pub fn new(sample_rate: f32, config: CrossoverConfig) -> Result<Self, DspError> {
        let sample_rate = design::validate_sample_rate(sample_rate)?;
        let mut crossover = Self {
            config: CrossoverConfig::full_range(),
            highpass: Cascade::default(),
            lowpass: Cascade::default(),
            compensation: 1.0,
            sample_rate,
        };
        crossover.configure(config)?;
        Ok(crossover)
    }

    /// Sanitize, design and install `config`
    pub fn configure(&mut self, config: CrossoverConfig) -> Result<(), DspError> {
        let config = config.sanitized();
        let design = CrossoverDesign::compute(&config, self.sample_rate)?;
        self.apply(config, &design);
        Ok(())
    }

    /// Install a precomputed design. No trig; filter state is cleared.
    pub fn apply(&mut self, config: CrossoverConfig, design: &CrossoverDesign) {
        self.highpass.set_coefficients(&design.highpass);
        self.lowpass.set_coefficients(&design.lowpass);
        self.compensation = design.compensation;
        self.config = config;
    }

    pub fn set_mode(&mut self, mode: CrossoverMode) -> Result<(), DspError> {
        let mut config = self.config;
        config.set_mode(mode);
        self.configure(config)
    }

    pub fn set_response(&mut self, response: FilterResponse) -> Result<(), DspError> {
        let mut config = self.config;
        config.set_response(response);
        self.configure(config)
    }

    pub fn set_order(&mut self, order: u8) -> Result<(), DspError> {
        let mut config = self.config;
        config.set_order(order);
        self.configure(config)
    }

    pub fn set_lowpass_hz(&mut self, frequency: f32) -> Result<(), DspError> {
        let mut config = self.config;
        config.set_lowpass_hz(frequency);
        self.configure(config)
    }

    pub fn set_highpass_hz(&mut self, frequency: f32) -> Result<(), DspError> {
        let mut config = self.config;
        config.set_highpass_hz(frequency);
        self.configure(config)
    }

    pub fn config(&self) -> &CrossoverConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        self.lowpass.process(self.highpass.process(input)) * self.compensation
    }

    pub fn reset(&mut self) {
        self.highpass.reset();
        self.lowpass.reset();
    }
}
