//! Time-Alignment Delay
//!
//! Fractional-sample delay line with optional polarity inversion, used to
//! align drivers at different distances from the listener.

use serde::{Deserialize, Serialize};

use crate::design;
use crate::error::DspError;
use crate::level::clamp_param;

/// Buffer length; a power of two so wrap-around is a mask
pub const DELAY_BUFFER_LEN: usize = 4096;
const DELAY_MASK: usize = DELAY_BUFFER_LEN - 1;

pub const MAX_DELAY_MS: f32 = 20.0;
pub const TEMPERATURE_RANGE_C: (f32, f32) = (-20.0, 50.0);
pub const DEFAULT_TEMPERATURE_C: f32 = 20.0;

/// Speed of sound in air (m/s) at `temperature_c`
pub fn speed_of_sound(temperature_c: f32) -> f32 {
    331.3 + 0.606 * temperature_c
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    #[default]
    Linear,
    /// Catmull-Rom; falls back to linear below one sample of delay
    Cubic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceUnit {
    Meters,
    Centimeters,
    Inches,
    Feet,
}

impl DistanceUnit {
    fn to_meters(self, distance: f32) -> f32 {
        match self {
            Self::Meters => distance,
            Self::Centimeters => distance * 0.01,
            Self::Inches => distance * 0.0254,
            Self::Feet => distance * 0.3048,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayConfig {
    pub delay_ms: f32,
    pub phase_invert: bool,
    pub enabled: bool,
    pub interpolation: Interpolation,
    /// Air temperature used for distance conversion
    pub temperature_c: f32,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            delay_ms: 0.0,
            phase_invert: false,
            enabled: true,
            interpolation: Interpolation::Linear,
            temperature_c: DEFAULT_TEMPERATURE_C,
        }
    }
}

impl DelayConfig {
    pub fn sanitized(mut self) -> Self {
        self.delay_ms = clamp_param(self.delay_ms, 0.0, MAX_DELAY_MS);
        self.temperature_c =
            clamp_param(self.temperature_c, TEMPERATURE_RANGE_C.0, TEMPERATURE_RANGE_C.1);
        self
    }

    pub fn set_delay_ms(&mut self, delay_ms: f32) {
        self.delay_ms = clamp_param(delay_ms, 0.0, MAX_DELAY_MS);
    }

    pub fn set_delay_samples(&mut self, samples: f32, sample_rate: f32) {
        self.set_delay_ms(samples * 1000.0 / sample_rate);
    }

    /// Delay equivalent to sound travelling `distance` at the configured
    /// temperature
    pub fn set_distance(&mut self, distance: f32, unit: DistanceUnit) {
        let meters = unit.to_meters(distance);
        self.set_delay_ms(meters / speed_of_sound(self.temperature_c) * 1000.0);
    }

    pub fn set_temperature_c(&mut self, temperature_c: f32) {
        self.temperature_c =
            clamp_param(temperature_c, TEMPERATURE_RANGE_C.0, TEMPERATURE_RANGE_C.1);
    }

    /// Delay as a distance in meters at the configured temperature
    pub fn distance_m(&self) -> f32 {
        self.delay_ms / 1000.0 * speed_of_sound(self.temperature_c)
    }

    /// Delay length in samples, snapped to an integer when within 1/1000
    /// of one
    pub fn delay_samples(&self, sample_rate: f32) -> f32 {
        let samples = self.delay_ms * sample_rate / 1000.0;
        let rounded = samples.round();
        if (samples - rounded).abs() < 1e-3 {
            rounded
        } else {
            samples
        }
    }
}

/// Per-channel delay line
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: [f32; DELAY_BUFFER_LEN],
    write_index: usize,
    delay_whole: usize,
    delay_frac: f32,
    config: DelayConfig,
    sample_rate: f32,
}

impl DelayLine {
    pub fn new(sample_rate: f32) -> Result<Self, DspError> {
        let sample_rate = design::validate_sample_rate(sample_rate)?;
        let mut line = Self {
            buffer: [0.0; DELAY_BUFFER_LEN],
            write_index: 0,
            delay_whole: 0,
            delay_frac: 0.0,
            config: DelayConfig::default(),
            sample_rate,
        };
        line.apply(DelayConfig::default());
        Ok(line)
    }

    /// Install new settings. The buffer contents are kept.
    pub fn apply(&mut self, config: DelayConfig) {
        let config = config.sanitized();
        let max_samples = MAX_DELAY_MS * self.sample_rate / 1000.0;
        let samples = config.delay_samples(self.sample_rate).min(max_samples);
        self.delay_whole = samples.floor() as usize;
        self.delay_frac = samples - samples.floor();
        self.config = config;
    }

    pub fn set_delay_ms(&mut self, delay_ms: f32) {
        let mut config = self.config;
        config.set_delay_ms(delay_ms);
        self.apply(config);
    }

    pub fn set_delay_samples(&mut self, samples: f32) {
        let mut config = self.config;
        config.set_delay_samples(samples, self.sample_rate);
        self.apply(config);
    }

    pub fn set_distance(&mut self, distance: f32, unit: DistanceUnit) {
        let mut config = self.config;
        config.set_distance(distance, unit);
        self.apply(config);
    }

    pub fn set_phase_invert(&mut self, phase_invert: bool) {
        self.apply(DelayConfig { phase_invert, ..self.config });
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.apply(DelayConfig { interpolation, ..self.config });
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.apply(DelayConfig { enabled, ..self.config });
    }

    pub fn config(&self) -> &DelayConfig {
        &self.config
    }

    /// Effective delay in samples
    pub fn delay_samples(&self) -> f32 {
        self.delay_whole as f32 + self.delay_frac
    }

    /// Zero the buffer
    pub fn flush(&mut self) {
        self.buffer = [0.0; DELAY_BUFFER_LEN];
    }

    #[inline]
    fn tap(&self, delay: usize) -> f32 {
        self.buffer[(self.write_index.wrapping_sub(delay)) & DELAY_MASK]
    }

    /// Process one sample: write, read `delay` samples back, advance
    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        if !self.config.enabled {
            return input;
        }

        self.buffer[self.write_index] = input;

        let d = self.delay_whole;
        let t = self.delay_frac;
        let p1 = self.tap(d);
        let p2 = self.tap(d + 1);

        let output = if self.config.interpolation == Interpolation::Cubic && d >= 1 {
            let p0 = self.tap(d - 1);
            let p3 = self.tap(d + 2);
            p1 + 0.5
                * t
                * (p2 - p0
                    + t * (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3
                        + t * (3.0 * (p1 - p2) + p3 - p0)))
        } else {
            p1 + t * (p2 - p1)
        };

        self.write_index = (self.write_index + 1) & DELAY_MASK;

        if self.config.phase_invert {
            -output
        } else {
            output
        }
    }

    /// Flush history (same as [`DelayLine::flush`])
    pub fn reset(&mut self) {
        self.flush();
        self.write_index = 0;
    }
}
