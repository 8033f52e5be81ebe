//! Peak Limiter
//!
//! Protects drivers from overshoot. The detector sees the undelayed input;
//! with lookahead enabled the audio itself is delayed, so the gain has
//! already dropped by the time a transient reaches the output.
//!
//! Gain law per sample:
//! - envelope: instant rise to `|x|`, decays at the release rate
//! - target: `threshold / envelope` above threshold, floored at -24 dB
//! - falling toward target: attack smoothing, hold counter re-armed
//! - otherwise: frozen while the hold counter runs, then release smoothing

use serde::{Deserialize, Serialize};

use crate::compressor::time_coefficient;
use crate::design;
use crate::error::DspError;
use crate::level::{clamp_param, db_to_linear, linear_to_db};

/// Lookahead ring capacity (covers 5 ms at 192 kHz)
pub const LOOKAHEAD_BUFFER_LEN: usize = 1024;
/// Deepest gain reduction the limiter will apply
pub const GAIN_FLOOR_DB: f32 = -24.0;
/// Release slow-down factor at full reduction when adaptive release is on
const ADAPTIVE_RELEASE_DEPTH: f32 = 5.0;

pub const THRESHOLD_RANGE_DB: (f32, f32) = (-6.0, 0.0);
pub const ATTACK_RANGE_MS: (f32, f32) = (0.1, 10.0);
pub const RELEASE_RANGE_MS: (f32, f32) = (10.0, 500.0);
pub const HOLD_RANGE_MS: (f32, f32) = (0.0, 50.0);
pub const MAKEUP_RANGE_DB: (f32, f32) = (0.0, 6.0);
pub const LOOKAHEAD_RANGE_MS: (f32, f32) = (0.0, 5.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    pub threshold_db: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub hold_ms: f32,
    pub makeup_gain_db: f32,
    pub lookahead_enabled: bool,
    pub lookahead_ms: f32,
    /// Stretch the release as reduction deepens
    pub adaptive_release: bool,
    pub enabled: bool,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            threshold_db: -1.0,
            attack_ms: 1.0,
            release_ms: 100.0,
            hold_ms: 5.0,
            makeup_gain_db: 0.0,
            lookahead_enabled: false,
            lookahead_ms: 1.5,
            adaptive_release: false,
            enabled: false,
        }
    }
}

impl LimiterConfig {
    pub fn sanitized(mut self) -> Self {
        self.threshold_db = clamp_param(self.threshold_db, THRESHOLD_RANGE_DB.0, THRESHOLD_RANGE_DB.1);
        self.attack_ms = clamp_param(self.attack_ms, ATTACK_RANGE_MS.0, ATTACK_RANGE_MS.1);
        self.release_ms = clamp_param(self.release_ms, RELEASE_RANGE_MS.0, RELEASE_RANGE_MS.1);
        self.hold_ms = clamp_param(self.hold_ms, HOLD_RANGE_MS.0, HOLD_RANGE_MS.1);
        self.makeup_gain_db = clamp_param(self.makeup_gain_db, MAKEUP_RANGE_DB.0, MAKEUP_RANGE_DB.1);
        self.lookahead_ms = clamp_param(self.lookahead_ms, LOOKAHEAD_RANGE_MS.0, LOOKAHEAD_RANGE_MS.1);
        self
    }
}

/// Precomputed limiter constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterDesign {
    pub threshold: f32,
    pub makeup: f32,
    pub gain_floor: f32,
    pub attack: f32,
    pub release: f32,
    pub hold_samples: u32,
    pub lookahead_samples: usize,
}

impl LimiterDesign {
    pub fn compute(config: &LimiterConfig, sample_rate: f32) -> Self {
        let config = config.sanitized();
        let lookahead_samples = if config.lookahead_enabled {
            ((config.lookahead_ms * sample_rate / 1000.0).round() as usize)
                .min(LOOKAHEAD_BUFFER_LEN - 1)
        } else {
            0
        };
        Self {
            threshold: db_to_linear(config.threshold_db),
            makeup: db_to_linear(config.makeup_gain_db),
            gain_floor: db_to_linear(GAIN_FLOOR_DB),
            attack: time_coefficient(config.attack_ms, sample_rate),
            release: time_coefficient(config.release_ms, sample_rate),
            hold_samples: (config.hold_ms * sample_rate / 1000.0).round() as u32,
            lookahead_samples,
        }
    }
}

/// Per-channel limiter
#[derive(Debug, Clone)]
pub struct Limiter {
    config: LimiterConfig,
    coeffs: LimiterDesign,
    sample_rate: f32,

    envelope: f32,
    gain: f32,
    hold_counter: u32,

    lookahead: [f32; LOOKAHEAD_BUFFER_LEN],
    write_index: usize,
}

impl Limiter {
    pub fn new(sample_rate: f32) -> Result<Self, DspError> {
        let sample_rate = design::validate_sample_rate(sample_rate)?;
        let config = LimiterConfig::default();
        Ok(Self {
            config,
            coeffs: LimiterDesign::compute(&config, sample_rate),
            sample_rate,
            envelope: 0.0,
            gain: 1.0,
            hold_counter: 0,
            lookahead: [0.0; LOOKAHEAD_BUFFER_LEN],
            write_index: 0,
        })
    }

    pub fn configure(&mut self, config: LimiterConfig) {
        let config = config.sanitized();
        let design = LimiterDesign::compute(&config, self.sample_rate);
        self.apply(config, &design);
    }

    /// Install new settings. Toggling the limiter or changing the lookahead
    /// length clears all runtime state.
    pub fn apply(&mut self, config: LimiterConfig, design: &LimiterDesign) {
        let flush = config.enabled != self.config.enabled
            || design.lookahead_samples != self.coeffs.lookahead_samples;
        self.config = config;
        self.coeffs = *design;
        if flush {
            self.reset();
        }
    }

    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.configure(LimiterConfig { threshold_db, ..self.config });
    }

    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        self.configure(LimiterConfig { attack_ms, ..self.config });
    }

    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.configure(LimiterConfig { release_ms, ..self.config });
    }

    pub fn set_hold_ms(&mut self, hold_ms: f32) {
        self.configure(LimiterConfig { hold_ms, ..self.config });
    }

    pub fn set_makeup_gain_db(&mut self, makeup_gain_db: f32) {
        self.configure(LimiterConfig { makeup_gain_db, ..self.config });
    }

    pub fn set_lookahead(&mut self, enabled: bool, lookahead_ms: f32) {
        self.configure(LimiterConfig {
            lookahead_enabled: enabled,
            lookahead_ms,
            ..self.config
        });
    }

    pub fn set_adaptive_release(&mut self, adaptive_release: bool) {
        self.configure(LimiterConfig { adaptive_release, ..self.config });
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.configure(LimiterConfig { enabled, ..self.config });
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Current gain reduction in dB (positive)
    pub fn gain_reduction_db(&self) -> f32 {
        -linear_to_db(self.gain)
    }

    /// Latency added by lookahead, in samples
    pub fn latency_samples(&self) -> usize {
        self.coeffs.lookahead_samples
    }

    #[inline]
    fn delay(&mut self, input: f32) -> f32 {
        let la = self.coeffs.lookahead_samples;
        if la == 0 {
            return input;
        }
        self.lookahead[self.write_index] = input;
        let read = (self.write_index + LOOKAHEAD_BUFFER_LEN - la) % LOOKAHEAD_BUFFER_LEN;
        self.write_index = (self.write_index + 1) % LOOKAHEAD_BUFFER_LEN;
        self.lookahead[read]
    }

    /// Process one sample
    ///
    /// # Real-time Safety
    /// No allocations, O(1) time.
    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        if !self.config.enabled {
            return input;
        }

        let delayed = self.delay(input);
        let c = &self.coeffs;

        let level = input.abs();
        self.envelope = if level > self.envelope {
            level
        } else {
            level + c.release * (self.envelope - level)
        };

        let target = if self.envelope > c.threshold {
            (c.threshold / self.envelope).max(c.gain_floor)
        } else {
            1.0
        };

        if target < self.gain {
            self.gain = target + c.attack * (self.gain - target);
            self.hold_counter = c.hold_samples;
        } else if self.hold_counter > 0 {
            self.hold_counter -= 1;
        } else {
            let release = if self.config.adaptive_release {
                let scale = 1.0 + ADAPTIVE_RELEASE_DEPTH * (1.0 - self.gain);
                1.0 - (1.0 - c.release) / scale
            } else {
                c.release
            };
            self.gain = target + release * (self.gain - target);
        }

        (delayed * self.gain * c.makeup).clamp(-1.0, 1.0)
    }

    /// Clear envelope, gain, hold and the lookahead ring
    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.gain = 1.0;
        self.hold_counter = 0;
        self.lookahead = [0.0; LOOKAHEAD_BUFFER_LEN];
        self.write_index = 0;
    }
}
