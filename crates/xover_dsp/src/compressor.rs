//! Dynamics Compressor
//!
//! Feed-forward compressor with a soft-knee gain computer operating in the
//! dB domain.
//!
//! # Algorithm
//!
//! Per sample:
//! 1. Detector level: peak `|x|` or RMS over a 32-sample rolling window
//! 2. Envelope (dB) one-pole: attack coefficient while rising, release
//!    coefficient while falling
//! 3. Gain computer with a quadratic knee of width `W` around threshold `T`
//! 4. Makeup gain, then a 1 ms one-pole on the linear gain to avoid clicks

use serde::{Deserialize, Serialize};

use crate::design;
use crate::error::DspError;
use crate::level::{clamp_param, db_to_linear, linear_to_db, SILENCE_DB};

/// RMS detector window length in samples
pub const RMS_WINDOW: usize = 32;
/// Time constant of the anti-click gain smoother
pub const GAIN_SMOOTHING_MS: f32 = 1.0;
/// Largest gain reduction the computer will apply
pub const MAX_GAIN_REDUCTION_DB: f32 = 60.0;

pub const THRESHOLD_RANGE_DB: (f32, f32) = (-60.0, 0.0);
pub const RATIO_RANGE: (f32, f32) = (1.0, 20.0);
pub const ATTACK_RANGE_MS: (f32, f32) = (0.1, 100.0);
pub const RELEASE_RANGE_MS: (f32, f32) = (10.0, 1000.0);
pub const KNEE_RANGE_DB: (f32, f32) = (0.0, 24.0);
pub const MAKEUP_RANGE_DB: (f32, f32) = (0.0, 24.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DetectionMode {
    #[default]
    Rms,
    Peak,
}

/// What the envelope is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompressorPhase {
    /// Below the knee, no reduction
    #[default]
    Idle,
    Attacking,
    Releasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorConfig {
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub knee_width_db: f32,
    pub makeup_gain_db: f32,
    pub detection: DetectionMode,
    pub enabled: bool,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_ms: 20.0,
            release_ms: 200.0,
            knee_width_db: 6.0,
            makeup_gain_db: 0.0,
            detection: DetectionMode::Rms,
            enabled: false,
        }
    }
}

impl CompressorConfig {
    pub fn sanitized(mut self) -> Self {
        self.threshold_db = clamp_param(self.threshold_db, THRESHOLD_RANGE_DB.0, THRESHOLD_RANGE_DB.1);
        self.ratio = clamp_param(self.ratio, RATIO_RANGE.0, RATIO_RANGE.1);
        self.attack_ms = clamp_param(self.attack_ms, ATTACK_RANGE_MS.0, ATTACK_RANGE_MS.1);
        self.release_ms = clamp_param(self.release_ms, RELEASE_RANGE_MS.0, RELEASE_RANGE_MS.1);
        self.knee_width_db = clamp_param(self.knee_width_db, KNEE_RANGE_DB.0, KNEE_RANGE_DB.1);
        self.makeup_gain_db = clamp_param(self.makeup_gain_db, MAKEUP_RANGE_DB.0, MAKEUP_RANGE_DB.1);
        self
    }

    /// Static gain reduction (positive dB) for an envelope level
    pub fn gain_reduction_db(&self, level_db: f32) -> f32 {
        let slope = 1.0 - 1.0 / self.ratio;
        let over = level_db - self.threshold_db;
        let half_knee = self.knee_width_db * 0.5;

        let reduction = if over <= -half_knee {
            0.0
        } else if self.knee_width_db > 0.0 && over < half_knee {
            let x = over + half_knee;
            slope * x * x / (2.0 * self.knee_width_db)
        } else {
            slope * over
        };
        reduction.clamp(0.0, MAX_GAIN_REDUCTION_DB)
    }
}

/// One-pole coefficient for a time constant in milliseconds
#[inline]
pub(crate) fn time_coefficient(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = time_ms * sample_rate / 1000.0;
    if samples <= 0.0 {
        0.0
    } else {
        (-1.0 / samples).exp()
    }
}

/// Precomputed smoothing coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorDesign {
    pub attack: f32,
    pub release: f32,
    pub smoothing: f32,
}

impl CompressorDesign {
    pub fn compute(config: &CompressorConfig, sample_rate: f32) -> Self {
        let config = config.sanitized();
        Self {
            attack: time_coefficient(config.attack_ms, sample_rate),
            release: time_coefficient(config.release_ms, sample_rate),
            smoothing: time_coefficient(GAIN_SMOOTHING_MS, sample_rate),
        }
    }
}

/// Per-channel compressor
#[derive(Debug, Clone)]
pub struct Compressor {
    config: CompressorConfig,
    coeffs: CompressorDesign,
    sample_rate: f32,

    envelope_db: f32,
    gain: f32,
    gain_reduction_db: f32,
    phase: CompressorPhase,

    rms_window: [f32; RMS_WINDOW],
    rms_sum: f32,
    rms_index: usize,
}

impl Compressor {
    pub fn new(sample_rate: f32) -> Result<Self, DspError> {
        let sample_rate = design::validate_sample_rate(sample_rate)?;
        let config = CompressorConfig::default();
        Ok(Self {
            config,
            coeffs: CompressorDesign::compute(&config, sample_rate),
            sample_rate,
            envelope_db: SILENCE_DB,
            gain: 1.0,
            gain_reduction_db: 0.0,
            phase: CompressorPhase::Idle,
            rms_window: [0.0; RMS_WINDOW],
            rms_sum: 0.0,
            rms_index: 0,
        })
    }

    pub fn configure(&mut self, config: CompressorConfig) {
        let config = config.sanitized();
        let design = CompressorDesign::compute(&config, self.sample_rate);
        self.apply(config, &design);
    }

    /// Install new settings. Detector state survives unless the enable
    /// state changes.
    pub fn apply(&mut self, config: CompressorConfig, design: &CompressorDesign) {
        let toggled = config.enabled != self.config.enabled;
        self.config = config;
        self.coeffs = *design;
        if toggled {
            self.reset();
        }
    }

    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.configure(CompressorConfig { threshold_db, ..self.config });
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.configure(CompressorConfig { ratio, ..self.config });
    }

    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        self.configure(CompressorConfig { attack_ms, ..self.config });
    }

    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.configure(CompressorConfig { release_ms, ..self.config });
    }

    pub fn set_knee_width_db(&mut self, knee_width_db: f32) {
        self.configure(CompressorConfig { knee_width_db, ..self.config });
    }

    pub fn set_makeup_gain_db(&mut self, makeup_gain_db: f32) {
        self.configure(CompressorConfig { makeup_gain_db, ..self.config });
    }

    pub fn set_detection(&mut self, detection: DetectionMode) {
        self.configure(CompressorConfig { detection, ..self.config });
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.configure(CompressorConfig { enabled, ..self.config });
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Current gain reduction in dB (positive)
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db
    }

    /// Envelope level in dB
    pub fn envelope_db(&self) -> f32 {
        self.envelope_db
    }

    pub fn phase(&self) -> CompressorPhase {
        self.phase
    }

    #[inline]
    fn detect(&mut self, input: f32) -> f32 {
        match self.config.detection {
            DetectionMode::Peak => input.abs(),
            DetectionMode::Rms => {
                let square = input * input;
                self.rms_sum += square - self.rms_window[self.rms_index];
                self.rms_window[self.rms_index] = square;
                self.rms_index += 1;
                if self.rms_index == RMS_WINDOW {
                    // drop accumulated rounding once per window
                    self.rms_index = 0;
                    self.rms_sum = self.rms_window.iter().sum();
                }
                (self.rms_sum.max(0.0) / RMS_WINDOW as f32).sqrt()
            }
        }
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

        let level_db = linear_to_db(self.detect(input));
        let rising = level_db > self.envelope_db;
        let coeff = if rising {
            self.coeffs.attack
        } else {
            self.coeffs.release
        };
        self.envelope_db = level_db + coeff * (self.envelope_db - level_db);

        self.gain_reduction_db = self.config.gain_reduction_db(self.envelope_db);
        self.phase = if self.gain_reduction_db <= 0.0 {
            CompressorPhase::Idle
        } else if rising {
            CompressorPhase::Attacking
        } else {
            CompressorPhase::Releasing
        };

        let target = db_to_linear(self.config.makeup_gain_db - self.gain_reduction_db);
        self.gain = target + self.coeffs.smoothing * (self.gain - target);
        input * self.gain
    }

    /// Clear envelope, gain and detector history
    pub fn reset(&mut self) {
        self.envelope_db = SILENCE_DB;
        self.gain = 1.0;
        self.gain_reduction_db = 0.0;
        self.phase = CompressorPhase::Idle;
        self.rms_window = [0.0; RMS_WINDOW];
        self.rms_sum = 0.0;
        self.rms_index = 0;
    }
}
