//! Soft Clipping
//!
//! Smooth saturation for the output guard. Below the threshold the signal
//! passes unchanged; above it the excess is squashed with `tanh` so the
//! output approaches, and never exceeds, full scale.

use crate::level::{clamp_param, db_to_linear};

pub const SOFT_CLIP_RANGE_DB: (f32, f32) = (-12.0, 0.0);
pub const DEFAULT_SOFT_CLIP_DB: f32 = -3.0;

/// Soft clipper with a fixed knee threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftClipper {
    /// Threshold where soft clipping begins (linear, 0.25 to 1.0)
    threshold: f32,
}

impl SoftClipper {
    /// # Arguments
    /// * `threshold_db` - Level below 0 dBFS where saturation begins,
    ///   clamped to -12..0 dB
    pub fn new(threshold_db: f32) -> Self {
        let threshold_db = clamp_param(threshold_db, SOFT_CLIP_RANGE_DB.0, SOFT_CLIP_RANGE_DB.1);
        Self {
            threshold: db_to_linear(threshold_db),
        }
    }

    /// Threshold in linear scale
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    #[inline]
    pub fn process_sample(&self, sample: f32) -> f32 {
        soft_clip(sample, self.threshold)
    }
}

impl Default for SoftClipper {
    fn default() -> Self {
        Self::new(DEFAULT_SOFT_CLIP_DB)
    }
}

/// `tanh` saturation of everything above `knee`
///
/// Input at the knee maps to the knee; output tends to +/-1.0.
#[inline]
fn soft_clip(sample: f32, knee: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude <= knee {
        return sample;
    }

    let room = (1.0 - knee).max(0.001);
    let squashed = knee + room * ((magnitude - knee) / room).tanh();
    squashed.min(1.0).copysign(sample)
}
