//! Level conversions and metering

/// Floor used when converting silence to decibels
pub const SILENCE_DB: f32 = -120.0;

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels, floored at [`SILENCE_DB`]
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    let magnitude = linear.abs();
    if magnitude <= 1e-6 {
        SILENCE_DB
    } else {
        (20.0 * magnitude.log10()).max(SILENCE_DB)
    }
}

/// Clamp a control value, mapping NaN onto the lower bound
#[inline]
pub(crate) fn clamp_param(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

/// Peak and RMS level meter for one channel
///
/// Updated once per block. The peak falls by `PEAK_DECAY` per block unless a
/// louder sample arrives; RMS is a one-pole average of each block's mean
/// square.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelMeter {
    peak: f32,
    mean_square: f32,
}

impl LevelMeter {
    const PEAK_DECAY: f32 = 0.95;
    const RMS_SMOOTHING: f32 = 0.9;

    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one processed block into the meter
    #[inline]
    pub fn update(&mut self, block: &[f32]) {
        if block.is_empty() {
            return;
        }

        let mut peak = 0.0_f32;
        let mut sum = 0.0_f32;
        for &sample in block {
            peak = peak.max(sample.abs());
            sum += sample * sample;
        }

        self.peak = peak.max(self.peak * Self::PEAK_DECAY);
        let block_ms = sum / block.len() as f32;
        self.mean_square =
            Self::RMS_SMOOTHING * self.mean_square + (1.0 - Self::RMS_SMOOTHING) * block_ms;
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn rms(&self) -> f32 {
        self.mean_square.sqrt()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
