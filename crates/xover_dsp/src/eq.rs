//! 5-Band Parametric Equalizer
//!
//! One EQ per output channel: a pre-gain followed by five biquad bands in
//! series. Band shapes come from the RBJ Audio EQ Cookbook (see
//! [`crate::design`]).

use serde::{Deserialize, Serialize};

use crate::biquad::{Biquad, BiquadCoefficients};
use crate::design::{self, design_band, BandType, MAX_FREQUENCY_HZ, MAX_Q, MIN_FREQUENCY_HZ, MIN_Q};
use crate::error::DspError;
use crate::level::{clamp_param, db_to_linear};

/// Number of bands per channel
pub const PEQ_BANDS: usize = 5;

pub const MIN_BAND_GAIN_DB: f32 = -12.0;
pub const MAX_BAND_GAIN_DB: f32 = 12.0;
pub const MIN_PRE_GAIN_DB: f32 = -12.0;
pub const MAX_PRE_GAIN_DB: f32 = 12.0;

/// Default band layout: (type, frequency, Q)
pub const DEFAULT_BANDS: [(BandType, f32, f32); PEQ_BANDS] = [
    (BandType::LowShelf, 80.0, 0.707),
    (BandType::Bell, 250.0, 1.0),
    (BandType::Bell, 1000.0, 1.0),
    (BandType::Bell, 3500.0, 1.0),
    (BandType::HighShelf, 10000.0, 0.707),
];

/// Single EQ band configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub band_type: BandType,
    pub frequency: f32,
    pub gain_db: f32,
    pub q: f32,
    pub enabled: bool,
}

impl Band {
    pub fn new(band_type: BandType, frequency: f32, q: f32) -> Self {
        Self {
            band_type,
            frequency,
            gain_db: 0.0,
            q,
            enabled: true,
        }
    }

    pub fn with_gain(mut self, gain_db: f32) -> Self {
        self.gain_db = gain_db;
        self
    }

    /// Clamp frequency, gain and Q into range
    pub fn sanitized(mut self) -> Self {
        self.frequency = clamp_param(self.frequency, MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ);
        self.gain_db = clamp_param(self.gain_db, MIN_BAND_GAIN_DB, MAX_BAND_GAIN_DB);
        self.q = clamp_param(self.q, MIN_Q, MAX_Q);
        self
    }

    /// Generate the biquad for this band. Disabled bands design to identity.
    pub fn to_coefficients(self, sample_rate: f32) -> Result<BiquadCoefficients, DspError> {
        if !self.enabled {
            return Ok(BiquadCoefficients::IDENTITY);
        }
        design_band(self.band_type, self.frequency, self.q, self.gain_db, sample_rate)
    }
}

/// Complete EQ configuration for one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqConfig {
    pub bands: [Band; PEQ_BANDS],
    pub pre_gain_db: f32,
    pub enabled: bool,
}

impl Default for EqConfig {
    fn default() -> Self {
        let bands = core::array::from_fn(|i| {
            let (band_type, frequency, q) = DEFAULT_BANDS[i];
            Band::new(band_type, frequency, q)
        });

        Self {
            bands,
            pre_gain_db: 0.0,
            enabled: true,
        }
    }
}

impl EqConfig {
    fn check_band(band_index: usize) -> Result<(), DspError> {
        if band_index < PEQ_BANDS {
            Ok(())
        } else {
            Err(DspError::InvalidBandIndex(band_index))
        }
    }

    /// Replace a whole band
    pub fn set_band(&mut self, band_index: usize, band: Band) -> Result<(), DspError> {
        Self::check_band(band_index)?;
        self.bands[band_index] = band.sanitized();
        Ok(())
    }

    /// Set gain for a specific band (0-4)
    pub fn set_band_gain(&mut self, band_index: usize, gain_db: f32) -> Result<(), DspError> {
        Self::check_band(band_index)?;
        self.bands[band_index].gain_db = clamp_param(gain_db, MIN_BAND_GAIN_DB, MAX_BAND_GAIN_DB);
        Ok(())
    }

    pub fn set_band_frequency(&mut self, band_index: usize, frequency: f32) -> Result<(), DspError> {
        Self::check_band(band_index)?;
        self.bands[band_index].frequency =
            clamp_param(frequency, MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ);
        Ok(())
    }

    pub fn set_band_q(&mut self, band_index: usize, q: f32) -> Result<(), DspError> {
        Self::check_band(band_index)?;
        self.bands[band_index].q = clamp_param(q, MIN_Q, MAX_Q);
        Ok(())
    }

    pub fn set_band_type(&mut self, band_index: usize, band_type: BandType) -> Result<(), DspError> {
        Self::check_band(band_index)?;
        self.bands[band_index].band_type = band_type;
        Ok(())
    }

    pub fn set_band_enabled(&mut self, band_index: usize, enabled: bool) -> Result<(), DspError> {
        Self::check_band(band_index)?;
        self.bands[band_index].enabled = enabled;
        Ok(())
    }

    pub fn set_pre_gain_db(&mut self, gain_db: f32) {
        self.pre_gain_db = clamp_param(gain_db, MIN_PRE_GAIN_DB, MAX_PRE_GAIN_DB);
    }

    pub fn sanitized(mut self) -> Self {
        for band in &mut self.bands {
            *band = band.sanitized();
        }
        self.pre_gain_db = clamp_param(self.pre_gain_db, MIN_PRE_GAIN_DB, MAX_PRE_GAIN_DB);
        self
    }

    /// Get all gains (useful for UI serialization)
    pub fn gains(&self) -> [f32; PEQ_BANDS] {
        core::array::from_fn(|i| self.bands[i].gain_db)
    }
}

/// Precomputed coefficients for every band plus the linear pre-gain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqDesign {
    pub bands: [BiquadCoefficients; PEQ_BANDS],
    pub pre_gain: f32,
}

impl EqDesign {
    pub fn compute(config: &EqConfig, sample_rate: f32) -> Result<Self, DspError> {
        let config = config.sanitized();
        let mut bands = [BiquadCoefficients::IDENTITY; PEQ_BANDS];
        for (coeffs, band) in bands.iter_mut().zip(config.bands.iter()) {
            *coeffs = band.to_coefficients(sample_rate)?;
        }
        Ok(Self {
            bands,
            pre_gain: db_to_linear(config.pre_gain_db),
        })
    }

    /// Combined magnitude response in dB (for response plots)
    pub fn magnitude_db(&self, frequency: f32, sample_rate: f32) -> f32 {
        20.0 * self.pre_gain.log10()
            + self
                .bands
                .iter()
                .map(|c| c.magnitude_db(frequency, sample_rate))
                .sum::<f32>()
    }
}

/// Five-band parametric EQ of one output
///
/// Owns the biquad state; coefficients come from [`EqDesign`].
#[derive(Debug, Clone)]
pub struct ParametricEq {
    filters: [Biquad; PEQ_BANDS],
    config: EqConfig,
    sample_rate: f32,
    pre_gain_linear: f32,
}

impl ParametricEq {
    /// Create an equalizer with the default flat layout
    pub fn new(sample_rate: f32) -> Result<Self, DspError> {
        let sample_rate = design::validate_sample_rate(sample_rate)?;
        let mut eq = Self {
            filters: [Biquad::default(); PEQ_BANDS],
            config: EqConfig::default(),
            sample_rate,
            pre_gain_linear: 1.0,
        };
        eq.update_config(EqConfig::default())?;
        Ok(eq)
    }

    /// Update the whole EQ configuration
    ///
    /// Recalculates every band and clears all filter state.
    pub fn update_config(&mut self, config: EqConfig) -> Result<(), DspError> {
        let config = config.sanitized();
        let design = EqDesign::compute(&config, self.sample_rate)?;
        self.apply(config, &design);
        Ok(())
    }

    /// Install a precomputed design for all bands
    pub fn apply(&mut self, config: EqConfig, design: &EqDesign) {
        for (filter, coeffs) in self.filters.iter_mut().zip(design.bands.iter()) {
            filter.set_coefficients(*coeffs);
        }
        self.pre_gain_linear = design.pre_gain;
        self.config = config;
    }

    /// Install one band's coefficients; only that band's state is cleared
    pub fn apply_band(&mut self, band_index: usize, band: Band, coeffs: BiquadCoefficients) {
        if band_index < PEQ_BANDS {
            self.filters[band_index].set_coefficients(coeffs);
            self.config.bands[band_index] = band;
        }
    }

    /// Change module-level settings (pre-gain, enable) without touching
    /// bands. Filter state is cleared when the enable state changes.
    pub fn apply_settings(&mut self, pre_gain_db: f32, enabled: bool, pre_gain_linear: f32) {
        if enabled != self.config.enabled {
            self.reset();
        }
        self.config.pre_gain_db = pre_gain_db;
        self.config.enabled = enabled;
        self.pre_gain_linear = pre_gain_linear;
    }

    /// Replace one band, recomputing only its coefficients
    pub fn set_band(&mut self, band_index: usize, band: Band) -> Result<(), DspError> {
        let mut config = self.config;
        config.set_band(band_index, band)?;
        let band = config.bands[band_index];
        let coeffs = band.to_coefficients(self.sample_rate)?;
        self.apply_band(band_index, band, coeffs);
        Ok(())
    }

    /// Set gain for a single band (convenience method)
    pub fn set_band_gain(&mut self, band_index: usize, gain_db: f32) -> Result<(), DspError> {
        let mut config = self.config;
        config.set_band_gain(band_index, gain_db)?;
        self.set_band(band_index, config.bands[band_index])
    }

    pub fn set_band_frequency(&mut self, band_index: usize, frequency: f32) -> Result<(), DspError> {
        let mut config = self.config;
        config.set_band_frequency(band_index, frequency)?;
        self.set_band(band_index, config.bands[band_index])
    }

    pub fn set_band_q(&mut self, band_index: usize, q: f32) -> Result<(), DspError> {
        let mut config = self.config;
        config.set_band_q(band_index, q)?;
        self.set_band(band_index, config.bands[band_index])
    }

    pub fn set_band_type(&mut self, band_index: usize, band_type: BandType) -> Result<(), DspError> {
        let mut config = self.config;
        config.set_band_type(band_index, band_type)?;
        self.set_band(band_index, config.bands[band_index])
    }

    pub fn set_band_enabled(&mut self, band_index: usize, enabled: bool) -> Result<(), DspError> {
        let mut config = self.config;
        config.set_band_enabled(band_index, enabled)?;
        self.set_band(band_index, config.bands[band_index])
    }

    pub fn set_pre_gain_db(&mut self, gain_db: f32) {
        let mut config = self.config;
        config.set_pre_gain_db(gain_db);
        self.apply_settings(
            config.pre_gain_db,
            config.enabled,
            db_to_linear(config.pre_gain_db),
        );
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.apply_settings(self.config.pre_gain_db, enabled, self.pre_gain_linear);
    }

    /// Pre-gain, then every enabled band in order
    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        if !self.config.enabled {
            return input;
        }

        let mut x = input * self.pre_gain_linear;
        for (filter, band) in self.filters.iter_mut().zip(self.config.bands.iter()) {
            if band.enabled {
                x = filter.process(x);
            }
        }
        x
    }

    pub fn config(&self) -> &EqConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Zero every band's biquad memory
    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }
}
