//! Filter Designer
//!
//! Stateless coefficient math. Every function here may use trig and
//! transcendental functions, so nothing in this module is called from the
//! per-sample path: designs are computed on the control side and handed to
//! the processors as finished [`CascadeCoefficients`] / [`BiquadCoefficients`].
//!
//! - Butterworth: per-section Q from the pole angles, plus a bilinear
//!   first-order section for odd orders.
//! - Linkwitz-Riley: two identical Butterworth cascades of half the order.
//! - Bessel: fixed (frequency scale, Q) table per order.
//! - EQ shapes: RBJ Audio EQ Cookbook.

use std::f64::consts::PI;

use biquad::{Coefficients, ToHertz, Type};
use serde::{Deserialize, Serialize};

use crate::biquad::{BiquadCoefficients, CascadeCoefficients};
use crate::error::DspError;
use crate::level::clamp_param;

/// Lowest designable corner/center frequency (Hz)
pub const MIN_FREQUENCY_HZ: f32 = 20.0;
/// Highest designable corner/center frequency (Hz), before the Nyquist limit
pub const MAX_FREQUENCY_HZ: f32 = 20000.0;
pub const MIN_Q: f32 = 0.1;
pub const MAX_Q: f32 = 10.0;
pub const MIN_ORDER: u8 = 1;
pub const MAX_ORDER: u8 = 8;
pub const MIN_SAMPLE_RATE: f32 = 8000.0;
pub const MAX_SAMPLE_RATE: f32 = 192000.0;

/// Filter family used for crossover slopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterResponse {
    Butterworth,
    #[default]
    LinkwitzRiley,
    Bessel,
}

/// Direction of a pass filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    LowPass,
    HighPass,
}

/// Shape of a single EQ band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandType {
    Bell,
    LowShelf,
    HighShelf,
    LowPass,
    HighPass,
    Notch,
    BandPass,
    AllPass,
}

impl BandType {
    /// Whether the band's gain parameter affects its response
    pub fn uses_gain(self) -> bool {
        matches!(self, Self::Bell | Self::LowShelf | Self::HighShelf)
    }
}

/// Bessel (frequency scale, Q) pairs per order; a `None` Q marks the real
/// pole of odd orders.
const BESSEL_TABLE: [&[(f32, Option<f32>)]; 8] = [
    &[(1.0, None)],
    &[(1.2736, Some(0.5773))],
    &[(1.3270, None), (1.4524, Some(0.6910))],
    &[(1.4192, Some(0.5219)), (1.5912, Some(0.8055))],
    &[
        (1.5069, None),
        (1.5611, Some(0.5635)),
        (1.7607, Some(0.9165)),
    ],
    &[
        (1.6060, Some(0.5103)),
        (1.6913, Some(0.6112)),
        (1.9071, Some(1.0234)),
    ],
    &[
        (1.6853, None),
        (1.7174, Some(0.5324)),
        (1.8235, Some(0.6608)),
        (2.0507, Some(1.1262)),
    ],
    &[
        (1.7837, Some(0.5060)),
        (1.8376, Some(0.5596)),
        (1.9591, Some(0.7109)),
        (2.1953, Some(1.2258)),
    ],
];

/// Reject sample rates the designer cannot work with
pub fn validate_sample_rate(sample_rate: f32) -> Result<f32, DspError> {
    if sample_rate.is_finite() && (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        Ok(sample_rate)
    } else {
        Err(DspError::InvalidSampleRate(sample_rate))
    }
}

/// Upper frequency bound for a sample rate: `min(20 kHz, fs/2 - 1)`
#[inline]
pub fn max_frequency(sample_rate: f32) -> f32 {
    MAX_FREQUENCY_HZ.min(sample_rate * 0.5 - 1.0)
}

/// Clamp a frequency into the designable range for `sample_rate`
pub fn clamp_frequency(frequency: f32, sample_rate: f32) -> f32 {
    clamp_param(frequency, MIN_FREQUENCY_HZ, max_frequency(sample_rate))
}

pub fn clamp_q(q: f32) -> f32 {
    clamp_param(q, MIN_Q, MAX_Q)
}

pub fn clamp_order(order: u8) -> u8 {
    order.clamp(MIN_ORDER, MAX_ORDER)
}

/// Order actually realized by a response family (Linkwitz-Riley rounds odd
/// orders up to the next even one)
pub fn effective_order(response: FilterResponse, order: u8) -> u8 {
    let order = clamp_order(order);
    match response {
        FilterResponse::LinkwitzRiley => (order + 1) / 2 * 2,
        FilterResponse::Butterworth | FilterResponse::Bessel => order,
    }
}

/// Q of the `section`-th second-order stage of an `order`-th order
/// Butterworth filter
pub fn butterworth_q(order: u8, section: usize) -> f32 {
    let n = f64::from(order);
    let angle = (2.0 * section as f64 + 1.0) * PI / (2.0 * n);
    (1.0 / (2.0 * angle.sin())) as f32
}

/// Design a low- or high-pass cascade
pub fn design_pass(
    kind: PassKind,
    response: FilterResponse,
    order: u8,
    frequency: f32,
    sample_rate: f32,
) -> Result<CascadeCoefficients, DspError> {
    let sample_rate = validate_sample_rate(sample_rate)?;
    let frequency = clamp_frequency(frequency, sample_rate);
    let order = effective_order(response, order);

    match response {
        FilterResponse::Butterworth => butterworth(kind, order, frequency, sample_rate),
        FilterResponse::LinkwitzRiley => {
            let half = butterworth(kind, order / 2, frequency, sample_rate)?;
            let mut cascade = half;
            cascade.extend(&half);
            Ok(cascade)
        }
        FilterResponse::Bessel => bessel(kind, order, frequency, sample_rate),
    }
}

fn butterworth(
    kind: PassKind,
    order: u8,
    frequency: f32,
    sample_rate: f32,
) -> Result<CascadeCoefficients, DspError> {
    let mut cascade = CascadeCoefficients::EMPTY;
    for section in 0..usize::from(order / 2) {
        let q = butterworth_q(order, section);
        cascade.push(second_order(kind, frequency, q, sample_rate)?);
    }
    if order % 2 == 1 {
        cascade.push(first_order(kind, frequency, sample_rate));
    }
    Ok(cascade)
}

fn bessel(
    kind: PassKind,
    order: u8,
    frequency: f32,
    sample_rate: f32,
) -> Result<CascadeCoefficients, DspError> {
    let mut cascade = CascadeCoefficients::EMPTY;
    let table = BESSEL_TABLE[usize::from(order) - 1];
    for &(scale, q) in table {
        let section_frequency = match kind {
            PassKind::LowPass => frequency * scale,
            PassKind::HighPass => frequency / scale,
        };
        let section_frequency = clamp_frequency(section_frequency, sample_rate);
        let coeffs = match q {
            Some(q) => second_order(kind, section_frequency, q, sample_rate)?,
            None => first_order(kind, section_frequency, sample_rate),
        };
        cascade.push(coeffs);
    }
    Ok(cascade)
}

/// Second-order low/high-pass section (RBJ, via the `biquad` crate)
fn second_order(
    kind: PassKind,
    frequency: f32,
    q: f32,
    sample_rate: f32,
) -> Result<BiquadCoefficients, DspError> {
    let filter_type = match kind {
        PassKind::LowPass => Type::LowPass,
        PassKind::HighPass => Type::HighPass,
    };
    Coefficients::<f32>::from_params(filter_type, sample_rate.hz(), frequency.hz(), q)
        .map(BiquadCoefficients::from)
        .map_err(|_| DspError::InvalidCoefficients {
            frequency,
            sample_rate,
        })
}

/// First-order section by bilinear transform, `K = tan(pi f / fs)`
fn first_order(kind: PassKind, frequency: f32, sample_rate: f32) -> BiquadCoefficients {
    let k = (PI * f64::from(frequency) / f64::from(sample_rate)).tan();
    let norm = 1.0 / (1.0 + k);
    let a1 = ((k - 1.0) * norm) as f32;
    match kind {
        PassKind::LowPass => BiquadCoefficients {
            b0: (k * norm) as f32,
            b1: (k * norm) as f32,
            b2: 0.0,
            a1,
            a2: 0.0,
        },
        PassKind::HighPass => BiquadCoefficients {
            b0: norm as f32,
            b1: -norm as f32,
            b2: 0.0,
            a1,
            a2: 0.0,
        },
    }
}

/// Design one EQ band
///
/// Frequency and Q are clamped first. Bell and shelf bands at exactly 0 dB
/// return [`BiquadCoefficients::IDENTITY`].
pub fn design_band(
    band_type: BandType,
    frequency: f32,
    q: f32,
    gain_db: f32,
    sample_rate: f32,
) -> Result<BiquadCoefficients, DspError> {
    let sample_rate = validate_sample_rate(sample_rate)?;
    let frequency = clamp_frequency(frequency, sample_rate);
    let q = clamp_q(q);
    let gain_db = if gain_db.is_nan() { 0.0 } else { gain_db };

    if band_type.uses_gain() && gain_db == 0.0 {
        return Ok(BiquadCoefficients::IDENTITY);
    }

    match band_type {
        BandType::LowPass => second_order(PassKind::LowPass, frequency, q, sample_rate),
        BandType::HighPass => second_order(PassKind::HighPass, frequency, q, sample_rate),
        _ => Ok(cookbook(band_type, frequency, q, gain_db, sample_rate)),
    }
}

/// RBJ cookbook shapes, `A = 10^(gain/40)`
fn cookbook(
    band_type: BandType,
    frequency: f32,
    q: f32,
    gain_db: f32,
    sample_rate: f32,
) -> BiquadCoefficients {
    let w0 = 2.0 * PI * f64::from(frequency) / f64::from(sample_rate);
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * f64::from(q));
    let a = 10.0_f64.powf(f64::from(gain_db) / 40.0);
    let shelf = 2.0 * a.sqrt() * alpha;

    let (b0, b1, b2, a0, a1, a2) = match band_type {
        BandType::Bell => (
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        ),
        BandType::LowShelf => (
            a * ((a + 1.0) - (a - 1.0) * cos_w0 + shelf),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
            a * ((a + 1.0) - (a - 1.0) * cos_w0 - shelf),
            (a + 1.0) + (a - 1.0) * cos_w0 + shelf,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
            (a + 1.0) + (a - 1.0) * cos_w0 - shelf,
        ),
        BandType::HighShelf => (
            a * ((a + 1.0) + (a - 1.0) * cos_w0 + shelf),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
            a * ((a + 1.0) + (a - 1.0) * cos_w0 - shelf),
            (a + 1.0) - (a - 1.0) * cos_w0 + shelf,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
            (a + 1.0) - (a - 1.0) * cos_w0 - shelf,
        ),
        BandType::Notch => (
            1.0,
            -2.0 * cos_w0,
            1.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        ),
        BandType::BandPass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
        BandType::AllPass | BandType::LowPass | BandType::HighPass => (
            1.0 - alpha,
            -2.0 * cos_w0,
            1.0 + alpha,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        ),
    };

    BiquadCoefficients {
        b0: (b0 / a0) as f32,
        b1: (b1 / a0) as f32,
        b2: (b2 / a0) as f32,
        a1: (a1 / a0) as f32,
        a2: (a2 / a0) as f32,
    }
}
