//! Second-order IIR sections and fixed-capacity cascades
//!
//! Every filter in the crate (crossover slopes, EQ bands) is built from these
//! sections. Coefficients are normalized so that `a0 == 1` and evaluated in
//! direct form II, where the two history slots hold the internal node `w`
//! rather than past outputs.

use std::f64::consts::PI;

/// Maximum number of sections in one cascade (8th order)
pub const MAX_SECTIONS: usize = 4;

/// Normalized biquad coefficients (`a0 == 1`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoefficients {
    /// Pass-through section
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Both poles strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Complex frequency response `(re, im)` at `frequency` Hz
    fn response(&self, frequency: f32, sample_rate: f32) -> (f64, f64) {
        self.response_at(omega(frequency, sample_rate))
    }

    /// Complex frequency response at normalized angular frequency `w`
    fn response_at(&self, w: f64) -> (f64, f64) {
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();

        let (b0, b1, b2) = (f64::from(self.b0), f64::from(self.b1), f64::from(self.b2));
        let (a1, a2) = (f64::from(self.a1), f64::from(self.a2));

        let num_re = b0 + b1 * c1 + b2 * c2;
        let num_im = -(b1 * s1 + b2 * s2);
        let den_re = 1.0 + a1 * c1 + a2 * c2;
        let den_im = -(a1 * s1 + a2 * s2);

        let den_mag = den_re * den_re + den_im * den_im;
        (
            (num_re * den_re + num_im * den_im) / den_mag,
            (num_im * den_re - num_re * den_im) / den_mag,
        )
    }

    /// Magnitude response in dB at `frequency`
    pub fn magnitude_db(&self, frequency: f32, sample_rate: f32) -> f32 {
        let (re, im) = self.response(frequency, sample_rate);
        (10.0 * (re * re + im * im).max(1e-24).log10()) as f32
    }

    /// Phase response in radians at `frequency`
    pub fn phase(&self, frequency: f32, sample_rate: f32) -> f32 {
        let (re, im) = self.response(frequency, sample_rate);
        im.atan2(re) as f32
    }

    /// Group delay in samples at `frequency`
    pub fn group_delay(&self, frequency: f32, sample_rate: f32) -> f32 {
        self.group_delay_at(omega(frequency, sample_rate)) as f32
    }

    /// `-dphi/dw` by central difference; the phase step is wrapped so a
    /// branch cut of `atan2` between the two taps doesn't show up
    fn group_delay_at(&self, w: f64) -> f64 {
        let phase = |w: f64| {
            let (re, im) = self.response_at(w);
            im.atan2(re)
        };
        let delta = phase(w + GROUP_DELAY_STEP) - phase(w - GROUP_DELAY_STEP);
        let delta = (delta + PI).rem_euclid(2.0 * PI) - PI;
        -delta / (2.0 * GROUP_DELAY_STEP)
    }
}

/// Half-width of the group delay difference, in radians per sample
const GROUP_DELAY_STEP: f64 = 1e-5;

fn omega(frequency: f32, sample_rate: f32) -> f64 {
    2.0 * PI * f64::from(frequency) / f64::from(sample_rate)
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<biquad::Coefficients<f32>> for BiquadCoefficients {
    fn from(c: biquad::Coefficients<f32>) -> Self {
        Self {
            b0: c.b0,
            b1: c.b1,
            b2: c.b2,
            a1: c.a1,
            a2: c.a2,
        }
    }
}

/// Per-section history
///
/// `x1`/`x2` are the last two inputs; `y1`/`y2` are the direct form II
/// internal node history.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    pub x1: f32,
    pub x2: f32,
    pub y1: f32,
    pub y2: f32,
}

impl BiquadState {
    /// Run one sample through `coeffs`
    #[inline]
    pub fn process(&mut self, coeffs: &BiquadCoefficients, input: f32) -> f32 {
        let w = input - coeffs.a1 * self.y1 - coeffs.a2 * self.y2;
        let output = coeffs.b0 * w + coeffs.b1 * self.y1 + coeffs.b2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = w;
        output
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One biquad section: coefficients plus its own history
#[derive(Debug, Clone, Copy, Default)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    state: BiquadState,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    /// Replace coefficients; history is cleared so stale state never meets
    /// new coefficients.
    pub fn set_coefficients(&mut self, coeffs: BiquadCoefficients) {
        self.coeffs = coeffs;
        self.state.reset();
    }

    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coeffs
    }

    pub fn state(&self) -> &BiquadState {
        &self.state
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state.process(&self.coeffs, input)
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }
}

/// Up to [`MAX_SECTIONS`] coefficient sets, produced by the designer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CascadeCoefficients {
    sections: [BiquadCoefficients; MAX_SECTIONS],
    len: usize,
}

impl CascadeCoefficients {
    /// A cascade with no sections (identity)
    pub const EMPTY: Self = Self {
        sections: [BiquadCoefficients::IDENTITY; MAX_SECTIONS],
        len: 0,
    };

    /// Append a section. Sections beyond capacity are dropped.
    pub(crate) fn push(&mut self, coeffs: BiquadCoefficients) {
        debug_assert!(self.len < MAX_SECTIONS, "cascade capacity exceeded");
        if self.len < MAX_SECTIONS {
            self.sections[self.len] = coeffs;
            self.len += 1;
        }
    }

    pub(crate) fn extend(&mut self, other: &CascadeCoefficients) {
        for coeffs in other.sections() {
            self.push(*coeffs);
        }
    }

    pub fn sections(&self) -> &[BiquadCoefficients] {
        &self.sections[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Combined magnitude response of all sections
    pub fn magnitude_db(&self, frequency: f32, sample_rate: f32) -> f32 {
        self.sections()
            .iter()
            .map(|c| c.magnitude_db(frequency, sample_rate))
            .sum()
    }

    /// Combined phase response of all sections (unwrapped sum)
    pub fn phase(&self, frequency: f32, sample_rate: f32) -> f32 {
        self.sections()
            .iter()
            .map(|c| c.phase(frequency, sample_rate))
            .sum()
    }

    /// Combined group delay in samples; section delays add
    pub fn group_delay(&self, frequency: f32, sample_rate: f32) -> f32 {
        let w = omega(frequency, sample_rate);
        self.sections().iter().map(|c| c.group_delay_at(w)).sum::<f64>() as f32
    }

    /// Combined group delay in milliseconds
    pub fn group_delay_ms(&self, frequency: f32, sample_rate: f32) -> f32 {
        self.group_delay(frequency, sample_rate) * 1000.0 / sample_rate
    }
}

/// Series chain of biquad sections with fixed storage
#[derive(Debug, Clone, Copy, Default)]
pub struct Cascade {
    sections: [Biquad; MAX_SECTIONS],
    len: usize,
}

impl Cascade {
    pub fn new(design: &CascadeCoefficients) -> Self {
        let mut cascade = Self::default();
        cascade.set_coefficients(design);
        cascade
    }

    /// Load a new design and clear all section history
    pub fn set_coefficients(&mut self, design: &CascadeCoefficients) {
        self.len = design.len();
        for (section, coeffs) in self.sections.iter_mut().zip(design.sections()) {
            section.set_coefficients(*coeffs);
        }
        for section in &mut self.sections[self.len..] {
            section.set_coefficients(BiquadCoefficients::IDENTITY);
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.sections[..self.len]
            .iter_mut()
            .fold(input, |acc, section| section.process(acc))
    }

    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_pole_lowpass() -> BiquadCoefficients {
        BiquadCoefficients {
            b0: 0.5,
            b1: 0.0,
            b2: 0.0,
            a1: -0.5,
            a2: 0.0,
        }
    }

    #[test]
    fn test_identity_passthrough() {
        let mut section = Biquad::new(BiquadCoefficients::IDENTITY);
        for x in [0.3, -0.7, 1.0, 0.0] {
            assert_eq!(section.process(x), x);
        }
    }

    #[test]
    fn test_direct_form_two_recurrence() {
        let mut section = Biquad::new(one_pole_lowpass());
        // w[n] = x[n] + 0.5 w[n-1], y[n] = 0.5 w[n]
        assert!((section.process(1.0) - 0.5).abs() < 1e-7);
        assert!((section.process(0.0) - 0.25).abs() < 1e-7);
        assert_eq!(section.state().x2, 1.0);
        assert!((section.process(0.0) - 0.125).abs() < 1e-7);
    }

    #[test]
    fn test_set_coefficients_resets_state() {
        let mut section = Biquad::new(one_pole_lowpass());
        section.process(1.0);
        assert_ne!(*section.state(), BiquadState::default());

        section.set_coefficients(one_pole_lowpass());
        assert_eq!(*section.state(), BiquadState::default());
    }

    #[test]
    fn test_magnitude_of_identity_is_zero_db() {
        let c = BiquadCoefficients::IDENTITY;
        for f in [20.0, 1000.0, 20000.0] {
            assert!(c.magnitude_db(f, 48000.0).abs() < 1e-6);
            assert!(c.phase(f, 48000.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_magnitude_dc_gain() {
        // DC gain = 0.5 / (1 - 0.5) = 1.0
        let c = one_pole_lowpass();
        assert!(c.magnitude_db(0.0, 48000.0).abs() < 1e-4);
        assert!(c.magnitude_db(20000.0, 48000.0) < -6.0);
    }

    #[test]
    fn test_group_delay_of_pure_delays() {
        let one_sample = BiquadCoefficients {
            b0: 0.0,
            b1: 1.0,
            ..BiquadCoefficients::IDENTITY
        };
        let two_samples = BiquadCoefficients {
            b0: 0.0,
            b2: 1.0,
            ..BiquadCoefficients::IDENTITY
        };
        for f in [20.0, 1000.0, 15000.0] {
            assert!(BiquadCoefficients::IDENTITY.group_delay(f, 48000.0).abs() < 1e-6);
            assert!((one_sample.group_delay(f, 48000.0) - 1.0).abs() < 1e-4);
            assert!((two_samples.group_delay(f, 48000.0) - 2.0).abs() < 1e-4);
        }

        let mut cascade = CascadeCoefficients::default();
        cascade.push(one_sample);
        cascade.push(two_samples);
        assert!((cascade.group_delay(5000.0, 48000.0) - 3.0).abs() < 1e-4);
        assert!((cascade.group_delay_ms(5000.0, 48000.0) - 0.0625).abs() < 1e-5);
    }

    #[test]
    fn test_stability_check() {
        assert!(one_pole_lowpass().is_stable());
        let unstable = BiquadCoefficients {
            a1: -2.5,
            a2: 1.2,
            ..BiquadCoefficients::IDENTITY
        };
        assert!(!unstable.is_stable());
    }

    #[test]
    fn test_cascade_runs_sections_in_series() {
        let mut design = CascadeCoefficients::EMPTY;
        design.push(BiquadCoefficients {
            b0: 0.5,
            ..BiquadCoefficients::IDENTITY
        });
        design.push(BiquadCoefficients {
            b0: 0.5,
            ..BiquadCoefficients::IDENTITY
        });

        let mut cascade = Cascade::new(&design);
        assert_eq!(cascade.len(), 2);
        assert!((cascade.process(1.0) - 0.25).abs() < 1e-7);
        assert!((design.magnitude_db(1000.0, 48000.0) + 12.04).abs() < 0.01);
    }

    #[test]
    fn test_empty_cascade_is_identity() {
        let mut cascade = Cascade::new(&CascadeCoefficients::EMPTY);
        assert!(cascade.is_empty());
        assert_eq!(cascade.process(0.42), 0.42);
    }

    #[test]
    fn test_from_biquad_crate_coefficients() {
        use biquad::{Coefficients, ToHertz, Type, Q_BUTTERWORTH_F32};

        let c = Coefficients::<f32>::from_params(
            Type::LowPass,
            48000.0_f32.hz(),
            1000.0_f32.hz(),
            Q_BUTTERWORTH_F32,
        )
        .unwrap();
        let ours: BiquadCoefficients = c.into();
        assert_eq!(ours.b0, c.b0);
        assert_eq!(ours.a2, c.a2);
        assert!((ours.magnitude_db(1000.0, 48000.0) + 3.01).abs() < 0.05);
    }
}
