//! Signal generators shared by the unit tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sine of `len` samples; phase accumulated in f64 to keep long tones clean
pub fn sine(frequency: f32, sample_rate: f32, amplitude: f32, len: usize) -> Vec<f32> {
    let step = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    (0..len)
        .map(|n| amplitude * (step * n as f64).sin() as f32)
        .collect()
}

/// Unit impulse at index 0
pub fn impulse(len: usize) -> Vec<f32> {
    let mut signal = vec![0.0; len];
    if let Some(first) = signal.first_mut() {
        *first = 1.0;
    }
    signal
}

/// Uniform white noise in [-amplitude, amplitude], reproducible per seed
pub fn white_noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| rng.gen_range(-amplitude..=amplitude))
        .collect()
}

/// Largest absolute sample from `start` on
pub fn peak_after(signal: &[f32], start: usize) -> f32 {
    signal
        .iter()
        .skip(start)
        .fold(0.0_f32, |peak, s| peak.max(s.abs()))
}
