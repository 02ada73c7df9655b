//! Continuous-phase frequency shifter

use core::f32::consts::PI;

use rustfft::num_complex::Complex32;

/// Frequency shifter with a persistent phasor
///
/// The phasor carries over between blocks so the shift is phase-continuous
/// across frames of different lengths.
#[derive(Debug, Clone)]
pub struct FreqShifter {
    sample_rate: f32,
    phase: Complex32,
}

impl FreqShifter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            phase: Complex32::new(1.0, 0.0),
        }
    }

    /// Current phasor (unit magnitude)
    pub fn phase(&self) -> Complex32 {
        self.phase
    }

    /// Shift `input` by `offset_hz`
    pub fn shift(&mut self, input: &[Complex32], offset_hz: f32) -> Vec<Complex32> {
        let step = Complex32::from_polar(1.0, 2.0 * PI * offset_hz / self.sample_rate);
        let out = input
            .iter()
            .map(|&x| {
                self.phase *= step;
                x * self.phase
            })
            .collect();

        // Keep the phasor on the unit circle
        self.phase /= self.phase.norm();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_is_phase_continuous_across_blocks() {
        let ones = vec![Complex32::new(1.0, 0.0); 300];

        let mut whole = FreqShifter::new(8000.0);
        let expected = whole.shift(&ones, 100.0);

        let mut split = FreqShifter::new(8000.0);
        let mut got = split.shift(&ones[..120], 100.0);
        got.extend(split.shift(&ones[120..], 100.0));

        for (a, b) in expected.iter().zip(got.iter()) {
            assert!((a - b).norm() < 1e-4);
        }
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let input: Vec<Complex32> = (0..50).map(|i| Complex32::new(i as f32, -1.0)).collect();
        let mut shifter = FreqShifter::new(8000.0);
        assert_eq!(shifter.shift(&input, 0.0), input);
    }

    #[test]
    fn test_phasor_stays_normalised() {
        let input = vec![Complex32::new(1.0, 0.0); 160];
        let mut shifter = FreqShifter::new(8000.0);
        for _ in 0..1000 {
            shifter.shift(&input, 1234.5);
        }
        assert!((shifter.phase().norm() - 1.0).abs() < 1e-5);
    }
}
