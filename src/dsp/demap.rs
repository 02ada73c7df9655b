//! DQPSK demapping and SNR estimation

use core::f32::consts::FRAC_PI_4;

use bitvec::prelude::*;
use rustfft::num_complex::Complex32;

/// Result of demapping one frame
#[derive(Debug, Clone)]
pub struct Demapped {
    /// Two bits per data carrier
    pub bits: BitVec<u8, Msb0>,
    /// Pilot phase reversal seen this frame
    pub sync_bit: bool,
    /// Fine frequency error from the pilot phase difference
    pub foff_fine: f32,
    /// Per-carrier phase difference, rotated by π/4, pilot last
    pub phase_difference: Vec<Complex32>,
}

/// Demap received symbols against the previous frame
///
/// The phase difference of each carrier is normalised by the previous
/// symbol's magnitude and rotated by π/4 so each DQPSK point falls in the
/// middle of a quadrant. The pilot's phase difference gives the sync bit
/// (reversal when its real part is negative) and the fine frequency error
/// (its imaginary part, sign-corrected for the reversal).
///
/// # Arguments
/// * `prev_rx` - Previous frame's received symbols, pilot last
/// * `rx` - This frame's received symbols, pilot last
pub fn qpsk_to_bits(prev_rx: &[Complex32], rx: &[Complex32]) -> Demapped {
    let nc = rx.len() - 1;
    let rotate = Complex32::from_polar(1.0, FRAC_PI_4);

    let mut phase_difference: Vec<Complex32> = rx
        .iter()
        .zip(prev_rx)
        .map(|(&r, &p)| r * p.conj() / (p.norm() + 1e-6))
        .collect();

    let mut bits = BitVec::with_capacity(2 * nc);
    for d in phase_difference.iter_mut().take(nc) {
        *d *= rotate;
        let (msb, lsb) = match (d.re >= 0.0, d.im >= 0.0) {
            (true, true) => (false, false),
            (false, true) => (false, true),
            (false, false) => (true, true),
            (true, false) => (true, false),
        };
        bits.push(msb);
        bits.push(lsb);
    }

    let pilot = phase_difference[nc];
    let norm = 1.0 / (prev_rx[nc].norm() + 1e-6);
    let (sync_bit, foff_fine) = if pilot.re < 0.0 {
        (true, pilot.im * norm)
    } else {
        (false, -pilot.im * norm)
    };
    phase_difference[nc] *= rotate;

    Demapped {
        bits,
        sync_bit,
        foff_fine,
        phase_difference,
    }
}

/// Per-carrier signal and noise magnitude accumulators
#[derive(Debug, Clone)]
pub struct SnrEstimator {
    coeff: f32,
    sig_est: Vec<f32>,
    noise_est: Vec<f32>,
}

impl SnrEstimator {
    pub fn new(carriers: usize, coeff: f32) -> Self {
        Self {
            coeff,
            sig_est: vec![0.0; carriers],
            noise_est: vec![0.0; carriers],
        }
    }

    /// Fold each phase difference into the first quadrant and update the
    /// signal (magnitude) and noise (distance from the ideal point) averages
    pub fn update(&mut self, phase_difference: &[Complex32]) {
        let a = self.coeff;
        for ((d, sig), noise) in phase_difference
            .iter()
            .zip(self.sig_est.iter_mut())
            .zip(self.noise_est.iter_mut())
        {
            let mag = d.norm();
            *sig = a * *sig + (1.0 - a) * mag;

            let folded = Complex32::new(d.re.abs(), d.im.abs());
            let ideal = Complex32::new(*sig, *sig) / core::f32::consts::SQRT_2;
            *noise = a * *noise + (1.0 - a) * (folded - ideal).norm();
        }
    }

    pub fn sig_est(&self) -> &[f32] {
        &self.sig_est
    }

    pub fn noise_est(&self) -> &[f32] {
        &self.noise_est
    }

    /// SNR estimate in dB over all carriers
    pub fn snr_db(&self) -> f32 {
        let sig: f32 = self.sig_est.iter().map(|s| s * s).sum();
        let noise: f32 = self.noise_est.iter().map(|n| n * n).sum();
        10.0 * libm::log10f((sig + 1e-12) / (noise + 1e-12))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::tx::bits_to_dqpsk_symbols;

    #[test]
    fn test_each_rotation_decodes() {
        let prev = vec![Complex32::new(0.6, 0.8); 5];
        let bits = bits![u8, Msb0; 0, 0, 0, 1, 1, 0, 1, 1];
        let mut pilot_bit = false;
        let rx = bits_to_dqpsk_symbols(&prev, bits, &mut pilot_bit);

        let demapped = qpsk_to_bits(&prev, &rx);
        assert_eq!(demapped.bits.as_bitslice(), bits);
        assert!(!demapped.sync_bit);
    }

    #[test]
    fn test_pilot_reversal_sets_sync_bit() {
        let prev = vec![Complex32::new(1.0, 0.0); 3];
        let mut rx = prev.clone();
        rx[2] = Complex32::new(-1.0, 0.0);
        let demapped = qpsk_to_bits(&prev, &rx);
        assert!(demapped.sync_bit);
        assert!(demapped.foff_fine.abs() < 1e-6);
    }

    #[test]
    fn test_fine_error_sign_follows_pilot_rotation() {
        // A positive frequency error advances the pilot phase each frame
        let prev = vec![Complex32::new(1.0, 0.0); 3];
        let step = Complex32::from_polar(1.0, 0.1);

        let mut rx = prev.clone();
        rx[2] = step;
        let same = qpsk_to_bits(&prev, &rx);

        rx[2] = -step;
        let reversed = qpsk_to_bits(&prev, &rx);

        assert!(same.foff_fine < 0.0);
        assert!((same.foff_fine - reversed.foff_fine).abs() < 1e-5);
    }

    #[test]
    fn test_snr_estimator_converges_on_clean_symbols() {
        let mut snr = SnrEstimator::new(3, 0.9);
        let clean = vec![Complex32::from_polar(1.0, FRAC_PI_4); 3];
        for _ in 0..200 {
            snr.update(&clean);
        }
        assert!(snr.sig_est().iter().all(|s| (s - 1.0).abs() < 1e-3));
        assert!(snr.noise_est().iter().all(|n| *n < 1e-3));
        assert!(snr.snr_db() > 40.0);
    }
}
