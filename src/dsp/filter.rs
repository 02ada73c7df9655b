//! Filter coefficient design
//!
//! The modem's coefficient tables are generated from the configuration instead
//! of being compiled in, so every primitive receives its taps explicitly.

use core::f32::consts::PI;

/// Root raised cosine pulse, unit energy
///
/// # Arguments
/// * `len` - Number of taps
/// * `samples_per_symbol` - Oversampling of the pulse
/// * `rolloff` - Excess bandwidth, 0 < rolloff <= 1
pub fn root_raised_cosine(len: usize, samples_per_symbol: usize, rolloff: f32) -> Vec<f32> {
    let centre = (len as f32 - 1.0) / 2.0;
    let mut taps: Vec<f32> = (0..len)
        .map(|n| rrc_response((n as f32 - centre) / samples_per_symbol as f32, rolloff))
        .collect();

    let energy: f32 = taps.iter().map(|h| h * h).sum();
    let norm = 1.0 / libm::sqrtf(energy.max(f32::MIN_POSITIVE));
    for h in taps.iter_mut() {
        *h *= norm;
    }
    taps
}

/// RRC impulse response at `t` symbol periods from the centre
fn rrc_response(t: f32, a: f32) -> f32 {
    if t.abs() < 1e-6 {
        return 1.0 - a + 4.0 * a / PI;
    }

    let four_at = 4.0 * a * t;
    if (1.0 - four_at * four_at).abs() < 1e-6 {
        let arg = PI / (4.0 * a);
        return a / libm::sqrtf(2.0)
            * ((1.0 + 2.0 / PI) * libm::sinf(arg) + (1.0 - 2.0 / PI) * libm::cosf(arg));
    }

    let num = libm::sinf(PI * t * (1.0 - a)) + four_at * libm::cosf(PI * t * (1.0 + a));
    let den = PI * t * (1.0 - four_at * four_at);
    num / den
}

/// Hamming-windowed sinc low-pass filter with unity DC gain
///
/// # Arguments
/// * `len` - Number of taps
/// * `cutoff_hz` - -6 dB point
/// * `sample_rate` - Sample rate in Hz
pub fn lowpass(len: usize, cutoff_hz: f32, sample_rate: f32) -> Vec<f32> {
    let fc = cutoff_hz / sample_rate;
    let centre = (len as f32 - 1.0) / 2.0;
    let window = hamming(len);

    let mut taps: Vec<f32> = (0..len)
        .map(|n| {
            let x = n as f32 - centre;
            let sinc = if x.abs() < 1e-6 {
                2.0 * fc
            } else {
                libm::sinf(2.0 * PI * fc * x) / (PI * x)
            };
            sinc * window[n]
        })
        .collect();

    let dc: f32 = taps.iter().sum();
    if dc.abs() > f32::MIN_POSITIVE {
        for h in taps.iter_mut() {
            *h /= dc;
        }
    }
    taps
}

/// Hamming window
pub fn hamming(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let span = (len - 1) as f32;
    (0..len)
        .map(|n| 0.54 - 0.46 * libm::cosf(2.0 * PI * n as f32 / span))
        .collect()
}

/// Hanning window with non-zero end points
pub fn hanning(len: usize) -> Vec<f32> {
    let span = (len + 1) as f32;
    (0..len)
        .map(|n| 0.5 - 0.5 * libm::cosf(2.0 * PI * (n + 1) as f32 / span))
        .collect()
}
