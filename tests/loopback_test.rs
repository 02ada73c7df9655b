//! End-to-end tests of the loopback control loop

mod test_utils;

use std::collections::BTreeSet;

use fdmdv_sync::dsp::qpsk_to_bits;
use fdmdv_sync::recorder::{Samples, Shape};
use fdmdv_sync::{FrameLog, Loopback, MemoryRecorder, ModemConfig, OutputMode};
use rustfft::num_complex::Complex32;
use test_utils::{
    append, bit_errors_at_best_delay, empty_like, first_sync, octave_output, record_frames, row,
    run_frames,
};

const FRAMES: usize = 35;

/// Long enough to acquire sync and settle well before the end
const LOCK_FRAMES: usize = 300;

/// Frames run by the tests that depend on sync being acquired
const SYNC_FRAMES: usize = 100;

#[test]
fn test_nin_stays_within_one_sub_block() {
    let configs = [
        ModemConfig::default(),
        ModemConfig {
            channel_offset_hz: 40.0,
            ..ModemConfig::default()
        },
        ModemConfig {
            channel_noise_std: 0.05,
            ..ModemConfig::default()
        },
    ];

    for config in configs {
        let m = config.samples_per_symbol;
        let q = config.sub_block();
        let allowed: BTreeSet<usize> = [m - q, m, m + q].into_iter().collect();

        for r in run_frames(config, 40) {
            assert!(allowed.contains(&r.nin), "frame {} nin {}", r.frame, r.nin);
            assert!(allowed.contains(&r.next_nin), "frame {} next_nin {}", r.frame, r.next_nin);
        }
    }
}

#[test]
fn test_next_nin_feeds_following_frame() {
    let results = run_frames(ModemConfig::default(), FRAMES);
    assert_eq!(results[0].nin, 160);
    for pair in results.windows(2) {
        assert_eq!(pair[1].nin, pair[0].next_nin);
    }
}

#[test]
fn test_outputs_stay_finite() {
    let config = ModemConfig {
        channel_offset_hz: -30.0,
        channel_noise_std: 0.1,
        ..ModemConfig::default()
    };
    for r in run_frames(config, FRAMES) {
        assert!(r.foff.is_finite());
        assert!(r.foff_coarse.is_finite());
        assert!(r.rx_timing.is_finite());
        assert!(r.rx_symbols.iter().all(|s| s.re.is_finite() && s.im.is_finite()));
        assert!(r.sig_est.iter().chain(&r.noise_est).all(|v| v.is_finite()));
    }
}

#[test]
fn test_unsynchronized_frames_take_coarse_estimate() {
    // While unsynchronized the estimate used for correction is the coarse
    // output of the same frame
    let results = run_frames(ModemConfig::default(), SYNC_FRAMES);
    assert!(first_sync(&results).is_some(), "ideal channel never synchronized");
    let mut synchronized = false;
    for r in &results {
        if !synchronized {
            assert_eq!(r.foff_applied, r.foff_coarse, "frame {}", r.frame);
        }
        synchronized = r.sync.state.is_synchronized();
    }
}

#[test]
fn test_synchronized_frames_only_track_fine_error() {
    let config = ModemConfig::default();
    let coeff = config.track_coeff;
    let results = run_frames(config, SYNC_FRAMES);
    assert!(first_sync(&results).is_some(), "ideal channel never synchronized");
    for pair in results.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.sync.state.is_synchronized() {
            // Coarse path was gated off: the estimate carried over unchanged
            assert_eq!(next.foff_applied, prev.foff);
        }
        let expected = next.foff_applied - coeff * next.foff_fine;
        assert!((next.foff - expected).abs() < 1e-4);
    }
}

/// Run a long loopback and check it locks, settles at the nominal block
/// size and recovers the transmitted bits
fn assert_demodulates(config: ModemConfig, max_error_rate: f64) {
    let label = format!(
        "offset {} Hz noise {}",
        config.channel_offset_hz, config.channel_noise_std
    );
    let m = config.samples_per_symbol;
    let results = run_frames(config, LOCK_FRAMES);

    let first = first_sync(&results).unwrap_or_else(|| panic!("{}: never synchronized", label));
    assert!(first < LOCK_FRAMES / 2, "{}: first synchronized at frame {}", label, first);

    let settled = &results[LOCK_FRAMES / 2..];
    assert!(
        settled.iter().all(|r| r.sync.state.is_synchronized()),
        "{}: lost sync after settling",
        label
    );

    let nominal = settled.iter().filter(|r| r.nin == m).count();
    assert!(
        nominal * 10 >= settled.len() * 9,
        "{}: nin at {} in only {} of {} frames",
        label,
        m,
        nominal,
        settled.len()
    );

    let (delay, errors, bits) = bit_errors_at_best_delay(&results, LOCK_FRAMES / 2);
    assert!(
        errors as f64 <= max_error_rate * bits as f64,
        "{}: {} of {} bits wrong at delay {}",
        label,
        errors,
        bits,
        delay
    );
}

#[test]
fn test_ideal_channel_locks_and_decodes() {
    assert_demodulates(ModemConfig::default(), 0.0);
}

#[test]
fn test_locks_through_carrier_offsets() {
    for offset in [-150.0, -30.0, 40.0, 120.0] {
        let config = ModemConfig {
            channel_offset_hz: offset,
            ..ModemConfig::default()
        };
        assert_demodulates(config, 0.0);
    }
}

#[test]
fn test_locks_through_noise_and_offset() {
    let quiet = ModemConfig {
        channel_offset_hz: -25.0,
        channel_noise_std: 0.05,
        ..ModemConfig::default()
    };
    assert_demodulates(quiet, 0.0);

    let noisy = ModemConfig {
        channel_offset_hz: 40.0,
        channel_noise_std: 0.1,
        ..ModemConfig::default()
    };
    assert_demodulates(noisy, 0.01);
}

#[test]
fn test_timing_loop_does_not_oscillate() {
    // A noisy channel kicks the timing estimate out of its window now and
    // then; each correction must bring it back rather than push it further
    let config = ModemConfig {
        channel_noise_std: 0.2,
        ..ModemConfig::default()
    };
    let m = config.samples_per_symbol;
    let results = run_frames(config, LOCK_FRAMES);

    let alternations = results
        .windows(2)
        .filter(|pair| pair[0].nin != m && pair[1].nin != m && pair[0].nin != pair[1].nin)
        .count();
    assert!(alternations < 5, "{} back-to-back block size reversals", alternations);

    let settled = &results[LOCK_FRAMES / 2..];
    let nominal = settled.iter().filter(|r| r.nin == m).count();
    assert!(nominal * 10 >= settled.len() * 9, "nin nominal in {} frames", nominal);
}

#[test]
fn test_demapper_round_trip_is_bit_exact() {
    // Transmit symbols fed straight back as the receive reference
    let config = ModemConfig::default();
    let mut prev = vec![Complex32::new(1.0, 0.0); config.total_carriers()];
    for r in run_frames(config, FRAMES) {
        let demapped = qpsk_to_bits(&prev, &r.tx_symbols);
        assert_eq!(demapped.bits, r.tx_bits, "frame {}", r.frame);
        prev = r.tx_symbols.clone();
    }
}

#[test]
fn test_runs_are_deterministic() {
    let config = ModemConfig {
        channel_noise_std: 0.05,
        channel_offset_hz: 20.0,
        ..ModemConfig::default()
    };
    let a = octave_output(config.clone(), 10);
    let b = octave_output(config, 10);
    assert!(!a.is_empty());
    assert_eq!(a, b);
}

#[test]
fn test_cumulative_output_matches_per_frame_output() {
    let frames = 12;
    let cumulative = record_frames(ModemConfig::default(), frames, OutputMode::Cumulative);
    let per_frame = record_frames(ModemConfig::default(), frames, OutputMode::PerFrame);

    let names: Vec<String> = cumulative.entries.iter().map(|(n, _, _)| n.clone()).collect();
    assert_eq!(names.len(), 26);
    assert_eq!(per_frame.entries.len(), names.len() * frames);

    for name in &names {
        let (whole, whole_shape) = cumulative.get(name).next().expect("recorded");
        let parts: Vec<(&Samples, Shape)> = per_frame.get(name).collect();
        assert_eq!(parts.len(), frames, "{}", name);

        if name == "pilot_lut_c" || name == "pilot_coeff_c" {
            assert!(parts.iter().all(|(s, _)| *s == whole), "{}", name);
            continue;
        }

        // Stitch each row of the per-frame dumps back together
        let mut stitched = empty_like(whole);
        for r in 0..whole_shape.rows {
            for (part, shape) in &parts {
                assert_eq!(shape.rows, whole_shape.rows, "{}", name);
                append(&mut stitched, &row(part, *shape, r));
            }
        }
        assert_eq!(&stitched, whole, "{}", name);
    }
}

#[test]
fn test_per_frame_calls_match_one_run() {
    // Driving frames one at a time through the log gives the same bytes as run()
    let frames = 8;
    let expected = octave_output(ModemConfig::default(), frames);

    let mut modem = Loopback::new(ModemConfig::default()).unwrap();
    let mut log = FrameLog::new(OutputMode::Cumulative, modem.reference());
    let mut writer = fdmdv_sync::OctaveWriter::new(Vec::new());
    for _ in 0..frames {
        let result = modem.process_frame().unwrap();
        log.push(result, &mut writer).unwrap();
    }
    log.finish(&mut writer).unwrap();

    assert_eq!(writer.into_inner(), expected);
}

#[test]
fn test_recorded_shapes() {
    let config = ModemConfig::default();
    let frames = 5;
    let rec: MemoryRecorder = record_frames(config.clone(), frames, OutputMode::Cumulative);
    let carriers = config.total_carriers();

    let (_, shape) = rec.get("rx_symbols_log_c").next().unwrap();
    assert_eq!(shape, Shape::matrix(carriers, frames));

    let (bits, _) = rec.get("tx_bits_log_c").next().unwrap();
    assert_eq!(bits.len(), config.bits_per_frame() * frames);

    let (nin, _) = rec.get("nin_log_c").next().unwrap();
    let Samples::Int(nin) = nin else { panic!("nin is an int vector") };
    let total_nin: i32 = nin.iter().sum();

    let (filt, filt_shape) = rec.get("rx_filt_log_c").next().unwrap();
    assert_eq!(filt_shape.rows, carriers);
    assert_eq!(filt_shape.cols as i32, total_nin / config.sub_block() as i32);
    assert_eq!(filt.len(), carriers * filt_shape.cols);

    let (lut, _) = rec.get("pilot_lut_c").next().unwrap();
    assert_eq!(lut.len(), 4 * config.samples_per_symbol);
}
