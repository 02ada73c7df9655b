//! Channel buffer occupancy properties

use fdmdv_sync::channel::ChannelBuffer;
use fdmdv_sync::ModemError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_random_append_take_keeps_occupancy_invariant() {
    let mut rng = StdRng::seed_from_u64(0xc4a7);
    let capacity = 1600;
    let mut channel = ChannelBuffer::new(capacity);
    let mut occupancy = 0usize;
    let mut next_value = 0.0f32;
    let mut expected_head = 0.0f32;

    for _ in 0..5_000 {
        if rng.random_bool(0.5) {
            let len = rng.random_range(0..=240);
            let block: Vec<f32> = (0..len)
                .map(|_| {
                    next_value += 1.0;
                    next_value
                })
                .collect();
            match channel.append(&block) {
                Ok(()) => occupancy += len,
                Err(ModemError::ChannelOverflow { .. }) => {
                    assert!(occupancy + len > capacity);
                    // Rejected samples never enter the buffer
                    next_value -= len as f32;
                }
                Err(e) => panic!("unexpected error {}", e),
            }
        } else {
            let n = rng.random_range(0..=240);
            match channel.take(n) {
                Ok(taken) => {
                    assert_eq!(taken.len(), n);
                    for x in &taken {
                        expected_head += 1.0;
                        assert_eq!(x.re, expected_head, "samples leave in order");
                        assert_eq!(x.im, 0.0);
                    }
                    occupancy -= n;
                }
                Err(ModemError::ChannelUnderflow { requested, available }) => {
                    assert_eq!(requested, n);
                    assert_eq!(available, occupancy);
                    assert!(n > occupancy);
                }
                Err(e) => panic!("unexpected error {}", e),
            }
        }
        assert_eq!(channel.len(), occupancy);
        assert!(channel.len() <= capacity);
    }
}

#[test]
fn test_take_past_occupancy_fails_deterministically() {
    let mut channel = ChannelBuffer::new(400);
    channel.append(&[0.25; 160]).unwrap();

    for _ in 0..3 {
        let err = channel.take(161).unwrap_err();
        assert!(matches!(
            err,
            ModemError::ChannelUnderflow { requested: 161, available: 160 }
        ));
    }
    assert_eq!(channel.take(160).unwrap().len(), 160);
    assert!(channel.take(1).is_err());
    assert!(channel.take(0).unwrap().is_empty());
}
