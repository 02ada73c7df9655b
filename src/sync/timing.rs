//! Block size control
//!
//! The transmitter writes exactly M samples per frame while the receiver's
//! sampling clock drifts against it. The timing estimate reports where the
//! symbol strobe sits, with `M/P` meaning centred; when it leaves the
//! `[0, 2·M/P]` window the next frame consumes one sub-block more or less so
//! the strobe slides back.

/// Converts a timing estimate into the next frame's input length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSizeController {
    nominal: usize,
    sub_block: usize,
}

impl BlockSizeController {
    pub fn new(nominal: usize, sub_block: usize) -> Self {
        Self { nominal, sub_block }
    }

    pub fn nominal(&self) -> usize {
        self.nominal
    }

    /// Input length for the next frame
    ///
    /// # Arguments
    /// * `timing` - This frame's timing estimate in samples
    ///
    /// # Returns
    /// One of `nominal - sub_block`, `nominal` or `nominal + sub_block`
    pub fn next_block_size(&self, timing: f32) -> usize {
        let sub_block = self.sub_block as f32;
        if timing > 2.0 * sub_block {
            self.nominal + self.sub_block
        } else if timing < 0.0 {
            self.nominal - self.sub_block
        } else {
            self.nominal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_thresholds() {
        let ctrl = BlockSizeController::new(160, 40);
        assert_eq!(ctrl.next_block_size(40.0), 160);
        assert_eq!(ctrl.next_block_size(0.0), 160);
        assert_eq!(ctrl.next_block_size(80.0), 160);
        assert_eq!(ctrl.next_block_size(80.5), 200);
        assert_eq!(ctrl.next_block_size(-0.5), 120);
    }

    #[test]
    fn test_output_is_one_of_three_sizes() {
        let ctrl = BlockSizeController::new(160, 40);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let timing = rng.random_range(-200.0f32..200.0);
            let nin = ctrl.next_block_size(timing);
            assert!([120, 160, 200].contains(&nin), "timing {} gave {}", timing, nin);
        }
    }
}
