//! Synchronization state machine
//!
//! The pilot reverses phase every other frame, so a correctly locked
//! receiver sees its sync bit alternate. A short unique word detector turns
//! the noisy per-frame sync bit into evidence of lock; a four phase machine
//! debounces that evidence into the overall sync state.
//!
//! **Phases**:
//! - `Search` - no lock; the coarse frequency search runs
//! - `Tentative` - unique word seen, waiting for it to persist
//! - `Locked` - unique word persisted for `sync_confirm_frames`
//! - `Fade` - unique word lost; sync held for `sync_hold_frames`

use tracing::{debug, info, warn};

use crate::config::ModemConfig;

/// Alternating pattern expected from the pilot sync bits, as +/-1
const UNIQUE_WORD: [i32; 6] = [1, -1, 1, -1, 1, -1];

/// Overall synchronization state seen by the rest of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Unsynchronized,
    Synchronized,
}

impl SyncState {
    pub fn is_synchronized(self) -> bool {
        self == SyncState::Synchronized
    }
}

/// Internal phase of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Search,
    Tentative,
    Locked,
    Fade,
}

impl SyncPhase {
    pub fn state(self) -> SyncState {
        match self {
            SyncPhase::Search => SyncState::Unsynchronized,
            _ => SyncState::Synchronized,
        }
    }
}

/// Evidence extracted from the recent sync bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueWord {
    /// Recent sync bits match the unique word in either polarity
    pub detected: bool,
    /// Recent sync bits match the unique word in its own polarity
    pub reliable: bool,
}

/// Correlates the most recent sync bits against the unique word
#[derive(Debug, Clone, Default)]
pub struct UniqueWordDetector {
    /// Last sync bits as +/-1, oldest first
    memory: [i32; UNIQUE_WORD.len()],
}

impl UniqueWordDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sync_bit: bool) -> UniqueWord {
        self.memory.rotate_left(1);
        self.memory[UNIQUE_WORD.len() - 1] = if sync_bit { -1 } else { 1 };

        let corr: i32 = self
            .memory
            .iter()
            .zip(UNIQUE_WORD.iter())
            .map(|(m, u)| m * u)
            .sum();
        let full = UNIQUE_WORD.len() as i32;

        UniqueWord {
            detected: corr.abs() == full,
            reliable: corr == full,
        }
    }
}

/// Debounces per-frame lock evidence into a sync state
#[derive(Debug, Clone)]
pub struct SyncStateMachine {
    phase: SyncPhase,
    timer: u32,
    confirm_frames: u32,
    hold_frames: u32,
}

impl SyncStateMachine {
    pub fn new(config: &ModemConfig) -> Self {
        Self {
            phase: SyncPhase::Search,
            timer: 0,
            confirm_frames: config.sync_confirm_frames,
            hold_frames: config.sync_hold_frames,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn state(&self) -> SyncState {
        self.phase.state()
    }

    /// Debounce counter of the current phase
    pub fn timer(&self) -> u32 {
        self.timer
    }

    /// Advance one frame given whether lock evidence was seen
    pub fn update(&mut self, evidence: bool) -> SyncState {
        let before = self.phase;

        self.phase = match (self.phase, evidence) {
            (SyncPhase::Search, true) => {
                self.timer = 0;
                SyncPhase::Tentative
            }
            (SyncPhase::Search, false) => SyncPhase::Search,
            (SyncPhase::Tentative, true) => {
                self.timer += 1;
                if self.timer >= self.confirm_frames {
                    SyncPhase::Locked
                } else {
                    SyncPhase::Tentative
                }
            }
            (SyncPhase::Tentative, false) => SyncPhase::Search,
            (SyncPhase::Locked, true) => SyncPhase::Locked,
            (SyncPhase::Locked, false) => {
                self.timer = 0;
                SyncPhase::Fade
            }
            (SyncPhase::Fade, true) => SyncPhase::Locked,
            (SyncPhase::Fade, false) => {
                self.timer += 1;
                if self.timer >= self.hold_frames {
                    SyncPhase::Search
                } else {
                    SyncPhase::Fade
                }
            }
        };

        if before != self.phase {
            debug!(from = ?before, to = ?self.phase, timer = self.timer, "sync phase");
            match (before.state(), self.phase.state()) {
                (SyncState::Unsynchronized, SyncState::Synchronized) => info!("sync acquired"),
                (SyncState::Synchronized, SyncState::Unsynchronized) => warn!(from = ?before, "sync lost"),
                _ => {}
            }
        }

        self.state()
    }
}

/// Sync state after one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: SyncState,
    pub reliable_sync_bit: bool,
    pub timer: u32,
}

/// Unique word detector feeding the state machine
#[derive(Debug, Clone)]
pub struct SyncTracker {
    detector: UniqueWordDetector,
    machine: SyncStateMachine,
}

impl SyncTracker {
    pub fn new(config: &ModemConfig) -> Self {
        Self {
            detector: UniqueWordDetector::new(),
            machine: SyncStateMachine::new(config),
        }
    }

    pub fn state(&self) -> SyncState {
        self.machine.state()
    }

    pub fn phase(&self) -> SyncPhase {
        self.machine.phase()
    }

    pub fn update(&mut self, sync_bit: bool) -> SyncStatus {
        let word = self.detector.push(sync_bit);
        let state = self.machine.update(word.detected);
        SyncStatus {
            state,
            reliable_sync_bit: word.reliable,
            timer: self.machine.timer(),
        }
    }
}
