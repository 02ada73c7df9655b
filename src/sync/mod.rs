//! Feedback components of the receive loop
//!
//! Each component turns one frame's demodulator outputs into state consumed
//! by the next frame.
//!
//! **Module Organization**:
//! - `freq` - Carrier offset estimate, coarse search and fine tracking
//! - `timing` - Next frame's input block size from the timing estimate
//! - `state` - Sync bit debouncing into the overall sync state

pub mod freq;
pub mod state;
pub mod timing;

pub use freq::FrequencyTracker;
pub use state::{
    SyncPhase, SyncState, SyncStateMachine, SyncStatus, SyncTracker, UniqueWord,
    UniqueWordDetector,
};
pub use timing::BlockSizeController;
