//! Clock synchronization between the local player and the sender

pub mod sample;
pub mod source;
pub mod sync;

pub use sample::ClockSample;
pub use source::{LocalClock, ManualClock, MonotonicClock};
pub use sync::{ClockSync, SyncState, SyncUpdate, TimeSyncInfo};
