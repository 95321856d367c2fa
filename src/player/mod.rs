//! Player: the owned state object and the task that drives it

pub mod core;
pub mod driver;

pub use self::core::{PlayerCore, PlayerStats, SyncInfo};
pub use driver::{Player, PlayerHandle};
