//! Player session state machine

pub mod state;

pub use state::{Session, SessionState};
