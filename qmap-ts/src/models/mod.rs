//! Data models for standardization runs

pub mod run_session;
pub mod run_status;

pub use run_session::{RunProgress, RunSession, RunState, StateTransition};
pub use run_status::{LogEntry, RunStatus};
