use thiserror::Error;

use crate::state::RunState;

/// Errors shared by every crate that sits on top of the run-state machine
/// and the clock abstraction.
#[derive(Error, Debug)]
pub enum FoundationError {
    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("fatal error, cannot recover: {0}")]
    Fatal(String),

    #[error("transient error, will retry: {0}")]
    Transient(String),
}
