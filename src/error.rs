use thiserror::Error;

use crate::api::ApiError;
use crate::sequencer::SequenceError;

/// Errors raised by the session lifecycle.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session data that can never be run (no questions, bad limits).
    #[error("invalid session configuration: {0}")]
    Configuration(String),

    /// Start or finalize failed on the wire; state is unchanged and the user may retry.
    #[error("backend request failed: {0}")]
    Network(#[from] ApiError),

    /// The session was already submitted or timed out server-side.
    #[error("session {0} is already closed")]
    TerminalState(String),

    /// The operation is not valid in the current phase.
    #[error("cannot {action} while session is {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: crate::controller::SessionPhase,
    },

    /// A submit for a question the session has already moved past.
    #[error("question {submitted} is no longer active (current is {current})")]
    StaleSubmit { submitted: usize, current: usize },

    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
