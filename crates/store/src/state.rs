//! State machine for unit-of-work lifecycle
//!
//! Unit-of-work states: Open → Committed | RolledBack.
//! Committed and RolledBack are terminal.

use thiserror::Error;

/// Errors that can occur during state transitions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransitionError {
    #[error("Terminal state: unit of work is already {0} and cannot be reused")]
    TerminalState(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOfWorkState {
    Open,
    Committed,
    RolledBack,
}

impl UnitOfWorkState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

impl std::fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// Events that end a unit of work
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitOfWorkEvent {
    Commit,
    Rollback,
}

impl std::fmt::Display for UnitOfWorkEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

pub struct UnitOfWorkStateMachine;

impl UnitOfWorkStateMachine {
    /// Attempt a state transition
    pub fn transition(
        current: UnitOfWorkState,
        event: UnitOfWorkEvent,
    ) -> Result<UnitOfWorkState, TransitionError> {
        if current.is_terminal() {
            return Err(TransitionError::TerminalState(current.to_string()));
        }

        Ok(match event {
            UnitOfWorkEvent::Commit => UnitOfWorkState::Committed,
            UnitOfWorkEvent::Rollback => UnitOfWorkState::RolledBack,
        })
    }
}
