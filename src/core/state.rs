//! Engine lifecycle tracking.
//!
//! The worker thread moves the engine from `Created` through `Running` to
//! `Finalized`. The tracker is shared by reference between the worker and the
//! orchestrator and only ever moves forward, so once `Finalized` has been
//! observed it is never observed as anything else.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use thiserror::Error;

/// Lifecycle state of the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EngineState {
    /// Engine exists, no compilation started.
    Created,
    /// Worker is optimizing or emitting machine code.
    Running,
    /// Machine code is emitted; symbol addresses are valid.
    Finalized,
}

impl EngineState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => EngineState::Created,
            1 => EngineState::Running,
            _ => EngineState::Finalized,
        }
    }

    fn as_raw(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Created => write!(f, "created"),
            EngineState::Running => write!(f, "running"),
            EngineState::Finalized => write!(f, "finalized"),
        }
    }
}

/// Attempted to move the engine backwards or skip ahead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid engine transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: EngineState,
    pub to: EngineState,
}

/// Advance-only engine state shared across threads.
#[derive(Debug)]
pub struct StateTracker {
    state: AtomicU8,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(EngineState::Created.as_raw()),
        }
    }

    /// Current state.
    pub fn get(&self) -> EngineState {
        EngineState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Move to the next state. Only `Created -> Running` and
    /// `Running -> Finalized` are accepted.
    pub fn advance(&self, to: EngineState) -> Result<(), InvalidTransition> {
        let from = match to {
            EngineState::Running => EngineState::Created,
            EngineState::Finalized => EngineState::Running,
            EngineState::Created => {
                return Err(InvalidTransition {
                    from: self.get(),
                    to,
                })
            }
        };

        self.state
            .compare_exchange(from.as_raw(), to.as_raw(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|current| InvalidTransition {
                from: EngineState::from_raw(current),
                to,
            })
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
