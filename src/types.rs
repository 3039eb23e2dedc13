//! This module defines the core data structures and types shared by every machine kind:
//! identifiers, reserved symbols, step outcomes, and the error type.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::Rule;

/// The symbol stored in every tape cell that has never been written.
pub const BLANK_SYMBOL: char = '_';
/// Marker used in configuration strings for an empty tape segment.
pub const EMPTY_SEGMENT: &str = "ε";
/// Label used in configuration strings before a simulator has started.
pub const NOT_STARTED: &str = "-";
/// The maximum allowed size for a machine definition in bytes.
pub const MAX_DEFINITION_SIZE: usize = 65536; // 64KB
/// The default step budget used by front ends when none is given.
pub const DEFAULT_MAX_STEPS: usize = 10000;
/// Number of cells allocated by a fresh tape.
pub const INITIAL_TAPE_CAPACITY: usize = 16;

/// Stable handle of a state inside one machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub(crate) usize);

/// Stable handle of a transition inside one machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionId(pub(crate) usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl TransitionId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// The two supported computation models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    /// Deterministic finite-state acceptor.
    Dfsa,
    /// Turing machine, optionally hierarchical.
    Turing,
}

impl fmt::Display for MachineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineKind::Dfsa => write!(f, "DFSA"),
            MachineKind::Turing => write!(f, "Turing machine"),
        }
    }
}

/// Represents the possible directions a tape head can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Move the head one position to the left.
    Left,
    /// Move the head one position to the right.
    Right,
    /// Keep the head in the same position.
    Stay,
}

/// Represents the outcome of a single simulator step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The machine performed a step and can continue.
    Continue,
    /// The machine has halted.
    Halt(Halt),
}

/// How a machine halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// The computation completed. For a Turing machine the head was parked in the final state;
    /// for a DFSA the input was accepted.
    Completed,
    /// DFSA only: the input was consumed outside of a final state.
    Failed,
}

/// Result of resolving one transition against the tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The transition's action was applied; the cursor moves to this state.
    Moved(StateId),
    /// No transition applies and the halt condition holds.
    Halted(Halt),
}

/// Represents the errors that can occur while building, validating, or running machines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MachineError {
    /// The machine violates a determinism or totality invariant.
    #[error("Machine is not deterministic: {0}")]
    Nondeterministic(String),
    /// The head tried to move left of the first cell.
    #[error("Tape head cannot move left of the first cell")]
    TapeOutOfBounds,
    /// No transition applies and the machine is not in a legal halting configuration.
    #[error("Undefined transition: {0}")]
    UndefinedTransition(String),
    /// A state handle does not belong to the machine.
    #[error("Invalid state: {0}")]
    InvalidState(StateId),
    /// A transition handle does not belong to the machine.
    #[error("Invalid transition: {0}")]
    InvalidTransition(TransitionId),
    /// Indicates an error during the parsing of a machine definition.
    #[error("Definition parsing error: {0}")]
    ParseError(#[from] Box<pest::error::Error<Rule>>),
    /// The definition parsed but does not describe a well-formed machine.
    #[error("Definition validation error: {0}")]
    ValidationError(String),
    /// Indicates an error related to reading or writing machine and tape files.
    #[error("File error: {0}")]
    FileError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_serialization() {
        let left_json = serde_json::to_string(&Direction::Left).unwrap();
        assert_eq!(left_json, "\"Left\"");

        let stay: Direction = serde_json::from_str("\"Stay\"").unwrap();
        assert_eq!(stay, Direction::Stay);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&StateId(3)).unwrap(), "3");
        let id: TransitionId = serde_json::from_str("7").unwrap();
        assert_eq!(id, TransitionId(7));
    }

    #[test]
    fn test_error_display() {
        let error = MachineError::InvalidState(StateId(4));
        let msg = format!("{}", error);
        assert!(msg.contains("Invalid state"));
        assert!(msg.contains("s4"));

        let error = MachineError::Nondeterministic("two start states".to_string());
        assert_eq!(
            error.to_string(),
            "Machine is not deterministic: two start states"
        );
    }
}
