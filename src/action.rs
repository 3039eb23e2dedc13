//! Actions describe what taking a transition does to the tape. Turing machine actions move
//! the head or write a symbol; DFSA actions consume one input symbol.

use crate::alphabet::normalize;
use crate::tape::Tape;
use crate::types::{Direction, MachineError};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The symbol a transition matches against the tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Input {
    /// Not configured yet. Never valid in a checked machine.
    Undefined,
    /// Turing machines only: matches any symbol no other transition of the state matches.
    Otherwise,
    /// DFSA empty-string sentinel. Taking it leaves the tape untouched.
    Empty,
    /// Matches exactly this symbol.
    Symbol(#[serde(deserialize_with = "normalized_symbol")] char),
}

impl Input {
    pub fn symbol(c: char) -> Self {
        Input::Symbol(normalize(c))
    }

    /// Exact match only; the wildcard is resolved by the machine.
    pub fn matches(&self, c: char) -> bool {
        matches!(self, Input::Symbol(s) if *s == normalize(c))
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Undefined => write!(f, "?"),
            Input::Otherwise => write!(f, "*"),
            Input::Empty => write!(f, "ε"),
            Input::Symbol(c) => write!(f, "{c}"),
        }
    }
}

/// Symbols read from serialized data get the same normalization as those built in code.
fn normalized_symbol<'de, D: Deserializer<'de>>(deserializer: D) -> Result<char, D::Error> {
    char::deserialize(deserializer).map(normalize)
}

/// What a non-moving Turing machine action writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Output {
    /// Not configured yet.
    Undefined,
    /// Leave the cell as it is.
    Nothing,
    /// Write this symbol.
    Symbol(#[serde(deserialize_with = "normalized_symbol")] char),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Undefined => write!(f, "?"),
            Output::Nothing => write!(f, "-"),
            Output::Symbol(c) => write!(f, "{c}"),
        }
    }
}

/// A Turing machine action: either a head move or a write, guarded by an input symbol.
/// `output` is only consulted when `direction` is [`Direction::Stay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmAction {
    pub direction: Direction,
    pub input: Input,
    pub output: Output,
}

impl Default for TmAction {
    fn default() -> Self {
        Self::undefined()
    }
}

impl TmAction {
    /// An action the editor has created but not configured.
    pub fn undefined() -> Self {
        Self {
            direction: Direction::Stay,
            input: Input::Undefined,
            output: Output::Undefined,
        }
    }

    pub fn left(input: Input) -> Self {
        Self {
            direction: Direction::Left,
            input,
            output: Output::Nothing,
        }
    }

    pub fn right(input: Input) -> Self {
        Self {
            direction: Direction::Right,
            input,
            output: Output::Nothing,
        }
    }

    pub fn write(input: Input, symbol: char) -> Self {
        Self {
            direction: Direction::Stay,
            input,
            output: Output::Symbol(normalize(symbol)),
        }
    }

    /// A stay action that writes nothing.
    pub fn nothing(input: Input) -> Self {
        Self {
            direction: Direction::Stay,
            input,
            output: Output::Nothing,
        }
    }

    /// Applies the action to the tape.
    ///
    /// # Errors
    ///
    /// * `MachineError::TapeOutOfBounds` when moving left from offset 0.
    /// * `MachineError::UndefinedTransition` when the output was never configured.
    pub fn perform(&self, tape: &mut Tape) -> Result<(), MachineError> {
        match self.direction {
            Direction::Left => tape.head_left(),
            Direction::Right => {
                tape.head_right();
                Ok(())
            }
            Direction::Stay => match self.output {
                Output::Nothing => Ok(()),
                Output::Symbol(symbol) => {
                    tape.write(symbol);
                    Ok(())
                }
                Output::Undefined => Err(MachineError::UndefinedTransition(format!(
                    "action {self} has no output"
                ))),
            },
        }
    }
}

impl fmt::Display for TmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Left => write!(f, "{}/<", self.input),
            Direction::Right => write!(f, "{}/>", self.input),
            Direction::Stay => write!(f, "{}/{}", self.input, self.output),
        }
    }
}

/// A DFSA action: match one input symbol and advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfsaAction {
    pub input: Input,
}

impl DfsaAction {
    pub fn new(input: Input) -> Self {
        Self { input }
    }

    pub fn on(symbol: char) -> Self {
        Self::new(Input::symbol(symbol))
    }

    /// Consumes the symbol under the head, unless this is the empty-string transition.
    pub fn perform(&self, tape: &mut Tape) -> Result<(), MachineError> {
        if self.input != Input::Empty {
            tape.head_right();
        }
        Ok(())
    }
}

impl fmt::Display for DfsaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.input)
    }
}
