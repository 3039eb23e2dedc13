//! This crate provides the execution engine for deterministic finite-state acceptors and
//! Turing machines whose states may run nested Turing machines.
//! It includes modules for building and validating machines, stepping them over a tape,
//! reading and writing machine definitions, and a small library of built-in machines.

pub mod action;
pub mod alphabet;
pub mod encoder;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod programs;
pub mod simulator;
pub mod tape;
pub mod types;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
pub use action::{DfsaAction, Input, Output, TmAction};
pub use alphabet::Alphabet;
/// Re-exports the text encoder, the inverse of [`parse`].
pub use encoder::encode;
pub use loader::MachineLoader;
pub use machine::{AnyMachine, Dfsa, Machine, TuringMachine};
/// Re-exports the `parse` function from the parser module.
pub use parser::parse;
pub use programs::{MachineInfo, MachineLibrary, LIBRARY};
pub use simulator::{DfsaSimulator, Simulator, TuringSimulator};
pub use tape::{Tape, TapeObserver};
/// Re-exports the identifiers, outcomes, errors, and limits shared across the crate.
pub use types::{
    Direction, Halt, MachineError, MachineKind, Resolution, StateId, Step, TransitionId,
    BLANK_SYMBOL, DEFAULT_MAX_STEPS, MAX_DEFINITION_SIZE,
};
