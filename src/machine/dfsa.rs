//! Deterministic finite-state acceptors.
//!
//! A DFSA consumes its input left to right, one symbol per step, and halts when the head
//! reads blank. The input is accepted if the machine is in a final state at that point.

use crate::action::{DfsaAction, Input};
use crate::alphabet::Alphabet;
use crate::machine::{describe, unique_start, Graph, Machine, Transition};
use crate::tape::Tape;
use crate::types::{
    Halt, MachineError, MachineKind, Resolution, StateId, TransitionId, BLANK_SYMBOL,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type DfsaTransition = Transition<DfsaAction>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dfsa {
    name: String,
    graph: Graph<DfsaAction>,
}

impl Dfsa {
    /// Creates an empty acceptor over the binary alphabet.
    pub fn new(name: &str) -> Self {
        Self::with_alphabet(name, Alphabet::default())
    }

    pub fn with_alphabet(name: &str, alphabet: Alphabet) -> Self {
        Self {
            name: name.to_string(),
            graph: Graph::new(alphabet),
        }
    }

    /// Whether halting in `state` accepts the input.
    pub fn is_accepting(&self, state: StateId) -> bool {
        self.graph.state(state).is_ok_and(|state| state.is_final())
    }

    /// The transition function must be total over every input symbol of the alphabet and
    /// free of duplicates.
    fn check(&self) -> Result<(), MachineError> {
        unique_start(&self.graph)?;
        let alphabet = self.graph.alphabet();

        for (id, state) in self.graph.states() {
            if state.submachine().is_some() {
                return Err(MachineError::Nondeterministic(format!(
                    "state '{}' owns a submachine, which only Turing machines support",
                    state.label()
                )));
            }

            let mut seen = HashSet::new();
            for (_, transition) in self.graph.outgoing(id) {
                let symbol = match transition.action().input {
                    Input::Symbol(symbol) => symbol,
                    Input::Undefined => {
                        return Err(self.reject(transition, "has no input symbol"));
                    }
                    Input::Otherwise => {
                        return Err(self.reject(
                            transition,
                            "is a wildcard, which only Turing machines support",
                        ));
                    }
                    Input::Empty => {
                        return Err(self.reject(transition, "consumes the empty string"));
                    }
                };

                if symbol == BLANK_SYMBOL {
                    return Err(self.reject(transition, "reads blank, which marks the end of input"));
                }
                if !alphabet.contains_symbol(symbol) {
                    return Err(self.reject(
                        transition,
                        &format!("reads '{symbol}', which is not in the alphabet {alphabet}"),
                    ));
                }
                if !seen.insert(symbol) {
                    return Err(MachineError::Nondeterministic(format!(
                        "state '{}' has more than one transition on '{symbol}'",
                        state.label()
                    )));
                }
            }

            let missing: Vec<String> = alphabet
                .input_symbols()
                .filter(|symbol| !seen.contains(symbol))
                .map(|symbol| format!("'{symbol}'"))
                .collect();
            if !missing.is_empty() {
                return Err(MachineError::Nondeterministic(format!(
                    "state '{}' has no transition on {}",
                    state.label(),
                    missing.join(", ")
                )));
            }
        }

        Ok(())
    }

    fn reject(&self, transition: &DfsaTransition, problem: &str) -> MachineError {
        MachineError::Nondeterministic(format!(
            "transition {} {problem}",
            describe(&self.graph, transition)
        ))
    }
}

impl Machine for Dfsa {
    type Action = DfsaAction;

    fn kind(&self) -> MachineKind {
        MachineKind::Dfsa
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn graph(&self) -> &Graph<DfsaAction> {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut Graph<DfsaAction> {
        &mut self.graph
    }

    fn validate(&self) -> Result<(), MachineError> {
        self.graph.memoize(|| self.check()).inspect_err(|e| {
            debug!("DFSA '{}' failed validation: {e}", self.name);
        })
    }

    fn next_transition(&self, state: StateId, symbol: char) -> Option<TransitionId> {
        self.graph
            .outgoing(state)
            .find(|(_, transition)| transition.action().input.matches(symbol))
            .map(|(id, _)| id)
    }

    fn step(&self, state: StateId, tape: &mut Tape) -> Result<Resolution, MachineError> {
        let symbol = tape.read();
        if symbol == BLANK_SYMBOL {
            let halt = if self.is_accepting(state) {
                Halt::Completed
            } else {
                Halt::Failed
            };
            return Ok(Resolution::Halted(halt));
        }

        let id = self.next_transition(state, symbol).ok_or_else(|| {
            MachineError::UndefinedTransition(format!(
                "no transition from state '{}' on symbol '{symbol}'",
                self.graph.label(state)
            ))
        })?;
        let transition = self.graph.transition(id)?;
        transition.action().perform(tape)?;
        Ok(Resolution::Moved(transition.to()))
    }
}
