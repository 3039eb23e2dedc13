//! Turing machines with a single one-ended tape.
//!
//! A Turing machine has exactly one final state, which has no outgoing transitions. It halts
//! successfully when no transition applies, the machine is in that final state, and the head
//! is parked at offset 0. Any state may own a nested machine that the simulator runs to
//! completion whenever the state is current.

use crate::action::{Input, Output, TmAction};
use crate::alphabet::Alphabet;
use crate::machine::{describe, quoted_labels, unique_start, Graph, Machine, Transition};
use crate::tape::Tape;
use crate::types::{Direction, Halt, MachineError, MachineKind, Resolution, StateId, TransitionId};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type TmTransition = Transition<TmAction>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuringMachine {
    name: String,
    graph: Graph<TmAction>,
}

impl TuringMachine {
    /// Creates an empty machine over the binary alphabet.
    pub fn new(name: &str) -> Self {
        Self::with_alphabet(name, Alphabet::default())
    }

    pub fn with_alphabet(name: &str, alphabet: Alphabet) -> Self {
        Self {
            name: name.to_string(),
            graph: Graph::new(alphabet),
        }
    }

    /// The first state flagged as final. Unique once the machine validates.
    pub fn final_state(&self) -> Option<StateId> {
        self.graph.final_states().first().copied()
    }

    /// Makes `submachine` run whenever `state` is current. Returns the machine it replaces.
    ///
    /// Submachines are owned by value, so a machine can never end up nested inside itself.
    pub fn attach_submachine(
        &mut self,
        state: StateId,
        submachine: TuringMachine,
    ) -> Result<Option<TuringMachine>, MachineError> {
        self.graph.set_submachine(state, Some(submachine))
    }

    pub fn detach_submachine(
        &mut self,
        state: StateId,
    ) -> Result<Option<TuringMachine>, MachineError> {
        self.graph.set_submachine(state, None)
    }

    pub fn submachine(&self, state: StateId) -> Option<&TuringMachine> {
        self.graph
            .state(state)
            .ok()
            .and_then(|state| state.submachine())
    }

    /// Mutable access to a nested machine. Counts as a structural change of this machine.
    pub fn submachine_mut(&mut self, state: StateId) -> Option<&mut TuringMachine> {
        self.graph.submachine_mut(state)
    }

    /// Number of machine levels, counting this one.
    pub fn depth(&self) -> usize {
        1 + self
            .graph
            .states()
            .filter_map(|(_, state)| state.submachine())
            .map(TuringMachine::depth)
            .max()
            .unwrap_or(0)
    }

    fn check(&self) -> Result<(), MachineError> {
        unique_start(&self.graph)?;
        self.check_final_state()?;
        let alphabet = self.graph.alphabet();

        for (id, state) in self.graph.states() {
            let mut seen = HashSet::new();
            for (_, transition) in self.graph.outgoing(id) {
                let action = transition.action();
                match action.input {
                    Input::Undefined => {
                        return Err(self.reject(transition, "has no input symbol"));
                    }
                    Input::Empty => {
                        return Err(self.reject(
                            transition,
                            "consumes the empty string, which only DFSAs support",
                        ));
                    }
                    Input::Symbol(symbol) if !alphabet.contains_symbol(symbol) => {
                        return Err(self.reject(
                            transition,
                            &format!("reads '{symbol}', which is not in the alphabet {alphabet}"),
                        ));
                    }
                    Input::Symbol(_) | Input::Otherwise => {}
                }

                if !seen.insert(action.input) {
                    let what = match action.input {
                        Input::Otherwise => "wildcard transition".to_string(),
                        input => format!("transition on '{input}'"),
                    };
                    return Err(MachineError::Nondeterministic(format!(
                        "state '{}' has more than one {what}",
                        state.label()
                    )));
                }

                if action.direction == Direction::Stay {
                    match action.output {
                        Output::Undefined => {
                            return Err(self.reject(transition, "has no output"));
                        }
                        Output::Symbol(symbol) if !alphabet.contains_symbol(symbol) => {
                            return Err(self.reject(
                                transition,
                                &format!(
                                    "writes '{symbol}', which is not in the alphabet {alphabet}"
                                ),
                            ));
                        }
                        Output::Symbol(_) | Output::Nothing => {}
                    }
                }
            }

            if let Some(submachine) = state.submachine() {
                submachine.validate().map_err(|e| match e {
                    MachineError::Nondeterministic(msg) => {
                        MachineError::Nondeterministic(format!(
                            "in submachine '{}' of state '{}': {msg}",
                            submachine.name(),
                            state.label()
                        ))
                    }
                    other => other,
                })?;
            }
        }

        Ok(())
    }

    fn check_final_state(&self) -> Result<(), MachineError> {
        match self.graph.final_states().as_slice() {
            [] => Err(MachineError::Nondeterministic(
                "no state is marked as final".to_string(),
            )),
            [single] => {
                let state = self.graph.state(*single)?;
                if state.outgoing().is_empty() {
                    Ok(())
                } else {
                    Err(MachineError::Nondeterministic(format!(
                        "final state '{}' has {} outgoing transition(s)",
                        state.label(),
                        state.outgoing().len()
                    )))
                }
            }
            finals => Err(MachineError::Nondeterministic(format!(
                "{} states are marked as final: {}",
                finals.len(),
                quoted_labels(&self.graph, finals)
            ))),
        }
    }

    fn reject(&self, transition: &TmTransition, problem: &str) -> MachineError {
        MachineError::Nondeterministic(format!(
            "transition {} {problem}",
            describe(&self.graph, transition)
        ))
    }
}

impl Machine for TuringMachine {
    type Action = TmAction;

    fn kind(&self) -> MachineKind {
        MachineKind::Turing
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn graph(&self) -> &Graph<TmAction> {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut Graph<TmAction> {
        &mut self.graph
    }

    fn validate(&self) -> Result<(), MachineError> {
        self.graph.memoize(|| self.check()).inspect_err(|e| {
            debug!("Turing machine '{}' failed validation: {e}", self.name);
        })
    }

    /// An exact match wins; otherwise the state's wildcard transition applies, if any.
    fn next_transition(&self, state: StateId, symbol: char) -> Option<TransitionId> {
        let mut otherwise = None;
        for (id, transition) in self.graph.outgoing(state) {
            let input = transition.action().input;
            if input.matches(symbol) {
                return Some(id);
            }
            if input == Input::Otherwise && otherwise.is_none() {
                otherwise = Some(id);
            }
        }
        otherwise
    }

    fn step(&self, state: StateId, tape: &mut Tape) -> Result<Resolution, MachineError> {
        let symbol = tape.read();
        if let Some(id) = self.next_transition(state, symbol) {
            let transition = self.graph.transition(id)?;
            transition.action().perform(tape)?;
            return Ok(Resolution::Moved(transition.to()));
        }

        let parked = tape.is_parked();
        let is_final = self.graph.state(state)?.is_final();
        let reason = match (parked, is_final) {
            (true, true) => return Ok(Resolution::Halted(Halt::Completed)),
            (false, true) => "head not parked",
            (true, false) => "not in a final state",
            (false, false) => "head not parked and not in a final state",
        };
        Err(MachineError::UndefinedTransition(format!(
            "no transition from state '{}' on symbol '{symbol}': {reason}",
            self.graph.label(state)
        )))
    }
}
