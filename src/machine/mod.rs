//! Machines: the capability interface shared by every machine kind, its two implementations,
//! and a tagged union used where the kind is only known at run time.

pub mod dfsa;
pub mod graph;
pub mod turing;

use crate::alphabet::Alphabet;
use crate::tape::Tape;
use crate::types::{MachineError, MachineKind, Resolution, StateId, TransitionId};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub use dfsa::{Dfsa, DfsaTransition};
pub use graph::{Graph, State, Transition};
pub use turing::{TmTransition, TuringMachine};

/// Operations every machine kind supports.
///
/// Implementors provide storage, validation, and transition resolution. The structural
/// editing operations are provided on top of [`Machine::graph_mut`], whose mutators keep
/// the validity flag honest.
pub trait Machine {
    /// The action carried by this machine's transitions.
    type Action: Copy + Display;

    fn kind(&self) -> MachineKind;

    fn name(&self) -> &str;

    fn graph(&self) -> &Graph<Self::Action>;

    fn graph_mut(&mut self) -> &mut Graph<Self::Action>;

    /// Checks the determinism invariants of this kind. The result is memoized until the
    /// next structural change.
    ///
    /// # Errors
    ///
    /// * `MachineError::Nondeterministic` describing the first offending state or transition.
    fn validate(&self) -> Result<(), MachineError>;

    /// Returns the transition taken from `state` when the head reads `symbol`, without
    /// changing anything.
    fn next_transition(&self, state: StateId, symbol: char) -> Option<TransitionId>;

    /// Resolves and applies one transition from `state` against the tape.
    fn step(&self, state: StateId, tape: &mut Tape) -> Result<Resolution, MachineError>;

    fn is_validated(&self) -> bool {
        self.graph().is_validated()
    }

    fn alphabet(&self) -> &Alphabet {
        self.graph().alphabet()
    }

    fn alphabet_mut(&mut self) -> &mut Alphabet {
        self.graph_mut().alphabet_mut()
    }

    fn add_state(&mut self, label: &str) -> StateId {
        self.graph_mut().add_state(label)
    }

    fn delete_state(&mut self, id: StateId) -> Result<(), MachineError> {
        self.graph_mut().delete_state(id).map(|_| ())
    }

    fn add_transition(
        &mut self,
        from: StateId,
        to: StateId,
        action: Self::Action,
    ) -> Result<TransitionId, MachineError> {
        self.graph_mut().add_transition(from, to, action)
    }

    fn delete_transition(&mut self, id: TransitionId) -> Result<(), MachineError> {
        self.graph_mut().delete_transition(id).map(|_| ())
    }

    fn set_action(&mut self, id: TransitionId, action: Self::Action) -> Result<(), MachineError> {
        self.graph_mut().set_action(id, action)
    }

    fn set_start(&mut self, id: StateId, is_start: bool) -> Result<(), MachineError> {
        self.graph_mut().set_start(id, is_start)
    }

    fn set_final(&mut self, id: StateId, is_final: bool) -> Result<(), MachineError> {
        self.graph_mut().set_final(id, is_final)
    }

    fn states(&self) -> Vec<StateId> {
        self.graph().states().map(|(id, _)| id).collect()
    }

    fn transitions(&self) -> Vec<TransitionId> {
        self.graph().transitions().map(|(id, _)| id).collect()
    }

    /// The first state flagged as start. Unique once the machine validates.
    fn start_state(&self) -> Option<StateId> {
        self.graph().start_states().first().copied()
    }

    fn final_states(&self) -> Vec<StateId> {
        self.graph().final_states()
    }

    fn label(&self, id: StateId) -> &str {
        self.graph().label(id)
    }
}

/// A machine of either kind, as stored on disk or chosen on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnyMachine {
    Dfsa(Dfsa),
    Turing(TuringMachine),
}

impl AnyMachine {
    pub fn kind(&self) -> MachineKind {
        match self {
            AnyMachine::Dfsa(machine) => machine.kind(),
            AnyMachine::Turing(machine) => machine.kind(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AnyMachine::Dfsa(machine) => machine.name(),
            AnyMachine::Turing(machine) => machine.name(),
        }
    }

    pub fn validate(&self) -> Result<(), MachineError> {
        match self {
            AnyMachine::Dfsa(machine) => machine.validate(),
            AnyMachine::Turing(machine) => machine.validate(),
        }
    }

    pub fn state_count(&self) -> usize {
        match self {
            AnyMachine::Dfsa(machine) => machine.graph().state_count(),
            AnyMachine::Turing(machine) => machine.graph().state_count(),
        }
    }

    pub fn transition_count(&self) -> usize {
        match self {
            AnyMachine::Dfsa(machine) => machine.graph().transition_count(),
            AnyMachine::Turing(machine) => machine.graph().transition_count(),
        }
    }

    /// Checks that handles and outgoing lists agree, recursing into submachines.
    pub fn check_integrity(&self) -> Result<(), MachineError> {
        match self {
            AnyMachine::Dfsa(machine) => machine.graph().check_integrity(),
            AnyMachine::Turing(machine) => machine.graph().check_integrity(),
        }
    }
}

impl From<Dfsa> for AnyMachine {
    fn from(machine: Dfsa) -> Self {
        AnyMachine::Dfsa(machine)
    }
}

impl From<TuringMachine> for AnyMachine {
    fn from(machine: TuringMachine) -> Self {
        AnyMachine::Turing(machine)
    }
}

/// Fails unless exactly one state carries the start flag.
pub(crate) fn unique_start<A>(graph: &Graph<A>) -> Result<StateId, MachineError> {
    match graph.start_states().as_slice() {
        [start] => Ok(*start),
        [] => Err(MachineError::Nondeterministic(
            "no state is marked as start".to_string(),
        )),
        starts => Err(MachineError::Nondeterministic(format!(
            "{} states are marked as start: {}",
            starts.len(),
            quoted_labels(graph, starts)
        ))),
    }
}

pub(crate) fn quoted_labels<A>(graph: &Graph<A>, states: &[StateId]) -> String {
    states
        .iter()
        .map(|&id| format!("'{}'", graph.label(id)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders a transition as `'from' -(action)-> 'to'` for diagnostics.
pub(crate) fn describe<A: Display>(graph: &Graph<A>, transition: &Transition<A>) -> String {
    format!(
        "'{}' -({})-> '{}'",
        graph.label(transition.from()),
        transition.action(),
        graph.label(transition.to())
    )
}
