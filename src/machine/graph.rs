//! Structural storage shared by both machine kinds: an arena of states, an arena of
//! transitions, the alphabet, and the memoized validity flag.
//!
//! States and transitions are addressed by stable handles. Deleting one leaves a hole in
//! its arena, so a handle is never reused for a different object.

use crate::alphabet::Alphabet;
use crate::machine::turing::TuringMachine;
use crate::machine::Machine;
use crate::types::{MachineError, StateId, TransitionId};
use serde::{Deserialize, Serialize};
use std::cell::Cell;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
struct Arena<T> {
    slots: Vec<Option<T>>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> Arena<T> {
    fn insert(&mut self, value: T) -> usize {
        self.slots.push(Some(value));
        self.slots.len() - 1
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    fn remove(&mut self, index: usize) -> Option<T> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|value| (i, value)))
    }

    fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// A node of a machine. Identity is its [`StateId`]; the label is only for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    label: String,
    is_start: bool,
    is_final: bool,
    outgoing: Vec<TransitionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    submachine: Option<Box<TuringMachine>>,
}

impl State {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            is_start: false,
            is_final: false,
            outgoing: Vec::new(),
            submachine: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_start(&self) -> bool {
        self.is_start
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Outgoing transitions in insertion order.
    pub fn outgoing(&self) -> &[TransitionId] {
        &self.outgoing
    }

    pub fn submachine(&self) -> Option<&TuringMachine> {
        self.submachine.as_deref()
    }
}

/// A directed edge carrying one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition<A> {
    from: StateId,
    to: StateId,
    action: A,
}

impl<A> Transition<A> {
    pub fn from(&self) -> StateId {
        self.from
    }

    pub fn to(&self) -> StateId {
        self.to
    }

    pub fn action(&self) -> &A {
        &self.action
    }
}

/// States, transitions and alphabet of one machine.
///
/// Every mutator clears the validity flag, so [`Graph::memoize`] re-runs the checks after
/// any structural change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph<A> {
    alphabet: Alphabet,
    states: Arena<State>,
    transitions: Arena<Transition<A>>,
    #[serde(skip)]
    validated: Cell<bool>,
    #[serde(skip)]
    passes: Cell<usize>,
}

impl<A> Default for Graph<A> {
    fn default() -> Self {
        Self::new(Alphabet::default())
    }
}

impl<A> Graph<A> {
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            alphabet,
            states: Arena::default(),
            transitions: Arena::default(),
            validated: Cell::new(false),
            passes: Cell::new(0),
        }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn alphabet_mut(&mut self) -> &mut Alphabet {
        self.invalidate();
        &mut self.alphabet
    }

    pub fn add_state(&mut self, label: &str) -> StateId {
        self.invalidate();
        StateId(self.states.insert(State::new(label)))
    }

    /// Removes a state together with every transition entering or leaving it.
    pub fn delete_state(&mut self, id: StateId) -> Result<State, MachineError> {
        self.state(id)?;
        let incident: Vec<TransitionId> = self
            .transitions
            .iter()
            .filter(|(_, t)| t.from == id || t.to == id)
            .map(|(i, _)| TransitionId(i))
            .collect();
        for transition in incident {
            self.delete_transition(transition)?;
        }
        self.invalidate();
        self.states
            .remove(id.0)
            .ok_or(MachineError::InvalidState(id))
    }

    /// Adds a transition to both the machine-level arena and the source state.
    pub fn add_transition(
        &mut self,
        from: StateId,
        to: StateId,
        action: A,
    ) -> Result<TransitionId, MachineError> {
        self.state(to)?;
        self.state(from)?;
        let id = TransitionId(self.transitions.insert(Transition { from, to, action }));
        self.state_entry(from)?.outgoing.push(id);
        self.invalidate();
        Ok(id)
    }

    /// Removes a transition from both the machine-level arena and its source state.
    pub fn delete_transition(&mut self, id: TransitionId) -> Result<Transition<A>, MachineError> {
        let transition = self
            .transitions
            .remove(id.0)
            .ok_or(MachineError::InvalidTransition(id))?;
        if let Some(state) = self.states.get_mut(transition.from.0) {
            state.outgoing.retain(|&t| t != id);
        }
        self.invalidate();
        Ok(transition)
    }

    /// Replaces the action of an existing transition.
    pub fn set_action(&mut self, id: TransitionId, action: A) -> Result<(), MachineError> {
        let transition = self
            .transitions
            .get_mut(id.0)
            .ok_or(MachineError::InvalidTransition(id))?;
        transition.action = action;
        self.invalidate();
        Ok(())
    }

    pub fn set_start(&mut self, id: StateId, is_start: bool) -> Result<(), MachineError> {
        self.state_entry(id)?.is_start = is_start;
        self.invalidate();
        Ok(())
    }

    pub fn set_final(&mut self, id: StateId, is_final: bool) -> Result<(), MachineError> {
        self.state_entry(id)?.is_final = is_final;
        self.invalidate();
        Ok(())
    }

    /// Labels carry no meaning for validation, so relabelling keeps the validity flag.
    pub fn set_label(&mut self, id: StateId, label: &str) -> Result<(), MachineError> {
        self.state_entry(id)?.label = label.to_string();
        Ok(())
    }

    pub fn state(&self, id: StateId) -> Result<&State, MachineError> {
        self.states.get(id.0).ok_or(MachineError::InvalidState(id))
    }

    pub fn transition(&self, id: TransitionId) -> Result<&Transition<A>, MachineError> {
        self.transitions
            .get(id.0)
            .ok_or(MachineError::InvalidTransition(id))
    }

    /// Returns the label of a state, or an empty string for a foreign handle.
    pub fn label(&self, id: StateId) -> &str {
        self.states.get(id.0).map_or("", |state| state.label())
    }

    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> {
        self.states.iter().map(|(i, state)| (StateId(i), state))
    }

    pub fn transitions(&self) -> impl Iterator<Item = (TransitionId, &Transition<A>)> {
        self.transitions
            .iter()
            .map(|(i, transition)| (TransitionId(i), transition))
    }

    /// Outgoing transitions of `id` in insertion order. Empty for a foreign handle.
    pub fn outgoing(&self, id: StateId) -> impl Iterator<Item = (TransitionId, &Transition<A>)> {
        self.states
            .get(id.0)
            .map(|state| state.outgoing.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|&t| self.transitions.get(t.0).map(|transition| (t, transition)))
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn start_states(&self) -> Vec<StateId> {
        self.states()
            .filter(|(_, state)| state.is_start)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn final_states(&self) -> Vec<StateId> {
        self.states()
            .filter(|(_, state)| state.is_final)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn is_validated(&self) -> bool {
        self.validated.get()
    }

    /// How many times the checks have actually run.
    pub fn validation_passes(&self) -> usize {
        self.passes.get()
    }

    /// Runs `checks` unless the graph is already known to be valid. The flag is only set
    /// when the checks pass.
    pub fn memoize(
        &self,
        checks: impl FnOnce() -> Result<(), MachineError>,
    ) -> Result<(), MachineError> {
        if self.validated.get() {
            return Ok(());
        }
        self.passes.set(self.passes.get() + 1);
        checks()?;
        self.validated.set(true);
        Ok(())
    }

    /// Verifies that handles and outgoing lists agree. Used after deserialization, where
    /// the data did not go through the mutators.
    pub fn check_integrity(&self) -> Result<(), MachineError> {
        for (id, transition) in self.transitions() {
            self.state(transition.to)?;
            let from = self.state(transition.from)?;
            if !from.outgoing.contains(&id) {
                return Err(MachineError::ValidationError(format!(
                    "transition {id} is missing from the outgoing list of state '{}'",
                    from.label
                )));
            }
        }
        for (id, state) in self.states() {
            for &t in &state.outgoing {
                if self.transition(t)?.from != id {
                    return Err(MachineError::ValidationError(format!(
                        "state '{}' lists transition {t} which starts elsewhere",
                        state.label
                    )));
                }
            }
            if let Some(submachine) = &state.submachine {
                submachine.graph().check_integrity()?;
            }
        }
        Ok(())
    }

    pub(crate) fn set_submachine(
        &mut self,
        id: StateId,
        submachine: Option<TuringMachine>,
    ) -> Result<Option<TuringMachine>, MachineError> {
        let state = self.state_entry(id)?;
        let previous = std::mem::replace(&mut state.submachine, submachine.map(Box::new));
        self.invalidate();
        Ok(previous.map(|machine| *machine))
    }

    pub(crate) fn submachine_mut(&mut self, id: StateId) -> Option<&mut TuringMachine> {
        self.invalidate();
        self.states
            .get_mut(id.0)
            .and_then(|state| state.submachine.as_deref_mut())
    }

    fn state_entry(&mut self, id: StateId) -> Result<&mut State, MachineError> {
        self.states
            .get_mut(id.0)
            .ok_or(MachineError::InvalidState(id))
    }

    fn invalidate(&self) {
        self.validated.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestGraph = Graph<char>;

    #[test]
    fn test_transition_sets_stay_in_sync() {
        let mut graph = TestGraph::default();
        let a = graph.add_state("a");
        let b = graph.add_state("b");
        let t1 = graph.add_transition(a, b, '0').unwrap();
        let t2 = graph.add_transition(a, a, '1').unwrap();

        assert_eq!(graph.state(a).unwrap().outgoing(), &[t1, t2]);
        assert_eq!(graph.transition_count(), 2);

        graph.delete_transition(t1).unwrap();
        assert_eq!(graph.state(a).unwrap().outgoing(), &[t2]);
        assert_eq!(graph.transition_count(), 1);
        assert_eq!(
            graph.delete_transition(t1).unwrap_err(),
            MachineError::InvalidTransition(t1)
        );
        assert!(graph.check_integrity().is_ok());
    }

    #[test]
    fn test_delete_state_removes_incident_transitions() {
        let mut graph = TestGraph::default();
        let a = graph.add_state("a");
        let b = graph.add_state("b");
        let c = graph.add_state("c");
        graph.add_transition(a, b, '0').unwrap();
        graph.add_transition(b, c, '0').unwrap();
        let kept = graph.add_transition(a, c, '1').unwrap();

        let removed = graph.delete_state(b).unwrap();
        assert_eq!(removed.label(), "b");
        assert_eq!(graph.state_count(), 2);
        assert_eq!(graph.transitions().map(|(id, _)| id).collect::<Vec<_>>(), vec![kept]);
        assert_eq!(graph.state(a).unwrap().outgoing(), &[kept]);
        assert!(graph.state(b).is_err());
    }

    #[test]
    fn test_handles_are_not_reused() {
        let mut graph = TestGraph::default();
        let a = graph.add_state("a");
        graph.delete_state(a).unwrap();
        let b = graph.add_state("b");
        assert_ne!(a, b);
        assert_eq!(graph.label(a), "");
        assert_eq!(graph.label(b), "b");
    }

    #[test]
    fn test_transition_requires_known_states() {
        let mut graph = TestGraph::default();
        let a = graph.add_state("a");
        let ghost = StateId(42);
        assert_eq!(
            graph.add_transition(a, ghost, '0').unwrap_err(),
            MachineError::InvalidState(ghost)
        );
        assert_eq!(graph.transition_count(), 0);
    }

    #[test]
    fn test_every_mutator_clears_the_flag() {
        let mut graph = TestGraph::default();
        let a = graph.add_state("a");

        let mutations: Vec<Box<dyn Fn(&mut TestGraph)>> = vec![
            Box::new(|g: &mut TestGraph| {
                g.add_state("x");
            }),
            Box::new(move |g: &mut TestGraph| g.set_start(a, true).unwrap()),
            Box::new(move |g: &mut TestGraph| g.set_final(a, true).unwrap()),
            Box::new(move |g: &mut TestGraph| {
                g.add_transition(a, a, '0').unwrap();
            }),
            Box::new(|g: &mut TestGraph| {
                g.alphabet_mut().set_symbol('2', true);
            }),
        ];

        for mutate in mutations {
            graph.memoize(|| Ok(())).unwrap();
            assert!(graph.is_validated());
            mutate(&mut graph);
            assert!(!graph.is_validated());
        }
    }

    #[test]
    fn test_relabel_keeps_the_flag() {
        let mut graph = TestGraph::default();
        let a = graph.add_state("a");
        graph.memoize(|| Ok(())).unwrap();
        graph.set_label(a, "renamed").unwrap();
        assert!(graph.is_validated());
        assert_eq!(graph.label(a), "renamed");
    }

    #[test]
    fn test_memoize_runs_checks_once() {
        let graph = TestGraph::default();
        graph.memoize(|| Ok(())).unwrap();
        graph.memoize(|| panic!("checks must not run again")).unwrap();
        assert_eq!(graph.validation_passes(), 1);
    }

    #[test]
    fn test_failed_checks_are_not_cached() {
        let graph = TestGraph::default();
        let fail = || Err(MachineError::Nondeterministic("broken".to_string()));
        assert!(graph.memoize(fail).is_err());
        assert!(graph.memoize(fail).is_err());
        assert_eq!(graph.validation_passes(), 2);
        assert!(!graph.is_validated());
    }

    #[test]
    fn test_integrity_detects_tampered_data() {
        let mut graph = TestGraph::default();
        let a = graph.add_state("a");
        let b = graph.add_state("b");
        graph.add_transition(a, b, '0').unwrap();

        let mut json: serde_json::Value = serde_json::to_value(&graph).unwrap();
        json["states"][0]["outgoing"] = serde_json::json!([]);
        let tampered: TestGraph = serde_json::from_value(json).unwrap();

        assert!(matches!(
            tampered.check_integrity(),
            Err(MachineError::ValidationError(_))
        ));
    }
}
