use crate::machine::{Dfsa, DfsaTransition, Machine};
use crate::simulator::Simulator;
use crate::tape::Tape;
use crate::types::{MachineError, Resolution, StateId, Step, BLANK_SYMBOL, NOT_STARTED};
use log::trace;

/// Runs a [`Dfsa`] over the input written on a tape.
pub struct DfsaSimulator<'m> {
    machine: &'m Dfsa,
    tape: Tape,
    current: Option<StateId>,
    steps: usize,
}

impl<'m> DfsaSimulator<'m> {
    pub fn new(machine: &'m Dfsa, tape: Tape) -> Self {
        Self {
            machine,
            tape,
            current: None,
            steps: 0,
        }
    }

    pub fn with_input(machine: &'m Dfsa, input: &str) -> Self {
        Self::new(machine, Tape::from_input(input))
    }

    pub fn machine(&self) -> &'m Dfsa {
        self.machine
    }

    pub fn current_state(&self) -> Option<StateId> {
        self.current
    }

    /// Halted with all input consumed in a final state.
    pub fn is_accepted(&self) -> bool {
        self.is_halted()
            && self
                .current
                .is_some_and(|state| self.machine.is_accepting(state))
    }
}

impl<'m> Simulator for DfsaSimulator<'m> {
    type Transition = DfsaTransition;

    fn step(&mut self) -> Result<Step, MachineError> {
        self.machine.validate()?;

        let Some(state) = self.current else {
            let start = self.machine.start_state().ok_or_else(|| {
                MachineError::Nondeterministic("no state is marked as start".to_string())
            })?;
            self.tape.check_alphabet(self.machine.alphabet())?;
            self.current = Some(start);
            self.steps += 1;
            return Ok(Step::Continue);
        };

        match self.machine.step(state, &mut self.tape)? {
            Resolution::Moved(next) => {
                trace!(
                    "DFSA '{}': {} -> {}",
                    self.machine.name(),
                    self.machine.label(state),
                    self.machine.label(next)
                );
                self.current = Some(next);
                self.steps += 1;
                Ok(Step::Continue)
            }
            Resolution::Halted(halt) => Ok(Step::Halt(halt)),
        }
    }

    /// Started and reading the blank that ends the input.
    fn is_halted(&self) -> bool {
        self.current.is_some() && self.tape.read() == BLANK_SYMBOL
    }

    fn is_successful(&self) -> bool {
        self.is_accepted()
    }

    fn reset_machine(&mut self) {
        self.current = None;
        self.steps = 0;
    }

    fn next_transition(&self) -> Option<&DfsaTransition> {
        let state = self.current?;
        let id = self.machine.next_transition(state, self.tape.read())?;
        self.machine.graph().transition(id).ok()
    }

    /// The label of the current state.
    fn configuration(&self) -> String {
        self.current
            .map_or(NOT_STARTED, |state| self.machine.label(state))
            .to_string()
    }

    fn tape(&self) -> &Tape {
        &self.tape
    }

    fn tape_mut(&mut self) -> &mut Tape {
        &mut self.tape
    }

    fn step_count(&self) -> usize {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::DfsaAction;
    use crate::types::Halt;

    /// A single start-and-final state looping on both binary symbols.
    fn accept_all() -> Dfsa {
        let mut dfsa = Dfsa::new("accept all");
        let q0 = dfsa.add_state("q0");
        dfsa.set_start(q0, true).unwrap();
        dfsa.set_final(q0, true).unwrap();
        dfsa.add_transition(q0, q0, DfsaAction::on('0')).unwrap();
        dfsa.add_transition(q0, q0, DfsaAction::on('1')).unwrap();
        dfsa
    }

    fn ends_in_one() -> Dfsa {
        let mut dfsa = Dfsa::new("ends in one");
        let zero = dfsa.add_state("zero");
        let one = dfsa.add_state("one");
        dfsa.set_start(zero, true).unwrap();
        dfsa.set_final(one, true).unwrap();
        dfsa.add_transition(zero, zero, DfsaAction::on('0')).unwrap();
        dfsa.add_transition(zero, one, DfsaAction::on('1')).unwrap();
        dfsa.add_transition(one, zero, DfsaAction::on('0')).unwrap();
        dfsa.add_transition(one, one, DfsaAction::on('1')).unwrap();
        dfsa
    }

    #[test]
    fn test_accepts_any_binary_string() {
        let dfsa = accept_all();
        for input in ["", "0", "1", "0110", "1111111", "0101010101010101010101"] {
            let mut sim = DfsaSimulator::with_input(&dfsa, input);
            assert_eq!(sim.run_until_halt(0), Ok(true), "input {input:?}");
            assert!(sim.is_accepted());
            assert_eq!(sim.configuration(), "q0");
            assert_eq!(sim.step_count(), input.len() + 1);
        }
    }

    #[test]
    fn test_rejects_outside_final_state() {
        let dfsa = ends_in_one();
        let mut sim = DfsaSimulator::with_input(&dfsa, "10");
        assert_eq!(sim.run_until_halt(0), Ok(false));
        assert!(sim.is_halted());
        assert!(!sim.is_accepted());
        assert_eq!(sim.configuration(), "zero");
        assert_eq!(sim.step(), Ok(Step::Halt(Halt::Failed)));

        let mut sim = DfsaSimulator::with_input(&dfsa, "01");
        assert_eq!(sim.run_until_halt(0), Ok(true));
        assert_eq!(sim.step(), Ok(Step::Halt(Halt::Completed)));
    }

    #[test]
    fn test_first_step_enters_start_state() {
        let dfsa = ends_in_one();
        let mut sim = DfsaSimulator::with_input(&dfsa, "1");
        assert_eq!(sim.configuration(), NOT_STARTED);
        assert!(sim.next_transition().is_none());

        assert_eq!(sim.step(), Ok(Step::Continue));
        assert_eq!(sim.configuration(), "zero");
        assert_eq!(sim.tape().head(), 0);

        let preview = sim.next_transition().unwrap();
        assert_eq!(dfsa.label(preview.to()), "one");
        assert_eq!(sim.tape().head(), 0);

        sim.step().unwrap();
        assert_eq!(sim.configuration(), "one");
    }

    #[test]
    fn test_budget_exhaustion_returns_false() {
        let dfsa = accept_all();
        let mut sim = DfsaSimulator::with_input(&dfsa, "0000");
        assert_eq!(sim.run_until_halt(2), Ok(false));
        assert!(!sim.is_halted());
        assert_eq!(sim.run_until_halt(0), Ok(true));
    }

    #[test]
    fn test_invalid_machine_does_not_start() {
        let mut dfsa = accept_all();
        let extra = dfsa.add_state("extra");
        dfsa.set_start(extra, true).unwrap();

        let mut sim = DfsaSimulator::with_input(&dfsa, "01");
        assert!(matches!(
            sim.step(),
            Err(MachineError::Nondeterministic(_))
        ));
        assert_eq!(sim.current_state(), None);
    }

    #[test]
    fn test_foreign_input_symbol_is_rejected_at_start() {
        let dfsa = ends_in_one();
        let mut sim = DfsaSimulator::with_input(&dfsa, "0120");
        match sim.step() {
            Err(MachineError::ValidationError(msg)) => {
                assert!(msg.contains("'2' at offset 2"), "unexpected message: {msg}")
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
        assert_eq!(sim.current_state(), None);
        assert_eq!(sim.step_count(), 0);

        sim.tape_mut().clear();
        assert_eq!(sim.run_until_halt(0), Ok(false));
    }

    #[test]
    fn test_reset_keeps_tape() {
        let dfsa = accept_all();
        let mut sim = DfsaSimulator::with_input(&dfsa, "01");
        sim.run_until_halt(0).unwrap();
        assert_eq!(sim.tape().head(), 2);

        sim.reset_machine();
        assert_eq!(sim.current_state(), None);
        assert_eq!(sim.step_count(), 0);
        assert_eq!(sim.tape().head(), 2);

        sim.tape_mut().reset_head();
        assert!(sim.run_until_halt(0).unwrap());
    }
}
