//! Step-by-step execution of a Turing machine and its nested submachines.
//!
//! The simulator keeps one frame per active machine level. Frame 0 belongs to the root
//! machine; frame `d + 1` exists only while the state current in frame `d` owns a
//! submachine. All levels share the same tape. Leaving a state discards the frames below
//! it, so re-entering the state runs its submachine again from the start.

use crate::machine::{Machine, TmTransition, TuringMachine};
use crate::simulator::Simulator;
use crate::tape::Tape;
use crate::types::{MachineError, Resolution, StateId, Step, EMPTY_SEGMENT, NOT_STARTED};
use log::{debug, trace};

#[derive(Debug, Clone, Copy)]
struct Frame<'m> {
    machine: &'m TuringMachine,
    cursor: Option<StateId>,
}

impl<'m> Frame<'m> {
    fn new(machine: &'m TuringMachine) -> Self {
        Self {
            machine,
            cursor: None,
        }
    }
}

/// Runs a [`TuringMachine`] over a tape.
pub struct TuringSimulator<'m> {
    frames: Vec<Frame<'m>>,
    tape: Tape,
    steps: usize,
}

impl<'m> TuringSimulator<'m> {
    pub fn new(machine: &'m TuringMachine, tape: Tape) -> Self {
        Self {
            frames: vec![Frame::new(machine)],
            tape,
            steps: 0,
        }
    }

    pub fn with_input(machine: &'m TuringMachine, input: &str) -> Self {
        Self::new(machine, Tape::from_input(input))
    }

    pub fn machine(&self) -> &'m TuringMachine {
        self.frames[0].machine
    }

    /// The current state of the root machine.
    pub fn current_state(&self) -> Option<StateId> {
        self.frames[0].cursor
    }

    /// Number of machine levels currently active, counting the root.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Labels of the current state at every active level, outermost first.
    pub fn active_labels(&self) -> Vec<&'m str> {
        self.frames
            .iter()
            .filter_map(|frame| frame.cursor.map(|state| frame.machine.label(state)))
            .collect()
    }

    /// Halted in the final state with the head back on the first cell.
    pub fn is_halted_with_head_parked(&self) -> bool {
        self.is_halted() && self.tape.is_parked()
    }

    /// A level is halted once its cursor rests on its final state and the submachine of
    /// that state, if any, is halted too.
    fn is_frame_halted(&self, depth: usize) -> bool {
        let Some(frame) = self.frames.get(depth) else {
            return false;
        };
        let Some(state) = frame.cursor else {
            return false;
        };
        if !frame
            .machine
            .graph()
            .state(state)
            .is_ok_and(|state| state.is_final())
        {
            return false;
        }
        match frame.machine.submachine(state) {
            Some(_) => self.is_frame_halted(depth + 1),
            None => true,
        }
    }

    /// Resolves one transition at `depth`, where `state` is current.
    ///
    /// A submachine that completes is not an outcome of the whole run: its parent takes
    /// over on the next step.
    fn resolve(&mut self, depth: usize, state: StateId) -> Result<Step, MachineError> {
        let machine = self.frames[depth].machine;
        match machine.step(state, &mut self.tape)? {
            Resolution::Moved(next) => {
                trace!(
                    "'{}': {} -> {}, head at {}",
                    machine.name(),
                    machine.label(state),
                    machine.label(next),
                    self.tape.head()
                );
                self.frames[depth].cursor = Some(next);
                if let Some(child) = self.frames.get(depth + 1) {
                    debug!("Leaving submachine '{}'", child.machine.name());
                    self.frames.truncate(depth + 1);
                }
                Ok(self.advance())
            }
            Resolution::Halted(halt) if depth == 0 => Ok(Step::Halt(halt)),
            Resolution::Halted(halt) => {
                debug!(
                    "Submachine '{}' halted ({halt:?}), control returns to its parent",
                    machine.name()
                );
                Ok(self.advance())
            }
        }
    }

    fn advance(&mut self) -> Step {
        self.steps += 1;
        Step::Continue
    }
}

impl<'m> Simulator for TuringSimulator<'m> {
    type Transition = TmTransition;

    /// Descends to the innermost level that still has work to do and steps there.
    fn step(&mut self) -> Result<Step, MachineError> {
        self.machine().validate()?;

        let mut depth = 0;
        loop {
            let frame = self.frames[depth];
            let Some(state) = frame.cursor else {
                let start = frame.machine.start_state().ok_or_else(|| {
                    MachineError::Nondeterministic("no state is marked as start".to_string())
                })?;
                if depth > 0 {
                    debug!("Entering submachine '{}'", frame.machine.name());
                } else {
                    self.tape.check_alphabet(frame.machine.alphabet())?;
                }
                self.frames[depth].cursor = Some(start);
                return Ok(self.advance());
            };

            if let Some(submachine) = frame.machine.submachine(state) {
                if self.frames.len() == depth + 1 {
                    self.frames.push(Frame::new(submachine));
                }
                if !self.is_frame_halted(depth + 1) {
                    depth += 1;
                    continue;
                }
            }

            return self.resolve(depth, state);
        }
    }

    fn is_halted(&self) -> bool {
        self.is_frame_halted(0)
    }

    fn is_successful(&self) -> bool {
        self.is_halted_with_head_parked()
    }

    /// Returns the whole run to its unstarted state, including every submachine level.
    fn reset_machine(&mut self) {
        self.frames.truncate(1);
        self.frames[0].cursor = None;
        self.steps = 0;
    }

    fn next_transition(&self) -> Option<&TmTransition> {
        let mut depth = 0;
        loop {
            let frame = self.frames.get(depth)?;
            let state = frame.cursor?;
            if frame.machine.submachine(state).is_some() && !self.is_frame_halted(depth + 1) {
                depth += 1;
                continue;
            }
            let id = frame.machine.next_transition(state, self.tape.read())?;
            return frame.machine.graph().transition(id).ok();
        }
    }

    /// Renders `(left, state, right)`, where `right` starts with the symbol under the head.
    /// Nested states are joined with `/`, outermost first.
    fn configuration(&self) -> String {
        let labels = self.active_labels();
        let state = if labels.is_empty() {
            NOT_STARTED.to_string()
        } else {
            labels.join("/")
        };
        let segment = |text: String| {
            if text.is_empty() {
                EMPTY_SEGMENT.to_string()
            } else {
                text
            }
        };
        format!(
            "({}, {state}, {})",
            segment(self.tape.left_of_head()),
            segment(self.tape.from_head())
        )
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
    use crate::action::{Input, TmAction};
    use crate::types::Halt;

    /// q0 skips 1s to the right and moves to the final state q1 on anything else.
    fn skip_ones() -> TuringMachine {
        let mut tm = TuringMachine::new("skip ones");
        let q0 = tm.add_state("q0");
        let q1 = tm.add_state("q1");
        tm.set_start(q0, true).unwrap();
        tm.set_final(q1, true).unwrap();
        tm.add_transition(q0, q0, TmAction::right(Input::symbol('1')))
            .unwrap();
        tm.add_transition(q0, q1, TmAction::right(Input::Otherwise))
            .unwrap();
        tm
    }

    /// Moves right once and stops.
    fn step_right() -> TuringMachine {
        let mut tm = TuringMachine::new("step right");
        let s0 = tm.add_state("s0");
        let s1 = tm.add_state("s1");
        tm.set_start(s0, true).unwrap();
        tm.set_final(s1, true).unwrap();
        tm.add_transition(s0, s1, TmAction::right(Input::Otherwise))
            .unwrap();
        tm
    }

    /// q0 runs `step right`, then moves back left into the final state q1.
    fn with_submachine() -> TuringMachine {
        let mut tm = TuringMachine::new("outer");
        let q0 = tm.add_state("q0");
        let q1 = tm.add_state("q1");
        tm.set_start(q0, true).unwrap();
        tm.set_final(q1, true).unwrap();
        tm.add_transition(q0, q1, TmAction::left(Input::Otherwise))
            .unwrap();
        tm.attach_submachine(q0, step_right()).unwrap();
        tm
    }

    #[test]
    fn test_wildcard_run_stops_unparked() {
        let tm = skip_ones();
        let mut sim = TuringSimulator::with_input(&tm, "1110");

        assert_eq!(sim.run_until_halt(0), Ok(false));
        assert!(sim.is_halted());
        assert!(!sim.is_halted_with_head_parked());
        assert_eq!(sim.tape().head(), 4);
        assert_eq!(sim.active_labels(), vec!["q1"]);
        assert_eq!(sim.configuration(), "(1110, q1, _)");

        match sim.step() {
            Err(MachineError::UndefinedTransition(msg)) => {
                assert!(msg.contains("head not parked"), "unexpected message: {msg}")
            }
            other => panic!("Expected UndefinedTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_configuration_before_and_after_start() {
        let tm = skip_ones();
        let mut sim = TuringSimulator::with_input(&tm, "");
        assert_eq!(sim.configuration(), format!("({EMPTY_SEGMENT}, -, {EMPTY_SEGMENT})"));

        sim.step().unwrap();
        assert_eq!(sim.configuration(), format!("({EMPTY_SEGMENT}, q0, {EMPTY_SEGMENT})"));
        assert_eq!(sim.step_count(), 1);
    }

    #[test]
    fn test_next_transition_previews_without_moving() {
        let tm = skip_ones();
        let mut sim = TuringSimulator::with_input(&tm, "10");
        assert!(sim.next_transition().is_none());

        sim.step().unwrap();
        let preview = sim.next_transition().unwrap();
        assert_eq!(preview.action().input, Input::symbol('1'));
        assert_eq!(sim.tape().head(), 0);

        sim.step().unwrap();
        let preview = sim.next_transition().unwrap();
        assert_eq!(preview.action().input, Input::Otherwise);
    }

    #[test]
    fn test_submachine_runs_before_parent() {
        let tm = with_submachine();
        let mut sim = TuringSimulator::with_input(&tm, "1");

        // Enter q0.
        assert_eq!(sim.step(), Ok(Step::Continue));
        assert_eq!(sim.depth(), 1);

        // Enter s0 inside q0.
        assert_eq!(sim.step(), Ok(Step::Continue));
        assert_eq!(sim.depth(), 2);
        assert_eq!(sim.configuration(), format!("({EMPTY_SEGMENT}, q0/s0, 1)"));

        // s0 -> s1 moves the head right; the submachine is now halted.
        assert_eq!(sim.step(), Ok(Step::Continue));
        assert_eq!(sim.tape().head(), 1);
        assert_eq!(sim.active_labels(), vec!["q0", "s1"]);
        assert!(!sim.is_halted());

        // The parent resumes: q0 -> q1 moves left and leaves the submachine.
        assert_eq!(sim.step(), Ok(Step::Continue));
        assert_eq!(sim.depth(), 1);
        assert_eq!(sim.tape().head(), 0);
        assert!(sim.is_halted_with_head_parked());
        assert_eq!(sim.step(), Ok(Step::Halt(Halt::Completed)));
        assert_eq!(sim.step_count(), 4);
    }

    #[test]
    fn test_submachine_run_until_halt_accepts() {
        let tm = with_submachine();
        let mut sim = TuringSimulator::with_input(&tm, "1");
        assert_eq!(sim.run_until_halt(0), Ok(true));
        assert_eq!(sim.configuration(), format!("({EMPTY_SEGMENT}, q1, 1_)"));
    }

    #[test]
    fn test_completed_submachine_does_not_halt_the_run() {
        let tm = with_submachine();
        let mut sim = TuringSimulator::with_input(&tm, "1");
        sim.step().unwrap();
        sim.step().unwrap();

        let child = sim.frames[1].machine;
        let s1 = child.final_state().unwrap();
        sim.frames[1].cursor = Some(s1);
        sim.tape_mut().reset_head();

        assert_eq!(sim.resolve(1, s1), Ok(Step::Continue));
        assert_eq!(sim.depth(), 2);
        assert!(!sim.is_halted());
    }

    #[test]
    fn test_reentering_state_restarts_submachine() {
        let mut tm = TuringMachine::new("loop twice");
        let q0 = tm.add_state("q0");
        let q1 = tm.add_state("q1");
        let q2 = tm.add_state("q2");
        tm.set_start(q0, true).unwrap();
        tm.set_final(q2, true).unwrap();
        // Each visit to q0 runs `step right` from s0 again.
        tm.add_transition(q0, q1, TmAction::left(Input::symbol('1')))
            .unwrap();
        tm.add_transition(q1, q0, TmAction::nothing(Input::symbol('1')))
            .unwrap();
        tm.add_transition(q0, q2, TmAction::left(Input::Otherwise))
            .unwrap();
        tm.attach_submachine(q0, step_right()).unwrap();

        let mut sim = TuringSimulator::with_input(&tm, "11");
        // q0, s0, s1 (head 1), q1 (head 0), q0, s0, s1 (head 1)
        for _ in 0..7 {
            assert_eq!(sim.step(), Ok(Step::Continue));
        }
        assert_eq!(sim.active_labels(), vec!["q0", "s1"]);
        assert_eq!(sim.tape().head(), 1);
    }

    #[test]
    fn test_foreign_tape_symbol_is_rejected_before_the_wildcard() {
        let tm = with_submachine();
        let mut sim = TuringSimulator::with_input(&tm, "X");
        assert!(matches!(
            sim.run_until_halt(0),
            Err(MachineError::ValidationError(_))
        ));
        assert_eq!(sim.current_state(), None);
        assert_eq!(sim.depth(), 1);

        sim.tape_mut().write('1');
        assert_eq!(sim.run_until_halt(0), Ok(true));
    }

    #[test]
    fn test_reset_discards_active_submachine() {
        let tm = with_submachine();
        let mut sim = TuringSimulator::with_input(&tm, "1");
        // q0, then s0 inside q0, then s0 -> s1.
        for _ in 0..3 {
            sim.step().unwrap();
        }
        assert_eq!(sim.depth(), 2);
        assert_eq!(sim.active_labels(), vec!["q0", "s1"]);

        sim.reset_machine();
        assert_eq!(sim.depth(), 1);
        assert_eq!(sim.configuration(), "(1, -, _)");

        sim.tape_mut().reset_head();
        sim.step().unwrap();
        sim.step().unwrap();
        assert_eq!(sim.depth(), 2);
        assert_eq!(sim.active_labels(), vec!["q0", "s0"]);
        assert_eq!(sim.run_until_halt(0), Ok(true));
    }

    #[test]
    fn test_invalid_machine_never_starts() {
        let mut tm = skip_ones();
        let q0 = tm.start_state().unwrap();
        tm.add_transition(q0, q0, TmAction::left(Input::Otherwise))
            .unwrap();

        let mut sim = TuringSimulator::with_input(&tm, "1");
        assert!(matches!(
            sim.run_until_halt(0),
            Err(MachineError::Nondeterministic(_))
        ));
        assert_eq!(sim.current_state(), None);
    }

    #[test]
    fn test_budget_and_reset() {
        let mut tm = TuringMachine::new("forever");
        let q0 = tm.add_state("q0");
        let q1 = tm.add_state("q1");
        tm.set_start(q0, true).unwrap();
        tm.set_final(q1, true).unwrap();
        tm.add_transition(q0, q0, TmAction::right(Input::Otherwise))
            .unwrap();

        let mut sim = TuringSimulator::with_input(&tm, "");
        assert_eq!(sim.run_until_halt(25), Ok(false));
        assert_eq!(sim.step_count(), 25);
        assert_eq!(sim.tape().head(), 24);

        sim.reset_machine();
        assert_eq!(sim.current_state(), None);
        assert_eq!(sim.step_count(), 0);
        assert_eq!(sim.tape().head(), 24);
    }
}
