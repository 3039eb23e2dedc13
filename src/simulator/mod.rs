//! Simulators drive a machine over a tape one step at a time.

pub mod dfsa;
pub mod turing;

use crate::tape::Tape;
use crate::types::{Halt, MachineError, Step};
use log::debug;

pub use dfsa::DfsaSimulator;
pub use turing::TuringSimulator;

/// Execution driver shared by every machine kind.
///
/// A simulator is reusable after any error: errors abort the current step only.
pub trait Simulator {
    /// The transition type returned by [`Simulator::next_transition`].
    type Transition;

    /// Performs one step. The first step after construction or reset only moves the
    /// cursor onto the start state.
    ///
    /// # Returns
    ///
    /// * `Ok(Step::Continue)` if a step was taken.
    /// * `Ok(Step::Halt(_))` if the machine is halted and no step was possible.
    /// * `Err(MachineError)` if validation fails or the step cannot be carried out.
    fn step(&mut self) -> Result<Step, MachineError>;

    /// Whether the machine has reached a configuration it cannot leave.
    fn is_halted(&self) -> bool;

    /// Whether the current halted configuration counts as success: acceptance for a DFSA,
    /// a parked head for a Turing machine.
    fn is_successful(&self) -> bool;

    /// Forgets the current state. The tape is left as it is.
    fn reset_machine(&mut self);

    /// Returns the transition the next step would take, without taking it.
    fn next_transition(&self) -> Option<&Self::Transition>;

    /// Renders the instantaneous description of the run.
    fn configuration(&self) -> String;

    fn tape(&self) -> &Tape;

    fn tape_mut(&mut self) -> &mut Tape;

    /// Number of steps taken since construction or the last reset.
    fn step_count(&self) -> usize;

    /// Steps until the machine halts or `max_steps` steps have been taken (0 means no
    /// limit).
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if the machine halted within the budget and [`Simulator::is_successful`].
    /// * `Ok(false)` if it halted unsuccessfully or ran out of budget.
    /// * `Err(MachineError)` if a step failed.
    fn run_until_halt(&mut self, max_steps: usize) -> Result<bool, MachineError> {
        let mut taken = 0;
        while !self.is_halted() {
            if max_steps != 0 && taken >= max_steps {
                debug!("Step budget of {max_steps} exhausted");
                return Ok(false);
            }
            if let Step::Halt(halt) = self.step()? {
                return Ok(halt == Halt::Completed && self.is_successful());
            }
            taken += 1;
        }
        Ok(self.is_successful())
    }
}
