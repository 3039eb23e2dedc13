use clap::Parser;
use log::debug;
use machina::{
    AnyMachine, DfsaSimulator, MachineError, MachineLibrary, MachineLoader, Simulator, Step, Tape,
    TuringSimulator, DEFAULT_MAX_STEPS,
};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

/// Runs a DFSA or Turing machine over an input tape.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(after_help = "EXAMPLES:
  machina demos/flip-bits.machine --input S0110
  machina --demo \"even zeros\" --input 1001 --debug
  cat demos/nested-step.machine | machina --input 1
  machina demos/even-zeros.machine --save even-zeros.json")]
struct Cli {
    /// Machine definition to run: `.json` or the text format.
    /// Read from stdin when neither a path nor --demo is given.
    machine: Option<PathBuf>,

    /// Run a built-in machine, by name or by its index in --list
    #[clap(long, conflicts_with = "machine")]
    demo: Option<String>,

    /// List the built-in machines and exit
    #[clap(short, long)]
    list: bool,

    /// The input written on the tape
    #[clap(short, long)]
    input: Option<String>,

    /// Read the input tape from a file
    #[clap(long, conflicts_with = "input")]
    tape: Option<PathBuf>,

    /// Give up after this many steps (0 means no limit)
    #[clap(short, long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Print the configuration after every step
    #[clap(short = 'd', long)]
    debug: bool,

    /// Save the machine to this path (`.json` or text) instead of running it
    #[clap(long)]
    save: Option<PathBuf>,

    /// Write the final tape contents to this path
    #[clap(long)]
    save_tape: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if cli.list {
        list_demos();
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn list_demos() {
    for index in 0..MachineLibrary::count() {
        if let Ok(info) = MachineLibrary::get_info(index) {
            println!(
                "{:>2}  {:<20} {:<15} {} states, {} transitions, try --input {}",
                info.index,
                info.name,
                info.kind.to_string(),
                info.state_count,
                info.transition_count,
                info.sample_input
            );
        }
    }
}

/// Loads, optionally saves, and runs the machine. Returns whether the run succeeded.
fn run(cli: &Cli) -> Result<bool, MachineError> {
    let (machine, sample_input) = load_machine(cli)?;

    if let Some(path) = &cli.save {
        MachineLoader::save_machine(&machine, path)?;
        println!("Saved '{}' to {}", machine.name(), path.display());
        return Ok(true);
    }

    let tape = match (&cli.tape, &cli.input) {
        (Some(path), _) => MachineLoader::load_tape(path)?,
        (None, Some(input)) => Tape::from_input(input),
        (None, None) => Tape::from_input(sample_input.unwrap_or_default()),
    };
    debug!("Running {} '{}' on {}", machine.kind(), machine.name(), tape.contents());

    match &machine {
        AnyMachine::Dfsa(dfsa) => {
            let mut sim = DfsaSimulator::new(dfsa, tape);
            let accepted = simulate(&mut sim, cli)?;
            report(&sim, cli, if accepted { "accepted" } else { "rejected" })?;
            Ok(accepted)
        }
        AnyMachine::Turing(tm) => {
            let mut sim = TuringSimulator::new(tm, tape);
            let parked = simulate(&mut sim, cli)?;
            let outcome = if parked {
                "halted with head parked"
            } else if sim.is_halted() {
                "halted with head not parked"
            } else {
                "did not halt"
            };
            report(&sim, cli, outcome)?;
            Ok(parked)
        }
    }
}

/// Loads the machine from --demo, a file, or stdin, in that order. Built-in machines also
/// come with a sample input.
fn load_machine(cli: &Cli) -> Result<(AnyMachine, Option<&'static str>), MachineError> {
    if let Some(query) = &cli.demo {
        let info = MachineLibrary::find(query).ok_or_else(|| {
            MachineError::ValidationError(format!("No built-in machine matches '{query}'"))
        })?;
        let machine = MachineLibrary::get_by_index(info.index)?;
        Ok((machine, Some(info.sample_input)))
    } else if let Some(path) = &cli.machine {
        Ok((MachineLoader::load_machine(path)?, None))
    } else if atty::isnt(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| MachineError::FileError(format!("Failed to read from stdin: {e}")))?;
        Ok((MachineLoader::load_machine_from_string(&buffer)?, None))
    } else {
        Err(MachineError::FileError(
            "No machine given: pass a file, --demo, or pipe a definition to stdin".to_string(),
        ))
    }
}

/// Runs to halt, printing every configuration when --debug is set.
fn simulate<S: Simulator>(sim: &mut S, cli: &Cli) -> Result<bool, MachineError> {
    if !cli.debug {
        return sim.run_until_halt(cli.max_steps);
    }

    println!("Step: 0, {}", sim.configuration());
    while !sim.is_halted() {
        if cli.max_steps != 0 && sim.step_count() >= cli.max_steps {
            println!("\nStep limit of {} reached.", cli.max_steps);
            return Ok(false);
        }
        if let Step::Halt(_) = sim.step()? {
            break;
        }
        println!("Step: {}, {}", sim.step_count(), sim.configuration());
    }
    println!("\nMachine halted.");
    Ok(sim.is_successful())
}

fn report<S: Simulator>(sim: &S, cli: &Cli, outcome: &str) -> Result<(), MachineError> {
    println!("Configuration: {}", sim.configuration());
    println!("Tape: {}", sim.tape().contents());
    println!("Steps: {}", sim.step_count());
    println!("Result: {outcome}");

    if let Some(path) = &cli.save_tape {
        MachineLoader::save_tape(sim.tape(), path)?;
    }
    Ok(())
}
