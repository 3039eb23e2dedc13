//! This module renders machines back into the text definition format understood by
//! [`crate::parser::parse`].
//!
//! Each submachine becomes a block of its own after the machine that uses it. Blocks are
//! referenced by name, so submachines that share a name get a numeric suffix.

use crate::action::{DfsaAction, Input, Output, TmAction};
use crate::alphabet::Alphabet;
use crate::machine::{AnyMachine, Dfsa, Graph, Machine, TuringMachine};
use crate::types::{Direction, MachineError, StateId};
use std::collections::HashSet;

/// Encodes a machine, and every submachine it owns, as a text definition.
///
/// # Returns
///
/// * `Ok(String)` - The definition, root block first.
/// * `Err(MachineError::ValidationError)` if a name, label, or action has no text form,
///   for example a label with spaces or a transition whose input was never set.
pub fn encode(machine: &AnyMachine) -> Result<String, MachineError> {
    let mut blocks = Vec::new();
    match machine {
        AnyMachine::Dfsa(dfsa) => blocks.push(encode_dfsa(dfsa)?),
        AnyMachine::Turing(tm) => {
            encode_turing(tm, &mut HashSet::new(), &mut blocks)?;
        }
    }
    Ok(blocks.join("\n"))
}

fn encode_dfsa(dfsa: &Dfsa) -> Result<String, MachineError> {
    check_name(dfsa.name())?;
    let mut block = header("dfsa", dfsa.name(), dfsa.alphabet());
    for (id, state) in dfsa.graph().states() {
        if state.submachine().is_some() {
            return Err(MachineError::ValidationError(format!(
                "State \"{}\" of DFSA \"{}\" owns a submachine",
                state.label(),
                dfsa.name()
            )));
        }
        block.push_str(&encode_state(dfsa.graph(), id, None, encode_dfsa_action)?);
    }
    block.push_str("}\n");
    Ok(block)
}

/// Appends the block for `tm` and its submachines to `blocks`, returning the name the block
/// was given.
fn encode_turing(
    tm: &TuringMachine,
    names: &mut HashSet<String>,
    blocks: &mut Vec<String>,
) -> Result<String, MachineError> {
    check_name(tm.name())?;
    let name = unique_name(tm.name(), names);
    let index = blocks.len();
    blocks.push(String::new());

    let mut block = header("tm", &name, tm.alphabet());
    for (id, state) in tm.graph().states() {
        let uses = match state.submachine() {
            Some(submachine) => Some(encode_turing(submachine, names, blocks)?),
            None => None,
        };
        block.push_str(&encode_state(
            tm.graph(),
            id,
            uses.as_deref(),
            encode_tm_action,
        )?);
    }
    block.push_str("}\n");

    blocks[index] = block;
    Ok(name)
}

fn header(kind: &str, name: &str, alphabet: &Alphabet) -> String {
    let symbols: Vec<String> = alphabet.symbols().map(String::from).collect();
    if symbols.is_empty() {
        format!("{kind} \"{name}\" {{\n  alphabet: ;\n")
    } else {
        format!("{kind} \"{name}\" {{\n  alphabet: {};\n", symbols.join(" "))
    }
}

fn encode_state<A>(
    graph: &Graph<A>,
    id: StateId,
    uses: Option<&str>,
    encode_action: fn(&A) -> Result<String, MachineError>,
) -> Result<String, MachineError> {
    let state = graph.state(id)?;
    check_label(graph, state.label())?;

    let mut line = format!("  state {}", state.label());
    let flags: Vec<&str> = [(state.is_start(), "start"), (state.is_final(), "final")]
        .into_iter()
        .filter_map(|(set, flag)| set.then_some(flag))
        .collect();
    if !flags.is_empty() {
        line.push_str(&format!(" [{}]", flags.join(", ")));
    }
    if let Some(name) = uses {
        line.push_str(&format!(" uses \"{name}\""));
    }

    let rules = graph
        .outgoing(id)
        .map(|(_, transition)| -> Result<String, MachineError> {
            let action = encode_action(transition.action()).map_err(|e| match e {
                MachineError::ValidationError(msg) => MachineError::ValidationError(format!(
                    "Transition from \"{}\": {msg}",
                    state.label()
                )),
                other => other,
            })?;
            Ok(format!(
                "    {action} -> {};\n",
                graph.label(transition.to())
            ))
        })
        .collect::<Result<Vec<_>, MachineError>>()?;

    if rules.is_empty() {
        line.push_str(" { }\n");
    } else {
        line.push_str(" {\n");
        line.push_str(&rules.concat());
        line.push_str("  }\n");
    }
    Ok(line)
}

fn encode_input(input: Input) -> Result<char, MachineError> {
    match input {
        Input::Symbol(symbol) => Ok(symbol),
        Input::Otherwise => Ok('*'),
        Input::Undefined => Err(MachineError::ValidationError(
            "input symbol is undefined".into(),
        )),
        Input::Empty => Err(MachineError::ValidationError(
            "the empty-string input has no text form".into(),
        )),
    }
}

fn encode_dfsa_action(action: &DfsaAction) -> Result<String, MachineError> {
    encode_input(action.input).map(String::from)
}

fn encode_tm_action(action: &TmAction) -> Result<String, MachineError> {
    let input = encode_input(action.input)?;
    let output = match (action.direction, action.output) {
        (Direction::Left, _) => '<',
        (Direction::Right, _) => '>',
        (Direction::Stay, Output::Nothing) => '-',
        (Direction::Stay, Output::Symbol(symbol)) => symbol,
        (Direction::Stay, Output::Undefined) => {
            return Err(MachineError::ValidationError(
                "output is undefined".into(),
            ))
        }
    };
    Ok(format!("{input}/{output}"))
}

fn check_name(name: &str) -> Result<(), MachineError> {
    if name.contains('"') {
        return Err(MachineError::ValidationError(format!(
            "Machine name {name:?} cannot contain quotes"
        )));
    }
    Ok(())
}

/// Labels become identifiers, so they must be non-empty, alphanumeric, and unique.
fn check_label<A>(graph: &Graph<A>, label: &str) -> Result<(), MachineError> {
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MachineError::ValidationError(format!(
            "State label {label:?} is not a valid identifier"
        )));
    }
    if graph.states().filter(|(_, state)| state.label() == label).count() > 1 {
        return Err(MachineError::ValidationError(format!(
            "State label \"{label}\" is used more than once"
        )));
    }
    Ok(())
}

fn unique_name(name: &str, names: &mut HashSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut counter = 2;
    while names.contains(&candidate) {
        candidate = format!("{name} {counter}");
        counter += 1;
    }
    names.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn outer_with(first: TuringMachine, second: TuringMachine) -> TuringMachine {
        let mut tm = TuringMachine::new("outer");
        let q0 = tm.add_state("q0");
        let q1 = tm.add_state("q1");
        let q2 = tm.add_state("q2");
        tm.set_start(q0, true).unwrap();
        tm.set_final(q2, true).unwrap();
        tm.add_transition(q0, q1, TmAction::right(Input::Otherwise))
            .unwrap();
        tm.add_transition(q1, q2, TmAction::write(Input::symbol('0'), '1'))
            .unwrap();
        tm.attach_submachine(q0, first).unwrap();
        tm.attach_submachine(q1, second).unwrap();
        tm
    }

    fn halt(name: &str) -> TuringMachine {
        let mut tm = TuringMachine::new(name);
        let s0 = tm.add_state("s0");
        tm.set_start(s0, true).unwrap();
        tm.set_final(s0, true).unwrap();
        tm
    }

    #[test]
    fn test_encode_dfsa() {
        let mut dfsa = Dfsa::new("parity");
        let even = dfsa.add_state("even");
        let odd = dfsa.add_state("odd");
        dfsa.set_start(even, true).unwrap();
        dfsa.set_final(even, true).unwrap();
        dfsa.add_transition(even, odd, DfsaAction::on('1')).unwrap();

        let text = encode(&dfsa.into()).unwrap();
        assert_eq!(
            text,
            "dfsa \"parity\" {\n  alphabet: 0 1 _;\n  state even [start, final] {\n    1 -> odd;\n  }\n  state odd { }\n}\n"
        );
    }

    #[test]
    fn test_encoded_submachines_parse_back() {
        let tm = outer_with(halt("inner"), halt("other"));
        let text = encode(&tm.clone().into()).unwrap();

        let AnyMachine::Turing(parsed) = parse(&text).unwrap() else {
            panic!("Expected a Turing machine");
        };
        assert_eq!(parsed.depth(), 2);
        assert_eq!(parsed.graph().state_count(), 3);
        assert_eq!(parsed.graph().transition_count(), 2);
        assert_eq!(encode(&parsed.into()).unwrap(), text);
    }

    #[test]
    fn test_shared_submachine_names_are_suffixed() {
        let tm = outer_with(halt("inner"), halt("inner"));
        let text = encode(&tm.into()).unwrap();
        assert!(text.contains("uses \"inner\""));
        assert!(text.contains("uses \"inner 2\""));
        assert!(text.contains("tm \"inner 2\""));
        assert!(parse(&text).is_ok());
    }

    #[test]
    fn test_unencodable_label() {
        let mut tm = halt("spaced");
        tm.add_state("has space");
        assert!(matches!(
            encode(&tm.into()),
            Err(MachineError::ValidationError(msg)) if msg.contains("not a valid identifier")
        ));
    }

    #[test]
    fn test_unencodable_action() {
        let mut tm = halt("undefined");
        let s0 = tm.start_state().unwrap();
        let s1 = tm.add_state("s1");
        tm.add_transition(s1, s0, TmAction::undefined()).unwrap();
        assert!(matches!(
            encode(&tm.into()),
            Err(MachineError::ValidationError(msg)) if msg.contains("Transition from \"s1\"")
        ));
    }
}
