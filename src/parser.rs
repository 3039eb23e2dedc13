//! This module parses the text definition format into machines, utilizing the `pest` crate.
//! The grammar lives in `grammar.pest`. A definition holds one or more machine blocks; the
//! first block is the machine that gets built, and the remaining blocks are available to it
//! as submachines through `uses "name"`.

use crate::{
    action::{DfsaAction, Input, TmAction},
    alphabet::Alphabet,
    machine::{AnyMachine, Dfsa, Machine, TuringMachine},
    types::{MachineError, MachineKind, StateId, BLANK_SYMBOL},
};
use pest::{
    error::{Error, ErrorVariant},
    iterators::Pair,
    Parser as PestParser, Span,
};
use pest_derive::Parser as PestParser;

/// Derives a `PestParser` for the machine grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct MachineParser;

/// Parses a text definition into a machine.
///
/// # Arguments
///
/// * `input` - A string slice containing one or more machine blocks.
///
/// # Returns
///
/// * `Ok(AnyMachine)` built from the first block.
/// * `Err(MachineError::ParseError)` if there are syntax errors or duplicate names.
/// * `Err(MachineError::ValidationError)` if a block references something that does not
///   exist or cannot be used where it is referenced.
///
/// The result is structurally complete but not validated: determinism is checked the first
/// time the machine is validated or run.
pub fn parse(input: &str) -> Result<AnyMachine, MachineError> {
    let root = MachineParser::parse(Rule::file, input.trim())
        .map_err(Box::new)?
        .next()
        .ok_or_else(|| MachineError::ValidationError("Definition is empty".into()))?;

    let mut blocks: Vec<Block> = Vec::new();
    for pair in root.into_inner() {
        if pair.as_rule() != Rule::machine {
            continue;
        }
        let span = pair.as_span();
        let block = parse_block(pair)?;
        if blocks.iter().any(|other| other.name == block.name) {
            return Err(parse_error(
                &format!("Duplicate machine \"{}\"", block.name),
                span,
            ));
        }
        blocks.push(block);
    }

    let definitions = Definitions { blocks };
    let root = definitions
        .blocks
        .first()
        .ok_or_else(|| MachineError::ValidationError("Definition is empty".into()))?;

    match root.kind {
        MachineKind::Dfsa => definitions.build_dfsa(root).map(AnyMachine::from),
        MachineKind::Turing => definitions
            .build_turing(root, &mut Vec::new())
            .map(AnyMachine::from),
    }
}

/// A machine block as written, before state names are resolved.
struct Block {
    kind: MachineKind,
    name: String,
    alphabet: Alphabet,
    states: Vec<StateDef>,
}

struct StateDef {
    label: String,
    is_start: bool,
    is_final: bool,
    uses: Option<String>,
    rules: Vec<RuleDef>,
}

struct RuleDef {
    input: Input,
    output: Option<String>,
    target: String,
}

/// Parses one `Rule::machine` pair: kind, name, alphabet and states.
fn parse_block(pair: Pair<Rule>) -> Result<Block, MachineError> {
    let mut kind = MachineKind::Turing;
    let mut name = String::new();
    let mut alphabet = Alphabet::empty();
    let mut states: Vec<StateDef> = Vec::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::kind => {
                kind = match p.as_str() {
                    "dfsa" => MachineKind::Dfsa,
                    _ => MachineKind::Turing,
                }
            }
            Rule::name => name = parse_name(p),
            Rule::alphabet => {
                for symbol in p.into_inner() {
                    alphabet.set_symbol(parse_symbol(symbol.as_str()), true);
                }
            }
            Rule::state => {
                let span = p.as_span();
                let state = parse_state(p)?;
                if states.iter().any(|other| other.label == state.label) {
                    return Err(parse_error(
                        &format!("Duplicate state \"{}\" in \"{name}\"", state.label),
                        span,
                    ));
                }
                states.push(state);
            }
            _ => {} // Skip other rules
        }
    }

    Ok(Block {
        kind,
        name,
        alphabet,
        states,
    })
}

/// Parses a single `Rule::state` pair.
fn parse_state(pair: Pair<Rule>) -> Result<StateDef, MachineError> {
    let mut state = StateDef {
        label: String::new(),
        is_start: false,
        is_final: false,
        uses: None,
        rules: Vec::new(),
    };

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => state.label = p.as_str().into(),
            Rule::flags => {
                for flag in p.into_inner() {
                    match flag.as_str() {
                        "start" => state.is_start = true,
                        "final" => state.is_final = true,
                        other => {
                            return Err(parse_error(
                                &format!("Unsupported flag: {other}"),
                                flag.as_span(),
                            ))
                        }
                    }
                }
            }
            Rule::uses => {
                if let Some(name) = p.into_inner().next() {
                    state.uses = Some(parse_name(name));
                }
            }
            Rule::rule => state.rules.push(parse_rule(p)),
            _ => {}
        }
    }

    Ok(state)
}

/// Parses `input[/output] -> target;`.
fn parse_rule(pair: Pair<Rule>) -> RuleDef {
    let mut rule = RuleDef {
        input: Input::Undefined,
        output: None,
        target: String::new(),
    };

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::input => {
                rule.input = match p.as_str() {
                    "*" => Input::Otherwise,
                    symbol => Input::symbol(parse_symbol(symbol)),
                }
            }
            Rule::output => rule.output = Some(p.as_str().into()),
            Rule::ident => rule.target = p.as_str().into(),
            _ => {}
        }
    }

    rule
}

/// The parsed blocks of one definition, indexed by name on demand.
struct Definitions {
    blocks: Vec<Block>,
}

impl Definitions {
    fn find(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.name == name)
    }

    fn build_dfsa(&self, block: &Block) -> Result<Dfsa, MachineError> {
        let mut dfsa = Dfsa::with_alphabet(&block.name, block.alphabet);
        let ids = add_states(&mut dfsa, block)?;

        for (state, &from) in block.states.iter().zip(&ids) {
            if state.uses.is_some() {
                return Err(MachineError::ValidationError(format!(
                    "State \"{}\" in DFSA \"{}\" uses a submachine; only tm blocks can",
                    state.label, block.name
                )));
            }
            for rule in &state.rules {
                if let Some(output) = &rule.output {
                    return Err(MachineError::ValidationError(format!(
                        "Transition from \"{}\" in DFSA \"{}\" has output \"{output}\"; DFSA transitions only read",
                        state.label, block.name
                    )));
                }
                let to = resolve_target(block, &ids, &state.label, &rule.target)?;
                dfsa.add_transition(from, to, DfsaAction::new(rule.input))?;
            }
        }

        Ok(dfsa)
    }

    /// Builds the Turing machine in `block`, recursively building every submachine it uses.
    /// `visiting` holds the chain of machine names currently being built.
    fn build_turing(
        &self,
        block: &Block,
        visiting: &mut Vec<String>,
    ) -> Result<TuringMachine, MachineError> {
        visiting.push(block.name.clone());

        let mut tm = TuringMachine::with_alphabet(&block.name, block.alphabet);
        let ids = add_states(&mut tm, block)?;

        for (state, &from) in block.states.iter().zip(&ids) {
            for rule in &state.rules {
                let output = rule.output.as_deref().ok_or_else(|| {
                    MachineError::ValidationError(format!(
                        "Transition from \"{}\" in \"{}\" needs an output: <, >, - or a symbol",
                        state.label, block.name
                    ))
                })?;
                let to = resolve_target(block, &ids, &state.label, &rule.target)?;
                tm.add_transition(from, to, tm_action(rule.input, output))?;
            }

            if let Some(name) = &state.uses {
                let submachine = self.build_submachine(name, visiting)?;
                tm.attach_submachine(from, submachine)?;
            }
        }

        visiting.pop();
        Ok(tm)
    }

    fn build_submachine(
        &self,
        name: &str,
        visiting: &mut Vec<String>,
    ) -> Result<TuringMachine, MachineError> {
        if visiting.iter().any(|visited| visited == name) {
            let mut chain = visiting.clone();
            chain.push(name.to_string());
            return Err(MachineError::ValidationError(format!(
                "Cyclic submachine reference: {}",
                format_chain(&chain)
            )));
        }

        let block = self.find(name).ok_or_else(|| {
            MachineError::ValidationError(format!("Unknown submachine \"{name}\""))
        })?;
        if block.kind != MachineKind::Turing {
            return Err(MachineError::ValidationError(format!(
                "Submachine \"{name}\" is a {}, but only tm blocks can be used",
                block.kind
            )));
        }

        self.build_turing(block, visiting)
    }
}

/// Adds the block's states in order, returning their handles in the same order.
fn add_states<M: Machine>(machine: &mut M, block: &Block) -> Result<Vec<StateId>, MachineError> {
    let mut ids = Vec::with_capacity(block.states.len());
    for state in &block.states {
        let id = machine.add_state(&state.label);
        machine.set_start(id, state.is_start)?;
        machine.set_final(id, state.is_final)?;
        ids.push(id);
    }
    Ok(ids)
}

fn resolve_target(
    block: &Block,
    ids: &[StateId],
    from: &str,
    target: &str,
) -> Result<StateId, MachineError> {
    block
        .states
        .iter()
        .position(|state| state.label == target)
        .map(|index| ids[index])
        .ok_or_else(|| {
            MachineError::ValidationError(format!(
                "Transition from \"{from}\" in \"{}\" targets unknown state \"{target}\"",
                block.name
            ))
        })
}

/// Maps the output column of a TM rule onto an action.
fn tm_action(input: Input, output: &str) -> TmAction {
    match output {
        "<" => TmAction::left(input),
        ">" => TmAction::right(input),
        "-" => TmAction::nothing(input),
        symbol => TmAction::write(input, parse_symbol(symbol)),
    }
}

/// Creates a `MachineError::ParseError` from a message and a `Span`.
fn parse_error(msg: &str, span: Span) -> MachineError {
    MachineError::ParseError(Box::new(Error::new_from_span(
        ErrorVariant::CustomError {
            message: msg.to_string(),
        },
        span,
    )))
}

/// Extracts the text between the quotes of a `Rule::name` pair.
fn parse_name(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|text| text.as_str().to_string())
        .unwrap_or_default()
}

fn parse_symbol(input: &str) -> char {
    input.chars().next().unwrap_or(BLANK_SYMBOL)
}

fn format_chain(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(" -> ")
}
