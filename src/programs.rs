use crate::machine::AnyMachine;
use crate::parser::parse;
use crate::types::{MachineError, MachineKind};
use log::warn;

use std::sync::RwLock;

/// Built-in definitions, each paired with an input it is meant to be run on.
const DEMOS: [(&str, &str); 4] = [
    (include_str!("../demos/even-zeros.machine"), "1001"),
    (include_str!("../demos/divisible-by-three.machine"), "110"),
    (include_str!("../demos/flip-bits.machine"), "S0110"),
    (include_str!("../demos/nested-step.machine"), "1"),
];

lazy_static::lazy_static! {
    pub static ref LIBRARY: RwLock<Vec<MachineInfo>> = RwLock::new(Vec::new());
}

/// Summary of a built-in machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineInfo {
    pub index: usize,
    pub name: String,
    pub kind: MachineKind,
    pub sample_input: &'static str,
    pub state_count: usize,
    pub transition_count: usize,
}

/// Access to the built-in demo machines.
///
/// The registry caches a summary of every demo; machines themselves are rebuilt from their
/// definitions on each request, so callers always get a fresh, independently owned copy.
pub struct MachineLibrary;

impl MachineLibrary {
    /// Parses every embedded definition and fills the registry. Definitions that fail to
    /// parse are logged and left out.
    pub fn load() -> Result<(), MachineError> {
        let mut infos = Vec::new();

        for (index, &(text, sample_input)) in DEMOS.iter().enumerate() {
            match parse(text) {
                Ok(machine) => infos.push(MachineInfo {
                    index,
                    name: machine.name().to_string(),
                    kind: machine.kind(),
                    sample_input,
                    state_count: machine.state_count(),
                    transition_count: machine.transition_count(),
                }),
                Err(e) => warn!("Failed to parse built-in machine {index}: {e}"),
            }
        }

        let mut registry = LIBRARY
            .write()
            .map_err(|_| MachineError::FileError("Failed to acquire write lock".to_string()))?;
        *registry = infos;

        Ok(())
    }

    /// Fills the registry on first use.
    fn ensure_loaded() {
        let loaded = LIBRARY.read().map(|infos| !infos.is_empty()).unwrap_or(false);
        if !loaded {
            if let Err(e) = Self::load() {
                warn!("Failed to load built-in machines: {e}");
            }
        }
    }

    fn infos() -> Vec<MachineInfo> {
        Self::ensure_loaded();
        LIBRARY.read().map(|infos| infos.clone()).unwrap_or_default()
    }

    /// Get the number of available machines
    pub fn count() -> usize {
        Self::infos().len()
    }

    /// Builds the machine at `index`.
    pub fn get_by_index(index: usize) -> Result<AnyMachine, MachineError> {
        let info = Self::get_info(index)?;
        Self::get_text(info.index).and_then(parse)
    }

    /// Builds the machine with the given name. Names are compared case-insensitively.
    pub fn get_by_name(name: &str) -> Result<AnyMachine, MachineError> {
        let info = Self::find(name)
            .ok_or_else(|| MachineError::ValidationError(format!("Machine '{name}' not found")))?;
        Self::get_text(info.index).and_then(parse)
    }

    /// Looks a machine up by name (case-insensitively) or by its index in the listing.
    pub fn find(query: &str) -> Option<MachineInfo> {
        let infos = Self::infos();
        infos
            .iter()
            .find(|info| info.name.eq_ignore_ascii_case(query))
            .cloned()
            .or_else(|| {
                query
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| infos.get(index).cloned())
            })
    }

    pub fn list_names() -> Vec<String> {
        Self::infos().into_iter().map(|info| info.name).collect()
    }

    pub fn get_info(index: usize) -> Result<MachineInfo, MachineError> {
        Self::infos().get(index).cloned().ok_or_else(|| {
            MachineError::ValidationError(format!("Machine index {index} out of range"))
        })
    }

    /// Search for machines whose name contains `query`, ignoring case.
    pub fn search(query: &str) -> Vec<usize> {
        let query = query.to_lowercase();
        Self::infos()
            .iter()
            .filter(|info| info.name.to_lowercase().contains(&query))
            .map(|info| info.index)
            .collect()
    }

    /// The definition text of the machine at `index`.
    pub fn get_text(index: usize) -> Result<&'static str, MachineError> {
        DEMOS.get(index).map(|(text, _)| *text).ok_or_else(|| {
            MachineError::ValidationError(format!("Machine text index {index} out of range"))
        })
    }
}
