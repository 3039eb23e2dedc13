//! This module provides the `MachineLoader` struct, responsible for reading and writing
//! machines and tapes.
//!
//! Machines are stored either as JSON (`.json`) or in the text definition format (any other
//! extension, conventionally `.machine`). Tapes are stored as their plain contents.

use crate::encoder::encode;
use crate::machine::AnyMachine;
use crate::parser::parse;
use crate::tape::Tape;
use crate::types::{MachineError, MAX_DEFINITION_SIZE};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of machine definitions in the text format.
pub const DEFINITION_EXTENSION: &str = "machine";
/// Extension of machines stored as JSON.
pub const JSON_EXTENSION: &str = "json";

/// `MachineLoader` is a utility struct for loading and saving machines and tapes. Loading
/// never hands out a partially built machine: any failure is reported as an error.
pub struct MachineLoader;

impl MachineLoader {
    /// Loads a machine from the specified file path, choosing the format by extension.
    ///
    /// # Returns
    ///
    /// * `Ok(AnyMachine)` if the file is read and describes a structurally sound machine.
    /// * `Err(MachineError::FileError)` if the file cannot be read or is too large.
    /// * `Err(MachineError::ParseError)` or `Err(MachineError::ValidationError)` if the
    ///   content is not a valid definition.
    pub fn load_machine(path: &Path) -> Result<AnyMachine, MachineError> {
        let content = read_file(path)?;
        debug!("Loading machine from {}", path.display());

        if is_json(path) {
            Self::load_machine_from_json(&content)
        } else {
            Self::load_machine_from_string(&content)
        }
    }

    /// Loads a machine from text definition content, e.g. read from standard input.
    pub fn load_machine_from_string(content: &str) -> Result<AnyMachine, MachineError> {
        check_size(content.len())?;
        parse(content)
    }

    /// Loads a machine from its JSON representation and checks that its state and
    /// transition handles are consistent.
    pub fn load_machine_from_json(content: &str) -> Result<AnyMachine, MachineError> {
        check_size(content.len())?;
        let machine: AnyMachine = serde_json::from_str(content).map_err(|e| {
            MachineError::ValidationError(format!("Invalid machine JSON: {e}"))
        })?;
        machine.check_integrity()?;
        Ok(machine)
    }

    /// Saves a machine to the specified path: JSON for a `.json` extension, the text format
    /// otherwise.
    pub fn save_machine(machine: &AnyMachine, path: &Path) -> Result<(), MachineError> {
        let content = if is_json(path) {
            serde_json::to_string_pretty(machine).map_err(|e| {
                MachineError::FileError(format!("Failed to serialize {}: {e}", machine.name()))
            })?
        } else {
            encode(machine)?
        };

        debug!("Saving {} '{}' to {}", machine.kind(), machine.name(), path.display());
        write_file(path, &content)
    }

    /// Loads every machine file (`.machine` or `.json`) in a directory.
    ///
    /// Directories and files with other extensions are skipped. Each element of the result
    /// is either the path and machine, or the error that prevented loading it.
    pub fn load_machines(
        directory: &Path,
    ) -> Vec<Result<(PathBuf, AnyMachine), MachineError>> {
        if !directory.exists() {
            return vec![Err(MachineError::FileError(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(MachineError::FileError(format!(
                    "Failed to read directory {}: {e}",
                    directory.display()
                )))]
            }
        };

        let mut paths: Vec<PathBuf> = Vec::new();
        let mut results = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => results.push(Err(MachineError::FileError(format!(
                    "Failed to read directory entry: {e}"
                )))),
            }
        }
        paths.sort();

        results.extend(
            paths
                .into_iter()
                .filter(|path| {
                    !path.is_dir()
                        && path.extension().is_some_and(|ext| {
                            ext == DEFINITION_EXTENSION || ext == JSON_EXTENSION
                        })
                })
                .map(|path| Self::load_machine(&path).map(|machine| (path, machine))),
        );
        results
    }

    /// Reads a tape from a file holding its contents. Trailing line breaks are ignored and
    /// the head starts parked.
    pub fn load_tape(path: &Path) -> Result<Tape, MachineError> {
        let content = read_file(path)?;
        Ok(Tape::from_input(content.trim_end_matches(['\n', '\r'])))
    }

    /// Writes the tape contents up to its high-water mark.
    pub fn save_tape(tape: &Tape, path: &Path) -> Result<(), MachineError> {
        write_file(path, &tape.contents())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == JSON_EXTENSION)
}

fn check_size(len: usize) -> Result<(), MachineError> {
    if len > MAX_DEFINITION_SIZE {
        return Err(MachineError::FileError(format!(
            "Definition is {len} bytes; the limit is {MAX_DEFINITION_SIZE} bytes"
        )));
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String, MachineError> {
    fs::read_to_string(path).map_err(|e| {
        MachineError::FileError(format!("Failed to read file {}: {e}", path.display()))
    })
}

fn write_file(path: &Path, content: &str) -> Result<(), MachineError> {
    fs::write(path, content).map_err(|e| {
        MachineError::FileError(format!("Failed to write file {}: {e}", path.display()))
    })
}
