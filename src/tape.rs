//! The one-ended tape shared by every machine kind: bounded on the left at offset 0,
//! unbounded on the right, with blank cells wherever nothing has been written.

use crate::alphabet::{normalize, Alphabet};
use crate::types::{MachineError, BLANK_SYMBOL, INITIAL_TAPE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Receives a notification after every tape mutation. Reads never notify.
pub trait TapeObserver {
    fn tape_changed(&self);
}

/// A left-bounded, right-unbounded sequence of symbols with a read/write head.
///
/// Storage grows by doubling whenever the head moves past its end and never shrinks.
/// `len` is the high-water mark: the number of cells that have held input, been written,
/// or been visited by the head.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Tape {
    cells: Vec<char>,
    len: usize,
    head: usize,
    observer: Option<Rc<dyn TapeObserver>>,
}

impl Tape {
    pub fn new() -> Self {
        Self {
            cells: vec![BLANK_SYMBOL; INITIAL_TAPE_CAPACITY],
            ..Self::default()
        }
    }

    /// Creates a tape holding `input` from offset 0, with the head parked.
    pub fn from_input(input: &str) -> Self {
        let mut tape = Self::new();
        tape.load(input);
        tape
    }

    /// Attaches an observer that is told about every subsequent mutation.
    pub fn set_observer(&mut self, observer: Rc<dyn TapeObserver>) {
        self.observer = Some(observer);
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Returns the symbol under the head, or blank past the high-water mark.
    pub fn read(&self) -> char {
        self.symbol_at(self.head)
    }

    /// Returns the symbol at `offset`, or blank past the high-water mark.
    pub fn symbol_at(&self, offset: usize) -> char {
        if offset < self.len {
            self.cells[offset]
        } else {
            BLANK_SYMBOL
        }
    }

    /// Moves the head one cell left. Fails at offset 0 and leaves the head where it is.
    pub fn head_left(&mut self) -> Result<(), MachineError> {
        if self.head == 0 {
            return Err(MachineError::TapeOutOfBounds);
        }
        self.head -= 1;
        self.notify();
        Ok(())
    }

    /// Moves the head one cell right, growing storage as needed.
    pub fn head_right(&mut self) {
        self.head += 1;
        self.reserve(self.head + 1);
        self.len = self.len.max(self.head + 1);
        self.notify();
    }

    /// Overwrites the cell under the head.
    pub fn write(&mut self, symbol: char) {
        self.reserve(self.head + 1);
        self.cells[self.head] = normalize(symbol);
        self.len = self.len.max(self.head + 1);
        self.notify();
    }

    pub fn reset_head(&mut self) {
        self.head = 0;
        self.notify();
    }

    /// Returns whether the head is at offset 0.
    pub fn is_parked(&self) -> bool {
        self.head == 0
    }

    pub fn head(&self) -> usize {
        self.head
    }

    /// The high-water mark.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated cells.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Blanks every cell and parks the head. Storage keeps its size.
    pub fn clear(&mut self) {
        self.cells.fill(BLANK_SYMBOL);
        self.len = 0;
        self.head = 0;
        self.notify();
    }

    /// Replaces the contents with `other`'s written contents and parks the head.
    pub fn copy_from(&mut self, other: &Tape) {
        self.load(&other.contents());
        self.notify();
    }

    /// Returns exactly `length` symbols starting at `begin`, padded with blanks past the
    /// high-water mark.
    pub fn partial_string(&self, begin: usize, length: usize) -> String {
        (begin..begin.saturating_add(length))
            .map(|offset| self.symbol_at(offset))
            .collect()
    }

    /// Symbols strictly left of the head.
    pub fn left_of_head(&self) -> String {
        self.partial_string(0, self.head)
    }

    /// Symbols from the head up to the high-water mark.
    pub fn from_head(&self) -> String {
        self.partial_string(self.head, self.len.saturating_sub(self.head))
    }

    /// The written portion of the tape, without the blank-filled spare capacity.
    pub fn contents(&self) -> String {
        self.partial_string(0, self.len)
    }

    /// Fails on the first written cell whose symbol is not in `alphabet`. Blank cells are
    /// always allowed, since every unwritten cell holds blank.
    pub fn check_alphabet(&self, alphabet: &Alphabet) -> Result<(), MachineError> {
        match self.cells[..self.len]
            .iter()
            .position(|&c| c != BLANK_SYMBOL && !alphabet.contains_symbol(c))
        {
            Some(offset) => Err(MachineError::ValidationError(format!(
                "tape symbol '{}' at offset {offset} is not in the alphabet {alphabet}",
                self.cells[offset]
            ))),
            None => Ok(()),
        }
    }

    fn load(&mut self, input: &str) {
        self.cells.fill(BLANK_SYMBOL);
        let symbols: Vec<char> = input.chars().map(normalize).collect();
        self.reserve(symbols.len());
        self.cells[..symbols.len()].copy_from_slice(&symbols);
        self.len = symbols.len();
        self.head = 0;
    }

    fn reserve(&mut self, needed: usize) {
        if needed <= self.cells.len() {
            return;
        }
        let mut capacity = self.cells.len().max(1);
        while capacity < needed {
            capacity *= 2;
        }
        self.cells.resize(capacity, BLANK_SYMBOL);
    }

    fn notify(&self) {
        if let Some(observer) = &self.observer {
            observer.tape_changed();
        }
    }
}

impl fmt::Display for Tape {
    /// Renders the whole backing storage, spare blank cells included.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: String = self.cells.iter().collect();
        f.write_str(&rendered)
    }
}

impl fmt::Debug for Tape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tape")
            .field("contents", &self.contents())
            .field("head", &self.head)
            .field("capacity", &self.cells.len())
            .finish()
    }
}

impl PartialEq for Tape {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head && self.contents() == other.contents()
    }
}

impl From<String> for Tape {
    fn from(input: String) -> Self {
        Self::from_input(&input)
    }
}

impl From<Tape> for String {
    fn from(tape: Tape) -> Self {
        tape.contents()
    }
}
