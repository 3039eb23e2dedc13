//! Symbol membership for machines. An alphabet is a subset of the uppercase letters,
//! the decimal digits, and the blank symbol.

use crate::types::BLANK_SYMBOL;
use serde::{Deserialize, Serialize};
use std::fmt;

const DIGIT_BITS: u64 = (1 << 10) - 1;
const LETTER_BITS: u64 = ((1 << 26) - 1) << 10;
const BLANK_BIT: u64 = 1 << 36;

/// Maps a raw character onto the symbol it stands for: letters are uppercased and a
/// space is read as the blank symbol. Other characters are returned unchanged.
pub fn normalize(c: char) -> char {
    match c {
        ' ' => BLANK_SYMBOL,
        c if c.is_ascii_alphabetic() => c.to_ascii_uppercase(),
        c => c,
    }
}

/// A finite set of tape symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Alphabet {
    bits: u64,
}

impl Default for Alphabet {
    /// The binary alphabet `{0, 1, _}`.
    fn default() -> Self {
        let mut alphabet = Self::empty();
        alphabet.set_symbol('0', true);
        alphabet.set_symbol('1', true);
        alphabet.set_blank(true);
        alphabet
    }
}

impl Alphabet {
    pub fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Builds an alphabet containing every classifiable character of `symbols`.
    /// Characters outside letters, digits and blank are ignored.
    pub fn from_symbols(symbols: &str) -> Self {
        let mut alphabet = Self::empty();
        for c in symbols.chars() {
            alphabet.set_symbol(c, true);
        }
        alphabet
    }

    /// Returns whether `c` belongs to the alphabet. Letters are compared case-insensitively
    /// and a space counts as the blank symbol. Unclassifiable characters are never members.
    pub fn contains_symbol(&self, c: char) -> bool {
        bit(c).is_some_and(|bit| self.bits & bit != 0)
    }

    /// Includes or excludes a single symbol. Returns `false` when `c` cannot be part of
    /// any alphabet.
    pub fn set_symbol(&mut self, c: char, included: bool) -> bool {
        match bit(c) {
            Some(bit) => {
                self.set_bits(bit, included);
                true
            }
            None => false,
        }
    }

    pub fn set_all_letters(&mut self, included: bool) {
        self.set_bits(LETTER_BITS, included);
    }

    pub fn set_all_digits(&mut self, included: bool) {
        self.set_bits(DIGIT_BITS, included);
    }

    pub fn set_blank(&mut self, included: bool) {
        self.set_bits(BLANK_BIT, included);
    }

    pub fn contains_blank(&self) -> bool {
        self.bits & BLANK_BIT != 0
    }

    /// Iterates over the members in a stable order: digits, then letters, then blank.
    pub fn symbols(&self) -> impl Iterator<Item = char> + '_ {
        ('0'..='9')
            .chain('A'..='Z')
            .chain(std::iter::once(BLANK_SYMBOL))
            .filter(move |&c| self.contains_symbol(c))
    }

    /// Iterates over the members that can appear as input, i.e. everything but blank.
    pub fn input_symbols(&self) -> impl Iterator<Item = char> + '_ {
        self.symbols().filter(|&c| c != BLANK_SYMBOL)
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    fn set_bits(&mut self, bits: u64, included: bool) {
        if included {
            self.bits |= bits;
        } else {
            self.bits &= !bits;
        }
    }
}

fn bit(c: char) -> Option<u64> {
    match normalize(c) {
        d @ '0'..='9' => Some(1 << (d as u32 - '0' as u32)),
        l @ 'A'..='Z' => Some(1 << (10 + l as u32 - 'A' as u32)),
        BLANK_SYMBOL => Some(BLANK_BIT),
        _ => None,
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbols: Vec<String> = self.symbols().map(String::from).collect();
        write!(f, "{{{}}}", symbols.join(", "))
    }
}

impl From<String> for Alphabet {
    fn from(symbols: String) -> Self {
        Self::from_symbols(&symbols)
    }
}

impl From<Alphabet> for String {
    fn from(alphabet: Alphabet) -> Self {
        alphabet.symbols().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_binary_with_blank() {
        let alphabet = Alphabet::default();
        assert!(alphabet.contains_symbol('0'));
        assert!(alphabet.contains_symbol('1'));
        assert!(alphabet.contains_symbol(BLANK_SYMBOL));
        assert!(alphabet.contains_symbol(' '));
        assert!(!alphabet.contains_symbol('2'));
        assert!(!alphabet.contains_symbol('A'));
        assert_eq!(alphabet.len(), 3);
    }

    #[test]
    fn test_letters_are_case_insensitive() {
        let mut alphabet = Alphabet::empty();
        assert!(alphabet.set_symbol('b', true));
        assert!(alphabet.contains_symbol('B'));
        assert!(alphabet.contains_symbol('b'));

        alphabet.set_symbol('B', false);
        assert!(!alphabet.contains_symbol('b'));
    }

    #[test]
    fn test_membership_is_total() {
        let alphabet = Alphabet::default();
        for c in ['#', '*', 'é', '\n'] {
            assert!(!alphabet.contains_symbol(c));
        }
        let mut alphabet = Alphabet::empty();
        assert!(!alphabet.set_symbol('#', true));
        assert!(alphabet.is_empty());
    }

    #[test]
    fn test_bulk_groups() {
        let mut alphabet = Alphabet::empty();
        alphabet.set_all_letters(true);
        assert_eq!(alphabet.len(), 26);
        alphabet.set_all_digits(true);
        assert_eq!(alphabet.len(), 36);
        alphabet.set_all_letters(false);
        assert_eq!(alphabet.symbols().collect::<String>(), "0123456789");
        alphabet.set_blank(true);
        assert!(alphabet.contains_blank());
        assert_eq!(alphabet.input_symbols().count(), 10);
    }

    #[test]
    fn test_symbols_order_and_display() {
        let alphabet = Alphabet::from_symbols("x1_a");
        assert_eq!(alphabet.symbols().collect::<String>(), "1AX_");
        assert_eq!(alphabet.to_string(), "{1, A, X, _}");
    }

    #[test]
    fn test_serde_as_string() {
        let alphabet = Alphabet::from_symbols("01ab");
        let json = serde_json::to_string(&alphabet).unwrap();
        assert_eq!(json, "\"01AB\"");
        let back: Alphabet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, alphabet);
    }
}
