//! Multi-valued logic vectors.
//!
//! A [`Value`] is an immutable vector of 1..=64 bits where every bit is one
//! of `0`, `1`, `X` (unknown / floating) or `E` (error / driver conflict).
//! Bit 0 is the least significant bit and all bitwise operations work
//! positionally.
//!
//! Internally a value is three disjoint bitmasks (`error`, `unknown`,
//! `value`) so that the operators below are a handful of word operations
//! regardless of width.
//!
//! # Bitwise policy
//!
//! The absorbing value of an operator wins over everything, errors
//! included: `0 AND E = 0` and `1 OR E = 1`. Apart from that, `E` beats
//! `X` and `X` beats defined bits. `XOR` and `NOT` have no absorbing value,
//! so any `E` operand gives `E` and any `X` operand gives `X`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{SimError, SimResult};

/// Widest supported value.
pub const MAX_WIDTH: u8 = 64;

/// One bit of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bit {
    /// Logic low
    Zero,
    /// Logic high
    One,
    /// Unknown or floating (`X`)
    Unknown,
    /// Error, e.g. two drivers disagree (`E`)
    Error,
}

impl Bit {
    /// All four bit states, in display order.
    pub const ALL: [Bit; 4] = [Bit::Zero, Bit::One, Bit::Unknown, Bit::Error];

    /// Returns the character used in the text form of a value.
    pub fn to_char(self) -> char {
        match self {
            Bit::Zero => '0',
            Bit::One => '1',
            Bit::Unknown => 'x',
            Bit::Error => 'E',
        }
    }

    /// Parses a single bit character.
    pub fn from_char(c: char) -> Option<Bit> {
        match c {
            '0' => Some(Bit::Zero),
            '1' => Some(Bit::One),
            'x' | 'X' => Some(Bit::Unknown),
            'e' | 'E' => Some(Bit::Error),
            _ => None,
        }
    }

    /// Returns true for `0` and `1`.
    pub fn is_defined(self) -> bool {
        matches!(self, Bit::Zero | Bit::One)
    }
}

impl From<bool> for Bit {
    fn from(b: bool) -> Self {
        if b {
            Bit::One
        } else {
            Bit::Zero
        }
    }
}

/// Validates a bit width and narrows it to `u8`.
pub fn check_width(width: u32) -> SimResult<u8> {
    if width == 0 || width > MAX_WIDTH as u32 {
        return Err(SimError::InvalidWidth(width));
    }
    Ok(width as u8)
}

fn mask(width: u8) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// An immutable logic vector.
///
/// Invariants: `error`, `unknown` and `value` are pairwise disjoint and
/// have no bits set at or above `width`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value {
    width: u8,
    error: u64,
    unknown: u64,
    value: u64,
}

impl Value {
    /// Single-bit `0`.
    pub const FALSE: Value = Value { width: 1, error: 0, unknown: 0, value: 0 };
    /// Single-bit `1`.
    pub const TRUE: Value = Value { width: 1, error: 0, unknown: 0, value: 1 };
    /// Single-bit `X`.
    pub const UNKNOWN: Value = Value { width: 1, error: 0, unknown: 1, value: 0 };
    /// Single-bit `E`.
    pub const ERROR: Value = Value { width: 1, error: 1, unknown: 0, value: 0 };

    /// Creates a fully defined value from the low `width` bits of `bits`.
    ///
    /// # Panics
    /// Panics if `width` is not in `1..=64`. Use [`check_width`] first for
    /// widths coming from configuration.
    pub fn known(width: u8, bits: u64) -> Value {
        assert_valid(width);
        Value { width, error: 0, unknown: 0, value: bits & mask(width) }
    }

    /// All bits `X`.
    pub fn unknown(width: u8) -> Value {
        Self::repeat(Bit::Unknown, width)
    }

    /// All bits `E`.
    pub fn error(width: u8) -> Value {
        Self::repeat(Bit::Error, width)
    }

    /// All bits `0`.
    pub fn zero(width: u8) -> Value {
        Self::repeat(Bit::Zero, width)
    }

    /// Every bit set to `bit`.
    pub fn repeat(bit: Bit, width: u8) -> Value {
        assert_valid(width);
        let m = mask(width);
        match bit {
            Bit::Zero => Value { width, error: 0, unknown: 0, value: 0 },
            Bit::One => Value { width, error: 0, unknown: 0, value: m },
            Bit::Unknown => Value { width, error: 0, unknown: m, value: 0 },
            Bit::Error => Value { width, error: m, unknown: 0, value: 0 },
        }
    }

    /// Single-bit value.
    pub fn from_bit(bit: Bit) -> Value {
        Self::repeat(bit, 1)
    }

    /// Builds a value from bits, least significant first.
    pub fn from_bits(bits: &[Bit]) -> SimResult<Value> {
        let width = check_width(bits.len() as u32)?;
        let mut out = Value::zero(width);
        for (i, bit) in bits.iter().enumerate() {
            out = out.set(i, *bit);
        }
        Ok(out)
    }

    /// Returns the bit width.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Returns bit `index` (0 = least significant).
    ///
    /// # Panics
    /// Panics if `index >= width`.
    pub fn get(&self, index: usize) -> Bit {
        assert!(index < self.width as usize, "bit {} out of range for width {}", index, self.width);
        let b = 1u64 << index;
        if self.error & b != 0 {
            Bit::Error
        } else if self.unknown & b != 0 {
            Bit::Unknown
        } else if self.value & b != 0 {
            Bit::One
        } else {
            Bit::Zero
        }
    }

    /// Returns a copy with bit `index` replaced.
    ///
    /// # Panics
    /// Panics if `index >= width`.
    pub fn set(&self, index: usize, bit: Bit) -> Value {
        assert!(index < self.width as usize, "bit {} out of range for width {}", index, self.width);
        let b = 1u64 << index;
        let mut out = Value {
            width: self.width,
            error: self.error & !b,
            unknown: self.unknown & !b,
            value: self.value & !b,
        };
        match bit {
            Bit::Zero => {}
            Bit::One => out.value |= b,
            Bit::Unknown => out.unknown |= b,
            Bit::Error => out.error |= b,
        }
        out
    }

    /// Iterates the bits, least significant first.
    pub fn bits(&self) -> impl Iterator<Item = Bit> + '_ {
        (0..self.width as usize).map(move |i| self.get(i))
    }

    /// True when no bit is `X` or `E`.
    pub fn is_fully_defined(&self) -> bool {
        self.error == 0 && self.unknown == 0
    }

    /// True when at least one bit is `E`.
    pub fn has_error(&self) -> bool {
        self.error != 0
    }

    /// True when every bit is `X`.
    pub fn is_fully_unknown(&self) -> bool {
        self.unknown == mask(self.width)
    }

    /// Mask of the `E` bits.
    pub fn error_mask(&self) -> u64 {
        self.error
    }

    /// The numeric value, if every bit is defined.
    pub fn to_u64(&self) -> Option<u64> {
        self.is_fully_defined().then_some(self.value)
    }

    fn same_width(&self, other: &Value) -> SimResult<()> {
        if self.width != other.width {
            return Err(SimError::WidthMismatch { left: self.width, right: other.width });
        }
        Ok(())
    }

    fn zeros(&self) -> u64 {
        !(self.error | self.unknown | self.value) & mask(self.width)
    }

    /// Bitwise AND; `0` absorbs everything including `E`.
    pub fn and(&self, other: &Value) -> SimResult<Value> {
        self.same_width(other)?;
        let zero = self.zeros() | other.zeros();
        let error = (self.error | other.error) & !zero;
        let unknown = (self.unknown | other.unknown) & !zero & !error;
        let value = self.value & other.value;
        Ok(Value { width: self.width, error, unknown, value })
    }

    /// Bitwise OR; `1` absorbs everything including `E`.
    pub fn or(&self, other: &Value) -> SimResult<Value> {
        self.same_width(other)?;
        let one = self.value | other.value;
        let error = (self.error | other.error) & !one;
        let unknown = (self.unknown | other.unknown) & !one & !error;
        Ok(Value { width: self.width, error, unknown, value: one })
    }

    /// Bitwise XOR; `E` beats `X` beats defined bits.
    pub fn xor(&self, other: &Value) -> SimResult<Value> {
        self.same_width(other)?;
        let error = self.error | other.error;
        let unknown = (self.unknown | other.unknown) & !error;
        let value = (self.value ^ other.value) & !error & !unknown;
        Ok(Value { width: self.width, error, unknown, value })
    }

    /// Bitwise NOT; `X` and `E` are preserved.
    pub fn not(&self) -> Value {
        let value = !self.value & !self.error & !self.unknown & mask(self.width);
        Value { value, ..*self }
    }

    /// Merges two drivers of the same net.
    ///
    /// `X` is the identity, `E` is absorbing, equal defined bits are kept
    /// and disagreeing defined bits become `E`. The operation is
    /// commutative and associative, so folding any number of drivers gives
    /// the same result in any order.
    pub fn combine(&self, other: &Value) -> SimResult<Value> {
        self.same_width(other)?;
        let defined = !(self.error | self.unknown) & !(other.error | other.unknown) & mask(self.width);
        let conflict = defined & (self.value ^ other.value);
        let error = self.error | other.error | conflict;
        let unknown = self.unknown & other.unknown;
        let value = (self.value | other.value) & !error;
        Ok(Value { width: self.width, error, unknown, value })
    }

    /// Replaces `X` bits with the matching bits of a weak driver.
    pub fn pull_toward(&self, weak: &Value) -> SimResult<Value> {
        self.same_width(weak)?;
        let floating = self.unknown;
        Ok(Value {
            width: self.width,
            error: self.error | (floating & weak.error),
            unknown: floating & weak.unknown,
            value: self.value | (floating & weak.value),
        })
    }

    /// Compares against an expected value where `X` bits of `expected`
    /// are don't-care. Values of different widths never match.
    pub fn matches(&self, expected: &Value) -> bool {
        if self.width != expected.width {
            return false;
        }
        let care = !expected.unknown & mask(self.width);
        (self.error & care) == (expected.error & care)
            && (self.unknown & care) == 0
            && (self.value & care) == (expected.value & care)
    }

    /// Widens the value, filling the new high bits with `fill`.
    ///
    /// A narrower target width truncates instead.
    pub fn extend(&self, width: u8, fill: Bit) -> Value {
        if width <= self.width {
            return self.truncate(width);
        }
        let high = Value::repeat(fill, width);
        let low = mask(self.width);
        Value {
            width,
            error: (high.error & !low) | self.error,
            unknown: (high.unknown & !low) | self.unknown,
            value: (high.value & !low) | self.value,
        }
    }

    /// Widens using the current most significant bit as fill.
    pub fn sign_extend(&self, width: u8) -> Value {
        let msb = self.get(self.width as usize - 1);
        self.extend(width, msb)
    }

    /// Keeps only the low `width` bits.
    ///
    /// # Panics
    /// Panics if `width` is not in `1..=64`.
    pub fn truncate(&self, width: u8) -> Value {
        assert_valid(width);
        let m = mask(width.min(self.width));
        Value {
            width: width.min(self.width),
            error: self.error & m,
            unknown: self.unknown & m,
            value: self.value & m,
        }
    }

    /// Coerces to `width`, zero-filling when widening.
    pub fn with_width(&self, width: u8) -> Value {
        self.extend(width, Bit::Zero)
    }
}

fn assert_valid(width: u8) {
    assert!(
        width >= 1 && width <= MAX_WIDTH,
        "invalid bit width {} (expected 1..={})",
        width,
        MAX_WIDTH
    );
}

impl std::ops::Not for Value {
    type Output = Value;

    fn not(self) -> Value {
        Value::not(&self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.width as usize).rev() {
            write!(f, "{}", self.get(i).to_char())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({}'b{})", self.width, self)
    }
}

impl FromStr for Value {
    type Err = SimError;

    /// Parses the MSB-first text form, e.g. `"10xE"`. Underscores are
    /// ignored as digit separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bits = Vec::with_capacity(s.len());
        for c in s.chars().rev().filter(|c| *c != '_') {
            let bit = Bit::from_char(c).ok_or_else(|| SimError::ParseValue(s.to_string()))?;
            bits.push(bit);
        }
        if bits.is_empty() {
            return Err(SimError::ParseValue(s.to_string()));
        }
        Value::from_bits(&bits)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        if b {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }
}

impl From<Bit> for Value {
    fn from(bit: Bit) -> Self {
        Value::from_bit(bit)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
