//! MSB-first bit strings
//!
//! The evaluation board's USB bridge talks to the AD9959 one bit at a time:
//! every register value travels as one byte per bit, most significant bit
//! first. [`BitString`] keeps register contents in exactly that order, so bit
//! position `0` is the first bit on the wire and register fields are addressed
//! as half-open ranges of positions.
//!
//! [`BitString::splice`] is the single read-modify-write primitive of this
//! crate. Every operation that changes one setting of a register without
//! touching the rest goes through it.

use core::{fmt, ops::Range, str::FromStr};


/// A fixed-length string of bits, most significant bit first
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitString(Vec<bool>);

impl BitString {
    /// Creates a bit string of `len` zero bits
    pub fn zeros(len: usize) -> Self {
        BitString(vec![false; len])
    }

    /// Creates a bit string of `width` bits from an unsigned integer
    ///
    /// Bits of `value` above `width` are silently dropped. Bits beyond the
    /// 64 bits of `value` are zero.
    pub fn from_uint(value: u64, width: usize) -> Self {
        (0..width)
            .rev()
            .map(|shift| shift < 64 && (value >> shift) & 1 == 1)
            .collect()
    }

    /// Interprets the bits as an unsigned integer
    ///
    /// Only the last 64 bits are taken into account.
    pub fn to_uint(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, &bit| (acc << 1) | bit as u64)
    }

    /// The number of bits
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bit string contains no bits
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the bit at `position`, if it exists
    pub fn get(&self, position: usize) -> Option<bool> {
        self.0.get(position).copied()
    }

    /// Sets the bit at `position`
    pub fn set(&mut self, position: usize, value: bool) -> Result<(), Error> {
        let len = self.len();
        let bit = self.0.get_mut(position).ok_or(Error::OutOfBounds {
            range: position..position + 1,
            len,
        })?;
        *bit = value;

        Ok(())
    }

    /// Returns a copy of the bits in `range`
    pub fn field(&self, range: Range<usize>) -> Result<BitString, Error> {
        self.check_range(&range)?;
        Ok(BitString(self.0[range].to_vec()))
    }

    /// Replaces the bits in `range` with `new_bits`
    ///
    /// Returns a new bit string of the same length as `self`. All bits
    /// outside of `range` are copied over unchanged, including reserved bits
    /// that no field describes. `new_bits` must be exactly as long as
    /// `range`.
    pub fn splice(&self, range: Range<usize>, new_bits: &BitString) -> Result<BitString, Error> {
        self.check_range(&range)?;

        let expected = range.end - range.start;
        if new_bits.len() != expected {
            return Err(Error::LengthMismatch {
                expected,
                actual: new_bits.len(),
            });
        }

        let mut bits = self.0.clone();
        bits[range].copy_from_slice(&new_bits.0);

        Ok(BitString(bits))
    }

    /// Iterates over the bits, most significant first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    /// The bridge representation: one `0x00`/`0x01` byte per bit
    pub fn to_wire(&self) -> impl Iterator<Item = u8> + '_ {
        self.iter().map(u8::from)
    }

    fn check_range(&self, range: &Range<usize>) -> Result<(), Error> {
        if range.start > range.end || range.end > self.len() {
            return Err(Error::OutOfBounds {
                range: range.clone(),
                len: self.len(),
            });
        }

        Ok(())
    }
}

impl FromIterator<bool> for BitString {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        BitString(iter.into_iter().collect())
    }
}

impl FromStr for BitString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                c => Err(Error::InvalidDigit(c)),
            })
            .collect()
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &bit in &self.0 {
            f.write_str(if bit { "1" } else { "0" })?;
        }

        Ok(())
    }
}

impl fmt::Debug for BitString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BitString({})", self)
    }
}


/// An error that can occur when editing a [`BitString`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The replacement bits don't have the length of the replaced range
    LengthMismatch {
        /// Length of the replaced range
        expected: usize,
        /// Length of the replacement
        actual: usize,
    },

    /// The range doesn't lie within the bit string
    OutOfBounds {
        /// The offending range
        range: Range<usize>,
        /// Length of the bit string
        len: usize,
    },

    /// A character other than `0` or `1` was parsed
    InvalidDigit(char),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::LengthMismatch { expected, actual } => write!(
                f,
                "field is {} bits wide, but {} bits were supplied",
                expected, actual
            ),
            Error::OutOfBounds { range, len } => write!(
                f,
                "bit range {:?} exceeds bit string of length {}",
                range, len
            ),
            Error::InvalidDigit(c) => write!(f, "invalid binary digit {:?}", c),
        }
    }
}

impl std::error::Error for Error {}
