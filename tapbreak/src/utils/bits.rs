//! Bit sequences and the bit/byte conversions used by the keystream.
//!
//! Bits are always consumed in generation order and that order is read as
//! most-significant-bit first. A run of `n` bits therefore behaves like the
//! big-endian encoding of an `n`-bit number, left padded with zero bits to a
//! whole number of bytes.

use std::fmt;
use std::str::FromStr;

use crate::error::AttackError;

/// An append-only sequence of revealed bits, indexed from the earliest one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitSequence {
    bits: Vec<bool>,
}

impl BitSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bits: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<bool> {
        self.bits.get(idx).copied()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }
}

impl From<Vec<bool>> for BitSequence {
    fn from(bits: Vec<bool>) -> Self {
        Self { bits }
    }
}

impl FromIterator<bool> for BitSequence {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

impl FromStr for BitSequence {
    type Err = AttackError;

    /// Parses a string of `0`/`1` characters. Whitespace and `_` separators are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(AttackError::InvalidInput(format!(
                    "unexpected character {:?} in bit string",
                    other
                ))),
            })
            .collect()
    }
}

impl fmt::Display for BitSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Packs bits MSB-first into `ceil(bits.len() / 8)` bytes.
///
/// The bits are treated as one big-endian number, so when the count is not a
/// multiple of eight the first byte carries the zero padding in its high
/// bits. Leading zero bits are never dropped: the output length depends only
/// on the number of bits, not on their value.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let byte_len = bits.len().div_ceil(8);
    let pad = byte_len * 8 - bits.len();
    let mut out = vec![0u8; byte_len];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            let pos = pad + i;
            out[pos / 8] |= 0x80 >> (pos % 8);
        }
    }
    out
}

/// Expands bytes into bits, most significant bit of each byte first.
pub fn unpack_bits(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|b| (0..8).rev().map(move |i| (b >> i) & 1 == 1))
        .collect()
}

pub fn xor_bytes(lhs: &[u8], rhs: &[u8]) -> Vec<u8> {
    lhs.iter().zip(rhs).map(|(a, b)| a ^ b).collect()
}

pub fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let seq: BitSequence = "0011 0101_1".parse().unwrap();
        assert_eq!(seq.len(), 9);
        assert_eq!(seq.to_string(), "001101011");
        assert_eq!(seq.get(2), Some(true));
        assert_eq!(seq.get(9), None);
        assert!("0102".parse::<BitSequence>().is_err());
    }

    #[test]
    fn test_pack_msb_first() {
        let bits = unpack_bits(&[0xA5, 0x3C]);
        assert!(bits[0]);
        assert!(!bits[1]);
        assert_eq!(pack_bits(&bits), vec![0xA5, 0x3C]);
    }

    #[test]
    fn test_pack_keeps_leading_zero_bytes() {
        let mut bits = vec![false; 8];
        bits.extend([true, false, false, false, false, false, false, true]);
        assert_eq!(pack_bits(&bits), vec![0x00, 0x81]);
        assert_eq!(pack_bits(&[false; 24]), vec![0, 0, 0]);
    }

    #[test]
    fn test_pack_pads_on_the_left() {
        // 0b1_0000_0001 as a 9-bit number
        let bits = [true, false, false, false, false, false, false, false, true];
        assert_eq!(pack_bits(&bits), vec![0x01, 0x01]);
        assert_eq!(pack_bits(&[true, true, true]), vec![0x07]);
        assert!(pack_bits(&[]).is_empty());
    }

    #[test]
    fn test_contains_subslice() {
        assert!(contains_subslice(b"xxFLAG{yy", b"FLAG{"));
        assert!(!contains_subslice(b"FLAG", b"FLAG{"));
        assert!(contains_subslice(b"abc", b""));
        assert_eq!(xor_bytes(&[0xFF, 0x0F], &[0x0F, 0x0F]), vec![0xF0, 0x00]);
    }
}
