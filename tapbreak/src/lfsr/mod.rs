//! Fibonacci-style shift register used by the target generator.
//!
//! The register is a window of `W` bits. Each step:
//! 1. emits the bit at position 0,
//! 2. computes the feedback bit as the XOR of the positions selected by the
//!    tap set,
//! 3. drops position 0 and appends the feedback bit at position `W-1`.
//!
//! Because of the drop-front/append-back shift, the first `W` bits emitted
//! are exactly the initial window read out in order. The tap recoverer relies
//! on this to bootstrap the window from the first `W` revealed bits.
//!
//! A window is packed into a `u64` with position `i` stored in bit `i`, so a
//! feedback bit is the parity of `window & taps`.

pub mod keystream;
pub mod recover;

use std::fmt;

use crate::def::MAX_WINDOW_SIZE;
use crate::error::{AttackError, Result};
use crate::utils::bits::BitSequence;

pub use keystream::{generate, Keystream};
pub use recover::{Recovery, TapRecoverer};

/// The state positions XORed into each feedback bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TapSet {
    mask: u64,
}

impl TapSet {
    pub fn from_mask(mask: u64) -> Self {
        Self { mask }
    }

    /// Builds a tap set from state positions. Duplicates collapse.
    pub fn from_indices(indices: &[usize]) -> Result<Self> {
        let mut mask = 0u64;
        for &i in indices {
            if i >= MAX_WINDOW_SIZE {
                return Err(AttackError::InvalidInput(format!(
                    "tap index {} out of range [0, {})",
                    i, MAX_WINDOW_SIZE
                )));
            }
            mask |= 1u64 << i;
        }
        Ok(Self { mask })
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Tap positions in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        (0..MAX_WINDOW_SIZE)
            .filter(|&i| self.mask >> i & 1 == 1)
            .collect()
    }

    /// Highest tap position plus one, i.e. the narrowest window these taps fit.
    pub fn span(&self) -> usize {
        MAX_WINDOW_SIZE - self.mask.leading_zeros() as usize
    }

    #[inline]
    pub fn feedback(&self, window: &StateWindow) -> bool {
        (window.bits & self.mask).count_ones() & 1 == 1
    }
}

impl fmt::Display for TapSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.indices())
    }
}

/// A contiguous window of `width` generator bits; position 0 is emitted next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateWindow {
    bits: u64,
    width: usize,
}

impl StateWindow {
    /// Reads the window from bits in output order.
    pub fn from_bits(bits: &[bool]) -> Result<Self> {
        check_width(bits.len())?;
        let packed = bits
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, &b)| acc | ((b as u64) << i));
        Ok(Self {
            bits: packed,
            width: bits.len(),
        })
    }

    /// Loads a seed value: bit `i` of `seed` becomes position `i`.
    pub fn from_seed(seed: u64, width: usize) -> Result<Self> {
        check_width(width)?;
        Ok(Self {
            bits: seed & width_mask(width),
            width,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn raw(&self) -> u64 {
        self.bits
    }

    pub fn get(&self, pos: usize) -> bool {
        assert!(pos < self.width, "position {} outside window", pos);
        self.bits >> pos & 1 == 1
    }

    /// The bit that will be emitted next.
    #[inline]
    pub fn head(&self) -> bool {
        self.bits & 1 == 1
    }

    /// Drops position 0 and appends `bit` at the end. Returns the dropped bit.
    #[inline]
    pub fn shift_in(&mut self, bit: bool) -> bool {
        let out = self.head();
        self.bits = (self.bits >> 1) | ((bit as u64) << (self.width - 1));
        out
    }

    pub fn to_bits(&self) -> BitSequence {
        (0..self.width).map(|i| self.get(i)).collect()
    }
}

impl fmt::Display for StateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bits())
    }
}

fn width_mask(width: usize) -> u64 {
    if width == MAX_WINDOW_SIZE {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn check_width(width: usize) -> Result<()> {
    if width == 0 || width > MAX_WINDOW_SIZE {
        return Err(AttackError::InvalidInput(format!(
            "window width {} not in [1, {}]",
            width, MAX_WINDOW_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_set_indices() {
        let taps = TapSet::from_indices(&[7, 0, 3, 3]).unwrap();
        assert_eq!(taps.indices(), vec![0, 3, 7]);
        assert_eq!(taps.len(), 3);
        assert_eq!(taps.span(), 8);
        assert_eq!(taps.to_string(), "[0, 3, 7]");
        assert!(TapSet::from_indices(&[64]).is_err());
    }

    #[test]
    fn test_window_round_trips_output_order() {
        let bits: BitSequence = "1101000".parse().unwrap();
        let window = StateWindow::from_bits(bits.as_slice()).unwrap();
        assert_eq!(window.width(), 7);
        assert!(window.head());
        assert_eq!(window.to_bits(), bits);
        assert_eq!(window.to_string(), "1101000");
    }

    #[test]
    fn test_shift_in_drops_front() {
        let mut window = StateWindow::from_bits(&[true, false, false]).unwrap();
        assert!(window.shift_in(true));
        assert_eq!(window.to_string(), "001");
        assert!(!window.shift_in(false));
        assert_eq!(window.to_string(), "010");
    }

    #[test]
    fn test_feedback_is_tap_parity() {
        let window = StateWindow::from_bits(&[true, true, false, true]).unwrap();
        assert!(!TapSet::from_indices(&[0, 1]).unwrap().feedback(&window));
        assert!(TapSet::from_indices(&[0, 1, 3]).unwrap().feedback(&window));
        assert!(!TapSet::from_indices(&[2]).unwrap().feedback(&window));
    }

    #[test]
    fn test_from_seed_masks_width() {
        let window = StateWindow::from_seed(0xFF, 4).unwrap();
        assert_eq!(window.raw(), 0xF);
        assert!(StateWindow::from_seed(1, 0).is_err());
        assert!(StateWindow::from_seed(1, 65).is_err());
        assert_eq!(StateWindow::from_seed(u64::MAX, 64).unwrap().raw(), u64::MAX);
    }
}
