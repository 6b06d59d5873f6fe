use super::{StateWindow, TapSet};
use crate::utils::bits::{pack_bits, xor_bytes};

/// An unbounded bit stream driven by a window and a tap set.
///
/// Cloning a `Keystream` snapshots its position, so a clone can be advanced
/// independently and the original restarted from where it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keystream {
    window: StateWindow,
    taps: TapSet,
}

impl Keystream {
    pub fn new(window: StateWindow, taps: TapSet) -> Self {
        Self { window, taps }
    }

    pub fn window(&self) -> &StateWindow {
        &self.window
    }

    pub fn taps(&self) -> &TapSet {
        &self.taps
    }

    /// Emits position 0, then shifts the feedback bit into the window.
    #[inline]
    pub fn next_bit(&mut self) -> bool {
        let feedback = self.taps.feedback(&self.window);
        self.window.shift_in(feedback)
    }

    /// Discards `steps` bits.
    pub fn advance(&mut self, steps: usize) {
        for _ in 0..steps {
            self.next_bit();
        }
    }

    pub fn take_bits(&mut self, count: usize) -> Vec<bool> {
        (0..count).map(|_| self.next_bit()).collect()
    }

    /// Draws `count` bits and packs them MSB-first into `ceil(count / 8)` bytes.
    pub fn take_bytes(&mut self, count: usize) -> Vec<u8> {
        pack_bits(&self.take_bits(count))
    }

    /// XORs `data` with the next `data.len() * 8` keystream bits.
    ///
    /// Encryption and decryption are the same operation.
    pub fn apply(&mut self, data: &[u8]) -> Vec<u8> {
        let key = self.take_bytes(data.len() * 8);
        xor_bytes(data, &key)
    }
}

impl Iterator for Keystream {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        Some(self.next_bit())
    }
}

/// The first `count` bits generated from `window` under `taps`.
///
/// The returned iterator owns its own copy of the window, so calling this
/// twice with the same arguments yields the same bits.
pub fn generate(window: StateWindow, taps: TapSet, count: usize) -> impl Iterator<Item = bool> {
    Keystream::new(window, taps).take(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bits::BitSequence;

    fn sample() -> Keystream {
        let window = StateWindow::from_seed(0x1A2B3C, 21).unwrap();
        let taps = TapSet::from_indices(&[0, 2, 3, 5, 7, 11, 13, 14, 17, 19]).unwrap();
        Keystream::new(window, taps)
    }

    #[test]
    fn test_first_window_bits_are_the_seed() {
        let ks = sample();
        let window = *ks.window();
        let head: BitSequence = ks.take(21).collect();
        assert_eq!(head, window.to_bits());
    }

    #[test]
    fn test_known_output() {
        let bits: BitSequence = generate(*sample().window(), *sample().taps(), 48).collect();
        assert_eq!(
            bits.to_string(),
            "001111001101010001011101100001001001010100101001"
        );
    }

    #[test]
    fn test_generate_is_restartable() {
        let ks = sample();
        let a: Vec<bool> = generate(*ks.window(), *ks.taps(), 100).collect();
        let b: Vec<bool> = generate(*ks.window(), *ks.taps(), 100).collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 100);
    }

    #[test]
    fn test_advance_matches_skip() {
        let mut skipped = sample();
        skipped.advance(37);
        let expected: Vec<bool> = sample().skip(37).take(64).collect();
        assert_eq!(skipped.take_bits(64), expected);
    }

    #[test]
    fn test_apply_round_trip() {
        let plaintext = b"FLAG{keystream_round_trip}".to_vec();
        let ciphertext = sample().apply(&plaintext);
        assert_ne!(ciphertext, plaintext);
        assert_eq!(sample().apply(&ciphertext), plaintext);
    }

    #[test]
    fn test_take_bytes_keeps_leading_zero_byte() {
        // seed 256 emits eight zero bits before the first one
        let window = StateWindow::from_seed(256, 21).unwrap();
        let taps = *sample().taps();
        let bytes = Keystream::new(window, taps).take_bytes(16);
        assert_eq!(bytes.len(), 2);
        assert_eq!(bytes[0], 0x00);
        assert_eq!(bytes[1] & 0x80, 0x80);
    }
}
