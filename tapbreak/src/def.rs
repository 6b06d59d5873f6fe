//! Constants shared by the oracle client and the cryptanalysis passes.

use std::time::Duration;

/// Width of the generator's state window (W).
pub const WINDOW_SIZE: usize = 21;

/// Number of taps XORed into each feedback bit (K).
pub const TAP_COUNT: usize = 10;

/// Bits revealed from the oracle before the offline passes start.
///
/// Must be at least `2 * WINDOW_SIZE` so that the tap search has
/// `KNOWN_BITS - WINDOW_SIZE` independent checks per candidate.
pub const KNOWN_BITS: usize = 48;

/// Widest window a `StateWindow` can hold; the window is packed into a `u64`.
pub const MAX_WINDOW_SIZE: usize = 64;

pub const POOL_SIZE: usize = 64;
pub const CONNECT_THREADS: usize = 16;

/// Zero means "use the global rayon pool".
pub const RECOVER_THREADS: usize = 0;

pub const IO_TIMEOUT: Duration = Duration::from_secs(10);

pub const FLAG_SIGNATURE: &[u8] = b"FLAG{";

pub const EPOCH_DELIMITER: &[u8] = b"\n";
pub const PROMPT_DELIMITER: &[u8] = b"> ";
pub const RESULT_DELIMITER: &[u8] = b"\n";
pub const CORRECT_MARKER: &[u8] = b"correct";

/// Upper bound on a single delimited message; anything longer is a protocol error.
pub const MAX_MESSAGE_LEN: usize = 4096;
