//! Configuration for an attack run.
//!
//! `Config` gathers the generator geometry (window width and tap count), the
//! oracle wire format, and the sizing of the session pool and tap search.
//! Defaults match the reference instance: a 21-bit window, 10 taps and 48
//! revealed bits.
//!
//! ```no_run
//! use tapbreak::config::Config;
//!
//! let mut config = Config::default();
//! config.pool_size = 96;
//! config.strict_taps = true;
//! config.validate().unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::def::{
    CONNECT_THREADS, CORRECT_MARKER, EPOCH_DELIMITER, FLAG_SIGNATURE, IO_TIMEOUT, KNOWN_BITS,
    MAX_WINDOW_SIZE, POOL_SIZE, PROMPT_DELIMITER, RECOVER_THREADS, RESULT_DELIMITER, TAP_COUNT,
    WINDOW_SIZE,
};
use crate::error::{AttackError, Result};

/// Delimiters and markers of the oracle's line protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub epoch_delimiter: Vec<u8>,
    pub prompt_delimiter: Vec<u8>,
    pub result_delimiter: Vec<u8>,
    /// Leading word of a result message iff the guess was right.
    pub correct_marker: Vec<u8>,
}

impl Protocol {
    /// Whether a result message, delimiter included, confirms the guess.
    ///
    /// The message must start with the marker as a whole word, so a reply
    /// such as `Incorrect!` never counts as `correct`.
    pub fn is_confirmation(&self, result: &[u8]) -> bool {
        let body = result
            .strip_suffix(self.result_delimiter.as_slice())
            .unwrap_or(result)
            .trim_ascii();
        match body.strip_prefix(self.correct_marker.as_slice()) {
            Some(rest) => !rest.first().is_some_and(|b| b.is_ascii_alphanumeric()),
            None => false,
        }
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            epoch_delimiter: EPOCH_DELIMITER.to_vec(),
            prompt_delimiter: PROMPT_DELIMITER.to_vec(),
            result_delimiter: RESULT_DELIMITER.to_vec(),
            correct_marker: CORRECT_MARKER.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// State window width W.
    pub window_size: usize,
    /// Taps per feedback bit K.
    pub tap_count: usize,
    /// Bits revealed through the oracle.
    pub known_bits: usize,
    /// Sessions opened before extraction starts. The worst case needs `known_bits`.
    pub pool_size: usize,
    pub connect_threads: usize,
    pub recover_threads: usize,
    pub strict_taps: bool,
    /// Confirm the last bit on a live session even when it can be inferred.
    pub confirm_final_bit: bool,
    pub signature: Vec<u8>,
    pub protocol: Protocol,
    pub io_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            tap_count: TAP_COUNT,
            known_bits: KNOWN_BITS,
            pool_size: POOL_SIZE,
            connect_threads: CONNECT_THREADS,
            recover_threads: RECOVER_THREADS,
            strict_taps: false,
            confirm_final_bit: false,
            signature: FLAG_SIGNATURE.to_vec(),
            protocol: Protocol::default(),
            io_timeout: Some(IO_TIMEOUT),
        }
    }
}

impl Config {
    /// Wire parameters shared by every session of a run.
    pub fn protocol(&self) -> Arc<Protocol> {
        Arc::new(self.protocol.clone())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AttackError::InvalidConfig(msg));
        if self.window_size < 2 || self.window_size > MAX_WINDOW_SIZE {
            return invalid(format!(
                "window_size {} not in [2, {}]",
                self.window_size, MAX_WINDOW_SIZE
            ));
        }
        if self.tap_count == 0 || self.tap_count >= self.window_size {
            return invalid(format!(
                "tap_count {} not in [1, {})",
                self.tap_count, self.window_size
            ));
        }
        if self.known_bits < 2 * self.window_size {
            return invalid(format!(
                "known_bits {} is below 2 * window_size = {}",
                self.known_bits,
                2 * self.window_size
            ));
        }
        if self.pool_size == 0 || self.connect_threads == 0 {
            return invalid("pool_size and connect_threads must be positive".to_string());
        }
        if self.signature.is_empty() {
            return invalid("signature must not be empty".to_string());
        }
        let p = &self.protocol;
        if p.epoch_delimiter.is_empty()
            || p.prompt_delimiter.is_empty()
            || p.result_delimiter.is_empty()
            || p.correct_marker.is_empty()
        {
            return invalid("protocol delimiters and marker must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_size, 21);
        assert_eq!(config.tap_count, 10);
        assert_eq!(config.known_bits, 48);
    }

    #[test]
    fn test_rejects_short_known_prefix() {
        let config = Config {
            known_bits: 41,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AttackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_confirmation_needs_leading_marker() {
        let protocol = Protocol::default();
        assert!(protocol.is_confirmation(b"correct\n"));
        assert!(protocol.is_confirmation(b"  correct!\n"));
        assert!(!protocol.is_confirmation(b"Incorrect!\n"));
        assert!(!protocol.is_confirmation(b"not correct\n"));
        assert!(!protocol.is_confirmation(b"correctly wrong\n"));
        assert!(!protocol.is_confirmation(b"wrong\n"));
    }

    #[test]
    fn test_rejects_bad_geometry() {
        let mut config = Config::default();
        config.tap_count = 21;
        assert!(config.validate().is_err());
        config.tap_count = 10;
        config.window_size = 65;
        assert!(config.validate().is_err());
        config.window_size = 21;
        config.protocol.correct_marker.clear();
        assert!(config.validate().is_err());
    }
}
