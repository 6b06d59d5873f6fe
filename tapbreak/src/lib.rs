//! tapbreak recovers the keystream of a shift-register generator through a
//! bit-guessing oracle, and uses it to decrypt the generator's ciphertext.
//!
//! # Overview
//! The target service reveals nothing but "correct" or "wrong" for each bit
//! guessed, and drops the connection on the first wrong guess. Work happens
//! in two phases:
//!
//! ## Online
//! - [`oracle::SessionPool`]: many sessions are opened concurrently and only
//!   those presenting the same epoch token (the same generator seeding) are
//!   kept.
//! - [`oracle::BitExtractor`]: reveals the hidden bits one at a time,
//!   guessing `0` first and replaying the known prefix on a fresh session
//!   whenever a guess kills the current one.
//!
//! ## Offline
//! - [`lfsr::TapRecoverer`]: brute-forces the tap set over all `K`-subsets of
//!   the window positions, in parallel.
//! - [`decrypt::Decryptor`]: regenerates the keystream from the recovered
//!   register, searches the phase offset and decrypts the ciphertext.
//!
//! # Example Usage
//! ```no_run
//! use std::sync::Arc;
//! use tapbreak::{config::Config, oracle::TcpConnector, run_attack};
//!
//! let config = Config::default();
//! let connector = Arc::new(TcpConnector::new("127.0.0.1:1337", config.io_timeout).unwrap());
//! let outcome = run_attack(connector, &config).unwrap();
//! println!("{}", String::from_utf8_lossy(&outcome.decryption.plaintext));
//! ```

pub mod attack;
pub mod config;
pub mod decrypt;
pub mod def;
pub mod error;
pub mod lfsr;
pub mod oracle;
pub mod utils;

// for test and dry runs
pub mod test_helper;

pub use attack::{crack_offline, run_attack, AttackOutcome, PoolStats};
pub use error::{AttackError, Result};
