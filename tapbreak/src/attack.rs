//! End-to-end runs: oracle extraction followed by the offline passes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

use crate::config::Config;
use crate::decrypt::{Decryption, Decryptor};
use crate::error::Result;
use crate::lfsr::{Recovery, TapRecoverer};
use crate::oracle::{BitExtractor, Connector, SessionPool};
use crate::utils::bits::BitSequence;

#[derive(Debug, Clone)]
pub struct PoolStats {
    pub epoch: Option<String>,
    pub admitted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub sessions_used: usize,
}

#[derive(Debug, Clone)]
pub struct AttackOutcome {
    pub known: BitSequence,
    pub ciphertext: Vec<u8>,
    pub recovery: Recovery,
    pub decryption: Decryption,
    pub pool: Option<PoolStats>,
    pub extract_time: Duration,
    pub recover_time: Duration,
    pub decrypt_time: Duration,
}

/// Recovers taps from `known` and searches the decryption offset for `ciphertext`.
///
/// The offset search spans `known.len()` bits, which may differ from
/// `config.known_bits` when the prefix was harvested elsewhere.
pub fn crack_offline(
    known: &BitSequence,
    ciphertext: &[u8],
    config: &Config,
) -> Result<AttackOutcome> {
    config.validate()?;
    let start = Instant::now();
    let recovery = TapRecoverer::from_config(config).recover(known)?;
    let recover_time = start.elapsed();

    let start = Instant::now();
    let decryption = Decryptor::from_config(&recovery, known, config).search(ciphertext)?;
    let decrypt_time = start.elapsed();
    info!(
        "recovered in {:.1?}, decrypted in {:.1?} at offset {}",
        recover_time, decrypt_time, decryption.offset
    );

    Ok(AttackOutcome {
        known: known.clone(),
        ciphertext: ciphertext.to_vec(),
        recovery,
        decryption,
        pool: None,
        extract_time: Duration::ZERO,
        recover_time,
        decrypt_time,
    })
}

/// Populates a pool through `connector`, reveals `known_bits` bits, drains
/// the ciphertext the service sends afterwards and cracks it.
pub fn run_attack<C>(connector: Arc<C>, config: &Config) -> Result<AttackOutcome>
where
    C: Connector + 'static,
{
    config.validate()?;
    let start = Instant::now();
    let pool = SessionPool::populate_with_config(connector, config);
    let mut extractor = BitExtractor::new(&pool).confirm_final_bit(config.confirm_final_bit);
    let known = extractor.extract(config.known_bits)?;
    let ciphertext = extractor.confirmed_session()?.read_remaining()?;
    let extract_time = start.elapsed();
    info!(
        "harvested {} ciphertext bytes after {:.1?}",
        ciphertext.len(),
        extract_time
    );
    let stats = PoolStats {
        epoch: pool.epoch(),
        admitted: pool.admitted(),
        rejected: pool.rejected(),
        failed: pool.failed(),
        sessions_used: extractor.sessions_used(),
    };

    let mut outcome = crack_offline(&known, &ciphertext, config)?;
    outcome.pool = Some(stats);
    outcome.extract_time = extract_time;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lfsr::{Keystream, StateWindow, TapSet};
    use crate::test_helper::SimulatedOracle;

    #[test]
    fn test_run_attack_against_simulator() {
        let window = StateWindow::from_seed(0x0F00F, 21).unwrap();
        let taps = TapSet::from_indices(&[0, 1, 4, 6, 8, 9, 12, 15, 16, 18]).unwrap();
        let plaintext = b"prefix FLAG{pool_of_sessions} suffix";
        let sim = Arc::new(SimulatedOracle::new(
            "1700000000",
            Keystream::new(window, taps),
            48,
            plaintext,
        ));
        let config = Config {
            pool_size: 50,
            connect_threads: 4,
            ..Config::default()
        };
        let outcome = run_attack(sim.clone(), &config).unwrap();
        assert_eq!(outcome.known, sim.challenge());
        assert_eq!(outcome.recovery.taps, taps);
        assert_eq!(outcome.decryption.offset, 21);
        assert_eq!(outcome.decryption.plaintext, plaintext.to_vec());
        let stats = outcome.pool.unwrap();
        assert_eq!(stats.admitted, 50);
        assert_eq!(stats.epoch.as_deref(), Some("1700000000"));
    }

    #[test]
    fn test_crack_offline_searches_whole_prefix() {
        let window = StateWindow::from_seed(0x1A2B3C, 21).unwrap();
        let taps = TapSet::from_indices(&[0, 2, 3, 5, 7, 11, 13, 14, 17, 19]).unwrap();
        let mut ks = Keystream::new(window, taps);
        let known: BitSequence = ks.take_bits(100).into();
        ks.advance(30);
        let ciphertext = ks.apply(b"FLAG{long}!");
        assert_eq!(hex::encode(&ciphertext), "50fe7c939592c79d280fb4");

        // the phase lies beyond the default 48-bit span but inside the 100-bit prefix
        let outcome = crack_offline(&known, &ciphertext, &Config::default()).unwrap();
        assert_eq!(outcome.recovery.taps, taps);
        assert_eq!(outcome.decryption.offset, 51);
        assert_eq!(outcome.decryption.plaintext, b"FLAG{long}!".to_vec());
    }

    #[test]
    fn test_crack_offline_rejects_invalid_config() {
        let config = Config {
            known_bits: 10,
            ..Config::default()
        };
        let known: BitSequence = std::iter::repeat(false).take(48).collect();
        assert!(crack_offline(&known, b"", &config).is_err());
    }
}
