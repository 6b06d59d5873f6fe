//! Adaptive recovery of the hidden bit stream.
//!
//! Every bit is first guessed as `0` on the current session. A confirmation
//! keeps the session alive for the next bit. A rejection kills it; a fresh
//! session is then taken from the pool, fed every known bit again, and asked
//! to confirm `1`. Replays are deterministic because all sessions in the pool
//! share one epoch, so any rejection during a replay means that invariant is
//! broken and the run is aborted.
//!
//! An all-zero stream costs one session in total, an all-one stream one
//! session per bit. When the last requested bit is rejected as `0` it is
//! recorded as `1` without spending another session, unless the extractor is
//! told to confirm it.

use std::io::{Read, Write};

use log::{debug, info};

use super::pool::SessionPool;
use super::session::OracleSession;
use crate::error::{AttackError, Result};
use crate::utils::bits::BitSequence;

pub struct BitExtractor<'a, S: Read + Write> {
    pool: &'a SessionPool<S>,
    known: BitSequence,
    current: Option<OracleSession<S>>,
    sessions_used: usize,
    confirm_final_bit: bool,
}

impl<'a, S: Read + Write> BitExtractor<'a, S> {
    pub fn new(pool: &'a SessionPool<S>) -> Self {
        Self {
            pool,
            known: BitSequence::new(),
            current: None,
            sessions_used: 0,
            confirm_final_bit: false,
        }
    }

    pub fn confirm_final_bit(mut self, confirm: bool) -> Self {
        self.confirm_final_bit = confirm;
        self
    }

    pub fn known(&self) -> &BitSequence {
        &self.known
    }

    /// Sessions taken from the pool so far.
    pub fn sessions_used(&self) -> usize {
        self.sessions_used
    }

    /// Reveals bits until `n` are known and returns them.
    ///
    /// Failures carry the index of the bit being revealed and the bits known
    /// at that point. There is no partial-result recovery: a new run needs a
    /// new pool on a single epoch.
    pub fn extract(&mut self, n: usize) -> Result<BitSequence> {
        info!(
            "extracting {} bits from a pool of {} sessions",
            n,
            self.pool.size()
        );
        while self.known.len() < n {
            let bit_index = self.known.len();
            let is_final = bit_index + 1 == n;
            if let Err(e) = self.reveal_next(is_final && !self.confirm_final_bit) {
                return Err(AttackError::Extraction {
                    bit_index,
                    known: self.known.clone(),
                    source: Box::new(e),
                });
            }
        }
        info!(
            "extracted {} bits with {} sessions: {}",
            n, self.sessions_used, self.known
        );
        Ok(self.known.clone())
    }

    /// Reveals one bit. With `infer_one`, a rejected `0` is recorded as `1`
    /// without confirming it on a new session.
    fn reveal_next(&mut self, infer_one: bool) -> Result<bool> {
        let bit_index = self.known.len();
        let mut session = match self.current.take() {
            Some(session) => session,
            None => self.fresh_session()?,
        };
        if session.guess(false)? {
            self.known.push(false);
            self.current = Some(session);
            metrics::counter!("extractor.bits_revealed").increment(1);
            return Ok(false);
        }
        drop(session);
        debug!("bit {} is 1, switching session", bit_index);
        if !infer_one {
            let mut session = self.fresh_session()?;
            if !session.guess(true)? {
                return Err(AttackError::ReplayInconsistency {
                    bit_index,
                    expected: 1,
                });
            }
            self.current = Some(session);
        }
        self.known.push(true);
        metrics::counter!("extractor.bits_revealed").increment(1);
        Ok(true)
    }

    /// Takes a session from the pool and brings it up to date with `known`.
    fn fresh_session(&mut self) -> Result<OracleSession<S>> {
        let mut session = self.pool.acquire()?;
        self.sessions_used += 1;
        metrics::counter!("extractor.sessions_consumed").increment(1);
        debug!(
            "session {} replaying {} known bits",
            session.id(),
            self.known.len()
        );
        session.replay(&self.known)?;
        Ok(session)
    }

    /// A session that has confirmed every known bit, for reading what the
    /// service sends after the challenge. Spends a pool session if the last
    /// bit was inferred rather than confirmed.
    pub fn confirmed_session(&mut self) -> Result<OracleSession<S>> {
        match self.current.take() {
            Some(session) => Ok(session),
            None => self.fresh_session().map_err(|e| AttackError::Extraction {
                bit_index: self.known.len(),
                known: self.known.clone(),
                source: Box::new(e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use crate::test_helper::sim_oracle::{SimStream, SimulatedOracle};
    use std::sync::Arc;

    fn pool_for(sim: &SimulatedOracle, size: usize) -> SessionPool<SimStream> {
        let pool = SessionPool::new();
        let protocol = Arc::new(Protocol::default());
        for id in 0..size {
            let session = OracleSession::handshake(id, sim.open(), protocol.clone()).unwrap();
            assert!(pool.admit(session));
        }
        pool
    }

    fn sim(bits: &str) -> SimulatedOracle {
        SimulatedOracle::from_bits("1700000000", bits.parse().unwrap(), b"tail".to_vec())
    }

    #[test]
    fn test_all_zero_costs_one_session() {
        let oracle = sim(&"0".repeat(32));
        let pool = pool_for(&oracle, 4);
        let mut extractor = BitExtractor::new(&pool);
        let bits = extractor.extract(32).unwrap();
        assert_eq!(bits.to_string(), "0".repeat(32));
        assert_eq!(extractor.sessions_used(), 1);
        assert_eq!(pool.size(), 3);
    }

    #[test]
    fn test_all_one_costs_one_session_per_bit() {
        let oracle = sim(&"1".repeat(20));
        let pool = pool_for(&oracle, 20);
        let mut extractor = BitExtractor::new(&pool);
        let bits = extractor.extract(20).unwrap();
        assert_eq!(bits.to_string(), "1".repeat(20));
        assert_eq!(extractor.sessions_used(), 20);
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn test_confirming_final_bit_costs_one_more() {
        let oracle = sim(&"1".repeat(8));
        let pool = pool_for(&oracle, 9);
        let mut extractor = BitExtractor::new(&pool).confirm_final_bit(true);
        extractor.extract(8).unwrap();
        assert_eq!(extractor.sessions_used(), 9);
        let mut session = extractor.confirmed_session().unwrap();
        assert_eq!(session.confirmed(), 8);
        assert_eq!(session.read_remaining().unwrap(), b"tail".to_vec());
    }

    #[test]
    fn test_mixed_bits_are_deterministic() {
        let hidden = "001111001101010001011101100001001001010100101001";
        let oracle = sim(hidden);
        for _ in 0..2 {
            let pool = pool_for(&oracle, 48);
            let mut extractor = BitExtractor::new(&pool);
            assert_eq!(extractor.extract(48).unwrap().to_string(), hidden);
            // one session to start with, one per 1-bit except the last
            assert_eq!(extractor.sessions_used(), 1 + hidden.matches('1').count() - 1);
        }
    }

    #[test]
    fn test_confirmed_session_after_inferred_bit() {
        let oracle = sim("0101");
        let pool = pool_for(&oracle, 4);
        let mut extractor = BitExtractor::new(&pool);
        extractor.extract(4).unwrap();
        assert_eq!(extractor.sessions_used(), 2);
        let mut session = extractor.confirmed_session().unwrap();
        assert_eq!(extractor.sessions_used(), 3);
        assert_eq!(session.read_remaining().unwrap(), b"tail".to_vec());
    }

    #[test]
    fn test_pool_exhausted_mid_run() {
        let oracle = sim("1111");
        let pool = pool_for(&oracle, 2);
        let mut extractor = BitExtractor::new(&pool);
        let err = extractor.extract(4).unwrap_err();
        match &err {
            AttackError::Extraction {
                bit_index, known, ..
            } => {
                assert_eq!(*bit_index, 1);
                assert_eq!(known.to_string(), "1");
            }
            other => panic!("unexpected error {}", other),
        }
        assert!(matches!(
            err.root(),
            AttackError::PoolExhausted { admitted: 2 }
        ));
    }

    #[test]
    fn test_foreign_session_breaks_replay() {
        let good = sim("0110");
        let other = SimulatedOracle::from_bits("1700000000", "1110".parse().unwrap(), vec![]);
        let pool = SessionPool::new();
        let protocol = Arc::new(Protocol::default());
        // same token, different stream: only a replay can notice
        pool.admit(OracleSession::handshake(0, good.open(), protocol.clone()).unwrap());
        pool.admit(OracleSession::handshake(1, other.open(), protocol).unwrap());
        let mut extractor = BitExtractor::new(&pool);
        let err = extractor.extract(4).unwrap_err();
        assert!(matches!(
            err.root(),
            AttackError::ReplayInconsistency {
                bit_index: 0,
                expected: 0
            }
        ));
    }
}
