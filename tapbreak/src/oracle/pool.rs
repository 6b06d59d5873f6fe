//! Bookkeeping for sessions that share one generator epoch.
//!
//! The first session admitted fixes the pool's epoch. Later sessions with a
//! different token come from another seeding of the generator and are turned
//! away. All mutation goes through a single mutex, so population threads may
//! call `admit` concurrently while the extractor later drains the pool with
//! `acquire`.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use threadpool::ThreadPool;

use super::session::OracleSession;
use super::transport::Connector;
use crate::config::{Config, Protocol};
use crate::error::{AttackError, Result};

struct PoolInner<S: Read + Write> {
    epoch: Option<String>,
    sessions: VecDeque<OracleSession<S>>,
    admitted: usize,
    rejected: usize,
    failed: usize,
}

pub struct SessionPool<S: Read + Write> {
    inner: Mutex<PoolInner<S>>,
}

impl<S: Read + Write> Default for SessionPool<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Read + Write> SessionPool<S> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                epoch: None,
                sessions: VecDeque::new(),
                admitted: 0,
                rejected: 0,
                failed: 0,
            }),
        }
    }

    /// Adds an open session if its epoch matches the pool's.
    ///
    /// Returns false and drops the session otherwise.
    pub fn admit(&self, session: OracleSession<S>) -> bool {
        let mut inner = self.inner.lock();
        if !session.is_open() {
            inner.rejected += 1;
            return false;
        }
        let epoch = inner
            .epoch
            .get_or_insert_with(|| session.epoch().to_string());
        if epoch.as_str() != session.epoch() {
            warn!(
                "session {} has epoch {} but the pool is on {}, dropping it",
                session.id(),
                session.epoch(),
                epoch
            );
            inner.rejected += 1;
            metrics::counter!("pool.sessions_rejected").increment(1);
            return false;
        }
        inner.admitted += 1;
        inner.sessions.push_back(session);
        metrics::counter!("pool.sessions_admitted").increment(1);
        true
    }

    /// Takes the oldest admitted session out of the pool.
    pub fn acquire(&self) -> Result<OracleSession<S>> {
        let mut inner = self.inner.lock();
        match inner.sessions.pop_front() {
            Some(session) => Ok(session),
            None => Err(AttackError::PoolExhausted {
                admitted: inner.admitted,
            }),
        }
    }

    /// Open sessions still waiting in the pool.
    pub fn size(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn epoch(&self) -> Option<String> {
        self.inner.lock().epoch.clone()
    }

    pub fn admitted(&self) -> usize {
        self.inner.lock().admitted
    }

    pub fn rejected(&self) -> usize {
        self.inner.lock().rejected
    }

    /// Handshakes that never produced a session.
    pub fn failed(&self) -> usize {
        self.inner.lock().failed
    }

    fn record_failure(&self) {
        self.inner.lock().failed += 1;
        metrics::counter!("pool.handshakes_failed").increment(1);
    }
}

impl<S: Read + Write + Send + 'static> SessionPool<S> {
    /// Opens `target` sessions on `threads` workers and admits the ones that
    /// share the first epoch seen. Failed handshakes are logged and only
    /// shrink the pool. Returns once every worker has finished.
    pub fn populate<C>(
        connector: Arc<C>,
        protocol: Arc<Protocol>,
        target: usize,
        threads: usize,
    ) -> Arc<Self>
    where
        C: Connector<Stream = S> + 'static,
    {
        let pool = Arc::new(Self::new());
        let workers = ThreadPool::new(threads.clamp(1, target.max(1)));
        for id in 0..target {
            let pool = pool.clone();
            let connector = connector.clone();
            let protocol = protocol.clone();
            workers.execute(move || {
                let opened = connector
                    .connect()
                    .map_err(|e| AttackError::HandshakeFailed {
                        reason: format!("session {}: {}", id, e),
                    })
                    .and_then(|stream| OracleSession::handshake(id, stream, protocol));
                match opened {
                    Ok(session) => {
                        pool.admit(session);
                    }
                    Err(e) => {
                        warn!("{}", e);
                        pool.record_failure();
                    }
                }
            });
        }
        workers.join();
        info!(
            "pool ready: {} sessions on epoch {:?} ({} rejected, {} failed)",
            pool.size(),
            pool.epoch(),
            pool.rejected(),
            pool.failed()
        );
        pool
    }

    pub fn populate_with_config<C>(connector: Arc<C>, config: &Config) -> Arc<Self>
    where
        C: Connector<Stream = S> + 'static,
    {
        debug!(
            "opening {} sessions on {} threads",
            config.pool_size, config.connect_threads
        );
        Self::populate(
            connector,
            config.protocol(),
            config.pool_size,
            config.connect_threads,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::sim_oracle::{EpochSchedule, SimStream, SimulatedOracle};

    fn session(sim: &SimulatedOracle, id: usize) -> OracleSession<SimStream> {
        OracleSession::handshake(id, sim.open(), Arc::new(Protocol::default())).unwrap()
    }

    #[test]
    fn test_admit_checks_epoch() {
        let a = SimulatedOracle::from_bits("100", "0101".parse().unwrap(), vec![]);
        let b = SimulatedOracle::from_bits("101", "0101".parse().unwrap(), vec![]);
        let pool = SessionPool::new();
        assert!(pool.admit(session(&a, 0)));
        assert!(!pool.admit(session(&b, 1)));
        assert!(pool.admit(session(&a, 2)));
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.epoch().as_deref(), Some("100"));
        assert_eq!(pool.admitted(), 2);
        assert_eq!(pool.rejected(), 1);
    }

    #[test]
    fn test_acquire_is_fifo_and_exhausts() {
        let sim = SimulatedOracle::from_bits("100", "0101".parse().unwrap(), vec![]);
        let pool = SessionPool::new();
        pool.admit(session(&sim, 5));
        pool.admit(session(&sim, 6));
        assert_eq!(pool.acquire().unwrap().id(), 5);
        assert_eq!(pool.acquire().unwrap().id(), 6);
        assert_eq!(pool.size(), 0);
        assert!(matches!(
            pool.acquire(),
            Err(AttackError::PoolExhausted { admitted: 2 })
        ));
    }

    #[test]
    fn test_populate_in_parallel() {
        let sim = Arc::new(SimulatedOracle::from_bits(
            "1700000000",
            "0101".parse().unwrap(),
            vec![],
        ));
        let pool = SessionPool::populate(sim.clone(), Arc::new(Protocol::default()), 32, 8);
        assert_eq!(pool.size(), 32);
        assert_eq!(sim.connections(), 32);
        assert_eq!(pool.epoch().as_deref(), Some("1700000000"));
    }

    #[test]
    fn test_populate_drops_foreign_epochs_and_failures() {
        // odd connections see the next clock tick, every fourth one fails
        let sim = Arc::new(
            SimulatedOracle::from_bits("1700000000", "0101".parse().unwrap(), vec![])
                .with_schedule(EpochSchedule {
                    alternate_epoch: Some("1700000001".to_string()),
                    fail_every: Some(4),
                }),
        );
        let pool = SessionPool::populate(sim.clone(), Arc::new(Protocol::default()), 16, 1);
        // one worker keeps ids in order: 3,7,11,15 fail, 1,5,9,13 are rejected
        assert_eq!(pool.epoch().as_deref(), Some("1700000000"));
        assert_eq!(pool.failed(), 4);
        assert_eq!(pool.rejected(), 4);
        assert_eq!(pool.size(), 8);
        assert_eq!(sim.connections(), 16);
    }
}
