use std::io::{BufRead, BufReader, Read, Write};
use std::sync::Arc;

use log::debug;

use crate::config::Protocol;
use crate::def::MAX_MESSAGE_LEN;
use crate::error::{AttackError, Result};
use crate::utils::bits::BitSequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    /// A guess was rejected or the stream ended. Never reused.
    Closed,
}

/// One connection to the bit-guessing service.
///
/// A session is only valid while every guess made on it has been confirmed,
/// so an open session is equivalent to "has replayed exactly the first
/// `confirmed()` hidden bits".
pub struct OracleSession<S: Read + Write> {
    id: usize,
    epoch: String,
    reader: BufReader<S>,
    protocol: Arc<Protocol>,
    state: SessionState,
    confirmed: usize,
}

impl<S: Read + Write> OracleSession<S> {
    /// Reads the epoch token the service sends right after connecting.
    pub fn handshake(id: usize, stream: S, protocol: Arc<Protocol>) -> Result<Self> {
        let mut session = Self {
            id,
            epoch: String::new(),
            reader: BufReader::new(stream),
            protocol,
            state: SessionState::Open,
            confirmed: 0,
        };
        let delimiter = session.protocol.epoch_delimiter.clone();
        let raw = session
            .read_until(&delimiter)
            .map_err(|e| AttackError::HandshakeFailed {
                reason: format!("session {}: {}", id, e),
            })?;
        let token = String::from_utf8_lossy(&raw[..raw.len() - delimiter.len()])
            .trim()
            .to_string();
        if token.is_empty() {
            return Err(AttackError::HandshakeFailed {
                reason: format!("session {}: empty epoch token", id),
            });
        }
        debug!("session {} joined epoch {}", id, token);
        session.epoch = token;
        Ok(session)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Number of guesses the oracle has confirmed on this session.
    pub fn confirmed(&self) -> usize {
        self.confirmed
    }

    /// Reads up to and including `delimiter`.
    pub fn read_until(&mut self, delimiter: &[u8]) -> Result<Vec<u8>> {
        let last = *delimiter
            .last()
            .ok_or_else(|| AttackError::InvalidConfig("empty delimiter".to_string()))?;
        let mut buf = Vec::new();
        loop {
            let n = match self.reader.read_until(last, &mut buf) {
                Ok(n) => n,
                Err(e) => {
                    self.state = SessionState::Closed;
                    return Err(e.into());
                }
            };
            if n == 0 {
                self.state = SessionState::Closed;
                return Err(AttackError::Protocol(format!(
                    "session {} closed while waiting for {:?}",
                    self.id,
                    String::from_utf8_lossy(delimiter)
                )));
            }
            if buf.ends_with(delimiter) {
                return Ok(buf);
            }
            if buf.len() > MAX_MESSAGE_LEN {
                self.state = SessionState::Closed;
                return Err(AttackError::Protocol(format!(
                    "session {} sent more than {} bytes without a delimiter",
                    self.id, MAX_MESSAGE_LEN
                )));
            }
        }
    }

    /// Guesses the next hidden bit.
    ///
    /// Returns `Ok(true)` when the oracle confirms. On `Ok(false)` the
    /// session is closed and must be dropped. Transport and protocol failures
    /// also close the session; they are never read as a rejection. That
    /// includes a rejection the service sends without the result delimiter
    /// before closing: it surfaces as `Protocol` and aborts extraction.
    pub fn guess(&mut self, bit: bool) -> Result<bool> {
        if !self.is_open() {
            return Err(AttackError::SessionClosed(self.id));
        }
        let protocol = self.protocol.clone();
        self.read_until(&protocol.prompt_delimiter)?;
        let line: &[u8] = if bit { b"1\n" } else { b"0\n" };
        let stream = self.reader.get_mut();
        if let Err(e) = stream.write_all(line).and_then(|_| stream.flush()) {
            self.state = SessionState::Closed;
            return Err(e.into());
        }
        metrics::counter!("extractor.guesses").increment(1);
        let result = self.read_until(&protocol.result_delimiter)?;
        if protocol.is_confirmation(&result) {
            self.confirmed += 1;
            Ok(true)
        } else {
            debug!(
                "session {} rejected bit {} = {}",
                self.id, self.confirmed, bit as u8
            );
            self.state = SessionState::Closed;
            Ok(false)
        }
    }

    /// Re-confirms `known` from the start. The session must be fresh.
    pub fn replay(&mut self, known: &BitSequence) -> Result<()> {
        if self.confirmed != 0 {
            return Err(AttackError::Protocol(format!(
                "session {} already confirmed {} bits, cannot replay",
                self.id, self.confirmed
            )));
        }
        for (bit_index, bit) in known.iter().enumerate() {
            if !self.guess(bit)? {
                return Err(AttackError::ReplayInconsistency {
                    bit_index,
                    expected: bit as u8,
                });
            }
        }
        Ok(())
    }

    /// Drains whatever the service sends until it closes the stream.
    pub fn read_remaining(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let res = self.reader.read_to_end(&mut out);
        self.state = SessionState::Closed;
        res?;
        Ok(out)
    }
}
