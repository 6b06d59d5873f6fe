//! An in-process stand-in for the bit-guessing service.
//!
//! `SimulatedOracle` owns a hidden challenge and the ciphertext to stream
//! once the challenge is fully confirmed. Each `open()` returns a `SimStream`
//! that plays the server side of the protocol against whatever the client
//! writes. Nothing blocks: reading from a stream that is waiting for a guess
//! fails with `WouldBlock`.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::Protocol;
use crate::lfsr::Keystream;
use crate::oracle::transport::Connector;
use crate::utils::bits::BitSequence;

const REJECTED: &[u8] = b"wrong";

/// Per-connection faults used to exercise pool population.
#[derive(Debug, Clone, Default)]
pub struct EpochSchedule {
    /// Token presented by odd-numbered connections, as if the seeding clock ticked.
    pub alternate_epoch: Option<String>,
    /// Connection `i` is refused when `(i + 1) % fail_every == 0`.
    pub fail_every: Option<usize>,
}

pub struct SimulatedOracle {
    epoch: String,
    challenge: Arc<Vec<bool>>,
    ciphertext: Arc<Vec<u8>>,
    protocol: Protocol,
    rejection: Vec<u8>,
    schedule: EpochSchedule,
    connections: AtomicUsize,
}

impl SimulatedOracle {
    /// Draws `challenge_len` bits from `keystream` as the challenge and
    /// encrypts `plaintext` with the bits that follow.
    pub fn new(
        epoch: &str,
        mut keystream: Keystream,
        challenge_len: usize,
        plaintext: &[u8],
    ) -> Self {
        let challenge: BitSequence = keystream.take_bits(challenge_len).into();
        let ciphertext = keystream.apply(plaintext);
        Self::from_bits(epoch, challenge, ciphertext)
    }

    pub fn from_bits(epoch: &str, challenge: BitSequence, ciphertext: Vec<u8>) -> Self {
        Self {
            epoch: epoch.to_string(),
            challenge: Arc::new(challenge.as_slice().to_vec()),
            ciphertext: Arc::new(ciphertext),
            protocol: Protocol::default(),
            rejection: REJECTED.to_vec(),
            schedule: EpochSchedule::default(),
            connections: AtomicUsize::new(0),
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Text sent before closing on a wrong guess.
    pub fn with_rejection(mut self, rejection: &[u8]) -> Self {
        self.rejection = rejection.to_vec();
        self
    }

    pub fn with_schedule(mut self, schedule: EpochSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn challenge(&self) -> BitSequence {
        self.challenge.iter().copied().collect()
    }

    /// Connection attempts so far, refused ones included.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Opens a stream on the primary epoch, bypassing the schedule.
    pub fn open(&self) -> SimStream {
        self.connections.fetch_add(1, Ordering::SeqCst);
        SimStream::new(&self.epoch, self)
    }
}

impl Connector for SimulatedOracle {
    type Stream = SimStream;

    fn connect(&self) -> io::Result<SimStream> {
        let idx = self.connections.fetch_add(1, Ordering::SeqCst);
        if let Some(n) = self.schedule.fail_every {
            if n > 0 && (idx + 1) % n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("simulated refusal of connection {}", idx),
                ));
            }
        }
        let epoch = match &self.schedule.alternate_epoch {
            Some(alt) if idx % 2 == 1 => alt.as_str(),
            _ => self.epoch.as_str(),
        };
        Ok(SimStream::new(epoch, self))
    }
}

/// Server side of one simulated connection.
pub struct SimStream {
    challenge: Arc<Vec<bool>>,
    ciphertext: Arc<Vec<u8>>,
    protocol: Protocol,
    rejection: Vec<u8>,
    outgoing: VecDeque<u8>,
    incoming: Vec<u8>,
    confirmed: usize,
    closed: bool,
}

impl SimStream {
    fn new(epoch: &str, oracle: &SimulatedOracle) -> Self {
        let mut stream = Self {
            challenge: oracle.challenge.clone(),
            ciphertext: oracle.ciphertext.clone(),
            protocol: oracle.protocol.clone(),
            rejection: oracle.rejection.clone(),
            outgoing: VecDeque::new(),
            incoming: Vec::new(),
            confirmed: 0,
            closed: false,
        };
        stream.send(epoch.as_bytes());
        let delimiter = stream.protocol.epoch_delimiter.clone();
        stream.send(&delimiter);
        stream.prompt();
        stream
    }

    fn send(&mut self, bytes: &[u8]) {
        self.outgoing.extend(bytes.iter().copied());
    }

    fn prompt(&mut self) {
        if self.confirmed == self.challenge.len() {
            let ciphertext = self.ciphertext.clone();
            self.send(&ciphertext);
            self.closed = true;
        } else {
            let prompt = self.protocol.prompt_delimiter.clone();
            self.send(&prompt);
        }
    }

    fn on_guess(&mut self, line: &[u8]) {
        let guess = match line.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'0') => false,
            Some(b'1') => true,
            _ => {
                self.reject();
                return;
            }
        };
        if guess == self.challenge[self.confirmed] {
            self.confirmed += 1;
            let marker = self.protocol.correct_marker.clone();
            let delimiter = self.protocol.result_delimiter.clone();
            self.send(&marker);
            self.send(&delimiter);
            self.prompt();
        } else {
            self.reject();
        }
    }

    fn reject(&mut self) {
        let mut reply = self.rejection.clone();
        reply.extend_from_slice(&self.protocol.result_delimiter);
        self.send(&reply);
        self.closed = true;
    }
}

impl Read for SimStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.outgoing.is_empty() {
            if self.closed {
                return Ok(0);
            }
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "simulated oracle is waiting for a guess",
            ));
        }
        let n = buf.len().min(self.outgoing.len());
        for (dst, src) in buf.iter_mut().zip(self.outgoing.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for SimStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated oracle closed the connection",
            ));
        }
        self.incoming.extend_from_slice(buf);
        while let Some(pos) = self.incoming.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.incoming.drain(..=pos).collect();
            if self.closed {
                break;
            }
            self.on_guess(&line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
