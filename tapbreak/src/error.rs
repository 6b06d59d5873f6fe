use crate::utils::bits::BitSequence;

#[derive(thiserror::Error, Debug)]
pub enum AttackError {
    #[error("HandshakeFailed: {reason}")]
    HandshakeFailed { reason: String }, // session is dropped, pool shrinks

    #[error("PoolExhausted: all {admitted} admitted sessions have been consumed")]
    PoolExhausted { admitted: usize },

    #[error("ReplayInconsistency: fresh session rejected bit {bit_index} = {expected}")]
    ReplayInconsistency { bit_index: usize, expected: u8 },

    #[error("NoConsistentTaps: {candidates} tap sets match {bit_count} known bits")]
    NoConsistentTaps { bit_count: usize, candidates: usize },

    #[error("NotEnoughBits: have {have} known bits, need at least {need}")]
    NotEnoughBits { have: usize, need: usize },

    #[error("NoMatchingOffset: signature not found below offset {span} ({ciphertext_len} bytes)")]
    NoMatchingOffset { span: usize, ciphertext_len: usize },

    #[error("SessionClosed: session {0} was already closed by a rejected guess")]
    SessionClosed(usize),

    #[error("Protocol: {0}")]
    Protocol(String),

    #[error("Transport: {0}")]
    Transport(#[from] std::io::Error),

    #[error("InvalidConfig: {0}")]
    InvalidConfig(String),

    #[error("InvalidInput: {0}")]
    InvalidInput(String),

    #[error("Extraction failed at bit {bit_index} (known: {known}): {source}")]
    Extraction {
        bit_index: usize,
        known: BitSequence,
        #[source]
        source: Box<AttackError>,
    },
}

impl AttackError {
    /// Strips the extraction context and returns the underlying failure.
    pub fn root(&self) -> &AttackError {
        match self {
            AttackError::Extraction { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn phase(&self) -> &'static str {
        match self {
            AttackError::HandshakeFailed { .. } => "populate",
            AttackError::PoolExhausted { .. }
            | AttackError::ReplayInconsistency { .. }
            | AttackError::SessionClosed(_)
            | AttackError::Protocol(_)
            | AttackError::Transport(_)
            | AttackError::Extraction { .. } => "extract",
            AttackError::NoConsistentTaps { .. } | AttackError::NotEnoughBits { .. } => "recover",
            AttackError::NoMatchingOffset { .. } => "decrypt",
            AttackError::InvalidConfig(_) | AttackError::InvalidInput(_) => "setup",
        }
    }

    /// Whether the failure only degrades pool capacity instead of aborting a phase.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AttackError::HandshakeFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, AttackError>;
