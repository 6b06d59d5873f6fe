use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Subcommand, Debug, Serialize, Clone)]
pub enum Command {
    /// Runs the full attack against a live service
    Attack {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 1337)]
        port: u16,

        /// Sessions opened before extraction. Needs to cover one per 1-bit.
        #[arg(long, default_value_t = 64)]
        pool_size: usize,

        #[arg(long, default_value_t = 16)]
        connect_threads: usize,

        /// Read/write/connect timeout per session, 0 disables it
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,

        /// Spend one more session to confirm the last bit instead of inferring it
        #[arg(long, default_value_t = false)]
        confirm_final_bit: bool,
    },
    /// Cracks already harvested bits and ciphertext offline
    Recover {
        /// Revealed bits in order, e.g. "0011 1100 ..."
        #[arg(long, required = true)]
        bits: String,

        /// Ciphertext as hex
        #[arg(long, required = true)]
        ciphertext: String,
    },
    /// Runs the attack against an in-process oracle
    Simulate {
        /// Initial register value, decimal or 0x-prefixed hex
        #[arg(long, default_value = "0x1A2B3C")]
        seed: String,

        /// Comma-separated tap positions
        #[arg(long, default_value = "0,2,3,5,7,11,13,14,17,19")]
        taps: String,

        #[arg(long, default_value = "FLAG{lfsr_taps_recovered}")]
        plaintext: String,

        #[arg(long, default_value = "1700000000")]
        epoch: String,

        #[arg(long, default_value_t = 64)]
        pool_size: usize,
    },
}

#[derive(Parser, Debug, Serialize, Clone)]
pub struct TapbreakCli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output filename for the JSON report, nothing is written if empty
    #[arg(long, default_value = "")]
    pub output: String,

    /// Register width W
    #[arg(long, default_value_t = 21)]
    pub window_size: usize,

    /// Taps per feedback bit K
    #[arg(long, default_value_t = 10)]
    pub tap_count: usize,

    /// Bits revealed through the oracle, at least twice the register width
    #[arg(long, default_value_t = 48)]
    pub known_bits: usize,

    /// Plaintext marker the offset search looks for
    #[arg(long, default_value = "FLAG{")]
    pub signature: String,

    /// Fail unless exactly one tap set explains the known bits
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Threads for tap recovery, 0 uses the global rayon pool
    #[arg(long, default_value_t = 0)]
    pub recover_threads: usize,

    /// Leading word of a reply that confirms a guess
    #[arg(long, default_value = "correct")]
    pub correct_marker: String,

    /// Text the service sends before each guess. Accepts \n, \r, \t escapes.
    #[arg(long, default_value = "> ")]
    pub prompt: String,

    /// Terminator of the epoch token sent on connect
    #[arg(long, default_value = "\\n")]
    pub epoch_delimiter: String,

    /// Terminator of each guess result
    #[arg(long, default_value = "\\n")]
    pub result_delimiter: String,
}

impl TapbreakCli {
    pub fn command_name(&self) -> &'static str {
        match &self.command {
            Some(Command::Attack { .. }) => "attack",
            Some(Command::Recover { .. }) => "recover",
            Some(Command::Simulate { .. }) => "simulate",
            None => "none",
        }
    }
}
