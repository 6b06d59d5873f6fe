use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tapbreak::AttackOutcome;

use super::cli::TapbreakCli;

#[derive(Serialize, Debug)]
pub struct Timestamps {
    pub start: String,
    pub end: String,
    pub duration_seconds: f64,
}

#[derive(Serialize, Debug)]
pub struct PoolReport {
    pub epoch: Option<String>,
    pub admitted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub sessions_used: usize,
}

#[derive(Serialize, Debug)]
pub struct PhaseTimes {
    pub extract_ms: f64,
    pub recover_ms: f64,
    pub decrypt_ms: f64,
}

/// Everything a run found, as written to `--output`.
#[derive(Serialize, Debug)]
pub struct RunReport {
    pub cli: TapbreakCli,
    pub command: String,
    pub timestamps: Timestamps,
    pub known_bits: String,
    pub taps: Vec<usize>,
    pub window: String,
    pub offset: usize,
    pub plaintext: String,
    pub plaintext_hex: String,
    pub ciphertext_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolReport>,
    pub phases: PhaseTimes,
    pub metrics: BTreeMap<String, f64>,
}

impl RunReport {
    pub fn new(
        cli: &TapbreakCli,
        outcome: &AttackOutcome,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        metrics: BTreeMap<String, f64>,
    ) -> Self {
        let plaintext = &outcome.decryption.plaintext;
        Self {
            cli: cli.clone(),
            command: std::env::args().collect::<Vec<_>>().join(" "),
            timestamps: Timestamps {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
                duration_seconds: (end - start).num_milliseconds() as f64 / 1000.0,
            },
            known_bits: outcome.known.to_string(),
            taps: outcome.recovery.taps.indices(),
            window: outcome.recovery.window.to_string(),
            offset: outcome.decryption.offset,
            plaintext: String::from_utf8_lossy(plaintext).into_owned(),
            plaintext_hex: hex::encode(plaintext),
            ciphertext_hex: hex::encode(&outcome.ciphertext),
            pool: outcome.pool.as_ref().map(|p| PoolReport {
                epoch: p.epoch.clone(),
                admitted: p.admitted,
                rejected: p.rejected,
                failed: p.failed,
                sessions_used: p.sessions_used,
            }),
            phases: PhaseTimes {
                extract_ms: outcome.extract_time.as_secs_f64() * 1000.0,
                recover_ms: outcome.recover_time.as_secs_f64() * 1000.0,
                decrypt_ms: outcome.decrypt_time.as_secs_f64() * 1000.0,
            },
            metrics,
        }
    }

    pub fn write(&self, filename: &str) -> Result<()> {
        if let Some(dir) = Path::new(filename).parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(filename, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
