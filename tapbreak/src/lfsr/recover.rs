//! Brute-force recovery of the tap set from a known output prefix.
//!
//! The first `W` known bits are taken as the initial window. Every
//! `K`-subset of `[0, W-1)` is then simulated over the remaining `M-W` known
//! bits and dropped on the first mismatch. Candidates are independent, so the
//! search fans out over a rayon pool; `find_map_first` keeps the result equal
//! to a sequential scan in lexicographic order.

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use super::{StateWindow, TapSet};
use crate::config::Config;
use crate::error::{AttackError, Result};
use crate::utils::bits::BitSequence;
use crate::utils::combinations::{binomial, subset_masks};

/// Taps and window consistent with every known bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    pub taps: TapSet,
    /// The last `W` known bits: the state from which output `M-W` is emitted.
    pub window: StateWindow,
}

#[derive(Debug, Clone)]
pub struct TapRecoverer {
    window_size: usize,
    tap_count: usize,
    strict: bool,
    threads: usize,
}

impl TapRecoverer {
    pub fn new(window_size: usize, tap_count: usize) -> Self {
        Self {
            window_size,
            tap_count,
            strict: false,
            threads: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.window_size, config.tap_count)
            .strict(config.strict_taps)
            .threads(config.recover_threads)
    }

    /// In strict mode the whole space is scanned and anything but exactly one
    /// consistent tap set is an error.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Zero runs on the global rayon pool.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn candidate_count(&self) -> usize {
        binomial(self.window_size - 1, self.tap_count)
    }

    pub fn recover(&self, known: &BitSequence) -> Result<Recovery> {
        let need = 2 * self.window_size;
        if known.len() < need {
            return Err(AttackError::NotEnoughBits {
                have: known.len(),
                need,
            });
        }
        if self.tap_count == 0 || self.tap_count >= self.window_size {
            return Err(AttackError::InvalidConfig(format!(
                "tap count {} must be in [1, {})",
                self.tap_count, self.window_size
            )));
        }
        let (head, rest) = known.as_slice().split_at(self.window_size);
        let initial = StateWindow::from_bits(head)?;
        let candidates = subset_masks(self.window_size - 1, self.tap_count);
        info!(
            "searching {} tap sets over {} check bits",
            candidates.len(),
            rest.len()
        );
        metrics::counter!("recover.candidates").increment(candidates.len() as u64);

        let search = || self.search(&candidates, initial, rest);
        let found = if self.threads == 0 {
            search()
        } else {
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build()
                .map_err(|e| AttackError::InvalidConfig(e.to_string()))?;
            pool.install(search)
        }?;
        info!("recovered taps {} window {}", found.taps, found.window);
        Ok(found)
    }

    fn search(&self, candidates: &[u64], initial: StateWindow, rest: &[bool]) -> Result<Recovery> {
        let bit_count = initial.width() + rest.len();
        if !self.strict {
            return candidates
                .par_iter()
                .find_map_first(|&mask| {
                    check_candidate(initial, rest, TapSet::from_mask(mask))
                })
                .ok_or(AttackError::NoConsistentTaps {
                    bit_count,
                    candidates: 0,
                });
        }
        let matches: Vec<Recovery> = candidates
            .par_iter()
            .filter_map(|&mask| {
                check_candidate(initial, rest, TapSet::from_mask(mask))
            })
            .collect();
        debug!("strict scan found {} consistent tap sets", matches.len());
        match matches.as_slice() {
            [only] => Ok(*only),
            _ => {
                if matches.len() > 1 {
                    warn!(
                        "{} tap sets explain {} bits, a longer prefix is needed",
                        matches.len(),
                        bit_count
                    );
                }
                Err(AttackError::NoConsistentTaps {
                    bit_count,
                    candidates: matches.len(),
                })
            }
        }
    }
}

/// Simulates `taps` from `initial` and compares each feedback bit against `rest`.
fn check_candidate(initial: StateWindow, rest: &[bool], taps: TapSet) -> Option<Recovery> {
    let mut window = initial;
    for &expected in rest {
        let feedback = taps.feedback(&window);
        if feedback != expected {
            return None;
        }
        window.shift_in(feedback);
    }
    Some(Recovery { taps, window })
}
