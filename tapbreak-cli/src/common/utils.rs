use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

pub fn init_logging(max_level: &str) {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(max_level));
}

pub fn spinner(msg: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub struct MetricsRecorder {
    snapshotter: Snapshotter,
}

impl MetricsRecorder {
    /// Installs a global debugging recorder. Only one can exist per process.
    pub fn install() -> Result<Self> {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .map_err(|_| anyhow!("a metrics recorder is already installed"))?;
        Ok(Self { snapshotter })
    }

    /// Metric name to value. Counters are converted to `f64`; histograms
    /// are summarized by their mean.
    pub fn snapshot_values(&self) -> BTreeMap<String, f64> {
        self.snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(ckey, _unit, _descr, value)| {
                let name = ckey.key().name().to_owned();
                match value {
                    DebugValue::Counter(v) => Some((name, v as f64)),
                    DebugValue::Gauge(v) => Some((name, v.into_inner())),
                    DebugValue::Histogram(samples) if !samples.is_empty() => {
                        let sum: f64 = samples.iter().map(|s| s.into_inner()).sum();
                        Some((name, sum / samples.len() as f64))
                    }
                    DebugValue::Histogram(_) => None,
                }
            })
            .collect()
    }
}
