// Command line front end.
// 3 sub-commands
// - attack   (live service: pool, extraction, recovery, decryption)
// - recover  (offline: known bits + ciphertext hex)
// - simulate (in-process oracle, same pipeline as attack)
use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use log::{error, info};
use tapbreak::AttackError;
use tapbreak_cli::common::{cli, commands, report, utils};

fn main() -> Result<()> {
    let args = cli::TapbreakCli::parse();
    utils::init_logging(&args.log_level);
    let run_start_ts = Utc::now();
    let metrics_recorder = utils::MetricsRecorder::install()?;

    let pb = utils::spinner("running");
    let outcome = commands::run(&args);
    pb.finish_and_clear();
    let outcome = outcome.inspect_err(|e| {
        if let Some(err) = e.downcast_ref::<AttackError>() {
            error!("{} phase failed: {}", err.root().phase(), err);
        }
    })?;

    let run_end_ts = Utc::now();
    metrics::gauge!("tapbreak.run.duration_s")
        .set((run_end_ts - run_start_ts).num_milliseconds() as f64 / 1000.0);

    info!(
        "taps {} window {} offset {}",
        outcome.recovery.taps, outcome.recovery.window, outcome.decryption.offset
    );
    println!("{}", String::from_utf8_lossy(&outcome.decryption.plaintext));

    if !args.output.is_empty() {
        let report = report::RunReport::new(
            &args,
            &outcome,
            run_start_ts,
            run_end_ts,
            metrics_recorder.snapshot_values(),
        );
        info!("Dumping {} report to {}", args.command_name(), args.output);
        report.write(&args.output)?;
    }
    Ok(())
}
