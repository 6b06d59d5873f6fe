use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use tapbreak::{
    config::{Config, Protocol},
    crack_offline,
    lfsr::{Keystream, StateWindow, TapSet},
    oracle::TcpConnector,
    run_attack,
    test_helper::SimulatedOracle,
    utils::bits::BitSequence,
    AttackOutcome,
};

use super::cli::{Command, TapbreakCli};

/// Builds the attack configuration from the global flags and, for
/// commands that talk to an oracle, the command's own flags.
pub fn build_config(args: &TapbreakCli) -> Result<Config> {
    let mut config = Config {
        window_size: args.window_size,
        tap_count: args.tap_count,
        known_bits: args.known_bits,
        strict_taps: args.strict,
        recover_threads: args.recover_threads,
        signature: args.signature.as_bytes().to_vec(),
        protocol: Protocol {
            epoch_delimiter: unescape(&args.epoch_delimiter),
            prompt_delimiter: unescape(&args.prompt),
            result_delimiter: unescape(&args.result_delimiter),
            correct_marker: unescape(&args.correct_marker),
        },
        ..Config::default()
    };
    match &args.command {
        Some(Command::Attack {
            pool_size,
            connect_threads,
            timeout_ms,
            confirm_final_bit,
            ..
        }) => {
            config.pool_size = *pool_size;
            config.connect_threads = *connect_threads;
            config.confirm_final_bit = *confirm_final_bit;
            config.io_timeout = match timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(*ms)),
            };
        }
        Some(Command::Simulate { pool_size, .. }) => config.pool_size = *pool_size,
        _ => {}
    }
    config.validate()?;
    Ok(config)
}

pub fn run(args: &TapbreakCli) -> Result<AttackOutcome> {
    let config = build_config(args)?;
    match &args.command {
        Some(Command::Attack { host, port, .. }) => attack(host, *port, &config),
        Some(Command::Recover { bits, ciphertext }) => recover(bits, ciphertext, &config),
        Some(Command::Simulate {
            seed,
            taps,
            plaintext,
            epoch,
            ..
        }) => simulate(seed, taps, plaintext, epoch, &config),
        None => bail!("no command provided: valid commands are attack, recover, simulate"),
    }
}

pub fn attack(host: &str, port: u16, config: &Config) -> Result<AttackOutcome> {
    let connector = TcpConnector::new((host, port), config.io_timeout)
        .with_context(|| format!("cannot resolve {}:{}", host, port))?;
    info!("attacking {}", connector.addr());
    Ok(run_attack(Arc::new(connector), config)?)
}

pub fn recover(bits: &str, ciphertext: &str, config: &Config) -> Result<AttackOutcome> {
    let known: BitSequence = bits.parse()?;
    let ciphertext = hex::decode(ciphertext.trim()).context("ciphertext is not valid hex")?;
    Ok(crack_offline(&known, &ciphertext, config)?)
}

pub fn simulate(
    seed: &str,
    taps: &str,
    plaintext: &str,
    epoch: &str,
    config: &Config,
) -> Result<AttackOutcome> {
    let window = StateWindow::from_seed(parse_seed(seed)?, config.window_size)?;
    let taps = TapSet::from_indices(&parse_taps(taps)?)?;
    if taps.len() != config.tap_count {
        bail!("expected {} taps, got {}", config.tap_count, taps.len());
    }
    if taps.span() >= config.window_size {
        bail!(
            "tap {} does not fit a window of {}",
            taps.span() - 1,
            config.window_size
        );
    }
    let oracle = SimulatedOracle::new(
        epoch,
        Keystream::new(window, taps),
        config.known_bits,
        plaintext.as_bytes(),
    )
    .with_protocol(config.protocol.clone());
    info!(
        "simulating seed {} taps {} with {} ciphertext bytes",
        window,
        taps,
        oracle.ciphertext().len()
    );
    Ok(run_attack(Arc::new(oracle), config)?)
}

pub fn parse_seed(seed: &str) -> Result<u64> {
    let seed = seed.trim();
    let parsed = match seed.strip_prefix("0x").or_else(|| seed.strip_prefix("0X")) {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => seed.parse(),
    };
    parsed.with_context(|| format!("invalid seed {:?}", seed))
}

/// Expands `\n`, `\r`, `\t` and `\\` so delimiters can be given on a command line.
pub fn unescape(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        let c = match c {
            '\\' => match chars.next() {
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                Some('\\') | None => '\\',
                Some(other) => {
                    out.push(b'\\');
                    other
                }
            },
            c => c,
        };
        let mut buf = [0u8; 4];
        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }
    out
}

pub fn parse_taps(taps: &str) -> Result<Vec<usize>> {
    taps.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse().map_err(|_| anyhow!("invalid tap position {:?}", t)))
        .collect()
}
