use std::collections::BTreeMap;

use chrono::Utc;
use clap::Parser;
use tapbreak_cli::common::{cli::TapbreakCli, commands, report::RunReport};

#[test]
fn test_simulate_writes_report() {
    let args = TapbreakCli::parse_from([
        "tapbreak",
        "simulate",
        "--seed",
        "0xF00F",
        "--taps",
        "0,1,4,6,8,9,12,15,16,18",
        "--plaintext",
        "prefix FLAG{pool_of_sessions} suffix",
        "--pool-size",
        "40",
    ]);
    let start = Utc::now();
    let outcome = commands::run(&args).unwrap();
    let end = Utc::now();

    let mut metrics = BTreeMap::new();
    metrics.insert("extractor.sessions_consumed".to_string(), 26.0);
    let report = RunReport::new(&args, &outcome, start, end, metrics);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports").join("simulate.json");
    let filename = path.to_str().unwrap();
    report.write(filename).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["taps"], serde_json::json!([0, 1, 4, 6, 8, 9, 12, 15, 16, 18]));
    assert_eq!(json["offset"], 21);
    assert_eq!(json["plaintext"], "prefix FLAG{pool_of_sessions} suffix");
    assert_eq!(json["pool"]["admitted"], 40);
    assert_eq!(json["pool"]["epoch"], "1700000000");
    assert_eq!(json["cli"]["known_bits"], 48);
    assert_eq!(json["metrics"]["extractor.sessions_consumed"], 26.0);
    assert_eq!(json["known_bits"].as_str().unwrap().len(), 48);
}

#[test]
fn test_recover_without_match() {
    let args = TapbreakCli::parse_from([
        "tapbreak",
        "recover",
        "--bits",
        "001111001101010001011101100001001001010100101001",
        "--ciphertext",
        "00000000",
    ]);
    let err = commands::run(&args).unwrap_err();
    assert!(err.to_string().contains("offset"), "{}", err);
}
