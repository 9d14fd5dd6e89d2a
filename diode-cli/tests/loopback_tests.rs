//! Send and receive through `cat` standing in for the modem
#![cfg(unix)]

use std::fs;
use tempfile::tempdir;

use diode_cli::commands::{recv, send};
use diode_core::Cancel;

const CAT_MODEM: &str = r#"
channels = 3
chunk_size = 200
sample_width = 4
wait = "unbounded"

[modem]
encoder = "cat"
encoder_args = []
decoder = "cat"
decoder_args = []
"#;

#[test]
fn test_send_recv_loopback() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("diode.toml");
    let input = dir.path().join("input.bin");
    let samples = dir.path().join("samples.raw");
    let output = dir.path().join("output.bin");
    let report = dir.path().join("report.json");
    fs::write(&config, CAT_MODEM).unwrap();

    let data: Vec<u8> = (0..20_011u32).map(|i| (i % 241) as u8).collect();
    fs::write(&input, &data).unwrap();

    send::execute(
        input.to_str().unwrap(),
        samples.to_str().unwrap(),
        Some(config.to_str().unwrap()),
        &Cancel::new(),
    )
    .unwrap();

    // Three channels of 4-byte samples
    let raw = fs::read(&samples).unwrap();
    assert_eq!(raw.len() % 12, 0);
    assert!(raw.len() > data.len());

    recv::execute(
        samples.to_str().unwrap(),
        output.to_str().unwrap(),
        Some(config.to_str().unwrap()),
        Some(report.to_str().unwrap()),
        &Cancel::new(),
    )
    .unwrap();

    assert_eq!(fs::read(&output).unwrap(), data);
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["end_confirmed"], true);
    assert_eq!(json["gap_markers"], 0);
}
