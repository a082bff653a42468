//! Minimal CLI verifier
//!
//! Reads a self-describing proof JSON (file path or `-` for stdin) and
//! verifies it with the selected backend.
//!
//! Usage:
//!   verifier --proof proof.json [--backend simulated]
//!            [--expect-theorem <text>] [--security-level <u64>]
//!
//! Exit codes mirror the native prover contract:
//!   0  proof valid
//!   1  proof invalid
//!   2  error (bad arguments, unreadable proof, backend failure)

#![forbid(unsafe_code)]

use std::io::Read;
use std::{env, fs, process};

use zktheorem::{Proof, ZkpVerifier};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn run() -> anyhow::Result<bool> {
    let args: Vec<String> = env::args().collect();

    let proof_arg = parse_flag(&args, "--proof")
        .ok_or_else(|| anyhow::anyhow!("--proof <path|-> is required"))?;
    let backend = parse_flag(&args, "--backend").unwrap_or_else(|| "simulated".into());

    let proof_text = if proof_arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(&proof_arg)
            .map_err(|e| anyhow::anyhow!("read proof {proof_arg}: {e}"))?
    };

    let value: serde_json::Value = serde_json::from_str(&proof_text)
        .map_err(|e| anyhow::anyhow!("proof is not valid JSON: {e}"))?;
    let proof = Proof::from_value(&value)
        .map_err(|e| anyhow::anyhow!("proof does not match the expected shape: {e}"))?;

    let mut verifier = ZkpVerifier::with_backend(&backend)
        .map_err(|e| anyhow::anyhow!("backend selection failed: {e}"))?;
    if let Some(level) = parse_flag(&args, "--security-level") {
        let level: u64 = level
            .parse()
            .map_err(|_| anyhow::anyhow!("--security-level must be a u64 (got `{level}`)"))?;
        verifier = verifier.with_security_level(level);
    }

    let valid = match parse_flag(&args, "--expect-theorem") {
        Some(expected) => verifier.verify_with_public_inputs(&proof, &expected)?,
        None => verifier.verify_proof(&proof)?,
    };

    if valid {
        eprintln!("✓ Proof verified");
    } else {
        eprintln!("✗ Proof rejected");
    }
    Ok(valid)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(2);
        }
    }
}
