//! Minimal CLI prover
//!
//! Generates a proof for a theorem over a private axiom set and writes the
//! self-describing proof JSON to stdout (or `--out <path>`).
//!
//! Usage:
//!   prover --theorem Q --axiom P --axiom "P -> Q" [--backend simulated]
//!          [--seed <u64>] [--circuit-version <u64>] [--ruleset TDFOL_v1]
//!          [--security-level <u64>] [--out proof.json]
//!
//! The Groth16 backend additionally requires IPFS_DATASETS_ENABLE_GROTH16=1
//! and a resolvable native prover binary.

#![forbid(unsafe_code)]

use std::{env, fs};

use serde_json::json;
use zktheorem::{Metadata, ZkpProver};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn parse_flag_multi(args: &[String], key: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            if let Some(v) = it.next() {
                out.push(v.clone());
            }
        }
    }
    out
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let theorem = parse_flag(&args, "--theorem")
        .ok_or_else(|| anyhow::anyhow!("--theorem is required"))?;
    let axioms = parse_flag_multi(&args, "--axiom");
    if axioms.is_empty() {
        return Err(anyhow::anyhow!("at least one --axiom is required"));
    }

    let backend = parse_flag(&args, "--backend").unwrap_or_else(|| "simulated".into());

    let mut metadata = Metadata::new();
    if let Some(seed) = parse_flag(&args, "--seed") {
        let seed: u64 = seed
            .parse()
            .map_err(|_| anyhow::anyhow!("--seed must be a u64 (got `{seed}`)"))?;
        metadata.insert("seed", json!(seed));
    }
    if let Some(version) = parse_flag(&args, "--circuit-version") {
        let version: u64 = version
            .parse()
            .map_err(|_| anyhow::anyhow!("--circuit-version must be a u64 (got `{version}`)"))?;
        metadata.insert("circuit_version", json!(version));
    }
    if let Some(ruleset) = parse_flag(&args, "--ruleset") {
        metadata.insert("ruleset_id", json!(ruleset));
    }

    let mut prover = ZkpProver::with_backend(&backend)
        .map_err(|e| anyhow::anyhow!("backend selection failed: {e}"))?;
    if let Some(level) = parse_flag(&args, "--security-level") {
        let level: u64 = level
            .parse()
            .map_err(|_| anyhow::anyhow!("--security-level must be a u64 (got `{level}`)"))?;
        prover = prover.with_security_level(level);
    }

    eprintln!("Generating proof ({} backend)...", prover.backend_id());
    let proof = prover
        .generate_proof(&theorem, &axioms, Some(metadata))
        .map_err(|e| anyhow::anyhow!("prover failed: {e}"))?;
    eprintln!(
        "✓ Proof generated: {} bytes, theorem_hash={}",
        proof.size_bytes,
        proof.public_inputs.get("theorem_hash").and_then(|v| v.as_str()).unwrap_or("?"),
    );

    let payload = serde_json::to_string_pretty(&proof.to_value())?;
    match parse_flag(&args, "--out") {
        Some(path) => {
            fs::write(&path, payload.as_bytes())
                .map_err(|e| anyhow::anyhow!("write {path}: {e}"))?;
            eprintln!("✓ Wrote {path}");
        }
        None => println!("{payload}"),
    }

    Ok(())
}
