//! Groth16 backend: external native prover over a strict JSON wire
//!
//! Real zkSNARK proving and verifying is delegated to a native `groth16`
//! binary. The adapter owns the wire contract, nothing else:
//!
//! - **Gating.** Every operation fails closed with `BackendDisabled` unless
//!   `IPFS_DATASETS_ENABLE_GROTH16` is one of `1/true/TRUE/yes/YES`.
//! - **Discovery.** The binary is resolved from `IPFS_DATASETS_GROTH16_BINARY`
//!   then `GROTH16_BINARY` (first existing wins), then a configurable list of
//!   canonical paths, then `PATH`.
//! - **Wire.** Witness JSON goes to `prove --input - --output -` on stdin;
//!   the proof JSON comes back on stdout; stderr is advisory only. `verify`
//!   reads the proof JSON from stdin and answers with its exit code
//!   (0 valid, 1 invalid, 2 error). On exit 2 the adapter parses stdout,
//!   then stderr, as a schema-validated `ErrorEnvelopeV1` and surfaces
//!   `[code] message`; anything else is surfaced as the coerced text.
//! - **Forward compatibility.** The caller's witness JSON is piped to the
//!   binary *verbatim* — unknown fields are validated around, never
//!   stripped.
//! - **Determinism.** `metadata.seed` (u64) is passed as `--seed <n>`;
//!   `GROTH16_BACKEND_DETERMINISTIC` is inherited by the child for stable
//!   timestamps in test vectors.
//!
//! Subprocess waits are bounded (default 30 s); on expiry the child is
//! killed and `Timeout` is returned.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::backend::ZkpBackend;
use crate::{canonical, semantics, Metadata, Proof, ZkpError};

/// Opt-in flag; without it every operation fails closed.
pub const ENABLE_ENV: &str = "IPFS_DATASETS_ENABLE_GROTH16";
/// Explicit binary override env vars, first existing path wins.
const BINARY_ENV_OVERRIDES: [&str; 2] = ["IPFS_DATASETS_GROTH16_BINARY", "GROTH16_BINARY"];
/// Binary name probed on `PATH`.
const BINARY_NAME: &str = "groth16";
/// Default bound for one subprocess invocation.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether the enable flag carries a truthy value.
pub fn groth16_enabled() -> bool {
    matches!(
        std::env::var(ENABLE_ENV).unwrap_or_default().trim(),
        "1" | "true" | "TRUE" | "yes" | "YES"
    )
}

fn bundled_envelope_validator() -> &'static jsonschema::Validator {
    static VALIDATOR: OnceLock<jsonschema::Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        let schema: Value = serde_json::from_str(include_str!(
            "../schemas/error_envelope_v1.schema.json"
        ))
        .expect("bundled envelope schema is valid JSON");
        jsonschema::validator_for(&schema).expect("bundled envelope schema compiles")
    })
}

/// Parse a *strictly valid* `ErrorEnvelopeV1` payload into `(code, message)`.
///
/// Anything that fails schema validation is treated as unstructured text;
/// there is deliberately no lenient parsing of binary output.
pub fn parse_error_envelope(text: &str) -> Option<(String, String)> {
    if text.trim().is_empty() {
        return None;
    }
    let payload: Value = serde_json::from_str(text).ok()?;
    if !bundled_envelope_validator().is_valid(&payload) {
        return None;
    }
    let err = payload.get("error")?;
    let code = err.get("code")?.as_str()?.to_string();
    let message = err.get("message")?.as_str()?.to_string();
    Some((code, message))
}

/// Output of one bounded subprocess run.
struct CmdOutput {
    code: Option<i32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CmdOutput {
    fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Run a command with bytes on stdin and a hard wall-clock bound.
///
/// Stdout/stderr are drained on threads so a chatty child can never block on
/// a full pipe; on timeout the child is killed before returning.
fn run_with_timeout(
    mut cmd: Command,
    stdin_bytes: &[u8],
    timeout: Duration,
) -> Result<CmdOutput, ZkpError> {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdin = child.stdin.take().expect("stdin piped");
    let mut stdout = child.stdout.take().expect("stdout piped");
    let mut stderr = child.stderr.take().expect("stderr piped");

    let stdout_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        buf
    });

    // A dead child makes this write fail with EPIPE; the exit-code handling
    // below reports the real cause, so the write error itself is ignorable.
    let _ = stdin.write_all(stdin_bytes);
    drop(stdin);

    match child.wait_timeout(timeout)? {
        Some(status) => Ok(CmdOutput {
            code: status.code(),
            stdout: stdout_reader.join().unwrap_or_default(),
            stderr: stderr_reader.join().unwrap_or_default(),
        }),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(ZkpError::Timeout(format!(
                "groth16 subprocess exceeded {}s",
                timeout.as_secs_f64()
            )))
        }
    }
}

/// Groth16 zkSNARK backend (gated external-process implementation).
#[derive(Clone, Debug)]
pub struct Groth16Backend {
    /// Explicit binary path; when set, discovery is skipped entirely.
    pub binary_path: Option<PathBuf>,
    /// Canonical locations probed after the env overrides.
    pub candidate_paths: Vec<PathBuf>,
    /// Bound for a single subprocess invocation.
    pub timeout: Duration,
}

impl Default for Groth16Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl Groth16Backend {
    /// Backend with the default candidate paths and timeout.
    pub fn new() -> Self {
        let mut candidates = vec![PathBuf::from("groth16_backend/target/release/groth16")];
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(Path::new(&home).join(".cargo").join("bin").join(BINARY_NAME));
        }
        Self { binary_path: None, candidate_paths: candidates, timeout: DEFAULT_TIMEOUT }
    }

    /// Pin an explicit binary path (no discovery fallback).
    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    /// Override the subprocess bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn ensure_enabled(&self, operation: &str) -> Result<(), ZkpError> {
        if groth16_enabled() {
            return Ok(());
        }
        Err(ZkpError::BackendDisabled(format!(
            "groth16 {operation} requires {ENABLE_ENV}=1; use the 'simulated' backend otherwise"
        )))
    }

    /// Resolve the prover binary: explicit path, env overrides, candidate
    /// list, then `PATH`.
    pub fn resolve_binary(&self) -> Result<PathBuf, ZkpError> {
        if let Some(path) = &self.binary_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(ZkpError::BinaryNotAvailable(format!(
                "configured groth16 binary does not exist: {}",
                path.display()
            )));
        }

        for env_var in BINARY_ENV_OVERRIDES {
            if let Ok(value) = std::env::var(env_var) {
                let path = PathBuf::from(&value);
                if path.exists() {
                    info!(%env_var, path = %path.display(), "using groth16 binary from env");
                    return Ok(path);
                }
                warn!(%env_var, path = %value, "env override points at a missing binary");
            }
        }

        for candidate in &self.candidate_paths {
            if candidate.exists() {
                info!(path = %candidate.display(), "found groth16 binary");
                return Ok(candidate.clone());
            }
        }

        if let Some(paths) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&paths) {
                let candidate = dir.join(BINARY_NAME);
                if candidate.is_file() {
                    info!(path = %candidate.display(), "found groth16 binary on PATH");
                    return Ok(candidate);
                }
            }
        }

        Err(ZkpError::BinaryNotAvailable(
            "no groth16 binary found; build the native prover or set \
             IPFS_DATASETS_GROTH16_BINARY/GROTH16_BINARY"
                .into(),
        ))
    }

    /// Validate the witness object the caller wants to pipe to the binary.
    ///
    /// Required fields must be present and well-typed; unknown fields are
    /// accepted untouched (forward compatibility).
    fn validate_witness(witness: &Value) -> Result<(), ZkpError> {
        let obj = witness
            .as_object()
            .ok_or_else(|| ZkpError::WireFormat("witness must be a JSON object".into()))?;

        for field in [
            "private_axioms",
            "theorem",
            "axioms_commitment_hex",
            "theorem_hash_hex",
            "circuit_version",
            "ruleset_id",
        ] {
            if !obj.contains_key(field) {
                return Err(ZkpError::WireFormat(format!("missing witness field: {field}")));
            }
        }

        let axioms = obj["private_axioms"]
            .as_array()
            .ok_or_else(|| ZkpError::WireFormat("private_axioms must be a list".into()))?;
        if axioms.is_empty() || !axioms.iter().all(Value::is_string) {
            return Err(ZkpError::WireFormat(
                "private_axioms must be a non-empty list of strings".into(),
            ));
        }

        if obj["theorem"].as_str().map(str::is_empty).unwrap_or(true) {
            return Err(ZkpError::WireFormat("theorem cannot be empty".into()));
        }

        if obj["circuit_version"].as_u64().is_none() {
            return Err(ZkpError::WireFormat(
                "circuit_version must be a non-negative integer".into(),
            ));
        }

        if let Some(sl) = obj.get("security_level") {
            if !sl.is_null() && sl.as_u64().is_none() {
                return Err(ZkpError::WireFormat(
                    "security_level must be a non-negative integer".into(),
                ));
            }
        }

        Ok(())
    }

    fn exit_error(&self, operation: &str, output: &CmdOutput) -> ZkpError {
        let stdout_text = output.stdout_text();
        let stderr_text = output.stderr_text();

        if let Some((code, message)) =
            parse_error_envelope(&stdout_text).or_else(|| parse_error_envelope(&stderr_text))
        {
            return ZkpError::Structured { code, message };
        }

        let detail = if stderr_text.is_empty() { stdout_text } else { stderr_text };
        ZkpError::WireFormat(format!(
            "groth16 {operation} failed (exit={:?}): {detail}",
            output.code
        ))
    }

    /// Generate a proof from a caller-built witness JSON string.
    ///
    /// The string is piped to the binary verbatim after validation, so
    /// forward-compatible extra fields survive the hop.
    pub fn prove_witness_json(
        &self,
        witness_json: &str,
        seed: Option<u64>,
    ) -> Result<Proof, ZkpError> {
        self.ensure_enabled("proof generation")?;
        let binary = self.resolve_binary()?;

        let witness: Value = serde_json::from_str(witness_json)
            .map_err(|e| ZkpError::WireFormat(format!("witness JSON: {e}")))?;
        Self::validate_witness(&witness)?;

        let mut cmd = Command::new(&binary);
        cmd.args(["prove", "--input", "-", "--output", "-"]);
        if let Some(seed) = seed {
            cmd.args(["--seed", &seed.to_string()]);
        }
        debug!(binary = %binary.display(), seed, "invoking groth16 prove");

        let output = run_with_timeout(cmd, witness_json.as_bytes(), self.timeout)?;
        match output.code {
            Some(0) => {
                let payload: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
                    ZkpError::WireFormat(format!("invalid proof JSON from binary: {e}"))
                })?;
                Self::parse_proof_output(&payload, &witness)
            }
            _ => Err(self.exit_error("proof generation", &output)),
        }
    }

    /// Wrap the binary's proof JSON into a [`Proof`], re-exposing the public
    /// inputs from the witness under stable keys.
    fn parse_proof_output(payload: &Value, witness: &Value) -> Result<Proof, ZkpError> {
        let obj = payload
            .as_object()
            .ok_or_else(|| ZkpError::WireFormat("proof payload must be a JSON object".into()))?;
        for field in ["proof_a", "proof_b", "proof_c", "public_inputs"] {
            if !obj.contains_key(field) {
                return Err(ZkpError::WireFormat(format!("missing proof field: {field}")));
            }
        }
        if !obj["public_inputs"].is_array() {
            return Err(ZkpError::WireFormat("public_inputs must be an array".into()));
        }

        let mut public_inputs = BTreeMap::new();
        public_inputs.insert(
            "theorem".to_string(),
            witness.get("theorem").cloned().unwrap_or(Value::Null),
        );
        public_inputs.insert(
            "theorem_hash".to_string(),
            witness.get("theorem_hash_hex").cloned().unwrap_or(Value::Null),
        );
        public_inputs.insert(
            "axioms_commitment".to_string(),
            witness.get("axioms_commitment_hex").cloned().unwrap_or(Value::Null),
        );
        public_inputs.insert(
            "circuit_version".to_string(),
            witness.get("circuit_version").cloned().unwrap_or(Value::Null),
        );
        public_inputs.insert(
            "ruleset_id".to_string(),
            witness.get("ruleset_id").cloned().unwrap_or(Value::Null),
        );

        let mut metadata = Metadata::new();
        metadata.insert("backend", json!("groth16"));
        metadata.insert("curve", json!("BN254"));
        metadata.insert("version", obj.get("version").cloned().unwrap_or(json!(1)));
        metadata.insert(
            "security_level",
            witness.get("security_level").cloned().unwrap_or(json!(0)),
        );

        let proof_data = serde_json::to_vec(payload)
            .map_err(|e| ZkpError::WireFormat(format!("re-encoding proof payload: {e}")))?;
        let size_bytes = proof_data.len();
        let timestamp = obj.get("timestamp").and_then(Value::as_f64).unwrap_or(0.0);

        Ok(Proof { proof_data, public_inputs, metadata, timestamp, size_bytes })
    }

    /// Check (or create) the trusted-setup artifacts for a circuit version.
    ///
    /// Returns `{"status": "already_exists", "version": n}` when both key
    /// files are present under the binary's artifact layout; otherwise runs
    /// `setup --version <n> [--seed <n>]` and returns the binary's report.
    /// A process-wide lock guarantees setup never runs concurrently for the
    /// same version.
    pub fn ensure_setup(&self, version: u64, seed: Option<u64>) -> Result<Value, ZkpError> {
        static SETUP_LOCK: Mutex<()> = Mutex::new(());

        self.ensure_enabled("setup")?;
        let binary = self.resolve_binary()?;
        let artifact_dir = binary
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("artifacts")
            .join(format!("v{version}"));

        let keys_present = artifact_dir.join("proving_key.bin").exists()
            && artifact_dir.join("verifying_key.bin").exists();
        if keys_present {
            return Ok(json!({ "status": "already_exists", "version": version }));
        }

        let _guard = SETUP_LOCK.lock().expect("setup lock poisoned");
        // Another thread may have completed the setup while we waited.
        if artifact_dir.join("proving_key.bin").exists()
            && artifact_dir.join("verifying_key.bin").exists()
        {
            return Ok(json!({ "status": "already_exists", "version": version }));
        }

        let mut cmd = Command::new(&binary);
        cmd.args(["setup", "--version", &version.to_string()]);
        if let Some(seed) = seed {
            cmd.args(["--seed", &seed.to_string()]);
        }
        info!(binary = %binary.display(), version, "running groth16 trusted setup");

        let output = run_with_timeout(cmd, &[], self.timeout)?;
        match output.code {
            Some(0) => serde_json::from_slice(&output.stdout)
                .map_err(|e| ZkpError::WireFormat(format!("invalid setup report: {e}"))),
            _ => Err(self.exit_error("setup", &output)),
        }
    }

    /// Build the wire witness for `(theorem, axioms, metadata)` under the
    /// adapter's circuit-version policy.
    fn build_witness(
        &self,
        theorem: &str,
        private_axioms: &[String],
        metadata: &Metadata,
    ) -> Result<Value, ZkpError> {
        let canonical_axioms = canonical::canonicalize_axioms(private_axioms);
        let circuit_version = metadata.circuit_version()?.unwrap_or(1);
        let ruleset_id = metadata.ruleset_id().unwrap_or_else(|| "TDFOL_v1".to_string());

        let (axioms_commitment_hex, intermediate_steps) =
            if circuit_version >= 2 && ruleset_id == "TDFOL_v1" {
                let commitment = canonical::tdfol_v1_axioms_commitment_hex_v2(&canonical_axioms);
                let trace = semantics::derive_tdfol_v1_trace(&canonical_axioms, theorem)?
                    .ok_or_else(|| {
                        ZkpError::NotDerivable(format!(
                            "theorem {theorem:?} has no TDFOL_v1 derivation trace for \
                             circuit_version={circuit_version}"
                        ))
                    })?;
                (commitment, trace)
            } else {
                (canonical::axioms_commitment_hex(&canonical_axioms), Vec::new())
            };

        Ok(json!({
            "private_axioms": canonical_axioms,
            // The caller's theorem text is preserved in public inputs;
            // hashing canonicalizes independently.
            "theorem": theorem,
            "intermediate_steps": intermediate_steps,
            "axioms_commitment_hex": axioms_commitment_hex,
            "theorem_hash_hex": canonical::theorem_hash_hex(theorem),
            "security_level": metadata.security_level()?.unwrap_or(0),
            "circuit_version": circuit_version,
            "ruleset_id": ruleset_id,
        }))
    }
}

impl ZkpBackend for Groth16Backend {
    fn backend_id(&self) -> &'static str {
        "groth16"
    }

    fn generate_proof(
        &self,
        theorem: &str,
        private_axioms: &[String],
        metadata: &Metadata,
    ) -> Result<Proof, ZkpError> {
        self.ensure_enabled("proof generation")?;
        if theorem.is_empty() {
            return Err(ZkpError::InvalidInput("theorem cannot be empty".into()));
        }
        if private_axioms.is_empty() {
            return Err(ZkpError::InvalidInput("at least one axiom required".into()));
        }

        let seed = metadata.seed()?;
        let witness = self.build_witness(theorem, private_axioms, metadata)?;
        let witness_json = serde_json::to_string(&witness)
            .map_err(|e| ZkpError::WireFormat(format!("witness serialization: {e}")))?;
        self.prove_witness_json(&witness_json, seed)
    }

    fn verify_proof(&self, proof: &Proof) -> Result<bool, ZkpError> {
        self.ensure_enabled("verification")?;
        let binary = self.resolve_binary()?;

        // Groth16 proof_data is the binary's proof JSON, verbatim.
        let proof_json = std::str::from_utf8(&proof.proof_data).map_err(|_| {
            ZkpError::MalformedProof("groth16 proof_data is not JSON-encoded UTF-8".into())
        })?;
        if serde_json::from_str::<Value>(proof_json).is_err() {
            return Err(ZkpError::MalformedProof(
                "groth16 proof_data does not parse as JSON".into(),
            ));
        }

        let mut cmd = Command::new(&binary);
        cmd.args(["verify", "--proof", "-"]);
        debug!(binary = %binary.display(), "invoking groth16 verify");

        let output = run_with_timeout(cmd, proof_json.as_bytes(), self.timeout)?;
        match output.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(self.exit_error("verification", &output)),
        }
    }

    fn backend_info(&self) -> Value {
        let binary = self.resolve_binary().ok();
        json!({
            "name": "groth16",
            "type": "real_zksnark",
            "curve": "BN254",
            "proof_system": "Groth16",
            "enabled": groth16_enabled(),
            "binary_path": binary.as_ref().map(|p| p.display().to_string()),
            "timeout_seconds": self.timeout.as_secs_f64(),
            "status": if binary.is_some() { "ready" } else { "not_available" },
        })
    }
}

/// Tests across the crate that touch `IPFS_DATASETS_ENABLE_GROTH16` must
/// serialize on this lock; `cargo test` runs test functions concurrently.
#[cfg(test)]
pub(crate) fn test_env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
