//! Crate root: public surface, core aliases, and protocol-wide invariants
//!
//! This crate is a zero-knowledge proof core for logic theorems: a prover
//! convinces a verifier that a theorem is derivable from a set of private
//! axioms without revealing the axioms. It covers the data path from raw
//! `(theorem, axioms)` through canonicalization, witness construction,
//! commitment, proof generation, verification, and EVM-compatible
//! public-input packing for on-chain verifier calls.
//!
//! ## Invariants (enforced across the submodules)
//!
//! - **Canonicity.** Every hash is computed over a canonical form: NFD +
//!   whitespace-collapsed text, sorted/deduplicated axiom sets, sorted-key
//!   compact JSON preimages. For any axiom list `A`,
//!   `commitment(A) == commitment(sort(dedup(normalize(A))))`.
//! - **Witness privacy.** A [`Witness`] is created by the witness manager,
//!   consumed by a backend, and discarded. It never crosses the verifier
//!   boundary; the verifier sees only the [`Statement`] bound into a proof's
//!   public inputs.
//! - **Field & hashes.** Unless explicitly configured otherwise, the scalar
//!   field is `ark_bn254::Fr` (`F` in this crate) and every digest is
//!   SHA-256. The core library performs no SNARK cryptography itself — the
//!   real Groth16 prover is an external native binary behind a strict JSON
//!   wire (see [`groth16`]), and the [`simulated`] backend is hash-based and
//!   **not** cryptographically sound.
//! - **Fail-closed Groth16.** The Groth16 backend refuses every operation
//!   unless `IPFS_DATASETS_ENABLE_GROTH16` is set to a truthy value.
//!
//! If any invariant is violated at runtime, the failure mode is a precise
//! [`ZkpError`] (never UB); verifiers reject malformed proofs with `false`
//! instead of erroring.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Backend trait, aliases, and the lazy backend registry.
pub mod backend;
/// Text normalization, axiom canonicalization, theorem/commitment hashing.
pub mod canonical;
/// Gate DAG, R1CS view, MVP + TDFOL_v1 derivation circuits.
pub mod circuit;
/// SHA-256-then-mod-Fr packing of public inputs for EVM verifiers.
pub mod evm;
/// Groth16 backend: external native prover over a strict JSON wire.
pub mod groth16;
/// Off-chain proof generation → on-chain submission pipeline.
pub mod pipeline;
/// Prover façade: canonicalized caching and backend dispatch.
pub mod prover;
/// TDFOL_v1 semantics: parser, forward-chaining fixpoint, traces.
pub mod semantics;
/// Simulated backend: hash-based, demo-only proving and verifying.
pub mod simulated;
/// Public statements, private witnesses, circuit-ref policy.
pub mod statement;
/// Verifier façade: structural checks and rejection accounting.
pub mod verifier;
/// Verifying-key hash registry keyed by `(circuit_id, version)`.
pub mod vk_registry;
/// Witness generation, validation, and consistency checking.
pub mod witness;

// ============================================================================
// Canonical aliases and root-level re-exports (centralization)
// ============================================================================

/// Scalar field used across the crate (BN254 Fr).
pub type F = ark_bn254::Fr;

/// Default security level (bits) carried in proof metadata.
pub const DEFAULT_SECURITY_LEVEL: u64 = 128;

pub use crate::backend::{get_backend, reset_backends, ZkpBackend};
pub use crate::prover::ZkpProver;
pub use crate::statement::{
    format_circuit_ref, parse_circuit_ref, parse_circuit_ref_lenient, ProofStatement, ProofType,
    Statement, Witness,
};
pub use crate::verifier::ZkpVerifier;
pub use crate::vk_registry::{compute_vk_hash, VkMaterial, VkRegistry};
pub use crate::witness::WitnessManager;

// ============================================================================
// Shared error surface
// ============================================================================

/// Errors raised by the ZKP core.
///
/// Backends raise the narrow kind that matches the failure; façades pass
/// them through unchanged. The verifier never raises on a malformed proof —
/// it returns `false` and counts the rejection.
#[derive(Debug, thiserror::Error)]
pub enum ZkpError {
    /// Empty theorem/axioms, malformed circuit reference, out-of-range seed,
    /// non-hex where hex is required.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// TDFOL_v1 parser rejected an axiom or theorem outside the fragment.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// No derivation trace exists for the declared theorem under TDFOL_v1.
    #[error("not derivable: {0}")]
    NotDerivable(String),

    /// Backend registry has no backend with this id.
    #[error("unknown ZKP backend: {0}")]
    UnknownBackend(String),

    /// Groth16 backend used without the enable flag.
    #[error("backend disabled: {0}")]
    BackendDisabled(String),

    /// Groth16 adapter could not resolve a prover binary.
    #[error("binary not available: {0}")]
    BinaryNotAvailable(String),

    /// Subprocess or RPC exceeded its time bound.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Stdin/stdout JSON failed schema validation or structural expectations.
    #[error("wire format error: {0}")]
    WireFormat(String),

    /// Proof object failed structural checks at a boundary that must error.
    #[error("malformed proof: {0}")]
    MalformedProof(String),

    /// Structured error reported by the Groth16 binary's error envelope.
    #[error("[{code}] {message}")]
    Structured {
        /// Machine-readable error code from the envelope.
        code: String,
        /// Human-readable message from the envelope.
        message: String,
    },

    /// Underlying I/O failure (binary spawn, artifact reads).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Proof object and metadata
// ============================================================================

/// Caller-supplied proof metadata with typed accessors for the keys the core
/// interprets (`seed`, `circuit_version`, `ruleset_id`, `security_level`).
///
/// Unknown keys pass through untouched so callers can attach their own
/// context; backends copy the whole map into the emitted proof.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(pub BTreeMap<String, Value>);

impl Metadata {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key, replacing any previous value.
    pub fn insert(&mut self, key: &str, value: Value) -> &mut Self {
        self.0.insert(key.to_string(), value);
        self
    }

    /// Raw access to a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn u64_key(&self, key: &str) -> Result<Option<u64>, ZkpError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| ZkpError::InvalidInput(format!("{key} must fit in u64"))),
        }
    }

    /// Deterministic-proving seed; must be a non-negative integer fitting u64.
    pub fn seed(&self) -> Result<Option<u64>, ZkpError> {
        self.u64_key("seed")
    }

    /// Declared circuit version, if any.
    pub fn circuit_version(&self) -> Result<Option<u64>, ZkpError> {
        self.u64_key("circuit_version")
    }

    /// Declared security level, if any.
    pub fn security_level(&self) -> Result<Option<u64>, ZkpError> {
        self.u64_key("security_level")
    }

    /// Declared ruleset id, if any.
    pub fn ruleset_id(&self) -> Option<String> {
        self.0.get("ruleset_id").and_then(|v| v.as_str()).map(str::to_string)
    }
}

/// A generated zero-knowledge proof.
///
/// Immutable once returned by a backend. `public_inputs` always carries at
/// least `theorem` (the caller's original string, for human inspection) and
/// `theorem_hash` (hex SHA-256 of the canonical theorem). Groth16 proofs
/// additionally carry `axioms_commitment`, `circuit_version`, `ruleset_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    /// Opaque proof bytes (backend-specific encoding).
    #[serde(with = "hex_bytes")]
    pub proof_data: Vec<u8>,
    /// Values the proof binds to, visible to the verifier.
    pub public_inputs: BTreeMap<String, Value>,
    /// Caller metadata plus backend-recorded context.
    pub metadata: Metadata,
    /// Generation time, seconds since the Unix epoch.
    pub timestamp: f64,
    /// `proof_data` length in bytes.
    pub size_bytes: usize,
}

impl Proof {
    /// Serialize to the self-describing map form (`proof_data` as hex).
    pub fn to_value(&self) -> Value {
        json!({
            "proof_data": hex::encode(&self.proof_data),
            "public_inputs": self.public_inputs,
            "metadata": self.metadata,
            "timestamp": self.timestamp,
            "size_bytes": self.size_bytes,
        })
    }

    /// Deserialize from the self-describing map form.
    pub fn from_value(value: &Value) -> Result<Self, ZkpError> {
        serde_json::from_value(value.clone())
            .map_err(|e| ZkpError::MalformedProof(format!("proof map: {e}")))
    }
}

/// Serde helper storing `proof_data` as lowercase hex.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Current time as `f64` seconds since the Unix epoch.
pub(crate) fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_round_trips_through_value() {
        let mut public_inputs = BTreeMap::new();
        public_inputs.insert("theorem".to_string(), json!("Q"));
        public_inputs.insert("theorem_hash".to_string(), json!("ab".repeat(32)));
        let mut metadata = Metadata::new();
        metadata.insert("proof_system", json!("Groth16 (simulated)"));
        let proof = Proof {
            proof_data: vec![1, 2, 3, 4],
            public_inputs,
            metadata,
            timestamp: 1_700_000_000.25,
            size_bytes: 4,
        };
        let value = proof.to_value();
        assert_eq!(value["proof_data"], "01020304");
        assert_eq!(Proof::from_value(&value).unwrap(), proof);
    }

    #[test]
    fn proof_from_value_rejects_missing_fields() {
        let value = json!({"proof_data": "00"});
        assert!(matches!(Proof::from_value(&value), Err(ZkpError::MalformedProof(_))));
    }

    #[test]
    fn proof_from_value_rejects_bad_hex() {
        let value = json!({
            "proof_data": "zz",
            "public_inputs": {},
            "metadata": {},
            "timestamp": 0.0,
            "size_bytes": 1,
        });
        assert!(Proof::from_value(&value).is_err());
    }

    #[test]
    fn metadata_typed_accessors() {
        let mut m = Metadata::new();
        m.insert("seed", json!(42));
        m.insert("ruleset_id", json!("TDFOL_v1"));
        assert_eq!(m.seed().unwrap(), Some(42));
        assert_eq!(m.ruleset_id().as_deref(), Some("TDFOL_v1"));
        assert_eq!(m.circuit_version().unwrap(), None);
    }

    #[test]
    fn metadata_rejects_out_of_range_seed() {
        let mut m = Metadata::new();
        m.insert("seed", json!(-1));
        assert!(matches!(m.seed(), Err(ZkpError::InvalidInput(_))));

        m.insert("seed", json!(1.8446744073709552e19));
        assert!(m.seed().is_err());

        m.insert("seed", json!("42"));
        assert!(m.seed().is_err());
    }
}
