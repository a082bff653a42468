//! Simulated proof backend (hash-based, demo-only)
//!
//! The default backend for tests, demos, and educational use. Proofs are
//! SHA-256 commitments with a random tail — **NOT cryptographically sound**
//! and trivially forgeable by anyone who has seen the axioms. What the
//! backend does guarantee is *exact, reproducible structure*, so independent
//! implementations match byte-for-byte:
//!
//! ```text
//! circuit_hash = SHA256(canonical_json({theorem, num_axioms, axiom_hashes}))
//! witness_hash = SHA256(canonical_json([normalized axioms...]))
//! proof_data   = SHA256(circuit_hash || witness_hash || theorem_canonical)
//!                || 128 random bytes            (exactly 160 bytes total)
//! ```
//!
//! Verification checks the public-input structure, the theorem hash (the
//! legacy unnormalized form is still accepted for old proofs), the size
//! bounds, and the presence of `metadata.proof_system`. It is total: a
//! malformed proof yields `false`, never an error.

use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::backend::ZkpBackend;
use crate::{canonical, Metadata, Proof, ZkpError};

/// Exact proof size emitted by this backend.
const PROOF_SIZE_BYTES: usize = 160;
/// Verifier-side structural bounds (kept looser than the generator's fixed
/// size for compatibility with older emitters).
const MIN_PROOF_SIZE: usize = 100;
const MAX_PROOF_SIZE: usize = 300;

/// Hash-based demo backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulatedBackend;

impl SimulatedBackend {
    pub fn new() -> Self {
        Self
    }

    /// Stable hash of the (simulated) circuit for a theorem/axiom-set shape.
    fn hash_circuit(theorem: &str, axioms: &[String]) -> [u8; 32] {
        let normalized_theorem = canonical::normalize(theorem);
        let axiom_hashes: Vec<String> = axioms
            .iter()
            .map(|a| hex::encode(Sha256::digest(canonical::normalize(a).as_bytes())))
            .collect();
        let preimage = canonical::canonical_json(&json!({
            "theorem": normalized_theorem,
            "num_axioms": axioms.len(),
            "axiom_hashes": axiom_hashes,
        }));
        Sha256::digest(preimage.as_bytes()).into()
    }

    /// Hash of the normalized axioms in caller order.
    fn compute_witness(axioms: &[String]) -> [u8; 32] {
        let normalized: Vec<String> = axioms.iter().map(|a| canonical::normalize(a)).collect();
        let preimage = canonical::canonical_json(&json!(normalized));
        Sha256::digest(preimage.as_bytes()).into()
    }

    fn simulate_proof(circuit_hash: &[u8; 32], witness: &[u8; 32], theorem: &str) -> Vec<u8> {
        let mut proof_inputs = Vec::with_capacity(64 + theorem.len());
        proof_inputs.extend_from_slice(circuit_hash);
        proof_inputs.extend_from_slice(witness);
        proof_inputs.extend_from_slice(canonical::normalize(theorem).as_bytes());
        let proof_hash: [u8; 32] = Sha256::digest(&proof_inputs).into();

        let mut tail = [0u8; PROOF_SIZE_BYTES - 32];
        OsRng.fill_bytes(&mut tail);

        let mut proof_data = Vec::with_capacity(PROOF_SIZE_BYTES);
        proof_data.extend_from_slice(&proof_hash);
        proof_data.extend_from_slice(&tail);
        proof_data
    }
}

impl ZkpBackend for SimulatedBackend {
    fn backend_id(&self) -> &'static str {
        "simulated"
    }

    fn generate_proof(
        &self,
        theorem: &str,
        private_axioms: &[String],
        metadata: &Metadata,
    ) -> Result<Proof, ZkpError> {
        if theorem.is_empty() {
            return Err(ZkpError::InvalidInput("theorem cannot be empty".into()));
        }
        if private_axioms.is_empty() {
            return Err(ZkpError::InvalidInput("at least one axiom required".into()));
        }

        let circuit_hash = Self::hash_circuit(theorem, private_axioms);
        let witness = Self::compute_witness(private_axioms);
        let proof_data = Self::simulate_proof(&circuit_hash, &witness, theorem);
        debug!(num_axioms = private_axioms.len(), "simulated proof generated");

        let mut public_inputs = std::collections::BTreeMap::new();
        public_inputs.insert("theorem".to_string(), json!(theorem));
        public_inputs
            .insert("theorem_hash".to_string(), json!(canonical::theorem_hash_hex(theorem)));

        let mut out_metadata = metadata.clone();
        out_metadata.insert("proof_system", json!("Groth16 (simulated)"));
        out_metadata.insert("num_axioms", json!(private_axioms.len()));

        let size_bytes = proof_data.len();
        Ok(Proof {
            proof_data,
            public_inputs,
            metadata: out_metadata,
            timestamp: crate::now_timestamp(),
            size_bytes,
        })
    }

    fn verify_proof(&self, proof: &Proof) -> Result<bool, ZkpError> {
        let theorem = match proof.public_inputs.get("theorem").and_then(Value::as_str) {
            Some(t) => t,
            None => return Ok(false),
        };
        let theorem_hash = match proof.public_inputs.get("theorem_hash").and_then(Value::as_str) {
            Some(h) => h,
            None => return Ok(false),
        };

        let expected = canonical::theorem_hash_hex(theorem);
        let legacy = hex::encode(Sha256::digest(theorem.as_bytes()));
        if theorem_hash != expected && theorem_hash != legacy {
            return Ok(false);
        }

        if proof.size_bytes < MIN_PROOF_SIZE || proof.size_bytes > MAX_PROOF_SIZE {
            return Ok(false);
        }

        if !proof.metadata.contains_key("proof_system") {
            return Ok(false);
        }

        Ok(true)
    }

    fn backend_info(&self) -> Value {
        json!({
            "name": "simulated",
            "type": "hash_based_simulation",
            "proof_system": "Groth16 (simulated)",
            "cryptographically_sound": false,
        })
    }
}
