//! Verifier façade: structural checks and rejection accounting
//!
//! `ZkpVerifier` confirms proofs without ever seeing the private axioms. Its
//! contract with callers is strict: **verification never errors on a
//! malformed proof** — structural problems (missing fields, out-of-bounds
//! size, a backend's `MalformedProof`) yield `false` and bump the rejection
//! counter. Only failures unrelated to the proof itself (a disabled backend,
//! a missing binary, a subprocess timeout) propagate as errors.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use crate::backend::{get_backend, ZkpBackend};
use crate::{Proof, ZkpError, DEFAULT_SECURITY_LEVEL};

/// Verifier statistics snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VerifierStats {
    /// Proofs accepted.
    pub proofs_verified: u64,
    /// Proofs rejected (structural or backend).
    pub proofs_rejected: u64,
}

impl VerifierStats {
    /// Fraction of checked proofs that were accepted.
    pub fn acceptance_rate(&self) -> f64 {
        let total = self.proofs_verified + self.proofs_rejected;
        if total == 0 {
            0.0
        } else {
            self.proofs_verified as f64 / total as f64
        }
    }
}

/// Verify zero-knowledge proofs for logic theorems.
pub struct ZkpVerifier {
    security_level: u64,
    backend: Arc<dyn ZkpBackend>,
    stats: Mutex<VerifierStats>,
}

impl ZkpVerifier {
    /// Verifier over the default (`simulated`) backend.
    pub fn new() -> Result<Self, ZkpError> {
        Self::with_backend("simulated")
    }

    /// Verifier over a named backend.
    pub fn with_backend(backend: &str) -> Result<Self, ZkpError> {
        Ok(Self {
            security_level: DEFAULT_SECURITY_LEVEL,
            backend: get_backend(backend)?,
            stats: Mutex::new(VerifierStats::default()),
        })
    }

    /// Override the minimum accepted `metadata.security_level`.
    pub fn with_security_level(mut self, security_level: u64) -> Self {
        self.security_level = security_level;
        self
    }

    /// Structural sanity of the proof object, independent of the backend.
    fn validate_proof_structure(&self, proof: &Proof) -> bool {
        if proof.proof_data.is_empty() || proof.public_inputs.is_empty() {
            return false;
        }
        if proof.size_bytes < 100 || proof.size_bytes > 300 {
            return false;
        }
        let proof_security = proof
            .metadata
            .get("security_level")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        proof_security >= self.security_level
    }

    fn record(&self, accepted: bool) -> bool {
        let mut stats = self.stats.lock().expect("stats poisoned");
        if accepted {
            stats.proofs_verified += 1;
        } else {
            stats.proofs_rejected += 1;
        }
        accepted
    }

    /// Verify a proof.
    ///
    /// Returns `Ok(false)` (never an error) for proofs that fail structural
    /// checks or that the backend reports as malformed. Environment failures
    /// (`BackendDisabled`, `BinaryNotAvailable`, `Timeout`, wire errors)
    /// propagate unchanged.
    pub fn verify_proof(&self, proof: &Proof) -> Result<bool, ZkpError> {
        if !self.validate_proof_structure(proof) {
            debug!("proof rejected by structural checks");
            return Ok(self.record(false));
        }

        match self.backend.verify_proof(proof) {
            Ok(accepted) => Ok(self.record(accepted)),
            Err(ZkpError::MalformedProof(reason)) => {
                debug!(%reason, "backend reported malformed proof");
                Ok(self.record(false))
            }
            Err(other) => Err(other),
        }
    }

    /// Verify a proof and additionally require its public `theorem` to equal
    /// `expected_theorem`.
    pub fn verify_with_public_inputs(
        &self,
        proof: &Proof,
        expected_theorem: &str,
    ) -> Result<bool, ZkpError> {
        if !self.verify_proof(proof)? {
            return Ok(false);
        }
        let matches = proof
            .public_inputs
            .get("theorem")
            .and_then(Value::as_str)
            .map(|t| t == expected_theorem)
            .unwrap_or(false);
        Ok(matches)
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> VerifierStats {
        self.stats.lock().expect("stats poisoned").clone()
    }

    /// Zero the counters.
    pub fn reset_stats(&self) {
        *self.stats.lock().expect("stats poisoned") = VerifierStats::default();
    }
}

/// One-shot verification for callers that hold a proof and a backend id but
/// no long-lived verifier.
pub fn verify_proof_with_backend(backend: &str, proof: &Proof) -> Result<bool, ZkpError> {
    let verifier = ZkpVerifier::with_backend(backend)?;
    verifier.verify_proof(proof)
}
