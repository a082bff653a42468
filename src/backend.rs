//! Backend protocol and lazy registry
//!
//! A backend turns `(theorem, private_axioms, metadata)` into a [`Proof`]
//! and checks proofs it produced. Two implementations exist:
//!
//! - `"simulated"` — hash-based, always available, **not** cryptographic;
//! - `"groth16"` — real zkSNARK over BN254 via an external native prover,
//!   fail-closed behind `IPFS_DATASETS_ENABLE_GROTH16`.
//!
//! Backends are loaded **lazily** on first request and cached per canonical
//! id, so importing this module never touches the Groth16 machinery and
//! repeated requests return the same shared handle. [`reset_backends`] clears
//! the cache for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use serde_json::{json, Value};
use tracing::debug;

use crate::groth16::Groth16Backend;
use crate::simulated::SimulatedBackend;
use crate::{Metadata, Proof, ZkpError};

/// Capability trait implemented by every proof backend.
pub trait ZkpBackend: Send + Sync {
    /// Stable backend identifier (`"simulated"`, `"groth16"`).
    fn backend_id(&self) -> &'static str;

    /// Generate a proof that `theorem` follows from `private_axioms`.
    fn generate_proof(
        &self,
        theorem: &str,
        private_axioms: &[String],
        metadata: &Metadata,
    ) -> Result<Proof, ZkpError>;

    /// Verify a proof produced by this backend.
    fn verify_proof(&self, proof: &Proof) -> Result<bool, ZkpError>;

    /// Diagnostic description of the backend.
    fn backend_info(&self) -> Value {
        json!({ "name": self.backend_id() })
    }
}

fn registry() -> &'static Mutex<HashMap<&'static str, Arc<dyn ZkpBackend>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<&'static str, Arc<dyn ZkpBackend>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Resolve a backend id (or alias) to a shared backend handle.
///
/// Aliases: `""`, `"sim"`, `"simulated"` → simulated; `"groth16"`, `"g16"` →
/// groth16. Construction happens on first request; later requests return the
/// cached handle. Unknown ids fail with [`ZkpError::UnknownBackend`].
pub fn get_backend(backend: &str) -> Result<Arc<dyn ZkpBackend>, ZkpError> {
    let normalized = backend.trim().to_ascii_lowercase();
    let canonical_id = match normalized.as_str() {
        "" | "sim" | "simulated" => "simulated",
        "groth16" | "g16" => "groth16",
        _ => return Err(ZkpError::UnknownBackend(format!("{backend:?}"))),
    };

    let mut map = registry().lock().expect("backend registry poisoned");
    if let Some(handle) = map.get(canonical_id) {
        return Ok(Arc::clone(handle));
    }

    debug!(backend = canonical_id, "loading ZKP backend");
    let handle: Arc<dyn ZkpBackend> = match canonical_id {
        "simulated" => Arc::new(SimulatedBackend::new()),
        "groth16" => Arc::new(Groth16Backend::new()),
        _ => unreachable!("alias table covers all canonical ids"),
    };
    map.insert(canonical_id, Arc::clone(&handle));
    Ok(handle)
}

/// Drop every cached backend instance. Test hook.
pub fn reset_backends() {
    registry().lock().expect("backend registry poisoned").clear();
}
