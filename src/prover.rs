//! Prover façade: canonicalized caching over pluggable backends
//!
//! `ZkpProver` is the high-level entry point for generating proofs. It
//! validates inputs, dispatches to the configured backend, and caches
//! results under a **canonicalized** key, so equivalent calls (same axioms
//! in a different order, same theorem with different whitespace) hit the
//! cache. Because the key is canonical, a cached proof may carry a theorem
//! string different from the current caller's; cache hits are re-adapted so
//! `public_inputs.theorem` always reflects the exact string the caller
//! passed.
//!
//! The cache key folds in every caller-controlled input that can change the
//! proof bytes: canonical theorem, canonical axioms, the prover's security
//! level, and the `seed` / `circuit_version` / `ruleset_id` metadata keys.
//!
//! The façade is safe for concurrent use: the proof cache sits behind an
//! `RwLock` (reads never serialize), and stats behind a dedicated mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::backend::{get_backend, ZkpBackend};
use crate::{canonical, Metadata, Proof, ZkpError, DEFAULT_SECURITY_LEVEL};

/// Prover statistics snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProverStats {
    /// Proofs generated by the backend (cache misses).
    pub proofs_generated: u64,
    /// Calls answered from the cache.
    pub cache_hits: u64,
    /// Total backend proving time, seconds.
    pub total_proving_time: f64,
}

impl ProverStats {
    /// Mean backend proving time, seconds.
    pub fn avg_proving_time(&self) -> f64 {
        if self.proofs_generated == 0 {
            0.0
        } else {
            self.total_proving_time / self.proofs_generated as f64
        }
    }

    /// Fraction of calls answered from cache.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.proofs_generated + self.cache_hits;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Generate zero-knowledge proofs for logic theorems.
pub struct ZkpProver {
    security_level: u64,
    enable_caching: bool,
    backend: Arc<dyn ZkpBackend>,
    cache: RwLock<HashMap<String, Proof>>,
    stats: Mutex<ProverStats>,
}

impl ZkpProver {
    /// Prover over the default (`simulated`) backend.
    pub fn new() -> Result<Self, ZkpError> {
        Self::with_backend("simulated")
    }

    /// Prover over a named backend (see the backend registry for aliases).
    pub fn with_backend(backend: &str) -> Result<Self, ZkpError> {
        Ok(Self {
            security_level: DEFAULT_SECURITY_LEVEL,
            enable_caching: true,
            backend: get_backend(backend)?,
            cache: RwLock::new(HashMap::new()),
            stats: Mutex::new(ProverStats::default()),
        })
    }

    /// Override the security level folded into metadata and cache keys.
    pub fn with_security_level(mut self, security_level: u64) -> Self {
        self.security_level = security_level;
        self
    }

    /// Disable the proof cache.
    pub fn without_caching(mut self) -> Self {
        self.enable_caching = false;
        self
    }

    /// Identifier of the backend this prover dispatches to.
    pub fn backend_id(&self) -> &'static str {
        self.backend.backend_id()
    }

    /// Generate a zero-knowledge proof that `theorem` follows from
    /// `private_axioms`, which stay private.
    pub fn generate_proof(
        &self,
        theorem: &str,
        private_axioms: &[String],
        metadata: Option<Metadata>,
    ) -> Result<Proof, ZkpError> {
        if theorem.is_empty() {
            return Err(ZkpError::InvalidInput("theorem cannot be empty".into()));
        }
        if private_axioms.is_empty() {
            return Err(ZkpError::InvalidInput("at least one axiom required".into()));
        }

        let metadata = metadata.unwrap_or_default();
        let cache_key = self.compute_cache_key(theorem, private_axioms, &metadata)?;

        if self.enable_caching {
            let cached = self
                .cache
                .read()
                .expect("proof cache poisoned")
                .get(&cache_key)
                .cloned();
            if let Some(proof) = cached {
                debug!(%cache_key, "proof cache hit");
                self.stats.lock().expect("stats poisoned").cache_hits += 1;
                return Ok(Self::adapt_cached_proof(proof, theorem));
            }
        }

        let started = std::time::Instant::now();
        let mut backend_metadata = metadata;
        backend_metadata.insert("security_level", json!(self.security_level));
        let proof = self.backend.generate_proof(theorem, private_axioms, &backend_metadata)?;
        let elapsed = started.elapsed().as_secs_f64();

        {
            let mut stats = self.stats.lock().expect("stats poisoned");
            stats.proofs_generated += 1;
            stats.total_proving_time += elapsed;
        }

        if self.enable_caching {
            self.cache
                .write()
                .expect("proof cache poisoned")
                .insert(cache_key, proof.clone());
        }

        Ok(proof)
    }

    /// Return a cached proof adapted to the current call.
    ///
    /// Cache keys are canonicalized, so several equivalent theorem strings
    /// map to one cached proof; the returned copy carries the caller's exact
    /// theorem text (and a recomputed hash when the text differs).
    fn adapt_cached_proof(proof: Proof, theorem: &str) -> Proof {
        match proof.public_inputs.get("theorem").and_then(Value::as_str) {
            Some(cached_theorem) if cached_theorem != theorem => {
                let mut adapted = proof;
                adapted
                    .public_inputs
                    .insert("theorem".to_string(), json!(theorem));
                if adapted.public_inputs.contains_key("theorem_hash") {
                    adapted.public_inputs.insert(
                        "theorem_hash".to_string(),
                        json!(canonical::theorem_hash_hex(theorem)),
                    );
                }
                adapted
            }
            _ => proof,
        }
    }

    /// Cache key over every input that can change the proof bytes.
    fn compute_cache_key(
        &self,
        theorem: &str,
        axioms: &[String],
        metadata: &Metadata,
    ) -> Result<String, ZkpError> {
        let mut meta_ctx = serde_json::Map::new();
        meta_ctx.insert("security_level".to_string(), json!(self.security_level));
        if let Some(seed) = metadata.seed()? {
            meta_ctx.insert("seed".to_string(), json!(seed));
        }
        if let Some(version) = metadata.circuit_version()? {
            meta_ctx.insert("circuit_version".to_string(), json!(version));
        }
        if let Some(ruleset) = metadata.ruleset_id() {
            meta_ctx.insert("ruleset_id".to_string(), json!(ruleset));
        }

        let key_data = canonical::canonical_json(&json!({
            "theorem": canonical::canonicalize_theorem(theorem),
            "axioms": canonical::canonicalize_axioms(axioms),
            "meta": meta_ctx,
        }));
        Ok(hex::encode(Sha256::digest(key_data.as_bytes())))
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> ProverStats {
        self.stats.lock().expect("stats poisoned").clone()
    }

    /// Drop all cached proofs.
    pub fn clear_cache(&self) {
        self.cache.write().expect("proof cache poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axioms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn prover() -> ZkpProver {
        ZkpProver::new().unwrap()
    }

    #[test]
    fn generates_simulated_proof() {
        let p = prover();
        let proof = p.generate_proof("Q", &axioms(&["P", "P -> Q"]), None).unwrap();
        assert_eq!(proof.size_bytes, 160);
        assert_eq!(proof.public_inputs["theorem"], "Q");
        assert_eq!(proof.metadata.get("security_level"), Some(&json!(128)));
        assert_eq!(p.stats().proofs_generated, 1);
    }

    #[test]
    fn rejects_empty_inputs() {
        let p = prover();
        assert!(matches!(
            p.generate_proof("", &axioms(&["P"]), None),
            Err(ZkpError::InvalidInput(_))
        ));
        assert!(matches!(
            p.generate_proof("Q", &[], None),
            Err(ZkpError::InvalidInput(_))
        ));
    }

    #[test]
    fn cache_hits_on_identical_calls() {
        let p = prover();
        let first = p.generate_proof("Q", &axioms(&["P", "P -> Q"]), None).unwrap();
        let second = p.generate_proof("Q", &axioms(&["P", "P -> Q"]), None).unwrap();
        assert_eq!(first, second);
        let stats = p.stats();
        assert_eq!(stats.proofs_generated, 1);
        assert_eq!(stats.cache_hits, 1);
        assert!(stats.cache_hit_rate() > 0.49);
    }

    #[test]
    fn cache_key_is_order_and_whitespace_insensitive() {
        let p = prover();
        p.generate_proof("Q", &axioms(&["P", "P -> Q"]), None).unwrap();
        p.generate_proof("  Q  ", &axioms(&["P -> Q", "P"]), None).unwrap();
        assert_eq!(p.stats().cache_hits, 1);
    }

    #[test]
    fn cached_proof_is_adapted_to_caller_theorem() {
        let p = prover();
        p.generate_proof("Q", &axioms(&["P", "P -> Q"]), None).unwrap();
        let adapted = p.generate_proof("  Q ", &axioms(&["P", "P -> Q"]), None).unwrap();
        // The caller's exact string is reflected back, with a hash computed
        // from it (canonicalization makes both hashes equal here).
        assert_eq!(adapted.public_inputs["theorem"], "  Q ");
        assert_eq!(
            adapted.public_inputs["theorem_hash"],
            json!(canonical::theorem_hash_hex("Q"))
        );
    }

    #[test]
    fn seed_and_version_change_the_cache_key() {
        let p = prover();
        p.generate_proof("Q", &axioms(&["P", "P -> Q"]), None).unwrap();

        let mut seeded = Metadata::new();
        seeded.insert("seed", json!(7));
        p.generate_proof("Q", &axioms(&["P", "P -> Q"]), Some(seeded)).unwrap();

        let mut versioned = Metadata::new();
        versioned.insert("circuit_version", json!(2));
        // Simulated backend ignores the version, but the cache must not.
        p.generate_proof("Q", &axioms(&["P", "P -> Q"]), Some(versioned)).unwrap();

        let stats = p.stats();
        assert_eq!(stats.proofs_generated, 3);
        assert_eq!(stats.cache_hits, 0);
    }

    #[test]
    fn invalid_seed_is_rejected_before_dispatch() {
        let p = prover();
        let mut metadata = Metadata::new();
        metadata.insert("seed", json!(-5));
        assert!(matches!(
            p.generate_proof("Q", &axioms(&["P"]), Some(metadata)),
            Err(ZkpError::InvalidInput(_))
        ));
    }

    #[test]
    fn clear_cache_forces_regeneration() {
        let p = prover();
        p.generate_proof("Q", &axioms(&["P"]), None).unwrap();
        p.clear_cache();
        p.generate_proof("Q", &axioms(&["P"]), None).unwrap();
        assert_eq!(p.stats().proofs_generated, 2);
    }

    #[test]
    fn caching_can_be_disabled() {
        let p = ZkpProver::new().unwrap().without_caching();
        p.generate_proof("Q", &axioms(&["P"]), None).unwrap();
        p.generate_proof("Q", &axioms(&["P"]), None).unwrap();
        let stats = p.stats();
        assert_eq!(stats.proofs_generated, 2);
        assert_eq!(stats.cache_hits, 0);
    }
}
