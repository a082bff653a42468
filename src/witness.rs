//! Witness generation, validation, and consistency checking
//!
//! The witness manager is the only component that builds [`Witness`] values.
//! It canonicalizes the axiom set, computes the commitment for the declared
//! circuit version, and — for `TDFOL_v1` version >= 2 — derives the
//! forward-chaining trace that the derivation circuit will check.
//!
//! Generated witnesses are cached by commitment hex behind a mutex so the
//! manager can be shared across threads; the cache is write-through and a
//! miss never blocks readers of other keys for longer than the map insert.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::circuit::{MvpCircuit, TdfolV1DerivationCircuit};
use crate::statement::{expected_commitment_hex, ProofStatement, ProofType, Statement, Witness};
use crate::{canonical, semantics, ZkpError};

/// Default circuit id for knowledge-of-axioms statements.
pub const DEFAULT_CIRCUIT_ID: &str = "knowledge_of_axioms";

/// Manages ZKP witness generation and validation.
#[derive(Debug, Default)]
pub struct WitnessManager {
    cache: Mutex<HashMap<String, Witness>>,
}

impl WitnessManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a witness proving knowledge of `axioms` for `theorem`.
    ///
    /// Axioms are canonicalized and committed. For `circuit_version >= 2`
    /// with the `TDFOL_v1` ruleset and no caller-supplied steps, a derivation
    /// trace is computed (empty if the theorem is underivable or already a
    /// base fact — the v2 circuit itself decides whether that is acceptable).
    ///
    /// Fails with `InvalidInput` if `axioms` is empty.
    pub fn generate_witness(
        &self,
        axioms: &[String],
        theorem: &str,
        intermediate_steps: Option<Vec<String>>,
        circuit_version: u64,
        ruleset_id: &str,
    ) -> Result<Witness, ZkpError> {
        if axioms.is_empty() {
            return Err(ZkpError::InvalidInput(
                "cannot generate witness: axioms cannot be empty".into(),
            ));
        }

        let canonical_axioms = canonical::canonicalize_axioms(axioms);
        let commitment_hex =
            expected_commitment_hex(&canonical_axioms, circuit_version, ruleset_id);

        let steps = match intermediate_steps {
            Some(steps) => steps,
            None if circuit_version >= 2 && ruleset_id == "TDFOL_v1" => {
                semantics::derive_tdfol_v1_trace(&canonical_axioms, theorem)?.unwrap_or_default()
            }
            None => Vec::new(),
        };

        let witness = Witness {
            axioms: canonical_axioms,
            theorem: theorem.to_string(),
            intermediate_steps: steps,
            axioms_commitment_hex: commitment_hex.clone(),
            circuit_version,
            ruleset_id: ruleset_id.to_string(),
        };

        debug!(commitment = %commitment_hex, circuit_version, "witness generated");
        self.cache
            .lock()
            .expect("witness cache poisoned")
            .insert(commitment_hex, witness.clone());

        Ok(witness)
    }

    /// Validate witness structure and, optionally, its axiom set.
    ///
    /// Checks: non-empty axioms, well-formed commitment, commitment
    /// recomputation, and (when given) the expected axiom count / axiom set
    /// after canonicalization.
    pub fn validate_witness(
        &self,
        witness: &Witness,
        expected_axiom_count: Option<usize>,
        expected_axioms: Option<&[String]>,
    ) -> bool {
        if witness.axioms.is_empty() || witness.axioms_commitment_hex.len() != 64 {
            return false;
        }
        if let Some(count) = expected_axiom_count {
            if witness.axioms.len() != count {
                return false;
            }
        }
        if let Some(expected) = expected_axioms {
            if canonical::canonicalize_axioms(expected)
                != canonical::canonicalize_axioms(&witness.axioms)
            {
                return false;
            }
        }
        let recomputed = expected_commitment_hex(
            &witness.axioms,
            witness.circuit_version,
            &witness.ruleset_id,
        );
        recomputed == witness.axioms_commitment_hex
    }

    /// Build the public [`ProofStatement`] for a witness.
    pub fn create_proof_statement(
        &self,
        witness: &Witness,
        theorem: &str,
        circuit_id: &str,
    ) -> ProofStatement {
        let statement = Statement {
            theorem_hash: canonical::theorem_hash_hex(theorem),
            axioms_commitment: witness.axioms_commitment_hex.clone(),
            circuit_version: witness.circuit_version,
            ruleset_id: witness.ruleset_id.clone(),
        };
        ProofStatement {
            statement,
            circuit_id: circuit_id.to_string(),
            proof_type: ProofType::Simulated,
            witness_count: witness.axioms.len(),
        }
    }

    /// Whether the witness satisfies the circuit of the statement's declared
    /// version. Version >= 2 with ruleset `TDFOL_v1` routes to the derivation
    /// circuit; everything else routes to the MVP circuit.
    pub fn verify_witness_consistency(&self, witness: &Witness, statement: &Statement) -> bool {
        if statement.circuit_version >= 2 && statement.ruleset_id == "TDFOL_v1" {
            TdfolV1DerivationCircuit::new(statement.circuit_version)
                .verify_constraints(witness, statement)
        } else {
            MvpCircuit::new(statement.circuit_version).verify_constraints(witness, statement)
        }
    }

    /// Retrieve a cached witness by its axioms commitment.
    pub fn get_cached_witness(&self, commitment_hex: &str) -> Option<Witness> {
        self.cache.lock().expect("witness cache poisoned").get(commitment_hex).cloned()
    }

    /// Drop all cached witnesses.
    pub fn clear_cache(&self) {
        self.cache.lock().expect("witness cache poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn axioms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn generates_canonical_witness() {
        let manager = WitnessManager::new();
        let witness = manager
            .generate_witness(&axioms(&["Q", "P", "P -> Q"]), "Q", None, 1, "TDFOL_v1")
            .unwrap();
        assert_eq!(witness.axioms, vec!["P", "P -> Q", "Q"]);
        assert_eq!(witness.axioms_commitment_hex.len(), 64);
        assert!(witness.intermediate_steps.is_empty());
    }

    #[test]
    fn rejects_empty_axioms() {
        let manager = WitnessManager::new();
        assert!(matches!(
            manager.generate_witness(&[], "Q", None, 1, "TDFOL_v1"),
            Err(ZkpError::InvalidInput(_))
        ));
    }

    #[test]
    fn v2_witness_carries_derivation_trace() {
        let manager = WitnessManager::new();
        let witness = manager
            .generate_witness(&axioms(&["P", "P -> Q", "Q -> R"]), "R", None, 2, "TDFOL_v1")
            .unwrap();
        assert_eq!(witness.intermediate_steps, vec!["Q".to_string(), "R".to_string()]);
    }

    #[test]
    fn caller_supplied_steps_win_over_derivation() {
        let manager = WitnessManager::new();
        let witness = manager
            .generate_witness(
                &axioms(&["P", "P -> Q"]),
                "Q",
                Some(vec!["Q".to_string()]),
                2,
                "TDFOL_v1",
            )
            .unwrap();
        assert_eq!(witness.intermediate_steps, vec!["Q".to_string()]);
    }

    #[test]
    fn validate_checks_commitment_and_axioms() {
        let manager = WitnessManager::new();
        let witness = manager
            .generate_witness(&axioms(&["P", "P -> Q"]), "Q", None, 1, "TDFOL_v1")
            .unwrap();
        assert!(manager.validate_witness(&witness, Some(2), None));
        assert!(manager.validate_witness(&witness, None, Some(&axioms(&["P -> Q", "P"]))));
        assert!(!manager.validate_witness(&witness, Some(3), None));
        assert!(!manager.validate_witness(&witness, None, Some(&axioms(&["P"]))));

        let mut tampered = witness.clone();
        tampered.axioms.push("R".to_string());
        assert!(!manager.validate_witness(&tampered, None, None));
    }

    #[test]
    fn consistency_holds_for_generated_pairs() {
        let manager = WitnessManager::new();
        let witness = manager
            .generate_witness(&axioms(&["P", "P -> Q"]), "Q", None, 1, "TDFOL_v1")
            .unwrap();
        let statement =
            manager.create_proof_statement(&witness, "Q", DEFAULT_CIRCUIT_ID).statement;
        assert!(manager.verify_witness_consistency(&witness, &statement));
    }

    #[test]
    fn consistency_dispatches_to_derivation_circuit() {
        let manager = WitnessManager::new();
        let witness = manager
            .generate_witness(&axioms(&["P", "P -> Q"]), "Q", None, 2, "TDFOL_v1")
            .unwrap();
        let statement =
            manager.create_proof_statement(&witness, "Q", DEFAULT_CIRCUIT_ID).statement;
        assert!(manager.verify_witness_consistency(&witness, &statement));

        let mut no_trace = witness.clone();
        no_trace.intermediate_steps.clear();
        assert!(!manager.verify_witness_consistency(&no_trace, &statement));
    }

    #[test]
    fn cache_round_trip() {
        let manager = WitnessManager::new();
        let witness = manager
            .generate_witness(&axioms(&["P"]), "P", None, 1, "TDFOL_v1")
            .unwrap();
        let cached = manager.get_cached_witness(&witness.axioms_commitment_hex);
        assert_eq!(cached.as_ref(), Some(&witness));
        manager.clear_cache();
        assert!(manager.get_cached_witness(&witness.axioms_commitment_hex).is_none());
    }

    proptest! {
        #[test]
        fn generated_witness_is_always_consistent(
            axiom_set in proptest::collection::vec("[A-Za-z][A-Za-z0-9_]{0,8}", 1..6),
            theorem in "[A-Za-z][A-Za-z0-9_]{0,8}",
        ) {
            let manager = WitnessManager::new();
            let witness = manager
                .generate_witness(&axiom_set, &theorem, None, 1, "TDFOL_v1")
                .unwrap();
            let statement = manager
                .create_proof_statement(&witness, &theorem, DEFAULT_CIRCUIT_ID)
                .statement;
            prop_assert!(manager.verify_witness_consistency(&witness, &statement));
            prop_assert!(manager.validate_witness(&witness, None, Some(&axiom_set)));
        }
    }
}
