//! Off-chain proof generation → on-chain submission pipeline
//!
//! Pure orchestration with no hidden state: the caller injects a prover (any
//! type that turns a witness JSON into a proof object) and an on-chain
//! client (RPC precheck, transaction submission, confirmation wait). The
//! pipeline itself only
//!
//! 1. generates the proof and checks its shape,
//! 2. packs the four public inputs for the EVM verifier,
//! 3. runs the RPC precheck (and stops there on `dry_run` or a failed
//!    precheck),
//! 4. submits and waits for confirmation.
//!
//! Malformed proof objects surface as [`ZkpError::MalformedProof`]; client
//! errors propagate unchanged; receipts are never interpreted.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info};

use crate::evm::{pack_public_inputs_for_evm, EvmPublicInputs};
use crate::ZkpError;

/// Default bound for the confirmation wait.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECONDS: u64 = 300;

/// Minimal interface required to generate a proof for the pipeline.
pub trait PipelineProver {
    /// Produce the self-describing proof object for a witness JSON string.
    fn generate_proof(&self, witness_json: &str) -> Result<Value>;
}

/// Minimal interface required to submit and confirm an on-chain verify call.
pub trait OnchainClient {
    /// `eth_call`-style precheck of the verifier contract.
    fn verify_proof_rpc_call(&self, proof_hex: &str, public_inputs_hex: &[String; 4])
        -> Result<bool>;

    /// Submit the verification transaction; returns the transaction hash.
    fn submit_proof_transaction(
        &self,
        proof_hex: &str,
        public_inputs_hex: &[String; 4],
        from_account: &str,
        private_key: &str,
        gas_price_wei: Option<u128>,
    ) -> Result<String>;

    /// Block until the transaction is confirmed (bounded by
    /// `timeout_seconds`); returns the receipt.
    fn wait_for_confirmation(&self, tx_hash: &str, timeout_seconds: u64) -> Result<Value>;
}

/// Result of one pipeline run.
#[derive(Clone, Debug, PartialEq)]
pub struct OnchainPipelineResult {
    /// Whether the RPC precheck accepted the proof.
    pub precheck_ok: bool,
    /// Whether a transaction was submitted.
    pub submitted: bool,
    /// Transaction hash, when submitted.
    pub tx_hash: Option<String>,
    /// Confirmation receipt, when submitted. Opaque to the pipeline.
    pub receipt: Option<Value>,
}

/// Caller-supplied knobs for one pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    /// Sender account address.
    pub from_account: String,
    /// Sender signing key.
    pub private_key: String,
    /// Stop after the precheck, even when it passes.
    pub dry_run: bool,
    /// Optional explicit gas price in wei.
    pub gas_price_wei: Option<u128>,
    /// Bound for the confirmation wait.
    pub confirmation_timeout_seconds: u64,
}

impl PipelineOptions {
    /// Options with default flags for a signer.
    pub fn new(from_account: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            from_account: from_account.into(),
            private_key: private_key.into(),
            dry_run: false,
            gas_price_wei: None,
            confirmation_timeout_seconds: DEFAULT_CONFIRMATION_TIMEOUT_SECONDS,
        }
    }
}

/// Accept the proof object either as a JSON object or as a JSON string that
/// itself parses to an object.
fn coerce_proof_object(value: Value) -> Result<Value> {
    match value {
        Value::String(s) if s.trim_start().starts_with('{') => Ok(serde_json::from_str(&s)
            .map_err(|e| ZkpError::MalformedProof(format!("proof JSON string: {e}")))?),
        other => Ok(other),
    }
}

fn required_str<'a>(obj: &'a Value, key: &str) -> Result<&'a str, ZkpError> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ZkpError::MalformedProof(format!("public_inputs.{key} missing")))
}

/// Generate a proof and submit it for on-chain verification.
pub fn run_offchain_to_onchain_pipeline(
    witness_json: &str,
    prover: &dyn PipelineProver,
    client: &dyn OnchainClient,
    options: &PipelineOptions,
) -> Result<OnchainPipelineResult> {
    let proof_obj = coerce_proof_object(prover.generate_proof(witness_json)?)?;

    let proof_hex = proof_obj
        .get("proof_data")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ZkpError::MalformedProof("proof_data must be a non-empty hex string".into())
        })?
        .to_string();

    let public_inputs = proof_obj
        .get("public_inputs")
        .filter(|v| v.is_object())
        .ok_or_else(|| ZkpError::MalformedProof("public_inputs missing".into()))?;

    let circuit_version = public_inputs
        .get("circuit_version")
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            ZkpError::MalformedProof("public_inputs.circuit_version missing".into())
        })?;

    let packed = pack_public_inputs_for_evm(&EvmPublicInputs {
        theorem_hash_hex: required_str(public_inputs, "theorem_hash")?.to_string(),
        axioms_commitment_hex: required_str(public_inputs, "axioms_commitment")?.to_string(),
        circuit_version,
        ruleset_id: required_str(public_inputs, "ruleset_id")?.to_string(),
    })?;
    debug!("public inputs packed for EVM verifier");

    let precheck_ok = client.verify_proof_rpc_call(&proof_hex, &packed)?;
    if options.dry_run || !precheck_ok {
        info!(precheck_ok, dry_run = options.dry_run, "pipeline stopping before submission");
        return Ok(OnchainPipelineResult {
            precheck_ok,
            submitted: false,
            tx_hash: None,
            receipt: None,
        });
    }

    let tx_hash = client.submit_proof_transaction(
        &proof_hex,
        &packed,
        &options.from_account,
        &options.private_key,
        options.gas_price_wei,
    )?;
    info!(%tx_hash, "proof transaction submitted");
    let receipt =
        client.wait_for_confirmation(&tx_hash, options.confirmation_timeout_seconds)?;

    Ok(OnchainPipelineResult {
        precheck_ok: true,
        submitted: true,
        tx_hash: Some(tx_hash),
        receipt: Some(receipt),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProver {
        proof: Value,
    }

    impl PipelineProver for MockProver {
        fn generate_proof(&self, _witness_json: &str) -> Result<Value> {
            Ok(self.proof.clone())
        }
    }

    #[derive(Default)]
    struct MockClient {
        precheck_result: bool,
        precheck_calls: AtomicUsize,
        submit_calls: AtomicUsize,
        confirm_calls: AtomicUsize,
    }

    impl OnchainClient for MockClient {
        fn verify_proof_rpc_call(
            &self,
            _proof_hex: &str,
            public_inputs_hex: &[String; 4],
        ) -> Result<bool> {
            assert!(public_inputs_hex.iter().all(|s| s.starts_with("0x")));
            self.precheck_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.precheck_result)
        }

        fn submit_proof_transaction(
            &self,
            _proof_hex: &str,
            _public_inputs_hex: &[String; 4],
            _from_account: &str,
            _private_key: &str,
            _gas_price_wei: Option<u128>,
        ) -> Result<String> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            Ok("0xtxhash".to_string())
        }

        fn wait_for_confirmation(&self, tx_hash: &str, _timeout_seconds: u64) -> Result<Value> {
            self.confirm_calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "transactionHash": tx_hash, "status": "0x1" }))
        }
    }

    fn well_formed_proof() -> Value {
        json!({
            "proof_data": "deadbeef",
            "public_inputs": {
                "theorem_hash": "11".repeat(32),
                "axioms_commitment": "22".repeat(32),
                "circuit_version": 1,
                "ruleset_id": "TDFOL_v1",
            },
        })
    }

    fn options() -> PipelineOptions {
        PipelineOptions::new("0xabc", "key")
    }

    #[test]
    fn dry_run_prechecks_but_never_submits() {
        let prover = MockProver { proof: well_formed_proof() };
        let client = MockClient { precheck_result: true, ..Default::default() };
        let mut opts = options();
        opts.dry_run = true;

        let result =
            run_offchain_to_onchain_pipeline("{}", &prover, &client, &opts).unwrap();
        assert_eq!(
            result,
            OnchainPipelineResult {
                precheck_ok: true,
                submitted: false,
                tx_hash: None,
                receipt: None,
            }
        );
        assert_eq!(client.precheck_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.submit_calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.confirm_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_precheck_stops_submission() {
        let prover = MockProver { proof: well_formed_proof() };
        let client = MockClient { precheck_result: false, ..Default::default() };
        let result =
            run_offchain_to_onchain_pipeline("{}", &prover, &client, &options()).unwrap();
        assert!(!result.precheck_ok);
        assert!(!result.submitted);
        assert_eq!(client.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn full_run_submits_and_confirms() {
        let prover = MockProver { proof: well_formed_proof() };
        let client = MockClient { precheck_result: true, ..Default::default() };
        let result =
            run_offchain_to_onchain_pipeline("{}", &prover, &client, &options()).unwrap();
        assert!(result.precheck_ok && result.submitted);
        assert_eq!(result.tx_hash.as_deref(), Some("0xtxhash"));
        assert_eq!(result.receipt.unwrap()["status"], "0x1");
        assert_eq!(client.confirm_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn accepts_proof_as_json_string() {
        let prover = MockProver { proof: Value::String(well_formed_proof().to_string()) };
        let client = MockClient { precheck_result: true, ..Default::default() };
        let result =
            run_offchain_to_onchain_pipeline("{}", &prover, &client, &options()).unwrap();
        assert!(result.precheck_ok);
    }

    #[test]
    fn missing_proof_data_is_malformed() {
        let mut proof = well_formed_proof();
        proof.as_object_mut().unwrap().remove("proof_data");
        let prover = MockProver { proof };
        let client = MockClient { precheck_result: true, ..Default::default() };
        let err =
            run_offchain_to_onchain_pipeline("{}", &prover, &client, &options()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ZkpError>(),
            Some(ZkpError::MalformedProof(_))
        ));
        assert_eq!(client.precheck_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_public_input_key_is_malformed() {
        let mut proof = well_formed_proof();
        proof["public_inputs"].as_object_mut().unwrap().remove("ruleset_id");
        let prover = MockProver { proof };
        let client = MockClient { precheck_result: true, ..Default::default() };
        let err =
            run_offchain_to_onchain_pipeline("{}", &prover, &client, &options()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ZkpError>(),
            Some(ZkpError::MalformedProof(_))
        ));
    }

    #[test]
    fn client_errors_propagate_unchanged() {
        struct FailingClient;
        impl OnchainClient for FailingClient {
            fn verify_proof_rpc_call(&self, _: &str, _: &[String; 4]) -> Result<bool> {
                anyhow::bail!("rpc node unreachable")
            }
            fn submit_proof_transaction(
                &self,
                _: &str,
                _: &[String; 4],
                _: &str,
                _: &str,
                _: Option<u128>,
            ) -> Result<String> {
                unreachable!()
            }
            fn wait_for_confirmation(&self, _: &str, _: u64) -> Result<Value> {
                unreachable!()
            }
        }
        let prover = MockProver { proof: well_formed_proof() };
        let err = run_offchain_to_onchain_pipeline("{}", &prover, &FailingClient, &options())
            .unwrap_err();
        assert_eq!(err.to_string(), "rpc node unreachable");
    }
}
