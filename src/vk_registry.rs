//! Verifying-key hash registry
//!
//! Off-chain registry mapping `(circuit_id, version)` to the SHA-256 hash of
//! a verifying key. VK artifacts themselves live in content-addressed
//! storage; publishing only the hash lets an on-chain registry pin verifiers
//! to a specific trusted setup without carrying the key material.
//!
//! Duplicate-registration policy: re-registering the **same** hash for a key
//! is idempotent; registering a **different** hash requires an explicit
//! overwrite. This makes concurrent idempotent boots safe while still
//! refusing silent VK swaps.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::statement::parse_circuit_ref_lenient;
use crate::{canonical, ZkpError};

/// Verifying-key material accepted by [`compute_vk_hash`].
pub enum VkMaterial<'a> {
    /// Raw serialized key bytes, hashed directly.
    Bytes(&'a [u8]),
    /// Textual key form, hashed as UTF-8.
    Text(&'a str),
    /// Structured key form, hashed as canonical JSON.
    Json(&'a Value),
}

/// Compute a stable SHA-256 hash for a verifying-key representation.
/// Returns 64 lowercase hex chars.
pub fn compute_vk_hash(vk: VkMaterial<'_>) -> String {
    let payload: Vec<u8> = match vk {
        VkMaterial::Bytes(bytes) => bytes.to_vec(),
        VkMaterial::Text(text) => text.as_bytes().to_vec(),
        VkMaterial::Json(value) => canonical::canonical_json(value).into_bytes(),
    };
    hex::encode(Sha256::digest(&payload))
}

fn validate_circuit_id(circuit_id: &str) -> Result<(), ZkpError> {
    if circuit_id.is_empty() {
        return Err(ZkpError::InvalidInput("circuit_id cannot be empty".into()));
    }
    if circuit_id.contains('@') {
        return Err(ZkpError::InvalidInput("circuit_id must not contain '@'".into()));
    }
    Ok(())
}

fn validate_vk_hash_hex(vk_hash_hex: &str) -> Result<String, ZkpError> {
    if vk_hash_hex.len() != 64 || !vk_hash_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ZkpError::InvalidInput("vk_hash_hex must be 64 hex characters".into()));
    }
    Ok(vk_hash_hex.to_ascii_lowercase())
}

/// One registry entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VkRegistryEntry {
    pub circuit_id: String,
    pub version: u64,
    pub vk_hash_hex: String,
}

/// Thread-safe registry mapping `(circuit_id, version)` to a VK hash.
#[derive(Debug, Default)]
pub struct VkRegistry {
    entries: RwLock<HashMap<(String, u64), String>>,
}

impl VkRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `entries` (no overwrites allowed).
    pub fn with_entries(entries: impl IntoIterator<Item = VkRegistryEntry>) -> Result<Self, ZkpError> {
        let registry = Self::new();
        for entry in entries {
            registry.register(&entry.circuit_id, entry.version, &entry.vk_hash_hex, false)?;
        }
        Ok(registry)
    }

    /// Register a VK hash for `(circuit_id, version)`.
    ///
    /// Same-hash re-registration is a no-op; a different hash fails with
    /// `InvalidInput` unless `overwrite` is set.
    pub fn register(
        &self,
        circuit_id: &str,
        version: u64,
        vk_hash_hex: &str,
        overwrite: bool,
    ) -> Result<(), ZkpError> {
        validate_circuit_id(circuit_id)?;
        let vk_hash_hex = validate_vk_hash_hex(vk_hash_hex)?;

        let key = (circuit_id.to_string(), version);
        let mut entries = self.entries.write().expect("vk registry poisoned");
        if let Some(existing) = entries.get(&key) {
            if !overwrite {
                if *existing != vk_hash_hex {
                    return Err(ZkpError::InvalidInput(format!(
                        "VK hash already registered for {circuit_id}@v{version}; \
                         pass overwrite to replace it"
                    )));
                }
                return Ok(());
            }
        }
        entries.insert(key, vk_hash_hex);
        Ok(())
    }

    /// Look up the VK hash for `(circuit_id, version)`.
    pub fn get(&self, circuit_id: &str, version: u64) -> Option<String> {
        self.entries
            .read()
            .expect("vk registry poisoned")
            .get(&(circuit_id.to_string(), version))
            .cloned()
    }

    /// Look up by circuit reference (lenient: bare ids map to version 1).
    pub fn get_by_ref(&self, circuit_ref: &str) -> Result<Option<String>, ZkpError> {
        let (circuit_id, version) = parse_circuit_ref_lenient(circuit_ref, 1)?;
        Ok(self.get(&circuit_id, version))
    }

    /// All registered versions for a circuit id, ascending.
    pub fn list_versions(&self, circuit_id: &str) -> Vec<u64> {
        let entries = self.entries.read().expect("vk registry poisoned");
        let mut versions: Vec<u64> = entries
            .keys()
            .filter(|(id, _)| id == circuit_id)
            .map(|(_, v)| *v)
            .collect();
        versions.sort_unstable();
        versions
    }

    /// Serialize to the canonical JSON shape:
    /// `{"vk_registry": {"<circuit_id>": {"<version>": "<hex64>"}}}`.
    pub fn to_value(&self) -> Value {
        let entries = self.entries.read().expect("vk registry poisoned");
        let mut by_circuit: Map<String, Value> = Map::new();
        for ((circuit_id, version), vk_hash_hex) in entries.iter() {
            let versions = by_circuit
                .entry(circuit_id.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(map) = versions.as_object_mut() {
                map.insert(version.to_string(), json!(vk_hash_hex));
            }
        }
        json!({ "vk_registry": by_circuit })
    }

    /// Deserialize from the canonical JSON shape. Version keys must be
    /// base-10 integer strings; hashes must be 64 hex chars.
    pub fn from_value(value: &Value) -> Result<Self, ZkpError> {
        let raw = value
            .get("vk_registry")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ZkpError::InvalidInput("expected an object containing 'vk_registry'".into())
            })?;

        let mut entries = Vec::new();
        for (circuit_id, versions) in raw {
            let versions = versions.as_object().ok_or_else(|| {
                ZkpError::InvalidInput("vk_registry values must be objects".into())
            })?;
            for (version_str, vk_hash) in versions {
                if version_str.is_empty() || !version_str.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ZkpError::InvalidInput(
                        "version keys must be base-10 integer strings".into(),
                    ));
                }
                let version: u64 = version_str.parse().map_err(|_| {
                    ZkpError::InvalidInput("version keys must fit u64".into())
                })?;
                let vk_hash_hex = vk_hash.as_str().ok_or_else(|| {
                    ZkpError::InvalidInput("vk hashes must be strings".into())
                })?;
                entries.push(VkRegistryEntry {
                    circuit_id: circuit_id.clone(),
                    version,
                    vk_hash_hex: vk_hash_hex.to_string(),
                });
            }
        }
        Self::with_entries(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hash(byte: u8) -> String {
        hex::encode([byte; 32])
    }

    #[test]
    fn vk_hash_over_bytes_text_and_json() {
        let bytes = compute_vk_hash(VkMaterial::Bytes(b"vk material"));
        let text = compute_vk_hash(VkMaterial::Text("vk material"));
        assert_eq!(bytes, text);
        assert_eq!(bytes.len(), 64);

        // JSON hashing is canonical: key order cannot matter.
        let a = compute_vk_hash(VkMaterial::Json(&json!({"b": 1, "a": 2})));
        let b = compute_vk_hash(VkMaterial::Json(&json!({"a": 2, "b": 1})));
        assert_eq!(a, b);
    }

    #[test]
    fn register_and_get() {
        let registry = VkRegistry::new();
        registry.register("knowledge_of_axioms", 1, &sample_hash(0xab), false).unwrap();
        assert_eq!(registry.get("knowledge_of_axioms", 1), Some(sample_hash(0xab)));
        assert_eq!(registry.get("knowledge_of_axioms", 2), None);
    }

    #[test]
    fn same_hash_is_idempotent_different_hash_needs_overwrite() {
        let registry = VkRegistry::new();
        registry.register("c", 1, &sample_hash(0x01), false).unwrap();
        registry.register("c", 1, &sample_hash(0x01), false).unwrap();

        let err = registry.register("c", 1, &sample_hash(0x02), false).unwrap_err();
        assert!(matches!(err, ZkpError::InvalidInput(_)));

        registry.register("c", 1, &sample_hash(0x02), true).unwrap();
        assert_eq!(registry.get("c", 1), Some(sample_hash(0x02)));
    }

    #[test]
    fn hashes_are_lowercased() {
        let registry = VkRegistry::new();
        registry.register("c", 1, &"AB".repeat(32), false).unwrap();
        assert_eq!(registry.get("c", 1), Some("ab".repeat(32)));
    }

    #[test]
    fn rejects_bad_ids_and_hashes() {
        let registry = VkRegistry::new();
        assert!(registry.register("", 1, &sample_hash(1), false).is_err());
        assert!(registry.register("bad@id", 1, &sample_hash(1), false).is_err());
        assert!(registry.register("c", 1, "short", false).is_err());
        assert!(registry.register("c", 1, &"zz".repeat(32), false).is_err());
    }

    #[test]
    fn get_by_ref_is_lenient() {
        let registry = VkRegistry::new();
        registry.register("c", 1, &sample_hash(1), false).unwrap();
        registry.register("c", 7, &sample_hash(7), false).unwrap();
        assert_eq!(registry.get_by_ref("c").unwrap(), Some(sample_hash(1)));
        assert_eq!(registry.get_by_ref("c@v7").unwrap(), Some(sample_hash(7)));
        assert!(registry.get_by_ref("bad@id").is_err());
    }

    #[test]
    fn list_versions_is_sorted() {
        let registry = VkRegistry::new();
        for v in [5u64, 1, 3] {
            registry.register("c", v, &sample_hash(v as u8), false).unwrap();
        }
        registry.register("other", 9, &sample_hash(9), false).unwrap();
        assert_eq!(registry.list_versions("c"), vec![1, 3, 5]);
        assert!(registry.list_versions("missing").is_empty());
    }

    #[test]
    fn serialization_round_trip() {
        let registry = VkRegistry::new();
        registry.register("c", 1, &sample_hash(1), false).unwrap();
        registry.register("c", 2, &sample_hash(2), false).unwrap();
        registry.register("d", 1, &sample_hash(3), false).unwrap();

        let value = registry.to_value();
        assert_eq!(value["vk_registry"]["c"]["1"], json!(sample_hash(1)));
        assert_eq!(value["vk_registry"]["c"]["2"], json!(sample_hash(2)));

        let restored = VkRegistry::from_value(&value).unwrap();
        assert_eq!(restored.get("c", 1), Some(sample_hash(1)));
        assert_eq!(restored.get("d", 1), Some(sample_hash(3)));
        assert_eq!(restored.list_versions("c"), vec![1, 2]);
    }

    #[test]
    fn from_value_rejects_malformed_shapes() {
        assert!(VkRegistry::from_value(&json!({})).is_err());
        assert!(VkRegistry::from_value(&json!({"vk_registry": 1})).is_err());
        assert!(VkRegistry::from_value(&json!({"vk_registry": {"c": {"x1": sample_hash(1)}}}))
            .is_err());
        assert!(VkRegistry::from_value(&json!({"vk_registry": {"c": {"1": "nothex"}}}))
            .is_err());
    }
}
