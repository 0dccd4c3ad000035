// src/registry.rs
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::error::{MarketError, Result};
use crate::models::FeaturePool;

/// Checks that a contributor owns the data it submits. Signature and
/// zero-knowledge schemes plug in here.
pub trait OwnershipVerifier: Send + Sync {
    fn verify(&self, contributor_id: &str, data_hash: &[u8; 32], proof: &[u8]) -> bool;
}

/// Accepts every proof. For simulations without an identity layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnverifiedOwnership;

impl OwnershipVerifier for UnverifiedOwnership {
    fn verify(&self, _contributor_id: &str, _data_hash: &[u8; 32], _proof: &[u8]) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Registration {
    Accepted { data_hash: String },
    Duplicate { data_hash: String },
    ProofRejected { data_hash: String },
}

impl Registration {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Registration::Accepted { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredContribution {
    pub contributor_id: String,
    pub data_hash: String,
    pub row: Vec<f64>,
}

/// Admits contributor rows into the market pool. Byte-identical resubmissions
/// are refused; near-duplicates are left to the Shapley duplication penalty.
pub struct DataRegistry {
    verifier: Box<dyn OwnershipVerifier>,
    seen_hashes: HashSet<[u8; 32]>,
    contributions: Vec<RegisteredContribution>,
}

impl DataRegistry {
    pub fn new(verifier: Box<dyn OwnershipVerifier>) -> Self {
        Self {
            verifier,
            seen_hashes: HashSet::new(),
            contributions: Vec::new(),
        }
    }

    pub fn register(&mut self, contributor_id: &str, row: Vec<f64>, proof: &[u8]) -> Result<Registration> {
        if row.is_empty() {
            return Err(MarketError::Shape(format!(
                "contributor '{}' submitted an empty feature vector",
                contributor_id
            )));
        }
        if let Some(first) = self.contributions.first() {
            if first.row.len() != row.len() {
                return Err(MarketError::Shape(format!(
                    "contributor '{}' submitted {} observations, pool has {}",
                    contributor_id,
                    row.len(),
                    first.row.len()
                )));
            }
        }

        let digest = hash_row(&row);
        let data_hash = to_hex(&digest);

        if self.seen_hashes.contains(&digest) {
            warn!(
                "Rejected '{}': data with hash {}... already registered",
                contributor_id,
                &data_hash[..10]
            );
            return Ok(Registration::Duplicate { data_hash });
        }
        if !self.verifier.verify(contributor_id, &digest, proof) {
            warn!(
                "Rejected '{}': ownership proof for {}... is invalid",
                contributor_id,
                &data_hash[..10]
            );
            return Ok(Registration::ProofRejected { data_hash });
        }

        self.seen_hashes.insert(digest);
        self.contributions.push(RegisteredContribution {
            contributor_id: contributor_id.to_string(),
            data_hash: data_hash.clone(),
            row,
        });
        info!("Registered data from contributor '{}'", contributor_id);
        Ok(Registration::Accepted { data_hash })
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    pub fn contributions(&self) -> &[RegisteredContribution] {
        &self.contributions
    }

    pub fn contributor_ids(&self) -> Vec<String> {
        self.contributions
            .iter()
            .map(|c| c.contributor_id.clone())
            .collect()
    }

    /// Registered rows as a pool, in registration order.
    pub fn into_pool(self) -> Result<FeaturePool> {
        FeaturePool::new(self.contributions.into_iter().map(|c| c.row).collect())
    }
}

/// SHA-256 over the little-endian bytes of every value.
pub fn hash_row(row: &[f64]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for value in row {
        hasher.update(value.to_le_bytes());
    }
    hasher.finalize().into()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RejectAll;

    impl OwnershipVerifier for RejectAll {
        fn verify(&self, _: &str, _: &[u8; 32], _: &[u8]) -> bool {
            false
        }
    }

    #[test]
    fn exact_clone_is_rejected() {
        let mut registry = DataRegistry::new(Box::new(UnverifiedOwnership));
        let first = registry.register("alice", vec![1.0, 2.0, 3.0], b"").unwrap();
        let clone = registry.register("mallory", vec![1.0, 2.0, 3.0], b"").unwrap();

        assert!(first.is_accepted());
        assert!(matches!(clone, Registration::Duplicate { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failed_proof_is_rejected() {
        let mut registry = DataRegistry::new(Box::new(RejectAll));
        let outcome = registry.register("alice", vec![1.0], b"sig").unwrap();
        assert!(matches!(outcome, Registration::ProofRejected { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn mismatched_length_is_a_shape_error() {
        let mut registry = DataRegistry::new(Box::new(UnverifiedOwnership));
        registry.register("alice", vec![1.0, 2.0], b"").unwrap();
        let err = registry.register("bob", vec![1.0], b"").unwrap_err();
        assert!(matches!(err, MarketError::Shape(_)));
    }

    #[test]
    fn pool_keeps_registration_order() {
        let mut registry = DataRegistry::new(Box::new(UnverifiedOwnership));
        registry.register("a", vec![1.0, 0.0], b"").unwrap();
        registry.register("b", vec![0.0, 1.0], b"").unwrap();
        assert_eq!(registry.contributor_ids(), vec!["a".to_string(), "b".to_string()]);

        let pool = registry.into_pool().unwrap();
        assert_eq!(pool.row(1), &[0.0, 1.0]);
    }

    #[test]
    fn hash_is_hex_sha256() {
        let mut registry = DataRegistry::new(Box::new(UnverifiedOwnership));
        match registry.register("a", vec![0.5], b"").unwrap() {
            Registration::Accepted { data_hash } => assert_eq!(data_hash.len(), 64),
            other => panic!("unexpected registration outcome {:?}", other),
        }
    }
}
