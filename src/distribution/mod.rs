//! Per-trader match distribution.
//!
//! The store holds one artifact per round. The public surface exposes a
//! leaf-free digest; the private surface releases a trader's own signed
//! leaves only after the caller proves control of the trader address by
//! signing a fresh challenge `shadowpool:matches:{address}:{timestamp}`
//! (personal-sign, lowercase hex address) within the configured TTL.

use alloy_primitives::{Address, B256};
use dashmap::DashMap;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::crypto::signing::recover_message_signer;
use crate::error::DistributionError;
use crate::models::fill::{MatchRecord, MatchingResult, RoundDigest};

/// Authentication material from the private-access headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessHeaders {
    pub address: Address,
    /// 65-byte signature over the challenge message.
    pub signature: Vec<u8>,
    pub timestamp: u64,
}

impl AccessHeaders {
    /// Parse the wire form of the three access headers: 0x-hex address,
    /// 0x-hex 65-byte signature, decimal unix timestamp.
    pub fn from_wire(
        address: &str,
        signature: &str,
        timestamp: &str,
    ) -> Result<Self, DistributionError> {
        let address = address
            .trim()
            .parse::<Address>()
            .map_err(|_| DistributionError::MalformedHeader)?;
        let sig_hex = signature.trim();
        let sig_hex = sig_hex.strip_prefix("0x").unwrap_or(sig_hex);
        let signature = hex::decode(sig_hex).map_err(|_| DistributionError::MalformedHeader)?;
        if signature.len() != 65 {
            return Err(DistributionError::MalformedHeader);
        }
        let timestamp = timestamp
            .trim()
            .parse::<u64>()
            .map_err(|_| DistributionError::MalformedHeader)?;
        Ok(Self { address, signature, timestamp })
    }
}

/// Build the challenge message a wallet must sign for private access.
pub fn access_challenge(address: Address, timestamp: u64) -> Vec<u8> {
    format!("shadowpool:matches:0x{}:{}", hex::encode(address), timestamp).into_bytes()
}

pub struct MatchStore {
    rounds: DashMap<B256, MatchingResult>,
    auth_ttl_seconds: u64,
    /// When set, every published artifact is also written as JSON.
    artifact_dir: Option<PathBuf>,
}

impl MatchStore {
    pub fn new(auth_ttl_seconds: u64) -> Self {
        Self {
            rounds: DashMap::new(),
            auth_ttl_seconds,
            artifact_dir: None,
        }
    }

    /// Persist published artifacts under `dir` as `round-<id>.json`.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    /// Publish (or republish) a round's artifact.
    pub fn publish(&self, result: MatchingResult) {
        if let Some(dir) = &self.artifact_dir {
            if let Err(e) = write_artifact(dir, &result) {
                warn!("Artifact write failed for round {}: {e}", result.round_id_bytes32);
            }
        }
        self.rounds.insert(result.round_id_bytes32, result);
    }

    /// Leaf-free public digest of a round.
    pub fn public_digest(&self, round_id: B256) -> Result<RoundDigest, DistributionError> {
        let result = self
            .rounds
            .get(&round_id)
            .ok_or(DistributionError::UnknownRound)?;
        Ok(RoundDigest {
            round_id,
            merkle_root: result.merkle_root,
            round_expiry: result.round_expiry,
            generated_at: result.generated_at,
            matches_count: result.matches.len(),
            matches: Vec::new(),
        })
    }

    /// Matches belonging to the authenticated trader.
    pub fn private_matches(
        &self,
        round_id: B256,
        headers: &AccessHeaders,
        now: u64,
    ) -> Result<Vec<MatchRecord>, DistributionError> {
        if now.abs_diff(headers.timestamp) > self.auth_ttl_seconds {
            return Err(DistributionError::StaleTimestamp);
        }
        let challenge = access_challenge(headers.address, headers.timestamp);
        let recovered = recover_message_signer(&challenge, &headers.signature);
        if recovered != Some(headers.address) {
            return Err(DistributionError::InvalidSignature);
        }

        let result = self
            .rounds
            .get(&round_id)
            .ok_or(DistributionError::UnknownRound)?;
        Ok(result.matches_for(headers.address))
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }
}

fn write_artifact(dir: &PathBuf, result: &MatchingResult) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "round-{}.json",
        hex::encode(result.round_id_bytes32)
    ));
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(&path, json)?;
    info!("Artifact written: {}", path.display());
    Ok(())
}
