use alloy_primitives::{Address, B256, Bytes, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialize uint256 amounts as decimal strings in the round artifact,
/// matching the off-chain JSON contract.
pub mod u256_dec {
    use alloy_primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &U256, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<U256, D::Error> {
        let s = String::deserialize(de)?;
        U256::from_str(&s).map_err(D::Error::custom)
    }
}

/// One side of a bilateral cross, as signed and distributed to its trader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub match_id: String,
    pub match_id_hash: B256,
    pub round_id: B256,
    pub trader: Address,
    pub counterparty: Address,
    pub token_in: Address,
    pub token_out: Address,
    #[serde(with = "u256_dec")]
    pub amount_in: U256,
    #[serde(with = "u256_dec")]
    pub min_amount_out: U256,
    /// Unix seconds; `min` of the two crossing intents' expiries.
    pub expiry: u64,
    pub merkle_proof: Vec<B256>,
    pub leaf: B256,
    /// 65-byte ECDSA signature over the prefixed leaf digest.
    pub signature: Bytes,
}

/// Complete per-round matcher output: the on-chain commitment material plus
/// the privately distributed match set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingResult {
    pub round_id: String,
    pub round_id_bytes32: B256,
    /// Absent when the round produced no matches.
    pub merkle_root: Option<B256>,
    /// `min(valid_until, min(match.expiry))`; absent with no matches.
    pub round_expiry: Option<u64>,
    pub generated_at: DateTime<Utc>,
    pub tee_signer: Address,
    pub intents_count: usize,
    pub eligible_intents_count: usize,
    pub matches: Vec<MatchRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub debug_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_summary: Option<String>,
}

impl MatchingResult {
    /// Matches belonging to one trader, for private distribution.
    pub fn matches_for(&self, trader: Address) -> Vec<MatchRecord> {
        self.matches
            .iter()
            .filter(|m| m.trader == trader)
            .cloned()
            .collect()
    }
}

/// Leaf-free public view of a round's artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundDigest {
    pub round_id: B256,
    pub merkle_root: Option<B256>,
    pub round_expiry: Option<u64>,
    pub generated_at: DateTime<Utc>,
    pub matches_count: usize,
    /// Always empty; leaves are only released through the private surface.
    pub matches: Vec<MatchRecord>,
}
