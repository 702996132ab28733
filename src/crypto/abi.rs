//! Strict ABI encodings shared by the matcher, the registries and the hook.
//!
//! Field orders are wire contracts: the commitment binds an intent's
//! cleartext to its on-chain registration, and the leaf binds a match to the
//! round root. Both sides must produce bit-identical bytes.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::{sol, SolValue};

use crate::error::HookError;
use crate::models::intent::Intent;

sol! {
    /// Redemption payload carried in `hookData`: one fixed tuple, decoded
    /// whole or rejected whole.
    #[derive(Debug, PartialEq, Eq)]
    struct RedemptionPayload {
        bytes32 roundId;
        bytes32 matchIdHash;
        address trader;
        address counterparty;
        address tokenIn;
        address tokenOut;
        uint256 amountIn;
        uint256 minAmountOut;
        uint256 expiry;
        bytes32[] proof;
        bytes signature;
    }
}

impl RedemptionPayload {
    pub fn encode(&self) -> Vec<u8> {
        self.abi_encode()
    }

    pub fn decode(data: &[u8]) -> Result<Self, HookError> {
        if data.is_empty() {
            return Err(HookError::InvalidHookData);
        }
        Self::abi_decode(data, true).map_err(|_| HookError::InvalidHookData)
    }
}

/// Commitment over an intent's cleartext parameters:
/// `keccak256(abi(uint8 side, address trader, address base, address quote,
/// uint256 amountBase, uint256 limitPrice, uint64 expiry, bytes32 salt))`.
pub fn intent_commitment(intent: &Intent) -> B256 {
    let encoded = (
        intent.side.as_u8() as u16,
        intent.trader,
        intent.base_token,
        intent.quote_token,
        intent.amount_base,
        intent.limit_price_wad,
        intent.expiry,
        intent.salt,
    )
        .abi_encode();
    keccak256(&encoded)
}

/// `intentId = keccak256(roundId ‖ trader ‖ protectedData ‖ commitment)`
/// over the raw concatenated bytes.
pub fn intent_id(
    round_id: B256,
    trader: Address,
    protected_data: Address,
    commitment: B256,
) -> B256 {
    let mut preimage = Vec::with_capacity(32 + 20 + 20 + 32);
    preimage.extend_from_slice(round_id.as_slice());
    preimage.extend_from_slice(trader.as_slice());
    preimage.extend_from_slice(protected_data.as_slice());
    preimage.extend_from_slice(commitment.as_slice());
    keccak256(&preimage)
}

/// Canonical match leaf over the fixed-width redemption fields.
#[allow(clippy::too_many_arguments)]
pub fn match_leaf(
    round_id: B256,
    match_id_hash: B256,
    trader: Address,
    counterparty: Address,
    token_in: Address,
    token_out: Address,
    amount_in: U256,
    min_amount_out: U256,
    expiry: U256,
) -> B256 {
    let encoded = (
        round_id,
        match_id_hash,
        trader,
        counterparty,
        token_in,
        token_out,
        amount_in,
        min_amount_out,
        expiry,
    )
        .abi_encode();
    keccak256(&encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::intent::Side;
    use alloy_primitives::Bytes;

    fn intent() -> Intent {
        Intent {
            side: Side::Buy,
            trader: Address::repeat_byte(1),
            base_token: Address::repeat_byte(2),
            quote_token: Address::repeat_byte(3),
            amount_base: U256::from(10u64),
            limit_price_wad: U256::from(2u64),
            expiry: 1_700_000_000,
            salt: B256::repeat_byte(9),
            slippage_min: None,
            slippage_max: None,
            notes: String::new(),
        }
    }

    #[test]
    fn test_commitment_binds_every_field() {
        let base = intent_commitment(&intent());

        let mut flipped = intent();
        flipped.side = Side::Sell;
        assert_ne!(base, intent_commitment(&flipped));

        let mut salted = intent();
        salted.salt = B256::repeat_byte(8);
        assert_ne!(base, intent_commitment(&salted));

        let mut noted = intent();
        noted.notes = "not committed".into();
        assert_eq!(base, intent_commitment(&noted));
    }

    #[test]
    fn test_payload_roundtrip() {
        let payload = RedemptionPayload {
            roundId: B256::repeat_byte(1),
            matchIdHash: B256::repeat_byte(2),
            trader: Address::repeat_byte(3),
            counterparty: Address::repeat_byte(4),
            tokenIn: Address::repeat_byte(5),
            tokenOut: Address::repeat_byte(6),
            amountIn: U256::from(100u64),
            minAmountOut: U256::from(90u64),
            expiry: U256::from(1_700_000_000u64),
            proof: vec![B256::repeat_byte(7)],
            signature: Bytes::from(vec![1u8; 65]),
        };
        let encoded = payload.encode();
        assert_eq!(RedemptionPayload::decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_payload_rejects_garbage() {
        assert_eq!(
            RedemptionPayload::decode(&[]).unwrap_err(),
            HookError::InvalidHookData
        );
        assert_eq!(
            RedemptionPayload::decode(&[0u8; 31]).unwrap_err(),
            HookError::InvalidHookData
        );
    }
}
