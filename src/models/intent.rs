use alloy_primitives::{Address, B256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::token::WAD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire encoding used inside the intent commitment.
    pub fn as_u8(&self) -> u8 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Cleartext trading intent. Exists only inside the matching boundary —
/// on-chain it is represented solely by its commitment hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub side: Side,
    pub trader: Address,
    pub base_token: Address,
    pub quote_token: Address,
    /// Amount of base token to trade, in base-token wei.
    pub amount_base: U256,
    /// Limit price in quote per 1 base, 18-decimal fixed point.
    pub limit_price_wad: U256,
    /// Unix seconds after which the intent must not be matched.
    pub expiry: u64,
    pub salt: B256,
    /// Optional slippage bounds as wad fractions of the nominal output.
    pub slippage_min: Option<U256>,
    pub slippage_max: Option<U256>,
    /// Free-form trader notes; never part of the commitment.
    #[serde(default)]
    pub notes: String,
}

/// A decrypted intent as delivered by the confidential transport, tagged
/// with the protected-data handle it was registered under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptedIntent {
    pub protected_data: Address,
    pub intent: Intent,
}

/// On-chain registration record for one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRef {
    pub trader: Address,
    pub protected_data: Address,
    pub commitment: B256,
    pub intent_id: B256,
    pub timestamp: u64,
    /// 1-based registration position; the basis of time priority.
    pub position: u64,
}

/// Parse a decimal price string (e.g. `"1.5"`) into a wad exactly.
/// Fails on more than 18 fractional digits rather than rounding — the
/// matcher must never see a silently altered price.
pub fn wad_from_str(s: &str) -> Option<U256> {
    wad_from_decimal(Decimal::from_str(s).ok()?)
}

/// Exact decimal → wad conversion for the intake edge.
pub fn wad_from_decimal(d: Decimal) -> Option<U256> {
    if d.is_sign_negative() {
        return None;
    }
    let scale = d.scale();
    if scale > 18 {
        return None;
    }
    let mantissa = u128::try_from(d.mantissa()).ok()?;
    let factor = U256::from(10u64).pow(U256::from(18 - scale));
    U256::from(mantissa).checked_mul(factor)
}

/// Convenience for whole-token amounts in tests and demos.
pub fn wad(units: u64) -> U256 {
    U256::from(units) * WAD
}
