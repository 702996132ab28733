use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// 1.0 in 18-decimal fixed point. All prices in the system are wads.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// An ERC-20 style token reference. Identity is the 20-byte address;
/// ordering is the raw byte order, which is case-free by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub decimals: u8,
}

/// An ordered token pair with `currency0 < currency1` by byte comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenPair {
    pub currency0: Address,
    pub currency1: Address,
}

impl TokenPair {
    /// Order two token addresses into a canonical pair.
    pub fn new(a: Address, b: Address) -> Self {
        if a <= b {
            Self { currency0: a, currency1: b }
        } else {
            Self { currency0: b, currency1: a }
        }
    }

    /// 40-byte key `currency0 ‖ currency1`; ascending `PairKey` order is the
    /// pair iteration order of the matching engine.
    pub fn key(&self) -> PairKey {
        let mut bytes = [0u8; 40];
        bytes[..20].copy_from_slice(self.currency0.as_slice());
        bytes[20..].copy_from_slice(self.currency1.as_slice());
        PairKey(bytes)
    }

    /// Whether `base` sits on the canonical (`currency0`) side of this pair.
    pub fn is_canonical_base(&self, base: Address) -> bool {
        base == self.currency0
    }
}

/// Concatenated `min ‖ max` token bytes identifying one clearing book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(pub [u8; 40]);

impl PairKey {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn currency0(&self) -> Address {
        Address::from_slice(&self.0[..20])
    }

    pub fn currency1(&self) -> Address {
        Address::from_slice(&self.0[20..])
    }
}
