use alloy_primitives::{keccak256, Address, B256, I256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

/// Identity of an AMM pool: ordered currencies plus fee tier, tick spacing
/// and the hook bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolKey {
    pub currency0: Address,
    pub currency1: Address,
    pub fee: u32,
    pub tick_spacing: i32,
    pub hooks: Address,
}

impl PoolKey {
    /// Derived pool identity hash over the ABI-encoded key fields.
    pub fn pool_id(&self) -> B256 {
        let encoded = (
            self.currency0,
            self.currency1,
            U256::from(self.fee),
            I256::try_from(self.tick_spacing).unwrap_or(I256::ZERO),
            self.hooks,
        )
            .abi_encode();
        keccak256(&encoded)
    }

    /// `(token_in, token_out)` for a swap direction over this pool.
    pub fn swap_tokens(&self, zero_for_one: bool) -> (Address, Address) {
        if zero_for_one {
            (self.currency0, self.currency1)
        } else {
            (self.currency1, self.currency0)
        }
    }
}

/// Swap parameters as the AMM hands them to the hook. Exact-input swaps
/// carry a negative `amount_specified`.
#[derive(Debug, Clone, Copy)]
pub struct SwapParams {
    pub zero_for_one: bool,
    pub amount_specified: I256,
}

/// Post-swap balance movement from the swapper's perspective: positive
/// amounts are owed to the swapper, negative amounts were taken from them.
#[derive(Debug, Clone, Copy)]
pub struct BalanceDelta {
    pub amount0: I256,
    pub amount1: I256,
}

impl BalanceDelta {
    /// Realized output on the swap's out-currency, clamped at zero.
    pub fn output(&self, zero_for_one: bool) -> U256 {
        let delta = if zero_for_one { self.amount1 } else { self.amount0 };
        if delta.is_negative() {
            U256::ZERO
        } else {
            delta.unsigned_abs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_slice(&bytes)
    }

    fn key() -> PoolKey {
        PoolKey {
            currency0: addr(1),
            currency1: addr(2),
            fee: 3000,
            tick_spacing: 60,
            hooks: addr(9),
        }
    }

    #[test]
    fn test_pool_id_changes_with_fee() {
        let a = key();
        let mut b = key();
        b.fee = 500;
        assert_ne!(a.pool_id(), b.pool_id());
    }

    #[test]
    fn test_swap_tokens_direction() {
        let k = key();
        assert_eq!(k.swap_tokens(true), (addr(1), addr(2)));
        assert_eq!(k.swap_tokens(false), (addr(2), addr(1)));
    }

    #[test]
    fn test_delta_output_clamps_negative() {
        let delta = BalanceDelta {
            amount0: I256::try_from(-5i64).unwrap(),
            amount1: I256::try_from(7i64).unwrap(),
        };
        assert_eq!(delta.output(true), U256::from(7u64));
        assert_eq!(delta.output(false), U256::ZERO);
    }
}
