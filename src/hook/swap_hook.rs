//! Before-/after-swap redemption verification.
//!
//! The before-swap callback is the trust boundary of the whole system: a
//! match only moves tokens if its leaf is included under the posted round
//! root, its signature recovers to the registered TEE signer, it has not
//! been redeemed before, and both the root window and the match expiry are
//! still open. Checks run in a fixed order and each failure maps to its own
//! error. The two usage maps flip together; the after-swap callback then
//! enforces the signed minimum output.

use alloy_primitives::{Address, B256, I256, U256};
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::crypto::abi::{self, RedemptionPayload};
use crate::crypto::merkle::verify_proof;
use crate::crypto::signing::recover_leaf_signer;
use crate::error::HookError;
use crate::models::pool::{BalanceDelta, PoolKey, SwapParams};
use crate::registry::roots::RootRegistry;

const BPS: u64 = 10_000;

/// `TradeExecuted` event, one per successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeExecuted {
    pub round_id: B256,
    pub match_id_hash: B256,
    pub trader: Address,
    pub counterparty: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub expiry: u64,
}

pub struct RedemptionHook {
    owner: Address,
    roots: Arc<RootRegistry>,
    tee_signer: RwLock<Address>,
    allowed_callers: DashMap<Address, bool>,
    match_used: DashMap<(B256, B256), ()>,
    leaf_used: DashMap<(B256, B256), ()>,
    /// Fraction of the signed minimum enforced after the swap, in bps.
    min_out_bps: u64,
    events: RwLock<Vec<TradeExecuted>>,
}

impl RedemptionHook {
    pub fn new(
        owner: Address,
        roots: Arc<RootRegistry>,
        tee_signer: Address,
        min_out_bps: u64,
    ) -> Self {
        Self {
            owner,
            roots,
            tee_signer: RwLock::new(tee_signer),
            allowed_callers: DashMap::new(),
            match_used: DashMap::new(),
            leaf_used: DashMap::new(),
            min_out_bps: min_out_bps.min(BPS),
            events: RwLock::new(Vec::new()),
        }
    }

    /// Before-swap verification. On success both usage bits are set and the
    /// swap may proceed; any error aborts the transaction.
    pub fn before_swap(
        &self,
        caller: Address,
        pool: &PoolKey,
        params: &SwapParams,
        hook_data: &[u8],
        now: u64,
    ) -> Result<(), HookError> {
        let payload = RedemptionPayload::decode(hook_data)?;

        if caller != payload.trader && !self.is_allowed_caller(caller) {
            return Err(HookError::UnauthorizedCaller);
        }

        // Exact-input swap whose size and direction mirror the match.
        if params.amount_specified >= I256::ZERO
            || params.amount_specified.unsigned_abs() != payload.amountIn
        {
            return Err(HookError::InvalidSwapParams);
        }
        let (token_in, token_out) = pool.swap_tokens(params.zero_for_one);
        if token_in != payload.tokenIn || token_out != payload.tokenOut {
            return Err(HookError::InvalidSwapParams);
        }

        let root = self.roots.get_root(payload.roundId);
        if root == B256::ZERO {
            return Err(HookError::RootNotSet);
        }
        if now > self.roots.get_root_valid_until(payload.roundId) {
            return Err(HookError::RootExpired);
        }
        if U256::from(now) > payload.expiry {
            return Err(HookError::MatchExpired);
        }
        if self.match_used.contains_key(&(payload.roundId, payload.matchIdHash)) {
            return Err(HookError::MatchAlreadyUsed);
        }

        let leaf = abi::match_leaf(
            payload.roundId,
            payload.matchIdHash,
            payload.trader,
            payload.counterparty,
            payload.tokenIn,
            payload.tokenOut,
            payload.amountIn,
            payload.minAmountOut,
            payload.expiry,
        );
        if self.leaf_used.contains_key(&(payload.roundId, leaf)) {
            return Err(HookError::LeafAlreadyUsed);
        }
        if !verify_proof(root, leaf, &payload.proof) {
            return Err(HookError::InvalidProof);
        }
        let signer = *self.tee_signer.read().expect("tee signer lock");
        if recover_leaf_signer(&leaf, &payload.signature) != Some(signer) {
            return Err(HookError::InvalidSignature);
        }

        // Flip both usage bits; a concurrent duplicate loses at the entry.
        match self.match_used.entry((payload.roundId, payload.matchIdHash)) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(HookError::MatchAlreadyUsed)
            }
            dashmap::mapref::entry::Entry::Vacant(v) => v.insert(()),
        };
        match self.leaf_used.entry((payload.roundId, leaf)) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                self.match_used.remove(&(payload.roundId, payload.matchIdHash));
                return Err(HookError::LeafAlreadyUsed);
            }
            dashmap::mapref::entry::Entry::Vacant(v) => v.insert(()),
        };

        let event = TradeExecuted {
            round_id: payload.roundId,
            match_id_hash: payload.matchIdHash,
            trader: payload.trader,
            counterparty: payload.counterparty,
            token_in: payload.tokenIn,
            token_out: payload.tokenOut,
            amount_in: payload.amountIn,
            min_amount_out: payload.minAmountOut,
            expiry: payload.expiry.saturating_to::<u64>(),
        };
        info!(
            "Trade executed: round={} match={} trader={}",
            event.round_id, event.match_id_hash, event.trader
        );
        self.events.write().expect("events lock").push(event);
        Ok(())
    }

    /// After-swap output enforcement against the signed minimum, scaled by
    /// the policy knob.
    pub fn after_swap(
        &self,
        params: &SwapParams,
        delta: &BalanceDelta,
        hook_data: &[u8],
    ) -> Result<(), HookError> {
        let payload = RedemptionPayload::decode(hook_data)?;
        let realized = delta.output(params.zero_for_one);
        let enforced = payload.minAmountOut * U256::from(self.min_out_bps) / U256::from(BPS);
        if realized < enforced {
            return Err(HookError::MinAmountOutNotMet);
        }
        Ok(())
    }

    // --- Owner operations ---

    pub fn set_tee_signer(&self, caller: Address, signer: Address) -> Result<(), HookError> {
        if caller != self.owner {
            return Err(HookError::NotOwner);
        }
        if signer == Address::ZERO {
            return Err(HookError::InvalidTeeSigner);
        }
        *self.tee_signer.write().expect("tee signer lock") = signer;
        info!("TEE signer rotated to {signer}");
        Ok(())
    }

    pub fn set_allowed_caller(
        &self,
        caller: Address,
        who: Address,
        allowed: bool,
    ) -> Result<(), HookError> {
        if caller != self.owner {
            return Err(HookError::NotOwner);
        }
        if allowed {
            self.allowed_callers.insert(who, true);
        } else {
            self.allowed_callers.remove(&who);
        }
        Ok(())
    }

    // --- Views ---

    pub fn tee_signer(&self) -> Address {
        *self.tee_signer.read().expect("tee signer lock")
    }

    pub fn is_allowed_caller(&self, caller: Address) -> bool {
        self.allowed_callers.get(&caller).map(|v| *v).unwrap_or(false)
    }

    pub fn match_used(&self, round_id: B256, match_id_hash: B256) -> bool {
        self.match_used.contains_key(&(round_id, match_id_hash))
    }

    pub fn leaf_used(&self, round_id: B256, leaf: B256) -> bool {
        self.leaf_used.contains_key(&(round_id, leaf))
    }

    pub fn events(&self) -> Vec<TradeExecuted> {
        self.events.read().expect("events lock").clone()
    }
}
