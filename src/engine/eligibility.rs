//! Eligibility filter: the gate between decrypted transport output and the
//! clearing books.
//!
//! Ineligible intents are never errors — each drop is recorded as a
//! diagnostic string and the round continues on the eligible subset.

use alloy_primitives::{Address, U256};
use std::collections::{HashMap, HashSet};

use crate::crypto::abi;
use crate::models::intent::{DecryptedIntent, Intent, IntentRef};
use crate::models::token::WAD;

/// An intent that passed every gate, tagged with its registry position.
#[derive(Debug, Clone)]
pub struct EligibleIntent {
    pub intent: Intent,
    pub protected_data: Address,
    pub position: u64,
}

#[derive(Debug, Default)]
pub struct EligibilityOutcome {
    /// Eligible intents in registry insertion order.
    pub eligible: Vec<EligibleIntent>,
    pub debug_errors: Vec<String>,
    /// Commitment-binding failures only (drives the mismatch diagnostics).
    pub commitment_mismatches: usize,
}

/// Filter the decrypted set against the on-chain registrations.
///
/// `round_end` is exclusive: an intent expiring exactly at round end is
/// ineligible, since its redemption window would already be over.
pub fn filter_eligible(
    intents: &[DecryptedIntent],
    refs: &[IntentRef],
    round_end: u64,
) -> EligibilityOutcome {
    let by_handle: HashMap<Address, &IntentRef> =
        refs.iter().map(|r| (r.protected_data, r)).collect();

    let mut outcome = EligibilityOutcome::default();
    let mut seen: HashSet<Address> = HashSet::new();

    for decrypted in intents {
        let handle = decrypted.protected_data;
        let intent = &decrypted.intent;

        if !seen.insert(handle) {
            outcome
                .debug_errors
                .push(format!("{handle}: duplicate decrypted record"));
            continue;
        }
        let Some(reference) = by_handle.get(&handle) else {
            outcome
                .debug_errors
                .push(format!("{handle}: no registration for handle"));
            continue;
        };
        if abi::intent_commitment(intent) != reference.commitment {
            outcome.commitment_mismatches += 1;
            outcome
                .debug_errors
                .push(format!("{handle}: commitment mismatch"));
            continue;
        }
        if intent.trader != reference.trader {
            outcome
                .debug_errors
                .push(format!("{handle}: trader does not match registration"));
            continue;
        }
        if intent.expiry <= round_end {
            outcome
                .debug_errors
                .push(format!("{handle}: expires before round end"));
            continue;
        }
        if intent.amount_base == U256::ZERO {
            outcome.debug_errors.push(format!("{handle}: zero amount"));
            continue;
        }
        if !slippage_ok(intent.slippage_min) || !slippage_ok(intent.slippage_max) {
            outcome
                .debug_errors
                .push(format!("{handle}: slippage bound out of range"));
            continue;
        }

        outcome.eligible.push(EligibleIntent {
            intent: intent.clone(),
            protected_data: handle,
            position: reference.position,
        });
    }

    // Registry insertion order is the time-priority basis downstream.
    outcome.eligible.sort_by_key(|e| e.position);
    outcome
}

fn slippage_ok(bound: Option<U256>) -> bool {
    bound.map(|b| b <= WAD).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::intent::Side;
    use alloy_primitives::B256;

    const ROUND_END: u64 = 1_700_000_400;

    fn intent(trader: Address) -> Intent {
        Intent {
            side: Side::Buy,
            trader,
            base_token: Address::repeat_byte(1),
            quote_token: Address::repeat_byte(2),
            amount_base: U256::from(10u64) * WAD,
            limit_price_wad: WAD,
            expiry: ROUND_END + 600,
            salt: B256::repeat_byte(9),
            slippage_min: None,
            slippage_max: None,
            notes: String::new(),
        }
    }

    fn registered(intent: &Intent, handle: Address, position: u64) -> IntentRef {
        IntentRef {
            trader: intent.trader,
            protected_data: handle,
            commitment: abi::intent_commitment(intent),
            intent_id: B256::ZERO,
            timestamp: 0,
            position,
        }
    }

    #[test]
    fn test_valid_intent_passes() {
        let trader = Address::repeat_byte(0x11);
        let handle = Address::repeat_byte(0x21);
        let i = intent(trader);
        let r = registered(&i, handle, 1);
        let outcome = filter_eligible(
            &[DecryptedIntent { protected_data: handle, intent: i }],
            &[r],
            ROUND_END,
        );
        assert_eq!(outcome.eligible.len(), 1);
        assert!(outcome.debug_errors.is_empty());
    }

    #[test]
    fn test_commitment_mismatch_dropped_and_counted() {
        let trader = Address::repeat_byte(0x11);
        let handle = Address::repeat_byte(0x21);
        let i = intent(trader);
        let mut r = registered(&i, handle, 1);
        r.commitment = B256::repeat_byte(0xff);
        let outcome = filter_eligible(
            &[DecryptedIntent { protected_data: handle, intent: i }],
            &[r],
            ROUND_END,
        );
        assert!(outcome.eligible.is_empty());
        assert_eq!(outcome.commitment_mismatches, 1);
    }

    #[test]
    fn test_expiry_at_round_end_is_ineligible() {
        let trader = Address::repeat_byte(0x11);
        let handle = Address::repeat_byte(0x21);
        let mut i = intent(trader);
        i.expiry = ROUND_END;
        let r = registered(&i, handle, 1);
        let outcome = filter_eligible(
            &[DecryptedIntent { protected_data: handle, intent: i }],
            &[r],
            ROUND_END,
        );
        assert!(outcome.eligible.is_empty());
        assert_eq!(outcome.commitment_mismatches, 0);
    }

    #[test]
    fn test_trader_mismatch_dropped() {
        let trader = Address::repeat_byte(0x11);
        let handle = Address::repeat_byte(0x21);
        let i = intent(trader);
        let mut r = registered(&i, handle, 1);
        r.trader = Address::repeat_byte(0x12);
        let outcome = filter_eligible(
            &[DecryptedIntent { protected_data: handle, intent: i }],
            &[r],
            ROUND_END,
        );
        assert!(outcome.eligible.is_empty());
    }

    #[test]
    fn test_slippage_above_one_dropped() {
        let trader = Address::repeat_byte(0x11);
        let handle = Address::repeat_byte(0x21);
        let mut i = intent(trader);
        i.slippage_max = Some(WAD + U256::from(1u64));
        let r = registered(&i, handle, 1);
        let outcome = filter_eligible(
            &[DecryptedIntent { protected_data: handle, intent: i }],
            &[r],
            ROUND_END,
        );
        assert!(outcome.eligible.is_empty());
    }

    #[test]
    fn test_output_sorted_by_position() {
        let trader = Address::repeat_byte(0x11);
        let h1 = Address::repeat_byte(0x21);
        let h2 = Address::repeat_byte(0x22);
        let i1 = intent(trader);
        let mut i2 = intent(trader);
        i2.salt = B256::repeat_byte(8);
        let r1 = registered(&i1, h1, 1);
        let r2 = registered(&i2, h2, 2);
        // Transport delivers out of order.
        let outcome = filter_eligible(
            &[
                DecryptedIntent { protected_data: h2, intent: i2 },
                DecryptedIntent { protected_data: h1, intent: i1 },
            ],
            &[r1, r2],
            ROUND_END,
        );
        let positions: Vec<u64> = outcome.eligible.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }
}
