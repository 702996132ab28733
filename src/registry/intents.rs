//! Time-partitioned intent intake.
//!
//! Registrations bind an opaque protected-data handle to a commitment over
//! the intent's cleartext parameters, and are only accepted while the round
//! clock is inside the intake sub-window. Insertion order is preserved; the
//! 1-based position is the basis of time priority in the matcher.

use alloy_primitives::{Address, B256};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

use crate::crypto::abi;
use crate::error::{RegistryError, RootRegistryError};
use crate::models::intent::{Intent, IntentRef};
use crate::models::round::RoundClock;
use crate::registry::roots::RootRegistry;

#[derive(Debug, Default)]
struct RoundIntents {
    refs: Vec<IntentRef>,
}

/// `IntentRegistered` event, one per accepted registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRegistered {
    pub round_id: B256,
    pub trader: Address,
    pub protected_data: Address,
    pub commitment: B256,
    pub position: u64,
    pub intent_id: B256,
    pub timestamp: u64,
}

pub struct IntentRegistry {
    clock: RoundClock,
    owner: Address,
    roots: Arc<RootRegistry>,
    rounds: DashMap<B256, RoundIntents>,
    events: DashMap<B256, Vec<IntentRegistered>>,
}

impl IntentRegistry {
    pub fn new(clock: RoundClock, owner: Address, roots: Arc<RootRegistry>) -> Self {
        Self {
            clock,
            owner,
            roots,
            rounds: DashMap::new(),
            events: DashMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn namespace(&self) -> &str {
        self.clock.namespace()
    }

    pub fn duration_seconds(&self) -> u64 {
        self.clock.duration_seconds()
    }

    pub fn intake_window_seconds(&self) -> u64 {
        self.clock.intake_window_seconds()
    }

    pub fn clock(&self) -> &RoundClock {
        &self.clock
    }

    pub fn current_round_id(&self, now: u64) -> B256 {
        self.clock.round_id(now)
    }

    /// Register one intent for the caller. Returns the 1-based position.
    pub fn register_intent(
        &self,
        caller: Address,
        now: u64,
        round_id: B256,
        protected_data: Address,
        commitment: B256,
    ) -> Result<u64, RegistryError> {
        self.register_batch(caller, now, round_id, &[protected_data], &[commitment])
            .map(|(from, _)| from)
    }

    /// Register a batch for the caller; fails atomically on any
    /// sub-validation. Returns the 1-based (from, to) positions.
    pub fn register_intents(
        &self,
        caller: Address,
        now: u64,
        round_id: B256,
        protected_data: &[Address],
        commitments: &[B256],
    ) -> Result<(u64, u64), RegistryError> {
        self.register_batch(caller, now, round_id, protected_data, commitments)
    }

    /// Owner-delegated registration on behalf of a stated trader.
    pub fn register_intent_for(
        &self,
        caller: Address,
        trader: Address,
        now: u64,
        round_id: B256,
        protected_data: Address,
        commitment: B256,
    ) -> Result<u64, RegistryError> {
        if caller != self.owner {
            return Err(RegistryError::NotOwner);
        }
        self.register_batch(trader, now, round_id, &[protected_data], &[commitment])
            .map(|(from, _)| from)
    }

    /// Owner-delegated batch registration.
    pub fn register_intents_for(
        &self,
        caller: Address,
        trader: Address,
        now: u64,
        round_id: B256,
        protected_data: &[Address],
        commitments: &[B256],
    ) -> Result<(u64, u64), RegistryError> {
        if caller != self.owner {
            return Err(RegistryError::NotOwner);
        }
        self.register_batch(trader, now, round_id, protected_data, commitments)
    }

    fn register_batch(
        &self,
        trader: Address,
        now: u64,
        round_id: B256,
        protected_data: &[Address],
        commitments: &[B256],
    ) -> Result<(u64, u64), RegistryError> {
        if protected_data.len() != commitments.len() {
            return Err(RegistryError::ArrayLengthMismatch {
                handles: protected_data.len(),
                commitments: commitments.len(),
            });
        }
        if round_id != self.clock.round_id(now) {
            return Err(RegistryError::InvalidRoundId);
        }
        if !self.clock.in_intake(now) {
            return Err(RegistryError::IntakeWindowClosed);
        }
        if trader == Address::ZERO {
            return Err(RegistryError::InvalidTrader);
        }
        for handle in protected_data {
            if *handle == Address::ZERO {
                return Err(RegistryError::InvalidProtectedData);
            }
        }
        for commitment in commitments {
            if *commitment == B256::ZERO {
                return Err(RegistryError::InvalidCommitment);
            }
        }

        // One consolidated handle set lives in the root registry; its batch
        // path validates everything before recording anything.
        let mut round = self.rounds.entry(round_id).or_default();
        let (from, to) = self
            .roots
            .submit_intents(round_id, protected_data)
            .map_err(|e| match e {
                RootRegistryError::IntentAlreadySubmitted => {
                    RegistryError::IntentAlreadyRegistered
                }
                other => RegistryError::Round(other),
            })?;

        for (handle, commitment) in protected_data.iter().zip(commitments) {
            let position = round.refs.len() as u64 + 1;
            let intent_id = abi::intent_id(round_id, trader, *handle, *commitment);
            let reference = IntentRef {
                trader,
                protected_data: *handle,
                commitment: *commitment,
                intent_id,
                timestamp: now,
                position,
            };
            round.refs.push(reference);
            info!(
                "Intent registered: round={round_id} trader={trader} handle={handle} position={position}"
            );
            self.events.entry(round_id).or_default().push(IntentRegistered {
                round_id,
                trader,
                protected_data: *handle,
                commitment: *commitment,
                position,
                intent_id,
                timestamp: now,
            });
        }
        Ok((from, to))
    }

    // --- Views ---

    pub fn get_intent_count(&self, round_id: B256) -> u64 {
        self.rounds
            .get(&round_id)
            .map(|r| r.refs.len() as u64)
            .unwrap_or(0)
    }

    /// Registration record at 0-based index `i`.
    pub fn get_intent_at(&self, round_id: B256, i: u64) -> Option<IntentRef> {
        self.rounds
            .get(&round_id)
            .and_then(|r| r.refs.get(i as usize).copied())
    }

    pub fn is_intent_registered(&self, round_id: B256, protected_data: Address) -> bool {
        self.roots.has_submitted(round_id, protected_data)
    }

    /// All registration records for a round, in insertion order.
    pub fn get_intent_refs(&self, round_id: B256) -> Vec<IntentRef> {
        self.rounds
            .get(&round_id)
            .map(|r| r.refs.clone())
            .unwrap_or_default()
    }

    pub fn compute_commitment(intent: &Intent) -> B256 {
        abi::intent_commitment(intent)
    }

    pub fn events(&self, round_id: B256) -> Vec<IntentRegistered> {
        self.events.get(&round_id).map(|e| e.clone()).unwrap_or_default()
    }
}
