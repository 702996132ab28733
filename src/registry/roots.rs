//! Per-round root registry: lifecycle state machine and the consolidated
//! intent-handle set.
//!
//! States advance strictly `Open → Closed → RootPosted → Locked`. The first
//! successful `post_root` binds the matcher address for the round; later
//! posts from anyone else fail, and locking is one-way.

use alloy_primitives::{Address, B256};
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::info;

use crate::error::RootRegistryError;

#[derive(Debug, Clone, Default)]
struct RoundState {
    closed: bool,
    root: B256,
    valid_until: u64,
    matcher: Address,
    locked: bool,
    handles: Vec<Address>,
    submitted: HashSet<Address>,
}

/// Snapshot of one round's on-chain root state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRootInfo {
    pub root: B256,
    pub valid_until: u64,
    pub matcher: Address,
    pub root_locked: bool,
    pub round_closed: bool,
}

/// Events recorded by the state machine, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootEvent {
    IntentSubmitted { round_id: B256, protected_data: Address, position: u64 },
    RoundClosedByOwner { round_id: B256 },
    RootPosted { round_id: B256, root: B256, valid_until: u64 },
    MatcherSet { round_id: B256, matcher: Address },
    RootLockedForRound { round_id: B256 },
}

pub struct RootRegistry {
    owner: Address,
    rounds: DashMap<B256, RoundState>,
    events: DashMap<B256, Vec<RootEvent>>,
}

impl RootRegistry {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            rounds: DashMap::new(),
            events: DashMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Record one protected-data handle for a round while it is open.
    /// This set is the single source of handle idempotency; the intent
    /// registry routes every registration through it.
    pub fn submit_intent(
        &self,
        round_id: B256,
        protected_data: Address,
    ) -> Result<u64, RootRegistryError> {
        self.submit_intents(round_id, std::slice::from_ref(&protected_data))
            .map(|(from, _)| from)
    }

    /// Atomic batch submission: validates every handle under one round lock
    /// before recording any. Returns the 1-based (from, to) positions.
    pub fn submit_intents(
        &self,
        round_id: B256,
        protected_data: &[Address],
    ) -> Result<(u64, u64), RootRegistryError> {
        let mut round = self.rounds.entry(round_id).or_default();
        if round.closed {
            return Err(RootRegistryError::RoundClosed);
        }
        if round.root != B256::ZERO {
            return Err(RootRegistryError::RootAlreadySet);
        }
        let mut batch_seen = HashSet::new();
        for handle in protected_data {
            if *handle == Address::ZERO {
                return Err(RootRegistryError::InvalidProtectedData);
            }
            if round.submitted.contains(handle) || !batch_seen.insert(*handle) {
                return Err(RootRegistryError::IntentAlreadySubmitted);
            }
        }

        let from = round.handles.len() as u64 + 1;
        for handle in protected_data {
            round.handles.push(*handle);
            round.submitted.insert(*handle);
            let position = round.handles.len() as u64;
            self.record(RootEvent::IntentSubmitted {
                round_id,
                protected_data: *handle,
                position,
            });
        }
        let to = round.handles.len() as u64;
        Ok((from, to))
    }

    /// Close the round to further submissions. Owner only; idempotent.
    pub fn close_round(&self, caller: Address, round_id: B256) -> Result<(), RootRegistryError> {
        if caller != self.owner {
            return Err(RootRegistryError::NotOwner);
        }
        let mut round = self.rounds.entry(round_id).or_default();
        if !round.closed {
            round.closed = true;
            info!("Round {round_id} closed by owner");
            self.record(RootEvent::RoundClosedByOwner { round_id });
        }
        Ok(())
    }

    /// Post (or, for the bound matcher, re-post) the match-set root.
    pub fn post_root(
        &self,
        caller: Address,
        now: u64,
        round_id: B256,
        root: B256,
        valid_until: u64,
    ) -> Result<(), RootRegistryError> {
        let mut round = self.rounds.entry(round_id).or_default();
        if !round.closed {
            return Err(RootRegistryError::RoundNotClosed);
        }
        if round.locked {
            return Err(RootRegistryError::RootLocked);
        }
        if root == B256::ZERO {
            return Err(RootRegistryError::InvalidRoot);
        }
        if valid_until <= now {
            return Err(RootRegistryError::InvalidValidUntil);
        }
        if round.matcher != Address::ZERO && caller != round.matcher {
            return Err(RootRegistryError::NotMatcher);
        }

        if round.matcher == Address::ZERO {
            round.matcher = caller;
            info!("Matcher {caller} bound for round {round_id}");
            self.record(RootEvent::MatcherSet { round_id, matcher: caller });
        }
        round.root = root;
        round.valid_until = valid_until;
        info!("Root posted for round {round_id}: {root} valid until {valid_until}");
        self.record(RootEvent::RootPosted { round_id, root, valid_until });
        Ok(())
    }

    /// Make the posted root irrevocable. Matcher only; one-way.
    pub fn lock_root(&self, caller: Address, round_id: B256) -> Result<(), RootRegistryError> {
        let mut round = self.rounds.entry(round_id).or_default();
        if round.root == B256::ZERO {
            return Err(RootRegistryError::RootNotSet);
        }
        if caller != round.matcher {
            return Err(RootRegistryError::NotMatcher);
        }
        if !round.locked {
            round.locked = true;
            info!("Root locked for round {round_id}");
            self.record(RootEvent::RootLockedForRound { round_id });
        }
        Ok(())
    }

    // --- Views ---

    pub fn get_root(&self, round_id: B256) -> B256 {
        self.state(round_id).map(|s| s.root).unwrap_or(B256::ZERO)
    }

    pub fn get_root_valid_until(&self, round_id: B256) -> u64 {
        self.state(round_id).map(|s| s.valid_until).unwrap_or(0)
    }

    pub fn get_matcher(&self, round_id: B256) -> Address {
        self.state(round_id).map(|s| s.matcher).unwrap_or(Address::ZERO)
    }

    pub fn is_root_locked(&self, round_id: B256) -> bool {
        self.state(round_id).map(|s| s.locked).unwrap_or(false)
    }

    pub fn is_round_closed(&self, round_id: B256) -> bool {
        self.state(round_id).map(|s| s.closed).unwrap_or(false)
    }

    pub fn is_root_active(&self, round_id: B256, now: u64) -> bool {
        self.state(round_id)
            .map(|s| s.root != B256::ZERO && now <= s.valid_until)
            .unwrap_or(false)
    }

    pub fn get_round_info(&self, round_id: B256) -> RoundRootInfo {
        self.state(round_id)
            .map(|s| RoundRootInfo {
                root: s.root,
                valid_until: s.valid_until,
                matcher: s.matcher,
                root_locked: s.locked,
                round_closed: s.closed,
            })
            .unwrap_or(RoundRootInfo {
                root: B256::ZERO,
                valid_until: 0,
                matcher: Address::ZERO,
                root_locked: false,
                round_closed: false,
            })
    }

    pub fn submitted_count(&self, round_id: B256) -> u64 {
        self.state(round_id).map(|s| s.handles.len() as u64).unwrap_or(0)
    }

    pub fn has_submitted(&self, round_id: B256, protected_data: Address) -> bool {
        self.state(round_id)
            .map(|s| s.submitted.contains(&protected_data))
            .unwrap_or(false)
    }

    pub fn events(&self, round_id: B256) -> Vec<RootEvent> {
        self.events.get(&round_id).map(|e| e.clone()).unwrap_or_default()
    }

    fn state(&self, round_id: B256) -> Option<RoundState> {
        self.rounds.get(&round_id).map(|s| s.clone())
    }

    fn record(&self, event: RootEvent) {
        let round_id = match &event {
            RootEvent::IntentSubmitted { round_id, .. }
            | RootEvent::RoundClosedByOwner { round_id }
            | RootEvent::RootPosted { round_id, .. }
            | RootEvent::MatcherSet { round_id, .. }
            | RootEvent::RootLockedForRound { round_id } => *round_id,
        };
        self.events.entry(round_id).or_default().push(event);
    }
}
