use alloy_primitives::{keccak256, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Maps wall time onto fixed-duration clearing rounds.
///
/// Rounds are aligned to clean boundaries: `start = ⌊t/duration⌋·duration`,
/// and identified by `keccak256(namespace ‖ uint256(start))`. Intents are
/// accepted only during the intake sub-window at the front of each round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundClock {
    namespace: String,
    duration_seconds: u64,
    intake_window_seconds: u64,
}

impl RoundClock {
    pub fn new(
        namespace: impl Into<String>,
        duration_seconds: u64,
        intake_window_seconds: u64,
    ) -> Result<Self, RegistryError> {
        if intake_window_seconds == 0 || intake_window_seconds > duration_seconds {
            return Err(RegistryError::InvalidRoundConfig);
        }
        Ok(Self {
            namespace: namespace.into(),
            duration_seconds,
            intake_window_seconds,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn intake_window_seconds(&self) -> u64 {
        self.intake_window_seconds
    }

    /// Start of the round containing `now`.
    pub fn round_start(&self, now: u64) -> u64 {
        (now / self.duration_seconds) * self.duration_seconds
    }

    /// End (exclusive) of the round containing `now`.
    pub fn round_end(&self, now: u64) -> u64 {
        self.round_start(now) + self.duration_seconds
    }

    /// Round id for the round starting at `start`.
    pub fn round_id_for_start(&self, start: u64) -> B256 {
        let mut preimage = Vec::with_capacity(self.namespace.len() + 32);
        preimage.extend_from_slice(self.namespace.as_bytes());
        preimage.extend_from_slice(&U256::from(start).to_be_bytes::<32>());
        keccak256(&preimage)
    }

    /// Round id for the round containing `now`.
    pub fn round_id(&self, now: u64) -> B256 {
        self.round_id_for_start(self.round_start(now))
    }

    /// Whether `now` is still inside the intake sub-window of its round.
    pub fn in_intake(&self, now: u64) -> bool {
        now - self.round_start(now) < self.intake_window_seconds
    }

    /// Human-readable round label used in off-chain artifacts.
    pub fn round_label(&self, start: u64) -> String {
        format!("{}:{}", self.namespace, start)
    }
}
