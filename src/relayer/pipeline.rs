//! The round pipeline: poll the clock, close ended rounds, invoke the
//! matcher and post roots.
//!
//! Each round flows through a linear task: close → fetch decrypted intents →
//! match (CPU-bound, behind `spawn_blocking`) → post root → publish.
//! Retryable failures back off exponentially with jitter; policy failures
//! (locked root, foreign matcher) abandon the round and are counted.

use alloy_primitives::{Address, B256};
use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::{MatcherConfig, RelayerConfig};
use crate::crypto::signing::TeeSigner;
use crate::distribution::MatchStore;
use crate::engine::{run_matching, MatchingInputs};
use crate::error::RootRegistryError;
use crate::models::intent::DecryptedIntent;
use crate::models::round::RoundClock;
use crate::registry::intents::IntentRegistry;
use crate::registry::roots::RootRegistry;
use crate::relayer::metrics::RelayerMetrics;

/// Opaque confidential transport: delivers decrypted intent records to the
/// matcher once a round is authorized for matching.
pub trait IntentSource: Send + Sync {
    fn fetch_round_intents(&self, round_id: B256) -> anyhow::Result<Vec<DecryptedIntent>>;
}

/// In-process transport used by the reference runtime and the test suites.
#[derive(Default)]
pub struct InMemoryIntentVault {
    rounds: DashMap<B256, Vec<DecryptedIntent>>,
}

impl InMemoryIntentVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&self, round_id: B256, intent: DecryptedIntent) {
        self.rounds.entry(round_id).or_default().push(intent);
    }
}

impl IntentSource for InMemoryIntentVault {
    fn fetch_round_intents(&self, round_id: B256) -> anyhow::Result<Vec<DecryptedIntent>> {
        Ok(self
            .rounds
            .get(&round_id)
            .map(|v| v.clone())
            .unwrap_or_default())
    }
}

enum PipelineError {
    /// Transient: transport or scheduling hiccups worth another attempt.
    Retryable(anyhow::Error),
    /// Policy: the round can never be completed by this relayer.
    Fatal(anyhow::Error),
}

pub struct Relayer {
    clock: RoundClock,
    registry: Arc<IntentRegistry>,
    roots: Arc<RootRegistry>,
    source: Arc<dyn IntentSource>,
    store: Arc<MatchStore>,
    signer: Arc<TeeSigner>,
    /// Authority for `close_round`.
    owner: Address,
    relayer_config: RelayerConfig,
    matcher_config: MatcherConfig,
    pub metrics: Arc<RelayerMetrics>,
}

impl Relayer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: RoundClock,
        registry: Arc<IntentRegistry>,
        roots: Arc<RootRegistry>,
        source: Arc<dyn IntentSource>,
        store: Arc<MatchStore>,
        signer: Arc<TeeSigner>,
        owner: Address,
        relayer_config: RelayerConfig,
        matcher_config: MatcherConfig,
    ) -> Self {
        Self {
            clock,
            registry,
            roots,
            source,
            store,
            signer,
            owner,
            relayer_config,
            matcher_config,
            metrics: Arc::new(RelayerMetrics::new()),
        }
    }

    /// Start the polling loop. Each ended round is processed once, as soon
    /// as the round after it has begun; on startup a catch-up window of
    /// recently ended rounds is swept for late-discovered intake.
    pub fn start(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let poll = tokio::time::Duration::from_millis(self.relayer_config.poll_interval_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll);
            let mut last_processed: Option<u64> = None;
            let duration = self.clock.duration_seconds();

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = Utc::now().timestamp() as u64;
                        let current_start = self.clock.round_start(now);
                        let Some(prev_start) = current_start.checked_sub(duration) else {
                            continue;
                        };
                        if last_processed == Some(prev_start) {
                            continue;
                        }
                        let window = duration
                            * u64::from(self.relayer_config.catchup_rounds.max(1) - 1);
                        let mut start = match last_processed {
                            Some(last) => last + duration,
                            None => prev_start.saturating_sub(window),
                        };
                        while start <= prev_start {
                            self.process_round(start).await;
                            start += duration;
                        }
                        last_processed = Some(prev_start);
                    }
                    _ = shutdown.recv() => {
                        info!("Relayer shutdown");
                        return;
                    }
                }
            }
        });
    }

    /// Drive one round to completion with retry/backoff. Public so the
    /// reference runtime and tests can invoke rounds directly.
    pub async fn process_round(&self, round_start: u64) {
        let round_id = self.clock.round_id_for_start(round_start);
        RelayerMetrics::incr(&self.metrics.rounds_processed);

        for attempt in 1..=self.relayer_config.max_attempts_per_round {
            match self.try_process(round_start, round_id).await {
                Ok(()) => {
                    self.metrics.record_success();
                    return;
                }
                Err(PipelineError::Fatal(e)) => {
                    error!("Round {round_id} abandoned: {e}");
                    RelayerMetrics::incr(&self.metrics.rounds_abandoned);
                    self.metrics.record_error();
                    return;
                }
                Err(PipelineError::Retryable(e)) => {
                    let errors = self.metrics.record_error();
                    let delay = self.backoff_ms(attempt);
                    warn!(
                        "Round {round_id} attempt {attempt} failed ({errors} consecutive): {e} — retrying in {delay}ms"
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
                }
            }
        }
        error!(
            "Round {round_id} gave up after {} attempts",
            self.relayer_config.max_attempts_per_round
        );
        RelayerMetrics::incr(&self.metrics.rounds_abandoned);
    }

    async fn try_process(&self, round_start: u64, round_id: B256) -> Result<(), PipelineError> {
        let now = Utc::now().timestamp() as u64;

        if self.roots.is_root_locked(round_id) {
            return Err(PipelineError::Fatal(anyhow::anyhow!("root already locked")));
        }
        if !self.roots.is_round_closed(round_id) {
            self.roots
                .close_round(self.owner, round_id)
                .map_err(|e| PipelineError::Fatal(e.into()))?;
        }

        let refs = self.registry.get_intent_refs(round_id);
        if refs.is_empty() {
            info!("Round {round_id}: no registered intents");
            RelayerMetrics::incr(&self.metrics.rounds_empty);
            return Ok(());
        }

        let intents = self
            .source
            .fetch_round_intents(round_id)
            .map_err(PipelineError::Retryable)?;

        let valid_until = now + self.matcher_config.root_validity_seconds;
        let inputs = MatchingInputs {
            round_id,
            round_label: self.clock.round_label(round_start),
            round_end: round_start + self.clock.duration_seconds(),
            valid_until: Some(valid_until),
            refs,
            intents,
            generated_at: Utc::now(),
            mismatch_warn_bps: self.matcher_config.mismatch_warn_bps,
        };

        let signer = self.signer.clone();
        let result = tokio::task::spawn_blocking(move || run_matching(&inputs, &signer))
            .await
            .map_err(|e| PipelineError::Retryable(e.into()))?
            .map_err(|e| {
                RelayerMetrics::incr(&self.metrics.match_failures);
                PipelineError::Fatal(e.into())
            })?;
        RelayerMetrics::incr(&self.metrics.rounds_matched);

        if let Some(root) = result.merkle_root {
            self.roots
                .post_root(self.signer.address(), now, round_id, root, valid_until)
                .map_err(|e| {
                    RelayerMetrics::incr(&self.metrics.post_failures);
                    match e {
                        RootRegistryError::RootLocked | RootRegistryError::NotMatcher => {
                            PipelineError::Fatal(e.into())
                        }
                        other => PipelineError::Retryable(other.into()),
                    }
                })?;
            RelayerMetrics::incr(&self.metrics.roots_posted);

            if self.matcher_config.lock_after_post {
                self.roots
                    .lock_root(self.signer.address(), round_id)
                    .map_err(|e| PipelineError::Fatal(e.into()))?;
                RelayerMetrics::incr(&self.metrics.roots_locked);
            }
        }

        self.store.publish(result);
        Ok(())
    }

    fn backoff_ms(&self, attempt: u32) -> u64 {
        let base = self.relayer_config.backoff_base_ms;
        let exp = base.saturating_mul(1u64 << (attempt - 1).min(16));
        let capped = exp.min(self.relayer_config.backoff_cap_ms);
        capped + rand::thread_rng().gen_range(0..=base)
    }
}
