use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub round: RoundConfig,
    pub matcher: MatcherConfig,
    pub redemption: RedemptionConfig,
    pub distribution: DistributionConfig,
    pub relayer: RelayerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Namespace folded into every round id.
    pub namespace: String,
    pub duration_seconds: u64,
    /// Intake sub-window at the front of each round.
    pub intake_window_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Hex private key of the TEE signer; empty = dry-run with a random key.
    pub private_key: String,
    /// Seconds past round end during which a posted root stays redeemable.
    pub root_validity_seconds: u64,
    /// Warn when commitment mismatches exceed this fraction (basis points).
    pub mismatch_warn_bps: u64,
    /// Lock the root immediately after posting.
    pub lock_after_post: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionConfig {
    /// Fraction of the signed minimum enforced after the swap, in basis
    /// points. 10_000 = strict enforcement.
    pub min_out_bps: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Allowed clock skew on private-access challenges, seconds.
    pub auth_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerConfig {
    pub poll_interval_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub max_attempts_per_round: u32,
    pub metrics_interval_secs: u64,
    /// How many ended rounds to sweep on startup (late-discovered rounds).
    pub catchup_rounds: u32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            namespace: "shadowpool:rounds:v1".into(),
            duration_seconds: 300,
            intake_window_seconds: 240,
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            private_key: String::new(),
            root_validity_seconds: 3600,
            mismatch_warn_bps: 2500,
            lock_after_post: false,
        }
    }
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self { min_out_bps: 10_000 }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self { auth_ttl_seconds: 300 }
    }
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            backoff_base_ms: 500,
            backoff_cap_ms: 60_000,
            max_attempts_per_round: 6,
            metrics_interval_secs: 30,
            catchup_rounds: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            round: RoundConfig::default(),
            matcher: MatcherConfig::default(),
            redemption: RedemptionConfig::default(),
            distribution: DistributionConfig::default(),
            relayer: RelayerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (.env file) with
    /// defaults.
    ///
    /// Optional env vars:
    ///   SHADOWPOOL_NAMESPACE — round id namespace
    ///   SHADOWPOOL_ROUND_SECONDS, SHADOWPOOL_INTAKE_SECONDS — round shape
    ///   SHADOWPOOL_MATCHER_KEY — hex key for leaf signing
    ///   SHADOWPOOL_ROOT_VALIDITY_SECONDS — redemption window per root
    ///   SHADOWPOOL_MIN_OUT_BPS — after-swap minimum-output policy
    ///   SHADOWPOOL_AUTH_TTL_SECONDS — private distribution challenge TTL
    ///   SHADOWPOOL_LOCK_AFTER_POST — lock each root right after posting
    ///   RUST_LOG — log level (default: info)
    ///   DRY_RUN — set to "true" to force a random matcher key
    pub fn load_or_default() -> Self {
        let _ = dotenv::dotenv();

        let mut config = Self::default();

        if let Ok(ns) = std::env::var("SHADOWPOOL_NAMESPACE") {
            if !ns.is_empty() {
                config.round.namespace = ns;
            }
        }
        if let Ok(secs) = std::env::var("SHADOWPOOL_ROUND_SECONDS") {
            if let Ok(v) = secs.parse() {
                config.round.duration_seconds = v;
            }
        }
        if let Ok(secs) = std::env::var("SHADOWPOOL_INTAKE_SECONDS") {
            if let Ok(v) = secs.parse() {
                config.round.intake_window_seconds = v;
            }
        }
        if let Ok(key) = std::env::var("SHADOWPOOL_MATCHER_KEY") {
            if key != "your_private_key_here" {
                config.matcher.private_key = key;
            }
        }
        if let Ok(secs) = std::env::var("SHADOWPOOL_ROOT_VALIDITY_SECONDS") {
            if let Ok(v) = secs.parse() {
                config.matcher.root_validity_seconds = v;
            }
        }
        if let Ok(bps) = std::env::var("SHADOWPOOL_MIN_OUT_BPS") {
            if let Ok(v) = bps.parse() {
                config.redemption.min_out_bps = v;
            }
        }
        if let Ok(secs) = std::env::var("SHADOWPOOL_AUTH_TTL_SECONDS") {
            if let Ok(v) = secs.parse() {
                config.distribution.auth_ttl_seconds = v;
            }
        }
        if let Ok(lock) = std::env::var("SHADOWPOOL_LOCK_AFTER_POST") {
            config.matcher.lock_after_post = lock == "true" || lock == "1";
        }

        let dry_run = std::env::var("DRY_RUN")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        if dry_run {
            config.matcher.private_key = String::new();
        }

        if config.matcher.private_key.is_empty() {
            tracing::warn!("No SHADOWPOOL_MATCHER_KEY set — entering DRY RUN mode");
            tracing::warn!("Leaves will be signed with a random key and fail on-chain recovery");
        }

        config
    }

    /// Check if running in dry-run mode (no real matcher key).
    pub fn is_dry_run(&self) -> bool {
        self.matcher.private_key.is_empty()
            || std::env::var("DRY_RUN")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.round.namespace.is_empty(),
            "round namespace must not be empty"
        );
        anyhow::ensure!(
            self.round.duration_seconds > 0,
            "round duration must be positive"
        );
        anyhow::ensure!(
            self.round.intake_window_seconds > 0
                && self.round.intake_window_seconds <= self.round.duration_seconds,
            "intake window must be positive and no longer than the round"
        );
        anyhow::ensure!(
            self.redemption.min_out_bps <= 10_000,
            "min_out_bps must be at most 10000"
        );
        anyhow::ensure!(
            self.matcher.root_validity_seconds > 0,
            "root validity must be positive"
        );
        anyhow::ensure!(
            self.relayer.backoff_base_ms > 0
                && self.relayer.backoff_base_ms <= self.relayer.backoff_cap_ms,
            "relayer backoff base must be positive and below the cap"
        );
        Ok(())
    }
}
