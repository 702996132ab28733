//! ShadowPool reference runtime.
//!
//! Wires the round clock, registries, matching engine, redemption hook and
//! distribution store into one process and runs the relayer loop. In dry-run
//! mode (no matcher key) a pair of synthetic traders populate each round so
//! the whole pipeline can be observed end to end.

use shadowpool::config::Config;
use shadowpool::crypto::abi;
use shadowpool::crypto::signing::TeeSigner;
use shadowpool::distribution::MatchStore;
use shadowpool::hook::RedemptionHook;
use shadowpool::models::intent::{DecryptedIntent, Intent, Side};
use shadowpool::models::round::RoundClock;
use shadowpool::models::token::{Token, WAD};
use shadowpool::registry::intents::IntentRegistry;
use shadowpool::registry::roots::RootRegistry;
use shadowpool::relayer::{InMemoryIntentVault, Relayer};

use alloy_primitives::{Address, B256, U256};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("================================================");
    info!("  SHADOWPOOL — Confidential Batch Auction v0.1.0");
    info!("  Round-based price-time clearing with on-chain roots");
    info!("================================================");

    let config = Config::load_or_default();
    if let Err(e) = config.validate() {
        error!("Config validation failed: {e}");
        anyhow::bail!("invalid configuration");
    }

    let dry_run = config.is_dry_run();
    if dry_run {
        warn!("DRY RUN MODE — leaves will be signed with a random key");
    }

    // === Initialize components ===

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let clock = RoundClock::new(
        config.round.namespace.clone(),
        config.round.duration_seconds,
        config.round.intake_window_seconds,
    )
    .map_err(|e| anyhow::anyhow!("round clock: {e}"))?;

    let signer = Arc::new(TeeSigner::new(&config.matcher.private_key));
    let owner = signer.address();

    let roots = Arc::new(RootRegistry::new(owner));
    let registry = Arc::new(IntentRegistry::new(clock.clone(), owner, roots.clone()));
    let vault = Arc::new(InMemoryIntentVault::new());
    let store = Arc::new(MatchStore::new(config.distribution.auth_ttl_seconds));
    let hook = Arc::new(RedemptionHook::new(
        owner,
        roots.clone(),
        signer.address(),
        config.redemption.min_out_bps,
    ));

    let relayer = Arc::new(Relayer::new(
        clock.clone(),
        registry.clone(),
        roots.clone(),
        vault.clone(),
        store.clone(),
        signer.clone(),
        owner,
        config.relayer.clone(),
        config.matcher.clone(),
    ));

    info!("--- Round configuration ---");
    info!("  Namespace:     {}", config.round.namespace);
    info!("  Duration:      {}s", config.round.duration_seconds);
    info!("  Intake window: {}s", config.round.intake_window_seconds);
    info!("  Root validity: {}s", config.matcher.root_validity_seconds);

    info!("--- Redemption configuration ---");
    info!("  TEE signer:    {}", hook.tee_signer());
    info!("  min_out_bps:   {}", config.redemption.min_out_bps);
    info!("  Auth TTL:      {}s", config.distribution.auth_ttl_seconds);

    // === Start the relayer loop ===
    relayer.clone().start(shutdown_tx.subscribe());
    info!("Relayer loop started");

    // === Spawn metrics summary loop ===
    {
        let metrics = relayer.metrics.clone();
        let store = store.clone();
        let interval_secs = config.relayer.metrics_interval_secs;
        let mut shutdown_rx = shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        metrics.log_summary();
                        info!("Distribution: {} rounds published", store.round_count());
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
    }

    // === Dry run: synthetic traders keep the pipeline busy ===
    if dry_run {
        let registry = registry.clone();
        let vault = vault.clone();
        let clock = clock.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();

        tokio::spawn(async move {
            let base = Token { address: Address::repeat_byte(0x01), decimals: 18 };
            let quote = Token { address: Address::repeat_byte(0x02), decimals: 18 };
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(5));
            let mut seeded_round: Option<B256> = None;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = Utc::now().timestamp() as u64;
                        if !clock.in_intake(now) {
                            continue;
                        }
                        let round_id = clock.round_id(now);
                        if seeded_round == Some(round_id) {
                            continue;
                        }

                        let mut rng = rand::thread_rng();
                        let sides = [
                            (Side::Buy, Address::repeat_byte(0x11), WAD * U256::from(2u64)),
                            (Side::Sell, Address::repeat_byte(0x12), WAD),
                        ];
                        let mut ok = true;
                        for (side, trader, price) in sides {
                            let mut salt = [0u8; 32];
                            rng.fill(&mut salt);
                            let mut handle = [0u8; 20];
                            rng.fill(&mut handle);
                            let intent = Intent {
                                side,
                                trader,
                                base_token: base.address,
                                quote_token: quote.address,
                                amount_base: U256::from(10u64) * WAD,
                                limit_price_wad: price,
                                expiry: now + 86_400,
                                salt: B256::from(salt),
                                slippage_min: None,
                                slippage_max: Some(U256::from(20_000_000_000_000_000u64)),
                                notes: String::new(),
                            };
                            let handle = Address::from_slice(&handle);
                            let commitment = abi::intent_commitment(&intent);
                            match registry.register_intent(trader, now, round_id, handle, commitment) {
                                Ok(position) => {
                                    vault.deposit(round_id, DecryptedIntent {
                                        protected_data: handle,
                                        intent,
                                    });
                                    info!("Demo intent registered at position {position}");
                                }
                                Err(e) => {
                                    warn!("Demo registration failed: {e}");
                                    ok = false;
                                }
                            }
                        }
                        if ok {
                            seeded_round = Some(round_id);
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
        info!("Synthetic traders started (dry run)");
    }

    info!("=== SHADOWPOOL running ===");
    info!("Press Ctrl+C to shutdown.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Cleaning up...");
    let _ = shutdown_tx.send(());

    relayer.metrics.log_summary();
    info!("SHADOWPOOL shutdown complete.");
    Ok(())
}
