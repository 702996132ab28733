//! Deterministic single-round simulation.
//!
//! Drives one clearing round end to end with fixed timestamps: intake →
//! close → matching → root posting → redemption through the hook → private
//! distribution. Prints the round artifact JSON and the redemption outcomes.
//!
//! Usage:  cargo run --bin simulate

use shadowpool::crypto::abi::{self, RedemptionPayload};
use shadowpool::crypto::signing::TeeSigner;
use shadowpool::distribution::{access_challenge, AccessHeaders, MatchStore};
use shadowpool::engine::{run_matching, MatchingInputs};
use shadowpool::error::HookError;
use shadowpool::hook::RedemptionHook;
use shadowpool::models::fill::MatchRecord;
use shadowpool::models::intent::{wad_from_str, DecryptedIntent, Intent, Side};
use shadowpool::models::pool::{BalanceDelta, PoolKey, SwapParams};
use shadowpool::models::round::RoundClock;
use shadowpool::models::token::WAD;
use shadowpool::registry::intents::IntentRegistry;
use shadowpool::registry::roots::RootRegistry;

use alloy_primitives::{Address, Bytes, B256, I256, U256};
use chrono::TimeZone;
use std::sync::Arc;
use tracing::info;

// Fixed scenario clock: one 300s round with a 240s intake window.
const ROUND_START: u64 = 1_700_000_100;
const ROUND_END: u64 = ROUND_START + 300;
const VALID_UNTIL: u64 = ROUND_END + 3600;

const BASE: Address = Address::repeat_byte(0x01);
const QUOTE: Address = Address::repeat_byte(0x02);

fn pool() -> PoolKey {
    PoolKey {
        currency0: BASE,
        currency1: QUOTE,
        fee: 3000,
        tick_spacing: 60,
        hooks: Address::repeat_byte(0xfe),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("=== ShadowPool single-round simulation ===");

    let clock = RoundClock::new("shadowpool:simulate", 300, 240)
        .map_err(|e| anyhow::anyhow!("round clock: {e}"))?;
    let signer = TeeSigner::random();
    let owner = signer.address();
    let roots = Arc::new(RootRegistry::new(owner));
    let registry = IntentRegistry::new(clock.clone(), owner, roots.clone());
    let round_id = clock.round_id(ROUND_START);

    // --- Intake: three traders, two crossing levels plus a resting bid ---
    let book = [
        (Side::Buy, Address::repeat_byte(0x11), 10u64, "2", Some("0.02")),
        (Side::Sell, Address::repeat_byte(0x12), 10u64, "1", Some("0.01")),
        (Side::Buy, Address::repeat_byte(0x13), 5u64, "0.4", None),
    ];
    let mut decrypted = Vec::new();
    for (n, (side, trader, amount, price, slippage)) in book.into_iter().enumerate() {
        let handle = Address::repeat_byte(0xa0 + n as u8);
        let intent = Intent {
            side,
            trader,
            base_token: BASE,
            quote_token: QUOTE,
            amount_base: U256::from(amount) * WAD,
            limit_price_wad: wad_from_str(price).expect("price literal"),
            expiry: ROUND_END + 600,
            salt: B256::repeat_byte(n as u8 + 1),
            slippage_min: None,
            slippage_max: slippage.map(|s| wad_from_str(s).expect("slippage literal")),
            notes: String::new(),
        };
        let position = registry
            .register_intent(
                trader,
                ROUND_START + 1 + n as u64,
                round_id,
                handle,
                abi::intent_commitment(&intent),
            )
            .map_err(|e| anyhow::anyhow!("intake: {e}"))?;
        info!("Registered {side:?} {amount}@{price} for {trader} at position {position}");
        decrypted.push(DecryptedIntent { protected_data: handle, intent });
    }

    // --- Close and match ---
    roots
        .close_round(owner, round_id)
        .map_err(|e| anyhow::anyhow!("close: {e}"))?;
    let inputs = MatchingInputs {
        round_id,
        round_label: clock.round_label(ROUND_START),
        round_end: ROUND_END,
        valid_until: Some(VALID_UNTIL),
        refs: registry.get_intent_refs(round_id),
        intents: decrypted,
        generated_at: chrono::Utc
            .timestamp_opt(ROUND_END as i64, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("bad timestamp"))?,
        mismatch_warn_bps: 2500,
    };
    let result = run_matching(&inputs, &signer).map_err(|e| anyhow::anyhow!("matcher: {e}"))?;
    info!(
        "Matched: {} records from {} intents ({} eligible)",
        result.matches.len(),
        result.intents_count,
        result.eligible_intents_count
    );

    let root = result
        .merkle_root
        .ok_or_else(|| anyhow::anyhow!("scenario should cross"))?;
    roots
        .post_root(signer.address(), ROUND_END, round_id, root, VALID_UNTIL)
        .map_err(|e| anyhow::anyhow!("post root: {e}"))?;
    roots
        .lock_root(signer.address(), round_id)
        .map_err(|e| anyhow::anyhow!("lock root: {e}"))?;
    info!("Root posted and locked: {root}");

    println!("{}", serde_json::to_string_pretty(&result)?);

    // --- Redeem both legs of the bilateral fill ---
    let hook = RedemptionHook::new(owner, roots.clone(), signer.address(), 10_000);
    let redeem_at = ROUND_END + 60;
    for record in &result.matches {
        redeem(&hook, record, redeem_at)?;

        let replay = hook.before_swap(
            record.trader,
            &pool(),
            &swap_params(record),
            &payload(record).encode(),
            redeem_at,
        );
        anyhow::ensure!(
            replay == Err(HookError::MatchAlreadyUsed),
            "replay must be rejected"
        );
    }
    info!("Replay attempts rejected with MatchAlreadyUsed");

    // --- Private distribution ---
    let store = MatchStore::new(300);
    store.publish(result.clone());
    let wallet_sim = TeeSigner::random();
    let challenge = access_challenge(Address::repeat_byte(0x11), redeem_at);
    // The simulation cannot sign for trader 0x11; show the rejection path,
    // then fetch the public digest.
    let headers = AccessHeaders {
        address: Address::repeat_byte(0x11),
        signature: wallet_sim.sign_message(&challenge)?.to_vec(),
        timestamp: redeem_at,
    };
    let denied = store.private_matches(round_id, &headers, redeem_at);
    info!("Foreign wallet denied private access: {denied:?}");
    let digest = store
        .public_digest(round_id)
        .map_err(|e| anyhow::anyhow!("digest: {e}"))?;
    info!(
        "Public digest: {} matches, root {:?}, expires {:?}",
        digest.matches_count, digest.merkle_root, digest.round_expiry
    );

    info!("=== simulation complete ===");
    Ok(())
}

fn payload(record: &MatchRecord) -> RedemptionPayload {
    RedemptionPayload {
        roundId: record.round_id,
        matchIdHash: record.match_id_hash,
        trader: record.trader,
        counterparty: record.counterparty,
        tokenIn: record.token_in,
        tokenOut: record.token_out,
        amountIn: record.amount_in,
        minAmountOut: record.min_amount_out,
        expiry: U256::from(record.expiry),
        proof: record.merkle_proof.clone(),
        signature: Bytes::from(record.signature.to_vec()),
    }
}

fn swap_params(record: &MatchRecord) -> SwapParams {
    SwapParams {
        zero_for_one: record.token_in == BASE,
        amount_specified: -I256::try_from(record.amount_in).expect("amount fits"),
    }
}

/// Run before-swap, simulate an exact-output swap, then run after-swap.
fn redeem(hook: &RedemptionHook, record: &MatchRecord, now: u64) -> anyhow::Result<()> {
    let params = swap_params(record);
    let data = payload(record).encode();
    hook.before_swap(record.trader, &pool(), &params, &data, now)
        .map_err(|e| anyhow::anyhow!("before-swap: {e}"))?;

    // The simulated AMM delivers exactly the enforced minimum.
    let out_signed = I256::try_from(record.min_amount_out).expect("output fits");
    let in_signed = -I256::try_from(record.amount_in).expect("input fits");
    let delta = if params.zero_for_one {
        BalanceDelta { amount0: in_signed, amount1: out_signed }
    } else {
        BalanceDelta { amount0: out_signed, amount1: in_signed }
    };
    hook.after_swap(&params, &delta, &data)
        .map_err(|e| anyhow::anyhow!("after-swap: {e}"))?;
    info!(
        "Redeemed {} for {}: {} in, {} min out",
        record.match_id, record.trader, record.amount_in, record.min_amount_out
    );
    Ok(())
}
