//! The single invoke boundary of the matching engine.
//!
//! `run_matching` is a synchronous pure function of its inputs: two runs over
//! the same round, eligible set and signer produce bit-identical artifacts.
//! Callers own the suspension points (transport fetch, registry reads) and
//! hand everything in by value.

use alloy_primitives::{keccak256, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::crypto::abi;
use crate::crypto::merkle::MerkleTree;
use crate::crypto::signing::TeeSigner;
use crate::engine::book::build_books;
use crate::engine::clearing::{clear_books, RawFill};
use crate::engine::eligibility::filter_eligible;
use crate::error::EngineError;
use crate::models::fill::{MatchRecord, MatchingResult};
use crate::models::intent::{DecryptedIntent, IntentRef, Side};

pub struct MatchingInputs {
    pub round_id: B256,
    /// Human-readable round label carried into the artifact.
    pub round_label: String,
    /// End of the round (unix seconds); eligibility requires expiry past it.
    pub round_end: u64,
    /// Planned root validity deadline, when known at matching time.
    pub valid_until: Option<u64>,
    /// Registration records in insertion order.
    pub refs: Vec<IntentRef>,
    /// Decrypted intents from the confidential transport.
    pub intents: Vec<DecryptedIntent>,
    /// Artifact timestamp, injected so reruns stay reproducible.
    pub generated_at: DateTime<Utc>,
    /// Diagnostic threshold for commitment mismatches, basis points.
    pub mismatch_warn_bps: u64,
}

/// Run one round of deterministic clearing and assemble the signed artifact.
pub fn run_matching(
    inputs: &MatchingInputs,
    signer: &TeeSigner,
) -> Result<MatchingResult, EngineError> {
    let intents_count = inputs.intents.len();
    let mut outcome = filter_eligible(&inputs.intents, &inputs.refs, inputs.round_end);
    let eligible_count = outcome.eligible.len();

    let mut debug_summary = None;
    if intents_count > 0 {
        let mismatch_bps = (outcome.commitment_mismatches as u64 * 10_000) / intents_count as u64;
        if mismatch_bps > inputs.mismatch_warn_bps {
            let summary = format!(
                "{} of {} intents failed commitment binding ({} bps)",
                outcome.commitment_mismatches, intents_count, mismatch_bps
            );
            warn!("Round {}: {summary}", inputs.round_id);
            debug_summary = Some(summary);
        }
    }

    let mut build = build_books(&outcome.eligible)?;
    outcome.debug_errors.append(&mut build.debug_errors);

    let fills = clear_books(&mut build.books)?;
    debug!(
        "Round {}: {eligible_count}/{intents_count} eligible, {} fills",
        inputs.round_id,
        fills.len()
    );

    let mut matches = Vec::with_capacity(fills.len() * 2);
    for fill in &fills {
        matches.push(build_record(inputs.round_id, fill, Side::Buy));
        matches.push(build_record(inputs.round_id, fill, Side::Sell));
    }

    let leaves: Vec<B256> = matches.iter().map(|m| m.leaf).collect();
    let tree = MerkleTree::from_leaves(leaves);
    let merkle_root = tree.root();

    for (i, record) in matches.iter_mut().enumerate() {
        record.merkle_proof = tree.proof(i);
        let sig = signer
            .sign_leaf(&record.leaf)
            .map_err(|e| EngineError::Signing(e.to_string()))?;
        record.signature = Bytes::from(sig.to_vec());
    }

    let min_match_expiry = matches.iter().map(|m| m.expiry).min();
    let round_expiry = match (inputs.valid_until, min_match_expiry) {
        (Some(valid), Some(expiry)) => Some(valid.min(expiry)),
        (_, expiry) => expiry,
    };

    if matches.is_empty() {
        info!("Round {}: no crosses, empty match set", inputs.round_id);
    } else {
        info!(
            "Round {}: {} matches, root {}",
            inputs.round_id,
            matches.len(),
            merkle_root.unwrap_or_default()
        );
    }

    Ok(MatchingResult {
        round_id: inputs.round_label.clone(),
        round_id_bytes32: inputs.round_id,
        merkle_root,
        round_expiry,
        generated_at: inputs.generated_at,
        tee_signer: signer.address(),
        intents_count,
        eligible_intents_count: eligible_count,
        matches,
        debug_errors: outcome.debug_errors,
        debug_summary,
    })
}

/// Build one perspective of a bilateral fill. Proof and signature are
/// attached after the full leaf set is known.
fn build_record(round_id: B256, fill: &RawFill, side: Side) -> MatchRecord {
    let (trader, counterparty, token_in, token_out, amount_in, min_amount_out) = match side {
        Side::Buy => (
            fill.buyer,
            fill.seller,
            fill.quote,
            fill.base,
            fill.trade_quote,
            fill.min_out_buy,
        ),
        Side::Sell => (
            fill.seller,
            fill.buyer,
            fill.base,
            fill.quote,
            fill.trade_base,
            fill.min_out_sell,
        ),
    };

    let match_id = format!(
        "fill:{}:{}:{}:0x{}",
        fill.fill_index,
        side.label(),
        fill.pair.to_hex(),
        hex::encode(round_id)
    );
    let match_id_hash = keccak256(match_id.as_bytes());
    let leaf = abi::match_leaf(
        round_id,
        match_id_hash,
        trader,
        counterparty,
        token_in,
        token_out,
        amount_in,
        min_amount_out,
        U256::from(fill.expiry),
    );

    MatchRecord {
        match_id,
        match_id_hash,
        round_id,
        trader,
        counterparty,
        token_in,
        token_out,
        amount_in,
        min_amount_out,
        expiry: fill.expiry,
        merkle_proof: Vec::new(),
        leaf,
        signature: Bytes::new(),
    }
}
