//! Matching engine scenarios: deterministic price-time clearing over
//! synthetic rounds, from single crosses through dust rounding and
//! cross-pair isolation.

use alloy_primitives::{keccak256, Address, B256, U256};
use chrono::{TimeZone, Utc};

use shadowpool::crypto::abi;
use shadowpool::crypto::merkle::verify_proof;
use shadowpool::crypto::signing::{recover_leaf_signer, TeeSigner};
use shadowpool::engine::{run_matching, MatchingInputs};
use shadowpool::models::fill::MatchingResult;
use shadowpool::models::intent::{wad_from_str, DecryptedIntent, Intent, IntentRef, Side};
use shadowpool::models::token::WAD;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ROUND_END: u64 = 1_700_000_400;
const ROUND_ID: B256 = B256::repeat_byte(0xab);

fn addr(last: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    Address::from_slice(&bytes)
}

/// Builds a round's registration records and decrypted intents in lockstep,
/// the way intake followed by transport delivery would.
#[derive(Default)]
struct RoundFixture {
    refs: Vec<IntentRef>,
    intents: Vec<DecryptedIntent>,
}

impl RoundFixture {
    fn new() -> Self {
        Self::default()
    }

    /// Add an intent with `amount` whole base tokens at a decimal price.
    fn add(&mut self, side: Side, trader: Address, base: Address, quote: Address, amount: u64, price: &str) {
        self.add_full(side, trader, base, quote, amount, price, ROUND_END + 600, None);
    }

    #[allow(clippy::too_many_arguments)]
    fn add_full(
        &mut self,
        side: Side,
        trader: Address,
        base: Address,
        quote: Address,
        amount: u64,
        price: &str,
        expiry: u64,
        slippage_max: Option<U256>,
    ) {
        let position = self.refs.len() as u64 + 1;
        let handle = addr(0xa0 + position as u8);
        let intent = Intent {
            side,
            trader,
            base_token: base,
            quote_token: quote,
            amount_base: U256::from(amount) * WAD,
            limit_price_wad: wad_from_str(price).expect("price"),
            expiry,
            salt: B256::repeat_byte(position as u8),
            slippage_min: None,
            slippage_max,
            notes: String::new(),
        };
        self.refs.push(IntentRef {
            trader,
            protected_data: handle,
            commitment: abi::intent_commitment(&intent),
            intent_id: abi::intent_id(ROUND_ID, trader, handle, abi::intent_commitment(&intent)),
            timestamp: ROUND_END - 300,
            position,
        });
        self.intents.push(DecryptedIntent { protected_data: handle, intent });
    }

    fn inputs(&self) -> MatchingInputs {
        MatchingInputs {
            round_id: ROUND_ID,
            round_label: "shadowpool:test:1700000100".into(),
            round_end: ROUND_END,
            valid_until: Some(ROUND_END + 3600),
            refs: self.refs.clone(),
            intents: self.intents.clone(),
            generated_at: Utc.timestamp_opt(ROUND_END as i64, 0).unwrap(),
            mismatch_warn_bps: 2500,
        }
    }

    fn run(&self, signer: &TeeSigner) -> MatchingResult {
        run_matching(&self.inputs(), signer).expect("matching")
    }
}

fn units(n: u64) -> U256 {
    U256::from(n) * WAD
}

// ---------------------------------------------------------------------------
// Seeded clearing scenarios
// ---------------------------------------------------------------------------

/// Bid {10 @ 2} against ask {10 @ 1}: one cross at the ask's price.
#[test]
fn test_two_intent_cross() {
    let base = addr(1);
    let quote = addr(2);
    let buyer = addr(0x11);
    let seller = addr(0x12);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, buyer, base, quote, 10, "2");
    fixture.add(Side::Sell, seller, base, quote, 10, "1");

    let result = fixture.run(&TeeSigner::random());
    assert_eq!(result.intents_count, 2);
    assert_eq!(result.eligible_intents_count, 2);
    assert_eq!(result.matches.len(), 2);

    let buy = &result.matches[0];
    assert_eq!(buy.trader, buyer);
    assert_eq!(buy.counterparty, seller);
    assert_eq!(buy.token_in, quote);
    assert_eq!(buy.token_out, base);
    assert_eq!(buy.amount_in, units(10));

    let sell = &result.matches[1];
    assert_eq!(sell.trader, seller);
    assert_eq!(sell.counterparty, buyer);
    assert_eq!(sell.token_in, base);
    assert_eq!(sell.token_out, quote);
    assert_eq!(sell.amount_in, units(10));
}

/// Bid {30 @ 2} walks three ask levels in ascending price order.
#[test]
fn test_price_levels() {
    let base = addr(1);
    let quote = addr(2);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, addr(0x11), base, quote, 30, "2");
    fixture.add(Side::Sell, addr(0x12), base, quote, 10, "0.5");
    fixture.add(Side::Sell, addr(0x13), base, quote, 10, "1");
    fixture.add(Side::Sell, addr(0x14), base, quote, 10, "1.5");

    let result = fixture.run(&TeeSigner::random());
    assert_eq!(result.matches.len(), 6);

    let buy_amounts: Vec<U256> = result
        .matches
        .iter()
        .filter(|m| m.trader == addr(0x11))
        .map(|m| m.amount_in)
        .collect();
    assert_eq!(buy_amounts, vec![units(5), units(10), units(15)]);
}

/// Two asks at the same price fill in registration order.
#[test]
fn test_same_price_ties_resolve_by_position() {
    let base = addr(1);
    let quote = addr(2);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, addr(0x11), base, quote, 15, "2");
    fixture.add(Side::Sell, addr(0x12), base, quote, 5, "1");
    fixture.add(Side::Sell, addr(0x13), base, quote, 10, "1");

    let result = fixture.run(&TeeSigner::random());
    let ask_fills: Vec<(Address, U256)> = result
        .matches
        .iter()
        .filter(|m| m.token_in == base)
        .map(|m| (m.trader, m.amount_in))
        .collect();
    assert_eq!(
        ask_fills,
        vec![(addr(0x12), units(5)), (addr(0x13), units(10))]
    );
}

/// One bid sweeps two asks: fills 10 then 15.
#[test]
fn test_one_to_many() {
    let base = addr(1);
    let quote = addr(2);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, addr(0x11), base, quote, 25, "2");
    fixture.add(Side::Sell, addr(0x12), base, quote, 10, "1");
    fixture.add(Side::Sell, addr(0x13), base, quote, 15, "1");

    let result = fixture.run(&TeeSigner::random());
    let base_fills: Vec<U256> = result
        .matches
        .iter()
        .filter(|m| m.token_in == base)
        .map(|m| m.amount_in)
        .collect();
    assert_eq!(base_fills, vec![units(10), units(15)]);
}

/// Quote amounts floor: 10 base at 0.333…3 clears to exactly
/// 3_333_333_333_333_333_330 quote-wei.
#[test]
fn test_dust_rounding_floors_quote() {
    let base = addr(1);
    let quote = addr(2);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, addr(0x11), base, quote, 10, "2");
    fixture.add(Side::Sell, addr(0x12), base, quote, 10, "0.333333333333333333");

    let result = fixture.run(&TeeSigner::random());
    let buy = result
        .matches
        .iter()
        .find(|m| m.trader == addr(0x11))
        .unwrap();
    assert_eq!(buy.amount_in, U256::from(3_333_333_333_333_333_330u64));

    // Balanced flooring: the quote leg equals floor(base · p / 1e18).
    let sell = result
        .matches
        .iter()
        .find(|m| m.trader == addr(0x12))
        .unwrap();
    let price = wad_from_str("0.333333333333333333").unwrap();
    assert_eq!(buy.amount_in, sell.amount_in * price / WAD);
}

/// An intent quoted in the opposite orientation is normalized: side flips,
/// price inverts, and the amount is rescaled into canonical-base units.
#[test]
fn test_opposite_orientation_crosses() {
    let base = addr(1);
    let quote = addr(2);
    let reoriented = addr(0x11);
    let seller = addr(0x12);
    let mut fixture = RoundFixture::new();
    // Sell 10 of the max token at 0.5 min-per-max ⇒ canonical bid for
    // 5 base at 2 quote-per-base.
    fixture.add(Side::Sell, reoriented, quote, base, 10, "0.5");
    fixture.add(Side::Sell, seller, base, quote, 5, "1");

    let result = fixture.run(&TeeSigner::random());
    assert_eq!(result.matches.len(), 2);

    let buy = result.matches.iter().find(|m| m.trader == reoriented).unwrap();
    assert_eq!(buy.token_in, quote);
    assert_eq!(buy.token_out, base);
    assert_eq!(buy.amount_in, units(5));

    let sell = result.matches.iter().find(|m| m.trader == seller).unwrap();
    assert_eq!(sell.amount_in, units(5));
}

/// Emission order follows ascending pair key, not registration order, and
/// fill indices stay globally monotonic across pairs.
#[test]
fn test_pair_iteration_order() {
    let a = addr(1);
    let b = addr(2);
    let c = addr(3);
    let mut fixture = RoundFixture::new();
    // The (a,c) pair registers first but must clear second.
    fixture.add(Side::Buy, addr(0x11), a, c, 10, "2");
    fixture.add(Side::Sell, addr(0x12), a, c, 10, "1");
    fixture.add(Side::Buy, addr(0x13), a, b, 10, "2");
    fixture.add(Side::Sell, addr(0x14), a, b, 10, "1");

    let result = fixture.run(&TeeSigner::random());
    assert_eq!(result.matches.len(), 4);
    let quote_of = |i: usize| {
        let m = &result.matches[i];
        if m.token_in == a { m.token_out } else { m.token_in }
    };
    assert_eq!(quote_of(0), b);
    assert_eq!(quote_of(1), b);
    assert_eq!(quote_of(2), c);
    assert_eq!(quote_of(3), c);
    assert!(result.matches[0].match_id.starts_with("fill:0:"));
    assert!(result.matches[2].match_id.starts_with("fill:1:"));
}

/// Intents on (A,B) and (A,C) never cross pairs.
#[test]
fn test_cross_pair_isolation() {
    let a = addr(1);
    let b = addr(2);
    let c = addr(3);
    let mut fixture = RoundFixture::new();
    // (A,B) crosses; (A,C) has only a one-sided book.
    fixture.add(Side::Buy, addr(0x11), a, b, 10, "2");
    fixture.add(Side::Sell, addr(0x12), a, b, 10, "1");
    fixture.add(Side::Sell, addr(0x13), a, c, 10, "1");

    let result = fixture.run(&TeeSigner::random());
    assert_eq!(result.matches.len(), 2);
    for m in &result.matches {
        let tokens = [m.token_in, m.token_out];
        assert!(tokens.contains(&a) && tokens.contains(&b));
        assert!(!tokens.contains(&c));
    }
}

/// An intent expiring exactly at round end is ineligible.
#[test]
fn test_expired_intent_filtered() {
    let base = addr(1);
    let quote = addr(2);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, addr(0x11), base, quote, 10, "2");
    fixture.add_full(Side::Sell, addr(0x12), base, quote, 10, "1", ROUND_END, None);

    let result = fixture.run(&TeeSigner::random());
    assert_eq!(result.intents_count, 2);
    assert_eq!(result.eligible_intents_count, 1);
    assert!(result.matches.is_empty());
    assert_eq!(result.merkle_root, None);
}

// ---------------------------------------------------------------------------
// Universal invariants
// ---------------------------------------------------------------------------

/// Two runs over identical inputs produce bit-identical artifacts.
#[test]
fn test_determinism() {
    let base = addr(1);
    let quote = addr(2);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, addr(0x11), base, quote, 30, "2");
    fixture.add(Side::Sell, addr(0x12), base, quote, 10, "0.5");
    fixture.add(Side::Sell, addr(0x13), base, quote, 10, "1");
    fixture.add(Side::Buy, addr(0x14), base, quote, 5, "1.5");

    let signer = TeeSigner::random();
    let first = fixture.run(&signer);
    let second = fixture.run(&signer);
    assert_eq!(first.merkle_root, second.merkle_root);
    assert_eq!(first.matches, second.matches);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

/// Every emitted match verifies against the root and recovers to the
/// signer; any tampered field breaks the proof.
#[test]
fn test_merkle_soundness_and_signatures() {
    let base = addr(1);
    let quote = addr(2);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, addr(0x11), base, quote, 30, "2");
    fixture.add(Side::Sell, addr(0x12), base, quote, 10, "1");
    fixture.add(Side::Sell, addr(0x13), base, quote, 20, "1.5");

    let signer = TeeSigner::random();
    let result = fixture.run(&signer);
    let root = result.merkle_root.unwrap();
    assert!(!result.matches.is_empty());

    for m in &result.matches {
        assert!(verify_proof(root, m.leaf, &m.merkle_proof));
        assert_eq!(recover_leaf_signer(&m.leaf, &m.signature), Some(signer.address()));
        assert_eq!(m.match_id_hash, keccak256(m.match_id.as_bytes()));

        // Recomputing the leaf from the record's own fields must agree.
        let recomputed = abi::match_leaf(
            m.round_id,
            m.match_id_hash,
            m.trader,
            m.counterparty,
            m.token_in,
            m.token_out,
            m.amount_in,
            m.min_amount_out,
            U256::from(m.expiry),
        );
        assert_eq!(recomputed, m.leaf);

        // A tampered amount no longer proves inclusion.
        let tampered = abi::match_leaf(
            m.round_id,
            m.match_id_hash,
            m.trader,
            m.counterparty,
            m.token_in,
            m.token_out,
            m.amount_in + U256::from(1u64),
            m.min_amount_out,
            U256::from(m.expiry),
        );
        assert!(!verify_proof(root, tampered, &m.merkle_proof));
    }
}

/// The two legs of every cross conserve amounts: what the buyer pays in
/// quote is what the seller receives, and vice versa in base.
#[test]
fn test_bilateral_conservation() {
    let base = addr(1);
    let quote = addr(2);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, addr(0x11), base, quote, 25, "2");
    fixture.add(Side::Sell, addr(0x12), base, quote, 10, "0.7");
    fixture.add(Side::Sell, addr(0x13), base, quote, 15, "1.3");

    let result = fixture.run(&TeeSigner::random());
    assert_eq!(result.matches.len() % 2, 0);

    for pair in result.matches.chunks(2) {
        let (buy, sell) = (&pair[0], &pair[1]);
        assert_eq!(buy.trader, sell.counterparty);
        assert_eq!(sell.trader, buy.counterparty);
        assert_eq!(buy.token_in, sell.token_out);
        assert_eq!(buy.token_out, sell.token_in);
        assert_eq!(buy.expiry, sell.expiry);
        // The buyer's output is the base leg, the seller's the quote leg;
        // signed minimums can never exceed the delivered side.
        assert!(buy.min_amount_out <= sell.amount_in);
        assert!(sell.min_amount_out <= buy.amount_in);
        assert_ne!(buy.match_id_hash, sell.match_id_hash);
    }
}

/// Slippage bounds translate into scaled minimum outputs.
#[test]
fn test_slippage_min_out() {
    let base = addr(1);
    let quote = addr(2);
    let two_percent = U256::from(20_000_000_000_000_000u64);
    let mut fixture = RoundFixture::new();
    fixture.add_full(
        Side::Buy, addr(0x11), base, quote, 10, "2", ROUND_END + 600, Some(two_percent),
    );
    fixture.add_full(
        Side::Sell, addr(0x12), base, quote, 10, "1", ROUND_END + 600, Some(two_percent),
    );

    let result = fixture.run(&TeeSigner::random());
    let buy = result.matches.iter().find(|m| m.trader == addr(0x11)).unwrap();
    let sell = result.matches.iter().find(|m| m.trader == addr(0x12)).unwrap();
    // Buyer receives base: min out = 10 · 0.98.
    assert_eq!(buy.min_amount_out, U256::from(9_800_000_000_000_000_000u64));
    // Seller receives quote at price 1: same floor.
    assert_eq!(sell.min_amount_out, U256::from(9_800_000_000_000_000_000u64));
}

/// A plaintext that no longer hashes to its registered commitment is
/// excluded from matching.
#[test]
fn test_commitment_binding_excludes_tampered_plaintext() {
    let base = addr(1);
    let quote = addr(2);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, addr(0x11), base, quote, 10, "2");
    fixture.add(Side::Sell, addr(0x12), base, quote, 10, "1");
    // Tamper with the second intent's decrypted amount after registration.
    fixture.intents[1].intent.amount_base = units(11);

    let result = fixture.run(&TeeSigner::random());
    assert_eq!(result.eligible_intents_count, 1);
    assert!(result.matches.is_empty());
    assert!(result
        .debug_errors
        .iter()
        .any(|e| e.contains("commitment mismatch")));
}

/// Mismatches beyond the configured fraction surface a summary diagnostic
/// while matching still proceeds on the eligible subset.
#[test]
fn test_mismatch_fraction_diagnostics() {
    let base = addr(1);
    let quote = addr(2);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, addr(0x11), base, quote, 10, "2");
    fixture.add(Side::Sell, addr(0x12), base, quote, 10, "1");
    fixture.add(Side::Sell, addr(0x13), base, quote, 10, "1");
    fixture.add(Side::Sell, addr(0x14), base, quote, 10, "1");
    fixture.intents[2].intent.amount_base = units(11);
    fixture.intents[3].intent.amount_base = units(12);

    let result = fixture.run(&TeeSigner::random());
    assert!(result.debug_summary.is_some());
    // The clean pair still clears.
    assert_eq!(result.matches.len(), 2);
}

/// Match ids are unique within the round and hash consistently.
#[test]
fn test_match_ids_unique() {
    let base = addr(1);
    let quote = addr(2);
    let mut fixture = RoundFixture::new();
    fixture.add(Side::Buy, addr(0x11), base, quote, 30, "2");
    fixture.add(Side::Sell, addr(0x12), base, quote, 10, "1");
    fixture.add(Side::Sell, addr(0x13), base, quote, 20, "1");

    let result = fixture.run(&TeeSigner::random());
    let mut ids: Vec<&str> = result.matches.iter().map(|m| m.match_id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), result.matches.len());
}
