//! Per-pair order book construction.
//!
//! Every eligible intent is normalized into the canonical orientation of its
//! pair (base = lexicographic-min token, price = quote per 1 base in wad)
//! before sorting. Opposite-oriented intents flip side, invert price and
//! rescale their amount into canonical-base units, flooring throughout.

use alloy_primitives::{Address, U256};
use std::collections::BTreeMap;

use crate::engine::eligibility::EligibleIntent;
use crate::error::EngineError;
use crate::models::intent::Side;
use crate::models::token::{PairKey, TokenPair, WAD};

/// One resting order in canonical orientation.
#[derive(Debug, Clone)]
pub struct BookOrder {
    pub trader: Address,
    pub protected_data: Address,
    /// Registry insertion position; the time-priority key.
    pub position: u64,
    /// Canonical wad price: quote per 1 base.
    pub price_wad: U256,
    pub remaining_base: U256,
    pub expiry: u64,
    pub slippage_max: Option<U256>,
}

#[derive(Debug)]
pub struct PairBook {
    pub pair: PairKey,
    pub base: Address,
    pub quote: Address,
    /// Highest price first, then earliest registration.
    pub bids: Vec<BookOrder>,
    /// Lowest price first, then earliest registration.
    pub asks: Vec<BookOrder>,
}

#[derive(Debug, Default)]
pub struct BookBuild {
    pub books: BTreeMap<PairKey, PairBook>,
    pub debug_errors: Vec<String>,
}

/// Partition eligible intents into canonical books, keyed for ascending
/// `PairKey` iteration.
pub fn build_books(eligible: &[EligibleIntent]) -> Result<BookBuild, EngineError> {
    let mut build = BookBuild::default();

    for entry in eligible {
        let intent = &entry.intent;
        let pair = TokenPair::new(intent.base_token, intent.quote_token);
        let key = pair.key();

        let (side, price_wad, remaining_base) = if pair.is_canonical_base(intent.base_token) {
            (intent.side, intent.limit_price_wad, intent.amount_base)
        } else {
            // Opposite orientation: trading the max token against the min.
            // Buying max for min is selling canonical base, and vice versa.
            if intent.limit_price_wad == U256::ZERO {
                build.debug_errors.push(format!(
                    "{}: zero limit price cannot be reoriented",
                    entry.protected_data
                ));
                continue;
            }
            let inverted = WAD
                .checked_mul(WAD)
                .ok_or(EngineError::Overflow("price inversion"))?
                / intent.limit_price_wad;
            let rescaled = intent
                .amount_base
                .checked_mul(intent.limit_price_wad)
                .ok_or(EngineError::Overflow("amount reorientation"))?
                / WAD;
            if rescaled == U256::ZERO {
                build.debug_errors.push(format!(
                    "{}: reoriented amount floors to zero",
                    entry.protected_data
                ));
                continue;
            }
            (intent.side.opposite(), inverted, rescaled)
        };

        let book = build.books.entry(key).or_insert_with(|| PairBook {
            pair: key,
            base: pair.currency0,
            quote: pair.currency1,
            bids: Vec::new(),
            asks: Vec::new(),
        });
        let order = BookOrder {
            trader: intent.trader,
            protected_data: entry.protected_data,
            position: entry.position,
            price_wad,
            remaining_base,
            expiry: intent.expiry,
            slippage_max: intent.slippage_max,
        };
        match side {
            Side::Buy => book.bids.push(order),
            Side::Sell => book.asks.push(order),
        }
    }

    for book in build.books.values_mut() {
        // Ties in price resolve by registry position; equal positions can
        // only come from a registry fault and fall back to trader, handle.
        book.bids.sort_by(|a, b| {
            b.price_wad
                .cmp(&a.price_wad)
                .then(a.position.cmp(&b.position))
                .then(a.trader.cmp(&b.trader))
                .then(a.protected_data.cmp(&b.protected_data))
        });
        book.asks.sort_by(|a, b| {
            a.price_wad
                .cmp(&b.price_wad)
                .then(a.position.cmp(&b.position))
                .then(a.trader.cmp(&b.trader))
                .then(a.protected_data.cmp(&b.protected_data))
        });
    }

    Ok(build)
}
