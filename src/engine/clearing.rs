//! Price-time greedy uniform clearing over canonical pair books.
//!
//! Crossing stops when the best bid falls below the best ask. Each cross
//! clears at the ask's price, floors the quote amount, and emits one
//! bilateral fill. A cross whose floored quote is zero is dust: nothing is
//! emitted and the thinner remaining side is dropped.

use alloy_primitives::{Address, U256};
use std::collections::BTreeMap;

use crate::engine::book::PairBook;
use crate::error::EngineError;
use crate::models::token::{PairKey, WAD};

/// One bilateral cross before leaf/signature assembly.
#[derive(Debug, Clone)]
pub struct RawFill {
    /// Round-global monotonic fill counter.
    pub fill_index: u64,
    pub pair: PairKey,
    pub base: Address,
    pub quote: Address,
    pub buyer: Address,
    pub seller: Address,
    pub trade_base: U256,
    pub trade_quote: U256,
    pub min_out_buy: U256,
    pub min_out_sell: U256,
    /// `min` of the two crossing intents' expiries.
    pub expiry: u64,
}

/// Clear every book in ascending pair order. Fill indices are global across
/// pairs to keep match ids unique within the round.
pub fn clear_books(
    books: &mut BTreeMap<PairKey, PairBook>,
) -> Result<Vec<RawFill>, EngineError> {
    let mut fills = Vec::new();
    let mut next_index = 0u64;
    for book in books.values_mut() {
        clear_pair(book, &mut next_index, &mut fills)?;
    }
    Ok(fills)
}

fn clear_pair(
    book: &mut PairBook,
    next_index: &mut u64,
    fills: &mut Vec<RawFill>,
) -> Result<(), EngineError> {
    let mut bid = 0usize;
    let mut ask = 0usize;

    while bid < book.bids.len() && ask < book.asks.len() {
        if book.bids[bid].price_wad < book.asks[ask].price_wad {
            break;
        }

        let bid_remaining = book.bids[bid].remaining_base;
        let ask_remaining = book.asks[ask].remaining_base;
        let trade_base = bid_remaining.min(ask_remaining);
        if trade_base == U256::ZERO {
            if bid_remaining == U256::ZERO {
                bid += 1;
            }
            if ask_remaining == U256::ZERO {
                ask += 1;
            }
            continue;
        }

        // The resting ask sets the clearing price.
        let price = book.asks[ask].price_wad;
        let trade_quote = trade_base
            .checked_mul(price)
            .ok_or(EngineError::Overflow("quote amount"))?
            / WAD;
        if trade_quote == U256::ZERO {
            // Dust: drop whichever side the min came from.
            if bid_remaining <= ask_remaining {
                bid += 1;
            }
            if ask_remaining <= bid_remaining {
                ask += 1;
            }
            continue;
        }

        let min_out_buy = min_out(trade_base, book.bids[bid].slippage_max)?;
        let min_out_sell = min_out(trade_quote, book.asks[ask].slippage_max)?;
        let expiry = book.bids[bid].expiry.min(book.asks[ask].expiry);

        fills.push(RawFill {
            fill_index: *next_index,
            pair: book.pair,
            base: book.base,
            quote: book.quote,
            buyer: book.bids[bid].trader,
            seller: book.asks[ask].trader,
            trade_base,
            trade_quote,
            min_out_buy,
            min_out_sell,
            expiry,
        });
        *next_index += 1;

        book.bids[bid].remaining_base = bid_remaining - trade_base;
        book.asks[ask].remaining_base = ask_remaining - trade_base;
        if book.bids[bid].remaining_base == U256::ZERO {
            bid += 1;
        }
        if book.asks[ask].remaining_base == U256::ZERO {
            ask += 1;
        }
    }
    Ok(())
}

/// `floor(amount · (1 − slippage_max))`; zero when no bound was given.
fn min_out(amount: U256, slippage_max: Option<U256>) -> Result<U256, EngineError> {
    match slippage_max {
        None => Ok(U256::ZERO),
        Some(slip) => {
            let keep = WAD
                .checked_sub(slip)
                .ok_or(EngineError::Overflow("slippage bound"))?;
            Ok(amount
                .checked_mul(keep)
                .ok_or(EngineError::Overflow("min amount out"))?
                / WAD)
        }
    }
}
