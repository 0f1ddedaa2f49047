use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::order::Order;
use crate::quotation::Quotation;

/// How much of an order a quotation can fulfil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// Every requested line is available.
    Full,
    /// Some, but not all, requested lines are available.
    Partial,
    /// No requested line is available.
    Missing,
}

/// Derived comparison summary for one quotation against its order.
/// Never persisted; recomputed on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub coverage: Coverage,
    /// Subtotal over available lines minus discount, floored at 0.
    pub total_price: u64,
    /// Lowest total among active quotations of the same order; set by
    /// the ranker, false when evaluated in isolation.
    pub is_best_price: bool,
}

/// Classify a quotation's item coverage and price it against its order.
///
/// Pure and deterministic: the same inputs always yield the same result,
/// so callers may cache the output freely. Quotation lines that answer
/// no order line are ignored for coverage (the store invariant keeps
/// them from ever being submitted).
pub fn evaluate(order: &Order, quotation: &Quotation) -> MatchResult {
    let mut wanted: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for item in &order.items {
        *wanted.entry(item.key()).or_default() += 1;
    }

    let mut available = 0usize;
    for item in &quotation.items {
        match wanted.get_mut(&item.key()) {
            Some(n) if *n > 0 => {
                *n -= 1;
                if item.available {
                    available += 1;
                }
            }
            _ => {} // unmatched line, ignored
        }
    }

    let coverage = if available == order.items.len() {
        Coverage::Full
    } else if available == 0 {
        Coverage::Missing
    } else {
        Coverage::Partial
    };

    MatchResult {
        coverage,
        total_price: quotation.total_amount(),
        is_best_price: false,
    }
}
