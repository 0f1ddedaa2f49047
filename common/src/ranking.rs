use serde::{Deserialize, Serialize};

use crate::evaluate::{evaluate, Coverage, MatchResult};
use crate::order::Order;
use crate::quotation::Quotation;

/// A quotation paired with its derived comparison summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedQuotation {
    pub quotation: Quotation,
    pub result: MatchResult,
}

/// Coverage filter applied by the buyer's comparison view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageFilter {
    #[default]
    All,
    Full,
    Partial,
    Missing,
}

impl CoverageFilter {
    pub fn parse(s: &str) -> Option<CoverageFilter> {
        match s {
            "all" => Some(CoverageFilter::All),
            "full" => Some(CoverageFilter::Full),
            "partial" => Some(CoverageFilter::Partial),
            "missing" => Some(CoverageFilter::Missing),
            _ => None,
        }
    }

    pub fn matches(self, coverage: Coverage) -> bool {
        match self {
            CoverageFilter::All => true,
            CoverageFilter::Full => coverage == Coverage::Full,
            CoverageFilter::Partial => coverage == Coverage::Partial,
            CoverageFilter::Missing => coverage == Coverage::Missing,
        }
    }
}

/// Re-sort direction for the comparison view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSort {
    #[default]
    Ascending,
    Descending,
}

impl PriceSort {
    pub fn parse(s: &str) -> Option<PriceSort> {
        match s {
            "asc" | "ascending" => Some(PriceSort::Ascending),
            "desc" | "descending" => Some(PriceSort::Descending),
            _ => None,
        }
    }
}

/// Evaluate and order all quotations of one order for buyer display.
///
/// Active quotations (pending or accepted) come first, ascending by total
/// price with ties broken by earliest sent date; the cheapest carries the
/// best-price flag. Rejected and withdrawn quotations follow in sent
/// order — excluded from the comparison but retained for history views.
/// An empty input yields an empty output, never an error.
pub fn rank(order: &Order, quotations: &[Quotation]) -> Vec<RankedQuotation> {
    let mut active: Vec<RankedQuotation> = Vec::new();
    let mut inactive: Vec<RankedQuotation> = Vec::new();
    for quotation in quotations {
        let entry = RankedQuotation {
            result: evaluate(order, quotation),
            quotation: quotation.clone(),
        };
        if quotation.status.is_active() {
            active.push(entry);
        } else {
            inactive.push(entry);
        }
    }

    active.sort_by(|a, b| {
        (a.result.total_price, a.quotation.sent_date)
            .cmp(&(b.result.total_price, b.quotation.sent_date))
    });
    if let Some(first) = active.first_mut() {
        first.result.is_best_price = true;
    }
    inactive.sort_by(|a, b| a.quotation.sent_date.cmp(&b.quotation.sent_date));

    active.extend(inactive);
    active
}

/// Keep only entries whose coverage matches the filter. Independent of
/// sorting; the two compose in either direction.
pub fn filter_by_coverage(
    ranked: Vec<RankedQuotation>,
    filter: CoverageFilter,
) -> Vec<RankedQuotation> {
    ranked
        .into_iter()
        .filter(|entry| filter.matches(entry.result.coverage))
        .collect()
}

/// Re-sort entries by total price. The best-price flag assigned by
/// `rank` is preserved, not recomputed.
pub fn sort_by_price(ranked: &mut [RankedQuotation], sort: PriceSort) {
    match sort {
        PriceSort::Ascending => {
            ranked.sort_by(|a, b| a.result.total_price.cmp(&b.result.total_price))
        }
        PriceSort::Descending => {
            ranked.sort_by(|a, b| b.result.total_price.cmp(&a.result.total_price))
        }
    }
}
