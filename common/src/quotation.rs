use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};
use crate::identity::SellerId;
use crate::order::{Order, OrderId};

/// Unique quotation identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub String);

/// Quotation lifecycle status. `Accepted` and `Rejected` are written
/// only by the acceptance coordinator (or the cancel cascade); once a
/// quotation leaves `Pending` it is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Pending,
    Accepted,
    Rejected,
    /// Pulled back by its seller before any decision. Kept for history;
    /// invisible to ranking's active set.
    Withdrawn,
}

impl QuotationStatus {
    /// Active quotations participate in price comparisons.
    pub fn is_active(self) -> bool {
        matches!(self, QuotationStatus::Pending | QuotationStatus::Accepted)
    }

    /// The one presentation label shared by every surface.
    pub fn label(self) -> &'static str {
        match self {
            QuotationStatus::Pending => "Awaiting decision",
            QuotationStatus::Accepted => "Accepted",
            QuotationStatus::Rejected => "Not selected",
            QuotationStatus::Withdrawn => "Withdrawn",
        }
    }
}

/// One priced line answering one requested order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationItem {
    pub product_name: String,
    pub unit: String,
    /// Offered amount, in `unit`s. Mirrors the requested quantity.
    pub quantity: f64,
    /// Price per `unit`, in the smallest currency unit. Unavailable
    /// lines carry 0.
    pub price_per_unit: u64,
    pub available: bool,
}

impl QuotationItem {
    pub fn key(&self) -> (&str, &str) {
        (self.product_name.as_str(), self.unit.as_str())
    }

    /// Line contribution to the subtotal. Unavailable lines contribute 0.
    pub fn line_total(&self) -> u64 {
        if !self.available {
            return 0;
        }
        (self.price_per_unit as f64 * self.quantity).round() as u64
    }
}

/// A seller's priced, partially-fulfillable response to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub order_id: OrderId,
    pub seller: SellerId,
    pub status: QuotationStatus,
    /// Flat discount off the subtotal, in the smallest currency unit.
    pub discount: u64,
    pub sent_date: DateTime<Utc>,
    pub items: Vec<QuotationItem>,
}

impl Quotation {
    /// Sum of available line totals. Always recomputed from the items,
    /// never stored.
    pub fn subtotal(&self) -> u64 {
        self.items.iter().map(QuotationItem::line_total).sum()
    }

    /// Subtotal minus discount, floored at 0.
    pub fn total_amount(&self) -> u64 {
        self.subtotal().saturating_sub(self.discount)
    }

    /// Check the submission invariant against the owning order: exactly
    /// one quotation line per order line (paired by product name + unit),
    /// positive quantities, and unavailable lines priced 0.
    pub fn validate_against(&self, order: &Order) -> MarketResult<()> {
        let mut wanted: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        for item in &order.items {
            *wanted.entry(item.key()).or_default() += 1;
        }

        for item in &self.items {
            if !(item.quantity > 0.0 && item.quantity.is_finite()) {
                return Err(MarketError::Validation(format!(
                    "quantity for '{}' must be positive",
                    item.product_name
                )));
            }
            if !item.available && item.price_per_unit != 0 {
                return Err(MarketError::Validation(format!(
                    "unavailable line '{}' must be priced 0",
                    item.product_name
                )));
            }
            match wanted.get_mut(&item.key()) {
                Some(n) if *n > 0 => *n -= 1,
                _ => {
                    return Err(MarketError::Validation(format!(
                        "'{} ({})' does not answer any requested line",
                        item.product_name, item.unit
                    )));
                }
            }
        }

        if let Some(((name, unit), _)) = wanted.iter().find(|(_, n)| **n > 0) {
            return Err(MarketError::Validation(format!(
                "missing availability declaration for '{name} ({unit})'"
            )));
        }
        Ok(())
    }
}
