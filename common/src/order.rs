use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};
use crate::identity::BuyerId;

/// Unique order identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

/// Order lifecycle status. Written only by the acceptance coordinator
/// and the buyer-cancel path; every surface reads the same enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, no offers yet.
    Pending,
    /// At least one quotation has been submitted.
    InProgress,
    /// Buyer accepted exactly one quotation.
    Accepted,
    /// Fulfilment finished (external event, passed through).
    Completed,
    /// Buyer cancelled before accepting.
    Cancelled,
}

impl OrderStatus {
    /// Returns true if transitioning from self to `next` is valid.
    ///
    /// `InProgress -> Pending` is the revert edge taken when the last
    /// pending quotation is withdrawn before any acceptance.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::InProgress)
                | (OrderStatus::InProgress, OrderStatus::Pending)
                | (OrderStatus::InProgress, OrderStatus::Accepted)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::InProgress, OrderStatus::Cancelled)
                | (OrderStatus::Accepted, OrderStatus::Completed)
        )
    }

    /// Sellers may still submit or revise quotations, and the buyer may
    /// still accept or cancel.
    pub fn is_open_for_quoting(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::InProgress)
    }

    /// Once true, the order and its line items are immutable.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            OrderStatus::Accepted | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    /// The one presentation label shared by buyer, seller and admin views.
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Awaiting offers",
            OrderStatus::InProgress => "Offers received",
            OrderStatus::Accepted => "Quotation accepted",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

/// One requested line in an order.
///
/// `(product_name, unit)` need not be unique within an order; a buyer may
/// request the same product twice with different notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_name: String,
    pub category: String,
    /// Requested amount, in `unit`s. Must be positive.
    pub quantity: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl OrderItem {
    /// Key used to pair a quotation line with this request.
    pub fn key(&self) -> (&str, &str) {
        (self.product_name.as_str(), self.unit.as_str())
    }
}

/// A buyer's wanted-items list, quoted against by independent sellers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer: BuyerId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Validate a wanted-items list at creation time.
    pub fn validate_items(items: &[OrderItem]) -> MarketResult<()> {
        if items.is_empty() {
            return Err(MarketError::Validation(
                "an order needs at least one item".to_string(),
            ));
        }
        for item in items {
            if !(item.quantity > 0.0 && item.quantity.is_finite()) {
                return Err(MarketError::Validation(format!(
                    "quantity for '{}' must be positive",
                    item.product_name
                )));
            }
            if item.product_name.trim().is_empty() {
                return Err(MarketError::Validation(
                    "item product name must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
