use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::order::OrderStatus;
use crate::quotation::{QuotationId, QuotationStatus};

/// Unique identifier for a message (random u64).
pub type MessageId = u64;

/// Which side of the negotiation sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Buyer,
    Seller,
}

/// A message in a quotation's negotiation channel.
///
/// Messages are append-only: never mutated, never deleted. When a channel
/// closes, history stays readable; only new writes are blocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub quotation_id: QuotationId,
    pub sender_id: String,
    pub sender_role: SenderRole,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Whether a quotation's negotiation channel is open, derived purely from
/// the owning order's status and the quotation's own status. A rejected
/// or withdrawn quotation's channel is permanently closed.
pub fn channel_open(order: OrderStatus, quotation: QuotationStatus) -> bool {
    matches!(order, OrderStatus::InProgress | OrderStatus::Accepted)
        && matches!(quotation, QuotationStatus::Pending | QuotationStatus::Accepted)
}
