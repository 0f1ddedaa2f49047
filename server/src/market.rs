use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{Mutex, RwLock};

use mandi_common::error::{MarketError, MarketResult};
use mandi_common::identity::{BuyerId, SellerId};
use mandi_common::message::{channel_open, Message, SenderRole};
use mandi_common::order::{Order, OrderId, OrderItem, OrderStatus};
use mandi_common::quotation::{Quotation, QuotationId, QuotationItem, QuotationStatus};

use crate::persist::{MarketSnapshot, OrderSnapshot};

/// Everything owned by one order: the order record, its quotations and
/// their chat logs.
///
/// All of it sits behind a single async mutex, so every write touching
/// an order is serialized and a multi-row transition (accept, cancel
/// cascade) is one atomic unit — no observer can see the order accepted
/// while a sibling quotation is still pending.
struct OrderEntry {
    order: Order,
    quotations: BTreeMap<QuotationId, Quotation>,
    messages: BTreeMap<QuotationId, Vec<Message>>,
}

impl OrderEntry {
    fn quotation(&self, id: &QuotationId) -> MarketResult<&Quotation> {
        self.quotations
            .get(id)
            .ok_or_else(|| MarketError::NotFound(format!("quotation {}", id.0)))
    }
}

/// In-memory order/quotation/message store with the acceptance
/// coordinator and chat gate layered on top.
///
/// Operations on different orders run in parallel (the outer map is only
/// read-locked to find an entry); operations on the same order are
/// linearized by the entry mutex. Status fields are written nowhere else.
pub struct Market {
    orders: RwLock<BTreeMap<OrderId, Arc<Mutex<OrderEntry>>>>,
    /// Which order owns each quotation, for lookups by quotation id alone.
    quotation_index: RwLock<BTreeMap<QuotationId, OrderId>>,
}

impl Default for Market {
    fn default() -> Self {
        Market {
            orders: RwLock::new(BTreeMap::new()),
            quotation_index: RwLock::new(BTreeMap::new()),
        }
    }
}

/// Timestamp-based id with a random salt, unique enough for one market.
fn new_id(prefix: &str) -> String {
    let salt: u16 = rand::thread_rng().gen();
    format!("{prefix}-{}-{salt:04x}", Utc::now().timestamp_millis())
}

impl Market {
    pub fn new() -> Self {
        Market::default()
    }

    async fn entry(&self, order_id: &OrderId) -> MarketResult<Arc<Mutex<OrderEntry>>> {
        self.orders
            .read()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| MarketError::NotFound(format!("order {}", order_id.0)))
    }

    async fn order_of_quotation(&self, quotation_id: &QuotationId) -> MarketResult<OrderId> {
        self.quotation_index
            .read()
            .await
            .get(quotation_id)
            .cloned()
            .ok_or_else(|| MarketError::NotFound(format!("quotation {}", quotation_id.0)))
    }

    // ─── Orders ─────────────────────────────────────────────────────────

    pub async fn create_order(&self, buyer: BuyerId, items: Vec<OrderItem>) -> MarketResult<Order> {
        Order::validate_items(&items)?;
        let order = Order {
            id: OrderId(new_id("ord")),
            buyer,
            status: OrderStatus::Pending,
            items,
            created_at: Utc::now(),
        };
        let entry = OrderEntry {
            order: order.clone(),
            quotations: BTreeMap::new(),
            messages: BTreeMap::new(),
        };
        self.orders
            .write()
            .await
            .insert(order.id.clone(), Arc::new(Mutex::new(entry)));
        Ok(order)
    }

    pub async fn get_order(&self, order_id: &OrderId) -> MarketResult<Order> {
        let entry = self.entry(order_id).await?;
        let guard = entry.lock().await;
        Ok(guard.order.clone())
    }

    /// All orders, optionally restricted to one buyer, newest first.
    pub async fn list_orders(&self, buyer: Option<&BuyerId>) -> Vec<Order> {
        let entries: Vec<Arc<Mutex<OrderEntry>>> =
            self.orders.read().await.values().cloned().collect();
        let mut orders = Vec::with_capacity(entries.len());
        for entry in entries {
            let guard = entry.lock().await;
            if buyer.is_none_or(|b| guard.order.buyer == *b) {
                orders.push(guard.order.clone());
            }
        }
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// Buyer cancels an order that has not been decided yet. Every
    /// pending quotation of the order is rejected in the same step.
    pub async fn cancel_order(&self, order_id: &OrderId, actor: &BuyerId) -> MarketResult<Order> {
        let entry = self.entry(order_id).await?;
        let mut guard = entry.lock().await;
        if guard.order.buyer != *actor {
            return Err(MarketError::Forbidden(
                "only the ordering buyer may cancel".to_string(),
            ));
        }
        if !guard.order.status.is_open_for_quoting() {
            return Err(MarketError::InvalidTransition(format!(
                "order is already {:?}",
                guard.order.status
            )));
        }
        guard.order.status = OrderStatus::Cancelled;
        for quotation in guard.quotations.values_mut() {
            if quotation.status == QuotationStatus::Pending {
                quotation.status = QuotationStatus::Rejected;
            }
        }
        Ok(guard.order.clone())
    }

    /// External fulfilment finished; pass the order through to completed.
    pub async fn complete_order(&self, order_id: &OrderId) -> MarketResult<Order> {
        let entry = self.entry(order_id).await?;
        let mut guard = entry.lock().await;
        if guard.order.status != OrderStatus::Accepted {
            return Err(MarketError::InvalidTransition(format!(
                "order is {:?}, not accepted",
                guard.order.status
            )));
        }
        guard.order.status = OrderStatus::Completed;
        Ok(guard.order.clone())
    }

    // ─── Quotations ─────────────────────────────────────────────────────

    /// Seller submits a priced response to an open order. The order moves
    /// to in-progress on its first offer. The order status is checked
    /// under the entry lock, at the moment of the write — a submit racing
    /// a concurrent accept can never land on a closed order.
    pub async fn submit_quotation(
        &self,
        order_id: &OrderId,
        seller: SellerId,
        items: Vec<QuotationItem>,
        discount: u64,
    ) -> MarketResult<Quotation> {
        let entry = self.entry(order_id).await?;
        let mut guard = entry.lock().await;
        if !guard.order.status.is_open_for_quoting() {
            return Err(MarketError::InvalidTransition(format!(
                "order is {:?} and no longer accepts quotations",
                guard.order.status
            )));
        }
        let has_pending = guard
            .quotations
            .values()
            .any(|q| q.seller == seller && q.status == QuotationStatus::Pending);
        if has_pending {
            return Err(MarketError::Validation(
                "seller already has a pending quotation for this order".to_string(),
            ));
        }

        let quotation = Quotation {
            id: QuotationId(new_id("quo")),
            order_id: order_id.clone(),
            seller,
            status: QuotationStatus::Pending,
            discount,
            sent_date: Utc::now(),
            items,
        };
        quotation.validate_against(&guard.order)?;

        if guard.order.status == OrderStatus::Pending {
            guard.order.status = OrderStatus::InProgress;
        }
        guard
            .quotations
            .insert(quotation.id.clone(), quotation.clone());
        self.quotation_index
            .write()
            .await
            .insert(quotation.id.clone(), order_id.clone());
        Ok(quotation)
    }

    /// Seller revises a quotation that is still pending on an open order.
    pub async fn update_quotation(
        &self,
        quotation_id: &QuotationId,
        seller: &SellerId,
        items: Vec<QuotationItem>,
        discount: u64,
    ) -> MarketResult<Quotation> {
        let order_id = self.order_of_quotation(quotation_id).await?;
        let entry = self.entry(&order_id).await?;
        let mut guard = entry.lock().await;

        let current = guard.quotation(quotation_id)?;
        if current.seller != *seller {
            return Err(MarketError::Forbidden(
                "only the submitting seller may edit a quotation".to_string(),
            ));
        }
        if current.status != QuotationStatus::Pending {
            return Err(MarketError::InvalidTransition(format!(
                "quotation is {:?} and immutable",
                current.status
            )));
        }
        if !guard.order.status.is_open_for_quoting() {
            return Err(MarketError::InvalidTransition(format!(
                "order is {:?} and no longer accepts quotations",
                guard.order.status
            )));
        }

        let mut revised = current.clone();
        revised.items = items;
        revised.discount = discount;
        revised.sent_date = Utc::now();
        revised.validate_against(&guard.order)?;
        guard
            .quotations
            .insert(quotation_id.clone(), revised.clone());
        Ok(revised)
    }

    /// Seller pulls back a pending quotation. If that was the order's
    /// last pending offer and nothing was accepted, the order reverts to
    /// pending rather than dangling in-progress with zero offers.
    pub async fn withdraw_quotation(
        &self,
        quotation_id: &QuotationId,
        seller: &SellerId,
    ) -> MarketResult<()> {
        let order_id = self.order_of_quotation(quotation_id).await?;
        let entry = self.entry(&order_id).await?;
        let mut guard = entry.lock().await;

        let current = guard.quotation(quotation_id)?;
        if current.seller != *seller {
            return Err(MarketError::Forbidden(
                "only the submitting seller may withdraw a quotation".to_string(),
            ));
        }
        if current.status != QuotationStatus::Pending {
            return Err(MarketError::InvalidTransition(format!(
                "quotation is {:?} and cannot be withdrawn",
                current.status
            )));
        }

        guard
            .quotations
            .get_mut(quotation_id)
            .expect("checked above")
            .status = QuotationStatus::Withdrawn;

        let none_pending = guard
            .quotations
            .values()
            .all(|q| q.status != QuotationStatus::Pending);
        if none_pending && guard.order.status == OrderStatus::InProgress {
            guard.order.status = OrderStatus::Pending;
        }
        Ok(())
    }

    /// The order and all its quotations, for ranking by the caller.
    pub async fn quotations_for_order(
        &self,
        order_id: &OrderId,
    ) -> MarketResult<(Order, Vec<Quotation>)> {
        let entry = self.entry(order_id).await?;
        let guard = entry.lock().await;
        Ok((
            guard.order.clone(),
            guard.quotations.values().cloned().collect(),
        ))
    }

    // ─── Acceptance coordinator ─────────────────────────────────────────

    /// Buyer accepts exactly one quotation, finally and exclusively.
    ///
    /// The entry mutex makes this the sole writer of the transition: of
    /// two racing accepts one wins, the other finds the order no longer
    /// open and gets `InvalidTransition`. The target quotation, every
    /// pending sibling and the order itself change in one critical
    /// section.
    pub async fn accept_quotation(
        &self,
        order_id: &OrderId,
        quotation_id: &QuotationId,
        actor: &BuyerId,
    ) -> MarketResult<Order> {
        let entry = self.entry(order_id).await?;
        let mut guard = entry.lock().await;

        if guard.order.buyer != *actor {
            return Err(MarketError::Forbidden(
                "only the ordering buyer may accept a quotation".to_string(),
            ));
        }
        if !guard.order.status.is_open_for_quoting() {
            return Err(MarketError::InvalidTransition(format!(
                "order is already {:?}",
                guard.order.status
            )));
        }
        match guard.quotations.get(quotation_id) {
            Some(q) if q.status == QuotationStatus::Pending => {}
            _ => {
                return Err(MarketError::NotFound(format!(
                    "no pending quotation {} on order {}",
                    quotation_id.0, order_id.0
                )));
            }
        }

        for (id, quotation) in guard.quotations.iter_mut() {
            if id == quotation_id {
                quotation.status = QuotationStatus::Accepted;
            } else if quotation.status == QuotationStatus::Pending {
                quotation.status = QuotationStatus::Rejected;
            }
        }
        guard.order.status = OrderStatus::Accepted;
        Ok(guard.order.clone())
    }

    // ─── Chat gate ──────────────────────────────────────────────────────

    /// Whether new messages may be sent on a quotation's channel.
    pub async fn chat_is_open(&self, quotation_id: &QuotationId) -> MarketResult<bool> {
        let order_id = self.order_of_quotation(quotation_id).await?;
        let entry = self.entry(&order_id).await?;
        let guard = entry.lock().await;
        let quotation = guard.quotation(quotation_id)?;
        Ok(channel_open(guard.order.status, quotation.status))
    }

    /// Append a message to a quotation's channel. The gate is evaluated
    /// inside the entry lock, so a channel closed by a concurrent accept
    /// or cancel can never take one more write.
    pub async fn send_message(
        &self,
        quotation_id: &QuotationId,
        sender_id: String,
        sender_role: SenderRole,
        body: String,
    ) -> MarketResult<Message> {
        if body.trim().is_empty() {
            return Err(MarketError::Validation(
                "message body must not be empty".to_string(),
            ));
        }
        let order_id = self.order_of_quotation(quotation_id).await?;
        let entry = self.entry(&order_id).await?;
        let mut guard = entry.lock().await;
        let quotation = guard.quotation(quotation_id)?;
        if !channel_open(guard.order.status, quotation.status) {
            return Err(MarketError::ChannelClosed(format!(
                "channel for quotation {} is closed",
                quotation_id.0
            )));
        }

        let message = Message {
            id: rand::thread_rng().gen(),
            quotation_id: quotation_id.clone(),
            sender_id,
            sender_role,
            body,
            sent_at: Utc::now(),
        };
        guard
            .messages
            .entry(quotation_id.clone())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    /// Full message history of a channel, oldest first. History stays
    /// readable after the channel closes.
    pub async fn messages_for_quotation(
        &self,
        quotation_id: &QuotationId,
    ) -> MarketResult<Vec<Message>> {
        let order_id = self.order_of_quotation(quotation_id).await?;
        let entry = self.entry(&order_id).await?;
        let guard = entry.lock().await;
        guard.quotation(quotation_id)?;
        Ok(guard
            .messages
            .get(quotation_id)
            .cloned()
            .unwrap_or_default())
    }

    // ─── Snapshots ──────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> MarketSnapshot {
        let entries: Vec<Arc<Mutex<OrderEntry>>> =
            self.orders.read().await.values().cloned().collect();
        let mut orders = Vec::with_capacity(entries.len());
        for entry in entries {
            let guard = entry.lock().await;
            orders.push(OrderSnapshot {
                order: guard.order.clone(),
                quotations: guard.quotations.values().cloned().collect(),
                messages: guard.messages.values().flatten().cloned().collect(),
            });
        }
        orders.sort_by(|a, b| a.order.id.cmp(&b.order.id));
        MarketSnapshot { orders }
    }

    pub async fn restore(snapshot: MarketSnapshot) -> Market {
        let market = Market::new();
        {
            let mut orders = market.orders.write().await;
            let mut index = market.quotation_index.write().await;
            for os in snapshot.orders {
                let mut quotations = BTreeMap::new();
                for quotation in os.quotations {
                    index.insert(quotation.id.clone(), os.order.id.clone());
                    quotations.insert(quotation.id.clone(), quotation);
                }
                let mut messages: BTreeMap<QuotationId, Vec<Message>> = BTreeMap::new();
                for message in os.messages {
                    messages
                        .entry(message.quotation_id.clone())
                        .or_default()
                        .push(message);
                }
                orders.insert(
                    os.order.id.clone(),
                    Arc::new(Mutex::new(OrderEntry {
                        order: os.order,
                        quotations,
                        messages,
                    })),
                );
            }
        }
        market
    }
}
