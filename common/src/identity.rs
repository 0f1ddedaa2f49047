use serde::{Deserialize, Serialize};

/// A buyer's opaque identity, issued by the external session service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuyerId(pub String);

/// A seller's opaque identity, issued by the external session service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SellerId(pub String);

/// Role a user can have in the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Buyer,
    Seller,
    Admin,
}

impl ActorRole {
    pub fn parse(s: &str) -> Option<ActorRole> {
        match s {
            "buyer" => Some(ActorRole::Buyer),
            "seller" => Some(ActorRole::Seller),
            "admin" => Some(ActorRole::Admin),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActorRole::Buyer => "buyer",
            ActorRole::Seller => "seller",
            ActorRole::Admin => "admin",
        }
    }
}

/// Authenticated session context passed explicitly into every core call.
///
/// The core trusts this as already verified; it is never read from
/// ambient global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn buyer_id(&self) -> BuyerId {
        BuyerId(self.id.clone())
    }

    pub fn seller_id(&self) -> SellerId {
        SellerId(self.id.clone())
    }
}
