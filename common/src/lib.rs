pub mod error;
pub mod evaluate;
pub mod identity;
pub mod message;
pub mod order;
pub mod quotation;
pub mod ranking;
