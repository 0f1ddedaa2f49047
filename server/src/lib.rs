pub mod api;
pub mod market;
pub mod persist;
