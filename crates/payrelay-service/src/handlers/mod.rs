//! API handlers.

pub mod customers;
pub mod health;
pub mod payments;
pub mod subscriptions;
pub mod webhooks;
