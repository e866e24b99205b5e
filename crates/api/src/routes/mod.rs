//! HTTP route handlers.

pub mod health;
pub mod metrics;
pub mod suppliers;
pub mod workflows;
