//! API handlers.

pub mod admin;
pub mod analytics;
pub mod dashboard;
pub mod health;
pub mod route;
pub mod track;
pub mod waitlist;
pub mod webhooks;
