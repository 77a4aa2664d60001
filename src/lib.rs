#![recursion_limit = "256"]

pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod events;
pub mod idempotency;
pub mod locking;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
pub mod workers;
