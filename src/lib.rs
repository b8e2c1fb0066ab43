//! ZONEWATCH — price-zone alert bot.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod messages;
pub mod feed;
pub mod notify;
pub mod engine;
pub mod commands;
pub mod dashboard;
