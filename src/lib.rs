//! PROSPECTOR — Autonomous Opportunity Aggregation Engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod sources;
pub mod workers;
pub mod chain;
pub mod monitor;
pub mod engine;
pub mod storage;
pub mod api;
