//! LADDERBOT — zig-zag martingale ladder auto-trader
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod market;
pub mod ladder;
pub mod notify;
pub mod storage;
pub mod session;
pub mod dashboard;
