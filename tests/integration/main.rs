//! Integration tests: full ladder cycles driven through the public API
//! against the paper exchange.

mod harness;
mod ladder_cycle;
mod control_api;
