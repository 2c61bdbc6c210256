//! rcl-daemon library target.
//!
//! Exposes boot wiring, the router and state for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod boot;
pub mod reload;
pub mod routes;
pub mod state;
