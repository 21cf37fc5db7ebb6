//! Integration test crate for the oracle pusher.
//!
//! This crate has no library code. It only contains integration tests that
//! exercise the decision policy, the wire format and the delivery protocol
//! together against a simulated chain, without a live RPC node.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p pusher-integration-tests
//! ```
