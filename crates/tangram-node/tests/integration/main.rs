//! Integration test entry point for tangram-node.
//!
//! Run with: cargo test --test integration -- --test-threads=1

mod harness;
mod scenarios;
