//! # Vision-Relay Test Suite
//!
//! Unified test crate containing the cross-crate RPC scenarios:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Client ↔ broker ↔ worker flows
//!     ├── rpc_flows.rs      # Call lifecycle scenarios
//!     └── worker_pool.rs    # Concurrency and shutdown behavior
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p relay-tests
//!
//! # By category
//! cargo test -p relay-tests integration::
//! ```

#![allow(dead_code)]

pub mod integration;
