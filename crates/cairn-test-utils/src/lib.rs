//! Shared test utilities for cairn tests.
//!
//! This crate provides:
//! - [`TracingLister`]: in-memory storage lister with operation recording,
//!   failure injection and simulated latency
//! - [`TracingIndex`]: catalog index that records writes and can lose races on purpose
//! - [`TestContext`]: a wired-up engine, registration service and storage
//! - Assertion helpers for registered data
//!
//! # Example
//!
//! ```rust,ignore
//! use cairn_test_utils::{TestContext, assert_versions};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     ctx.put("data-v=0/part-0.txt");
//!     let rows = ctx.engine().reconcile(&ctx.key, TestContext::STORAGE).await.unwrap();
//!     assert_versions(&rows, &[0]);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;
pub mod index;
pub mod storage;

pub use assertions::*;
pub use fixtures::*;
pub use index::*;
pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("cairn_catalog=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
