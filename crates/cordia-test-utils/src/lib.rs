// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles and the end-to-end harness.
//!
//! [`TestHarness`] assembles the full follow-up stack against a temp SQLite
//! database: mock channels, a scripted provider, a deterministic embedder,
//! and an explicit [`TestClock`] so scheduler time is advanced by tests, not
//! by sleeping.

pub mod harness;
pub mod mock_channel;
pub mod mock_embedder;
pub mod mock_provider;
pub mod test_clock;

pub use harness::{TEST_EMBEDDING_DIM, TestHarness, TestHarnessBuilder, step};
pub use mock_channel::MockChannel;
pub use mock_embedder::MockEmbedder;
pub use mock_provider::MockProvider;
pub use test_clock::TestClock;

/// Install a stderr tracing subscriber honoring `RUST_LOG`. Repeat calls are
/// fine; only the first wins.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
