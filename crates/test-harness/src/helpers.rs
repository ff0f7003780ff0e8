//! Helper functions: error type, placement constructors, tracing setup.

use std::sync::Once;

use nalgebra::{Matrix4, Vector3};
use shape_kernel::Transform;
use tracing_subscriber::EnvFilter;

use feature_engine::EngineError;

// ── Error Type ──────────────────────────────────────────────────────────────

/// Unified error type for the test harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("object not found: {name}")]
    ObjectNotFound { name: String },

    #[error("no shape for object: {name}")]
    NoShape { name: String },

    #[error("assertion failed: {detail}")]
    AssertionFailed { detail: String },

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("duplicate name: {name}")]
    DuplicateName { name: String },
}

// ── Placements ──────────────────────────────────────────────────────────────

pub fn translation(offset: [f64; 3]) -> Transform {
    Matrix4::new_translation(&Vector3::from(offset))
}

// ── Tracing ─────────────────────────────────────────────────────────────────

static TRACING: Once = Once::new();

/// Install a test-writer fmt subscriber filtered by `RUST_LOG` (default
/// `warn`). Safe to call from every test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        // Another subscriber may already be installed by the test binary.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
