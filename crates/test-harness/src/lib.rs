//! Scenario harness for the part-feature engine.
//!
//! Scripts multi-step modeling sessions by object name and checks element
//! naming, history and resolution at every step.
//!
//! # Key Components
//!
//! - [`Scenario`]: fluent builder over a [`feature_engine::Workspace`] and a kernel
//! - [`assertions`]: topology and naming assertions with diagnostics
//! - [`helpers`]: error type, placements, tracing setup

pub mod assertions;
pub mod helpers;
pub mod workflow;

pub use helpers::{init_tracing, HarnessError};
pub use workflow::Scenario;
