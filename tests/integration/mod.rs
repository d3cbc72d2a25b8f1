//! Integration test suite for archon.
//!
//! These tests drive teams, workflow graphs and the orchestrator together
//! through their public API.
//!
//! # Test Categories
//!
//! - `routing`: Team selection and assignment scenarios
//! - `workflow_e2e`: Full workflow walks, retries and termination
//! - `orchestrator`: Phase registry, execution modes and the ADM presets
//! - `concurrency`: Cross-phase execution, contention and cancellation
//!
//! # CI Compatibility
//!
//! Every agent is backed by a scripted provider; nothing calls out to a
//! model backend.

mod fixtures;

mod concurrency;
mod orchestrator;
mod workflow_e2e;
