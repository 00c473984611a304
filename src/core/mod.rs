//! Core functionality for the Luxor observer.
//!
//! This module contains:
//! - The classified snapshot type and its enums
//! - Workflow and intensity classification
//! - The analyzer that turns buffered input into snapshots

pub mod analyzer;
pub mod classify;
pub mod state;

// Re-export commonly used types
pub use analyzer::{event_totals, ActivityAnalyzer};
pub use classify::{classify_consciousness, classify_workflow, WORKFLOW_KEYWORDS};
pub use state::{round3, ConsciousnessLevel, QuantumState, WorkflowContext};
