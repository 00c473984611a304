//! Classified activity snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inferred task category of the foreground application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowContext {
    Coding,
    Music,
    Design,
    Browsing,
    General,
}

impl WorkflowContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowContext::Coding => "coding",
            WorkflowContext::Music => "music",
            WorkflowContext::Design => "design",
            WorkflowContext::Browsing => "browsing",
            WorkflowContext::General => "general",
        }
    }
}

impl std::fmt::Display for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity intensity tier derived from windowed input rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsciousnessLevel {
    FlowState,
    ActiveCoding,
    CreativeExploration,
    FocusedWork,
    Contemplative,
}

impl ConsciousnessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsciousnessLevel::FlowState => "flow_state",
            ConsciousnessLevel::ActiveCoding => "active_coding",
            ConsciousnessLevel::CreativeExploration => "creative_exploration",
            ConsciousnessLevel::FocusedWork => "focused_work",
            ConsciousnessLevel::Contemplative => "contemplative",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ConsciousnessLevel::FlowState => "🔥",
            ConsciousnessLevel::ActiveCoding => "⚡",
            ConsciousnessLevel::CreativeExploration => "🎨",
            ConsciousnessLevel::FocusedWork => "💭",
            ConsciousnessLevel::Contemplative => "🌙",
        }
    }

    /// Display label, e.g. `🔥 flow_state`.
    pub fn label(&self) -> String {
        format!("{} {}", self.emoji(), self.as_str())
    }
}

impl std::fmt::Display for ConsciousnessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified snapshot of user activity. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumState {
    pub timestamp: DateTime<Utc>,
    pub active_apps: Vec<String>,
    /// Keyboard events per second, rounded to 3 decimals
    pub keyboard_activity: f64,
    /// Pointer events per second, rounded to 3 decimals
    pub mouse_activity: f64,
    pub workflow_context: WorkflowContext,
    pub consciousness_level: ConsciousnessLevel,
}

/// Round to 3 decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
