//! Classification of input rates and foreground applications.
//!
//! Both classifiers are pure functions over plain data.

use crate::core::state::{ConsciousnessLevel, WorkflowContext};

/// Keyword table, evaluated top to bottom; the first context with a keyword
/// contained in the (lowercased) application name wins.
pub const WORKFLOW_KEYWORDS: &[(WorkflowContext, &[&str])] = &[
    (
        WorkflowContext::Coding,
        &[
            "visual studio code",
            "vscode",
            "terminal",
            "iterm",
            "pycharm",
            "intellij",
            "sublime",
            "atom",
            "vim",
        ],
    ),
    (
        WorkflowContext::Music,
        &["suno", "spotify", "garageband", "itunes", "music"],
    ),
    (
        WorkflowContext::Design,
        &["figma", "photoshop", "sketch", "blender", "illustrator"],
    ),
    (
        WorkflowContext::Browsing,
        &["chrome", "safari", "firefox", "edge", "brave"],
    ),
];

/// Infer the workflow context from the foreground application name.
pub fn classify_workflow(active: &str) -> WorkflowContext {
    let active = active.trim().to_lowercase();
    if active.is_empty() {
        return WorkflowContext::General;
    }

    WORKFLOW_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| active.contains(keyword)))
        .map(|(context, _)| *context)
        .unwrap_or(WorkflowContext::General)
}

/// Place keyboard and pointer rates (events/s) on the intensity ladder.
///
/// Rules are checked in order and all comparisons are strict. Negative or NaN
/// inputs count as zero.
pub fn classify_consciousness(keyboard: f64, mouse: f64) -> ConsciousnessLevel {
    let kb = keyboard.max(0.0);
    let mv = mouse.max(0.0);
    let total = kb + mv;

    if kb > 3.0 && mv > 2.0 && total > 6.0 {
        ConsciousnessLevel::FlowState
    } else if kb > 1.5 && total > 3.0 {
        ConsciousnessLevel::ActiveCoding
    } else if mv > 1.5 && total > 2.0 {
        ConsciousnessLevel::CreativeExploration
    } else if total > 0.5 {
        ConsciousnessLevel::FocusedWork
    } else {
        ConsciousnessLevel::Contemplative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConsciousnessLevel::*;

    #[test]
    fn test_workflow_matching_is_case_insensitive() {
        assert_eq!(classify_workflow("Visual Studio Code"), WorkflowContext::Coding);
        assert_eq!(classify_workflow("ITERM2"), WorkflowContext::Coding);
        assert_eq!(classify_workflow("Spotify Premium"), WorkflowContext::Music);
        assert_eq!(classify_workflow("FIGMA"), WorkflowContext::Design);
        assert_eq!(classify_workflow("Google Chrome"), WorkflowContext::Browsing);
    }

    #[test]
    fn test_workflow_defaults_to_general() {
        assert_eq!(classify_workflow(""), WorkflowContext::General);
        assert_eq!(classify_workflow("   "), WorkflowContext::General);
        assert_eq!(classify_workflow("Finder"), WorkflowContext::General);
        assert_eq!(classify_workflow("Microsoft Word"), WorkflowContext::General);
    }

    #[test]
    fn test_workflow_first_context_wins() {
        // "Terminal" (coding) appears before "music" in the table
        assert_eq!(classify_workflow("Music Terminal"), WorkflowContext::Coding);
        // "sketch" (design) before "chrome" (browsing)
        assert_eq!(classify_workflow("Sketch in Chrome"), WorkflowContext::Design);
    }

    #[test]
    fn test_every_keyword_maps_to_its_context() {
        for (context, keywords) in WORKFLOW_KEYWORDS {
            for keyword in *keywords {
                let earlier = WORKFLOW_KEYWORDS
                    .iter()
                    .take_while(|(c, _)| c != context)
                    .any(|(_, kws)| kws.iter().any(|k| keyword.contains(k)));
                if !earlier {
                    assert_eq!(classify_workflow(&keyword.to_uppercase()), *context);
                }
            }
        }
    }

    #[test]
    fn test_ladder_tiers() {
        assert_eq!(classify_consciousness(4.0, 3.0), FlowState);
        assert_eq!(classify_consciousness(2.0, 1.5), ActiveCoding);
        assert_eq!(classify_consciousness(0.5, 2.0), CreativeExploration);
        assert_eq!(classify_consciousness(0.3, 0.3), FocusedWork);
        assert_eq!(classify_consciousness(0.0, 0.0), Contemplative);
    }

    #[test]
    fn test_ladder_boundaries_are_strict() {
        // kb=3, mv=2, total=5: not flow, but active coding (kb>1.5, total>3)
        assert_eq!(classify_consciousness(3.0, 2.0), ActiveCoding);
        // kb=3, mv=3, total=6: kb not > 3
        assert_eq!(classify_consciousness(3.0, 3.0), ActiveCoding);
        // kb=4, mv=2, total=6: mv not > 2 and total not > 6
        assert_eq!(classify_consciousness(4.0, 2.0), ActiveCoding);
        // every flow condition met
        assert_eq!(classify_consciousness(3.5, 2.75), FlowState);
        // kb>3 and mv>2 but total=5.5 is not > 6
        assert_eq!(classify_consciousness(3.25, 2.25), ActiveCoding);

        // kb=1.5 is not > 1.5
        assert_eq!(classify_consciousness(1.5, 1.6), CreativeExploration);
        // total=3 is not > 3
        assert_eq!(classify_consciousness(2.0, 1.0), FocusedWork);

        // mv=1.5 is not > 1.5
        assert_eq!(classify_consciousness(1.0, 1.5), FocusedWork);
        // total=2 is not > 2
        assert_eq!(classify_consciousness(0.25, 1.75), FocusedWork);

        // total=0.5 is not > 0.5
        assert_eq!(classify_consciousness(0.25, 0.25), Contemplative);
        assert_eq!(classify_consciousness(0.5, 0.0), Contemplative);
        assert_eq!(classify_consciousness(0.501, 0.0), FocusedWork);
    }

    #[test]
    fn test_negative_and_nan_inputs() {
        assert_eq!(classify_consciousness(-1.0, -5.0), Contemplative);
        assert_eq!(classify_consciousness(f64::NAN, 0.0), Contemplative);
    }
}
