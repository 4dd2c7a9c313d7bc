//! Suggestion model and priority-based selection
//!
//! Suggestions come from the assessor, one batch per standard. They are
//! ordered by priority (0 is most urgent) and only those at or below the
//! configured threshold are ever handed to the applier.

pub mod llm;

use serde::{Deserialize, Serialize};

/// Explanation used for the synthetic suggestion produced when the model
/// reply could not be parsed as JSON.
pub const SENTINEL_EXPLANATION: &str = "Failed to parse JSON response";
const SENTINEL_REASONING: &str = "The AI response was not valid JSON";

/// One improvement item produced by the assessor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Short human-readable summary
    pub explanation: String,
    /// 0 = highest urgency, 3 = lowest by convention
    pub priority: u32,
    /// Free-text justification
    pub reasoning: String,
    /// Concrete edits, ideally with line or function references
    pub suggested_changes: String,
}

impl Suggestion {
    pub fn new(
        explanation: impl Into<String>,
        priority: u32,
        reasoning: impl Into<String>,
        suggested_changes: impl Into<String>,
    ) -> Self {
        Self {
            explanation: explanation.into(),
            priority,
            reasoning: reasoning.into(),
            suggested_changes: suggested_changes.into(),
        }
    }

    /// The stand-in for a reply that was not valid JSON. It carries the raw
    /// reply so nothing the model said is lost.
    pub fn unparsed_reply(raw: &str) -> Self {
        Self::new(SENTINEL_EXPLANATION, 0, SENTINEL_REASONING, raw)
    }
}

/// How many eligible suggestions the publisher applies in one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Apply only the most urgent eligible suggestion
    #[default]
    LowestOnly,
    /// Apply every eligible suggestion, most urgent first, chaining results
    AllEligible,
}

impl SelectionPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            SelectionPolicy::LowestOnly => "lowest-only",
            SelectionPolicy::AllEligible => "all-eligible",
        }
    }
}

/// Sort suggestions by priority, most urgent first.
///
/// The sort is stable: suggestions sharing a priority keep their input order.
pub fn sort_by_priority(suggestions: &mut [Suggestion]) {
    suggestions.sort_by_key(|s| s.priority);
}

/// Pick the suggestions to apply from an already sorted slice.
///
/// Stops at the first suggestion above `threshold`; everything after it is
/// at least as low priority.
pub fn select_eligible(
    sorted: &[Suggestion],
    threshold: u32,
    policy: SelectionPolicy,
) -> Vec<&Suggestion> {
    let eligible = sorted.iter().take_while(|s| s.priority <= threshold);
    match policy {
        SelectionPolicy::LowestOnly => eligible.take(1).collect(),
        SelectionPolicy::AllEligible => eligible.collect(),
    }
}
