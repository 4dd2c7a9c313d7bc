//! Plain-text suggestion report printed to stdout

use crate::suggest::Suggestion;
use std::fmt::Write;

/// Render the suggestions found for one standard.
pub fn format_report(standard: &str, suggestions: &[Suggestion]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", standard);
    if suggestions.is_empty() {
        let _ = writeln!(out, "No suggestions.");
        return out;
    }
    for suggestion in suggestions {
        let _ = writeln!(out, "Suggestion: {}", suggestion.explanation);
        let _ = writeln!(out, "Priority: {}", suggestion.priority);
        let _ = writeln!(out, "Reasoning: {}", suggestion.reasoning);
        let _ = writeln!(out, "Suggested Changes: {}", suggestion.suggested_changes);
        let _ = writeln!(out, "---");
    }
    out
}
