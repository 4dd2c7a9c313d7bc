use super::client::CompletionBackend;
use super::parse::{extract_code_block, ExtractedContent};
use super::prompts::apply_prompt;
use crate::suggest::Suggestion;
use std::sync::Arc;
use tracing::{debug, warn};

/// Asks the model to rewrite a file with exactly one suggestion applied
#[derive(Clone)]
pub struct Applier {
    backend: Arc<dyn CompletionBackend>,
}

impl Applier {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Rewrite `content` applying only `suggestion`.
    ///
    /// Nothing is written to disk. A reply without a closed code fence comes
    /// back as [`ExtractedContent::Unstructured`] so the caller decides
    /// whether to trust it.
    pub async fn apply(
        &self,
        content: &str,
        suggestion: &Suggestion,
    ) -> anyhow::Result<ExtractedContent> {
        let prompt = apply_prompt(content, suggestion);
        debug!(prompt = %prompt, "sending apply prompt");

        let reply = self.backend.complete(&prompt).await?;
        debug!(reply = %reply, "apply reply");

        let extracted = extract_code_block(&reply);
        debug!(
            fenced = extracted.is_fenced(),
            chars = extracted.as_str().chars().count(),
            "extracted rewrite"
        );
        if !extracted.is_fenced() {
            warn!(
                explanation = %suggestion.explanation,
                "apply reply had no code fence; passing it through verbatim"
            );
        }
        Ok(extracted)
    }
}

/// Match the trailing newline convention of `original`.
///
/// Fence extraction trims the payload, which would otherwise drop the final
/// newline of most source files.
pub(crate) fn normalize_generated_content(original: &str, content: String) -> String {
    let mut normalized = content;

    if original.ends_with('\n') {
        if !normalized.ends_with('\n') {
            if original.ends_with("\r\n") {
                normalized.push_str("\r\n");
            } else {
                normalized.push('\n');
            }
        }
    } else {
        while normalized.ends_with('\n') {
            let cut = if normalized.ends_with("\r\n") { 2 } else { 1 };
            let new_len = normalized.len().saturating_sub(cut);
            normalized.truncate(new_len);
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;

    fn fstring_suggestion() -> Suggestion {
        Suggestion::new(
            "Use f-string formatting",
            2,
            "f-strings are the house style",
            "Line 1: Replace print('hi') with print(f'hi')",
        )
    }

    #[tokio::test]
    async fn test_apply_extracts_fenced_rewrite() {
        let backend = Arc::new(ScriptedBackend::new([Ok(
            "Sure! Here is the updated file:\n```python\nprint(f'hi')\n```\n",
        )]));
        let applier = Applier::new(backend.clone());

        let result = applier
            .apply("print('hi')", &fstring_suggestion())
            .await
            .unwrap();

        assert_eq!(result, ExtractedContent::Fenced("print(f'hi')".to_string()));
        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("print('hi')"));
        assert!(prompts[0].contains("Use f-string formatting"));
    }

    #[tokio::test]
    async fn test_apply_without_fence_is_unstructured() {
        let backend = Arc::new(ScriptedBackend::new([Ok("print(f'hi')")]));
        let result = Applier::new(backend)
            .apply("print('hi')", &fstring_suggestion())
            .await
            .unwrap();
        assert_eq!(result, ExtractedContent::Unstructured("print(f'hi')".to_string()));
    }

    #[tokio::test]
    async fn test_apply_backend_error_propagates() {
        let backend = Arc::new(ScriptedBackend::new([Err("429 rate limited")]));
        let result = Applier::new(backend)
            .apply("print('hi')", &fstring_suggestion())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_normalize_restores_trailing_newline() {
        assert_eq!(
            normalize_generated_content("a\n", "b".to_string()),
            "b\n"
        );
        assert_eq!(
            normalize_generated_content("a\r\n", "b".to_string()),
            "b\r\n"
        );
    }

    #[test]
    fn test_normalize_strips_newline_when_original_has_none() {
        assert_eq!(
            normalize_generated_content("a", "b\n\n".to_string()),
            "b"
        );
        assert_eq!(
            normalize_generated_content("a", "b\r\n".to_string()),
            "b"
        );
    }
}
