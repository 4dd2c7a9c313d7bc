use super::client::CompletionBackend;
use super::parse::parse_suggestions;
use super::prompts::assessment_prompt;
use crate::suggest::Suggestion;
use anyhow::Context;
use std::sync::Arc;
use tracing::debug;

/// Asks the model which changes a standard calls for
#[derive(Clone)]
pub struct Assessor {
    backend: Arc<dyn CompletionBackend>,
}

impl Assessor {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Assess `code` against one `standard`.
    ///
    /// Makes exactly one backend call. An unparseable reply yields the
    /// sentinel suggestion; schema violations and backend errors propagate.
    pub async fn assess(&self, code: &str, standard: &str) -> anyhow::Result<Vec<Suggestion>> {
        let prompt = assessment_prompt(code, standard);
        debug!(prompt_chars = prompt.len(), "sending assessment prompt");

        let reply = self.backend.complete(&prompt).await?;
        debug!(reply = %reply, "assessment reply");

        let suggestions = parse_suggestions(&reply)
            .context("Assessment reply does not match the suggestion schema")?;
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;

    #[tokio::test]
    async fn test_assess_formatting_standard() {
        let backend = Arc::new(ScriptedBackend::new([Ok(r#"{"suggestions": [
            {"explanation": "Use f-string formatting", "priority": 2,
             "reasoning": "f-strings are the house style",
             "suggested_changes": "Line 1: Replace print('hi') with print(f'hi')"}
        ]}"#)]));
        let assessor = Assessor::new(backend.clone());

        let suggestions = assessor
            .assess("print('hi')", "Prefer f-strings for all string formatting.")
            .await
            .unwrap();

        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].explanation.contains("formatting"));
        assert!(suggestions[0].priority <= 2);

        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("print('hi')"));
        assert!(prompts[0].contains("Prefer f-strings for all string formatting."));
    }

    #[tokio::test]
    async fn test_assess_prose_reply_degrades_to_sentinel() {
        let backend = Arc::new(ScriptedBackend::new([Ok("I think the code looks fine.")]));
        let suggestions = Assessor::new(backend)
            .assess("x = 1", "Be nice.")
            .await
            .unwrap();
        assert_eq!(suggestions, vec![Suggestion::unparsed_reply("I think the code looks fine.")]);
    }

    #[tokio::test]
    async fn test_assess_schema_violation_propagates() {
        let backend = Arc::new(ScriptedBackend::new([Ok(
            r#"{"suggestions": [{"explanation": "x", "priority": 0}]}"#,
        )]));
        let err = Assessor::new(backend)
            .assess("x = 1", "Be nice.")
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("missing field \"reasoning\""));
    }

    #[tokio::test]
    async fn test_assess_backend_error_propagates() {
        let backend = Arc::new(ScriptedBackend::new([Err("connection reset")]));
        let err = Assessor::new(backend.clone())
            .assess("x = 1", "Be nice.")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(backend.prompts().len(), 1);
    }
}
