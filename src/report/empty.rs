use crate::llm::LlmManager;
use crate::llm::models::ChatMessage;
use crate::report::Ignored;
use crate::report::extract::parse_json_object;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyResultAnalysis {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, alias = "alternative_question")]
    pub alternative_question: Option<String>,
}

impl EmptyResultAnalysis {
    pub fn fallback() -> Self {
        Self {
            reason: "No records matched the filters in the query.".to_string(),
            suggestions: vec![
                "Check the spelling of project, client or person names.".to_string(),
                "Widen the date range or remove a filter.".to_string(),
                "Ask about all projects first, then narrow down.".to_string(),
            ],
            alternative_question: None,
        }
    }
}

/// Asks the model why the query returned nothing.
pub async fn request_analysis(
    llm: &LlmManager,
    question: &str,
    sql: &str,
) -> Result<EmptyResultAnalysis, Ignored> {
    let messages = [
        ChatMessage::system(
            "A report query returned zero rows. Explain the most likely reason and help the user \
             rephrase. Respond with JSON only: {\"reason\": \"...\", \"suggestions\": [\"...\"], \
             \"alternativeQuestion\": \"...\"}. Give at most three short suggestions.",
        ),
        ChatMessage::user(format!("Question: {}\n\nSQL:\n{}", question, sql)),
    ];

    let reply = llm.complete(&messages).await?;
    let analysis: EmptyResultAnalysis = parse_json_object(&reply).ok_or_else(|| {
        debug!("Empty-result analysis was not JSON: {}", reply);
        Ignored
    })?;

    if analysis.suggestions.is_empty() {
        return Err(Ignored);
    }
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::llm::testing::{Scripted, ScriptedModel, manager};
    use std::sync::Arc;

    #[tokio::test]
    async fn parses_model_analysis() {
        let model = Arc::new(ScriptedModel::new(vec![Scripted::Text(Ok(
            r#"{"reason":"No project exceeds its budget","suggestions":["Look at projects near budget"],"alternativeQuestion":"Which projects are above 90% of budget?"}"#
                .to_string(),
        ))]));
        let analysis = request_analysis(&manager(model), "q", "SELECT 1").await.unwrap();
        assert_eq!(analysis.suggestions, vec!["Look at projects near budget".to_string()]);
        assert_eq!(
            analysis.alternative_question.as_deref(),
            Some("Which projects are above 90% of budget?")
        );
    }

    #[tokio::test]
    async fn failures_are_ignored() {
        let model = Arc::new(ScriptedModel::new(vec![
            Scripted::Text(Err(LlmError::ConnectionError("down".to_string()))),
            Scripted::Text(Ok("I think nothing matched.".to_string())),
        ]));
        let llm = manager(model);
        assert!(request_analysis(&llm, "q", "SELECT 1").await.is_err());
        assert!(request_analysis(&llm, "q", "SELECT 1").await.is_err());
        assert!(!EmptyResultAnalysis::fallback().suggestions.is_empty());
    }
}
