use serde::{Deserialize, Serialize};

use crate::gateway::Row;
use crate::llm::models::ChatMessage;
use crate::report::fields::FieldDescriptor;

// One incoming question plus the chat turns that preceded it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(rename = "query")]
    pub natural_language_query: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedQuery {
    pub sql: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSuccess {
    pub success: bool,
    pub answer: String,
    pub show_details_by_default: bool,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub data: Vec<Row>,
    pub fields: Vec<FieldDescriptor>,
    pub row_count: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_attempted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simplified_query: Option<String>,
    pub kpi_version: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub sql_attempted: String,
    pub error_type: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFailure {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
}

impl ReportFailure {
    pub fn new(error: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            query: None,
            answer: answer.into(),
            debug_info: None,
        }
    }
}

/// What the endpoint sends back for a handled request.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReportResponse {
    Success(ReportSuccess),
    Failure(ReportFailure),
}

impl ReportResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, ReportResponse::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::models::Role;
    use serde_json::json;

    #[test]
    fn request_accepts_wire_names_and_optional_history() {
        let request: QueryRequest = serde_json::from_value(json!({
            "query": "Show me projects over budget",
            "conversationHistory": [
                { "role": "user", "content": "hi" },
                { "role": "assistant", "content": "hello" }
            ]
        }))
        .unwrap();
        assert_eq!(request.natural_language_query, "Show me projects over budget");
        assert_eq!(request.conversation_history[1].role, Role::Assistant);

        let bare: QueryRequest = serde_json::from_value(json!({ "query": "x" })).unwrap();
        assert!(bare.conversation_history.is_empty());
    }

    #[test]
    fn failure_serializes_camel_case_without_empty_fields() {
        let mut failure = ReportFailure::new("boom", "Something went wrong");
        failure.debug_info = Some(DebugInfo {
            sql_attempted: "SELECT 1".to_string(),
            error_type: "TableNotFound".to_string(),
            suggestion: "check the table".to_string(),
        });
        let value = serde_json::to_value(ReportResponse::Failure(failure)).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["debugInfo"]["sqlAttempted"], "SELECT 1");
        assert!(value.get("query").is_none());
    }
}
