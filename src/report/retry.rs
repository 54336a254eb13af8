use crate::gateway::ExecutionResult;
use crate::llm::LlmManager;
use crate::llm::models::ChatMessage;
use crate::report::classify::ErrorClassification;
use crate::report::executor::QueryExecutor;
use crate::report::extract::{extract_code_block, parse_json_object};
use serde::Deserialize;
use tracing::{info, warn};

const RETRY_INSTRUCTIONS: &str = "You fix failed SQL queries for a construction reporting tool. \
Given the question, the failing query and the database error, write a strictly simpler read-only \
query that avoids the error: fewer joins, only columns that certainly exist, no clever syntax. \
Respond with JSON only: {\"can_retry\": true, \"sql\": \"...\", \"explanation\": \"...\"} or, \
if no simpler query can answer the question, {\"can_retry\": false, \"reason\": \"...\"}.";

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    Simplified { sql: String, explanation: String },
    CannotRetry { reason: String },
    Unparseable,
}

#[derive(Debug, Clone, Default)]
pub struct RetryOutcome {
    pub attempted: bool,
    pub succeeded: bool,
    pub simplified_sql: Option<String>,
    pub explanation: Option<String>,
    pub result: Option<ExecutionResult>,
    pub error: Option<String>,
}

impl RetryOutcome {
    fn failed(simplified_sql: Option<String>, error: impl Into<String>) -> Self {
        Self {
            attempted: true,
            simplified_sql,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
struct RetryReply {
    #[serde(default)]
    can_retry: Option<bool>,
    #[serde(default)]
    sql: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

pub fn retry_messages(
    question: &str,
    failed_sql: &str,
    error_text: &str,
    classification: &ErrorClassification,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(RETRY_INSTRUCTIONS),
        ChatMessage::user(format!(
            "Question: {}\n\nFailed SQL:\n{}\n\nDatabase error: {}\nError category: {} ({})\nHint: {}",
            question,
            failed_sql,
            error_text,
            classification.category,
            classification.message,
            classification.suggestion
        )),
    ]
}

/// JSON first, then a fenced code block.
pub fn parse_decision(reply: &str) -> RetryDecision {
    if let Some(parsed) = parse_json_object::<RetryReply>(reply) {
        let sql = parsed.sql.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        match (parsed.can_retry, sql) {
            (Some(false), _) => {
                return RetryDecision::CannotRetry {
                    reason: parsed
                        .reason
                        .unwrap_or_else(|| "The model found no simpler query".to_string()),
                };
            }
            (_, Some(sql)) => {
                return RetryDecision::Simplified {
                    sql,
                    explanation: parsed.explanation.unwrap_or_default(),
                };
            }
            _ => {}
        }
    }

    match extract_code_block(reply) {
        Some(sql) => RetryDecision::Simplified {
            sql,
            explanation: String::new(),
        },
        None => RetryDecision::Unparseable,
    }
}

fn normalized(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(';')
        .to_lowercase()
}

/// Asks for one simplified query and runs it at most once.
pub async fn attempt(
    llm: &LlmManager,
    executor: &QueryExecutor,
    question: &str,
    failed_sql: &str,
    error_text: &str,
    classification: &ErrorClassification,
) -> RetryOutcome {
    let messages = retry_messages(question, failed_sql, error_text, classification);
    let decision = match llm.complete(&messages).await {
        Ok(reply) => parse_decision(&reply),
        Err(e) => {
            warn!("Retry request failed: {}", e);
            return RetryOutcome::failed(None, format!("Retry request failed: {}", e));
        }
    };

    let (sql, explanation) = match decision {
        RetryDecision::Simplified { sql, explanation } => (sql, explanation),
        RetryDecision::CannotRetry { reason } => {
            info!("Model declined to retry: {}", reason);
            return RetryOutcome::failed(None, reason);
        }
        RetryDecision::Unparseable => {
            return RetryOutcome::failed(None, "The retry response contained no query");
        }
    };

    if normalized(&sql) == normalized(failed_sql) {
        return RetryOutcome::failed(Some(sql), "The simplified query was identical to the failed one");
    }

    info!("Retrying with simplified query");
    match executor.execute(&sql).await {
        Ok(result) => RetryOutcome {
            attempted: true,
            succeeded: true,
            simplified_sql: Some(sql),
            explanation: Some(explanation).filter(|e| !e.is_empty()),
            result: Some(result),
            error: None,
        },
        Err(e) => {
            warn!("Simplified query failed: {}", e);
            RetryOutcome::failed(Some(sql), e.to_string())
        }
    }
}
