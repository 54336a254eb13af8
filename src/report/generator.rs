use crate::llm::LlmManager;
use crate::llm::models::{ChatMessage, FunctionCallResponse, FunctionSpec, Role};
use crate::report::extract::{extract_code_block, parse_json_object};
use crate::report::models::GeneratedQuery;
use serde_json::json;
use tracing::{debug, info, warn};

pub const GENERATION_FUNCTION: &str = "generate_sql_query";

pub const GENERATION_HELP: &str = "I couldn't turn that question into a report query. \
Try naming the project, person or metric you're interested in, for example \
\"What is the margin on project 24-105?\" or \"How many hours did Mike log last week?\"";

#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    Query(GeneratedQuery),
    Failed { reason: String },
}

pub fn function_spec() -> FunctionSpec {
    FunctionSpec {
        name: GENERATION_FUNCTION.to_string(),
        description: "Produce one read-only SQL query that answers the user's question.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "A single SELECT (or WITH ... SELECT) statement"
                },
                "explanation": {
                    "type": "string",
                    "description": "One or two sentences describing what the query returns"
                }
            },
            "required": ["sql", "explanation"]
        }),
    }
}

/// Grounding document, then the most recent `turns` history messages, then the question.
pub fn build_messages(
    grounding: String,
    history: &[ChatMessage],
    question: &str,
    turns: usize,
) -> Vec<ChatMessage> {
    let conversation: Vec<&ChatMessage> = history.iter().filter(|m| m.role != Role::System).collect();
    let skip = conversation.len().saturating_sub(turns);

    let mut messages = Vec::with_capacity(turns + 2);
    messages.push(ChatMessage::system(grounding));
    messages.extend(conversation.into_iter().skip(skip).cloned());
    messages.push(ChatMessage::user(question));
    messages
}

pub async fn generate(llm: &LlmManager, messages: &[ChatMessage]) -> Generation {
    let response = match llm.call_function(messages, &function_spec()).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Query generation call failed: {}", e);
            return Generation::Failed { reason: e.to_string() };
        }
    };

    let query = match response {
        FunctionCallResponse::Arguments(arguments) => {
            debug!("Generator returned arguments: {}", arguments);
            serde_json::from_value::<GeneratedQuery>(arguments).ok()
        }
        FunctionCallResponse::Text(text) => {
            info!("Generator answered in free text, salvaging a query from it");
            parse_json_object::<GeneratedQuery>(&text).or_else(|| {
                extract_code_block(&text).map(|sql| GeneratedQuery {
                    sql,
                    explanation: String::new(),
                })
            })
        }
    };

    match query {
        Some(mut query) if !query.sql.trim().is_empty() => {
            query.sql = query.sql.trim().to_string();
            Generation::Query(query)
        }
        _ => Generation::Failed {
            reason: "No SQL could be extracted from the model response".to_string(),
        },
    }
}
