use crate::config::LlmConfig;
use crate::llm::models::{ChatMessage, FunctionCallResponse, FunctionSpec};
use crate::llm::{ChatModel, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};

/// OpenAI-compatible `/chat/completions` endpoint.
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct PromptRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: ToolCallFunction,
}

#[derive(Deserialize)]
struct ToolCallFunction {
    name: String,
    // Arguments arrive as a JSON document encoded in a string
    arguments: String,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config.api_url.clone().ok_or_else(|| {
            LlmError::ConfigError("API URL is required for remote LLM provider".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn send(&self, request: &PromptRequest<'_>) -> Result<ResponseMessage, LlmError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LlmError::ConfigError("API key is required for remote LLM provider".to_string())
        })?;

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!("LLM API responded with status code: {} - {}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                status
            )));
        }

        let prompt_response: PromptResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        prompt_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))
    }
}

#[async_trait]
impl ChatModel for RemoteLlmProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request = PromptRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: None,
            tool_choice: None,
        };

        let message = self.send(&request).await?;
        message
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::ResponseError("Empty completion".to_string()))
    }

    async fn call_function(
        &self,
        messages: &[ChatMessage],
        function: &FunctionSpec,
    ) -> Result<FunctionCallResponse, LlmError> {
        let request = PromptRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: Some(vec![json!({
                "type": "function",
                "function": {
                    "name": function.name,
                    "description": function.description,
                    "parameters": function.parameters,
                }
            })]),
            tool_choice: Some(json!({
                "type": "function",
                "function": { "name": function.name }
            })),
        };

        let message = self.send(&request).await?;

        if let Some(call) = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .find(|call| call.function.name == function.name)
        {
            debug!("Function '{}' called with: {}", call.function.name, call.function.arguments);
            let arguments = serde_json::from_str(&call.function.arguments).map_err(|e| {
                LlmError::ResponseError(format!("Malformed function arguments: {}", e))
            })?;
            return Ok(FunctionCallResponse::Arguments(arguments));
        }

        debug!("Model answered in free text instead of calling '{}'", function.name);
        Ok(FunctionCallResponse::Text(message.content.unwrap_or_default()))
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = LlmConfig {
            api_key: Some("   ".to_string()),
            ..LlmConfig::default()
        };
        let provider = RemoteLlmProvider::new(&config).unwrap();
        assert!(!provider.has_credentials());
    }

    #[test]
    fn tool_call_arguments_decode_from_string() {
        let raw = r#"{"choices":[{"message":{"content":null,"tool_calls":[{"id":"c1","type":"function","function":{"name":"generate_sql_query","arguments":"{\"sql\":\"SELECT 1\",\"explanation\":\"one\"}"}}]}}]}"#;
        let response: PromptResponse = serde_json::from_str(raw).unwrap();
        let call = &response.choices[0].message.tool_calls.as_ref().unwrap()[0];
        let args: serde_json::Value = serde_json::from_str(&call.function.arguments).unwrap();
        assert_eq!(args["sql"], "SELECT 1");
    }
}
