use crate::config::LlmConfig;
use crate::llm::models::{ChatMessage, FunctionCallResponse, FunctionSpec};
use crate::llm::{ChatModel, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info};

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    done: Option<bool>,
    // Use serde to ignore unknown fields
    #[serde(flatten)]
    extra: std::collections::HashMap<String, serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Deserialize, Debug)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Deserialize, Debug)]
struct OllamaFunction {
    name: String,
    // Unlike OpenAI, Ollama hands back the arguments as a JSON object
    arguments: serde_json::Value,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .filter(|url| url.contains("/api/"))
            .unwrap_or_else(|| "http://localhost:11434/api/chat".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    async fn chat(&self, request: &OllamaRequest<'_>) -> Result<OllamaMessage, LlmError> {
        info!("Sending request to Ollama with model: {}", self.model);
        debug!("API URL: {}", self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            // Try to get the error message from the response body
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        // Get the raw text response first for diagnostics
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        debug!("Raw response from Ollama: {}", response_text);

        let ollama_response = serde_json::from_str::<OllamaResponse>(&response_text).map_err(|e| {
            error!("Failed to parse Ollama response: {} - Response was: {}", e, response_text);
            LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
        })?;

        if ollama_response.done == Some(false) {
            debug!("Ollama reported an unfinished response: {:?}", ollama_response.extra.get("done_reason"));
        }

        Ok(ollama_response.message)
    }
}

#[async_trait]
impl ChatModel for OllamaProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model: &self.model,
            messages,
            stream: false, // Explicitly disable streaming
            options: OllamaOptions {
                temperature: self.temperature,
            },
            tools: None,
        };

        let message = self.chat(&request).await?;
        if message.content.trim().is_empty() {
            return Err(LlmError::ResponseError("Empty response from Ollama".to_string()));
        }
        Ok(message.content)
    }

    async fn call_function(
        &self,
        messages: &[ChatMessage],
        function: &FunctionSpec,
    ) -> Result<FunctionCallResponse, LlmError> {
        // Ollama cannot force a particular tool, it only offers it
        let request = OllamaRequest {
            model: &self.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
            tools: Some(vec![json!({
                "type": "function",
                "function": {
                    "name": function.name,
                    "description": function.description,
                    "parameters": function.parameters,
                }
            })]),
        };

        let message = self.chat(&request).await?;

        let call = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .find(|call| call.function.name == function.name);

        match call {
            Some(call) => Ok(FunctionCallResponse::Arguments(call.function.arguments)),
            None => {
                info!("Ollama replied without calling '{}'", function.name);
                Ok(FunctionCallResponse::Text(message.content))
            }
        }
    }
}
