pub mod models;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use self::models::{ChatMessage, FunctionCallResponse, FunctionSpec};

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
    Timeout(Duration),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
            LlmError::Timeout(after) => write!(f, "LLM call timed out after {}s", after.as_secs()),
        }
    }
}

impl Error for LlmError {}

/// A chat-completion service offering both free text and forced function calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    async fn call_function(
        &self,
        messages: &[ChatMessage],
        function: &FunctionSpec,
    ) -> Result<FunctionCallResponse, LlmError>;

    /// False when the backend needs an API key that was never configured.
    fn has_credentials(&self) -> bool {
        true
    }
}

pub struct LlmManager {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
    backend: String,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let model: Arc<dyn ChatModel> = match config.backend.as_str() {
            "remote" => Arc::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Arc::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self {
            model,
            timeout: Duration::from_secs(config.timeout_secs),
            backend: config.backend.clone(),
        })
    }

    pub fn with_model(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self {
            model,
            timeout,
            backend: "custom".to_string(),
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn has_credentials(&self) -> bool {
        self.model.has_credentials()
    }

    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.model.complete(messages)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Chat completion exceeded {:?}", self.timeout);
                Err(LlmError::Timeout(self.timeout))
            }
        }
    }

    pub async fn call_function(
        &self,
        messages: &[ChatMessage],
        function: &FunctionSpec,
    ) -> Result<FunctionCallResponse, LlmError> {
        match tokio::time::timeout(self.timeout, self.model.call_function(messages, function)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!("Function call '{}' exceeded {:?}", function.name, self.timeout);
                Err(LlmError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted chat model shared by the pipeline tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub enum Scripted {
        Function(Result<FunctionCallResponse, LlmError>),
        Text(Result<String, LlmError>),
    }

    #[derive(Default)]
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Scripted>>,
        pub calls: Mutex<Vec<Vec<ChatMessage>>>,
        pub missing_key: bool,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<Scripted>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        pub fn without_key() -> Self {
            Self {
                missing_key: true,
                ..Default::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn next(&self, messages: &[ChatMessage]) -> Option<Scripted> {
            self.calls.lock().unwrap().push(messages.to_vec());
            self.replies.lock().unwrap().pop_front()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
            match self.next(messages) {
                Some(Scripted::Text(reply)) => reply,
                Some(Scripted::Function(_)) => {
                    Err(LlmError::ResponseError("expected a function call".to_string()))
                }
                None => Err(LlmError::ResponseError("script exhausted".to_string())),
            }
        }

        async fn call_function(
            &self,
            messages: &[ChatMessage],
            _function: &FunctionSpec,
        ) -> Result<FunctionCallResponse, LlmError> {
            match self.next(messages) {
                Some(Scripted::Function(reply)) => reply,
                Some(Scripted::Text(_)) => {
                    Err(LlmError::ResponseError("expected free text".to_string()))
                }
                None => Err(LlmError::ResponseError("script exhausted".to_string())),
            }
        }

        fn has_credentials(&self) -> bool {
            !self.missing_key
        }
    }

    pub fn manager(model: Arc<ScriptedModel>) -> LlmManager {
        LlmManager::with_model(model, Duration::from_secs(5))
    }
}
