//! The natural-language report pipeline.
//!
//! question -> grounding prompt -> generated SQL -> execution
//! -> (classify + one simplified retry) -> empty-result analysis
//! -> narrative answer and optional insights, with every terminal
//! transition written to the query log.

pub mod answer;
pub mod classify;
pub mod empty;
pub mod executor;
pub mod extract;
pub mod fields;
pub mod generator;
pub mod log;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod retry;

use crate::llm::LlmError;
use tracing::debug;

/// Failure of a best-effort call. Callers fold it into a default value.
#[derive(Debug)]
pub struct Ignored;

impl From<LlmError> for Ignored {
    fn from(err: LlmError) -> Self {
        debug!("Best-effort model call failed: {}", err);
        Ignored
    }
}
