//! Append-only audit trail of every terminal pipeline transition.

use crate::config::QueryLogConfig;
use crate::knowledge::KnowledgeBase;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

static TIME_BASED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(current_date|current_timestamp|now\s*\(|interval|date_trunc|date_part|extract\s*\()|_(date|at)\s*(>=|<=|>|<|=|between)",
    )
    .unwrap()
});

static AGGREGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(sum|count|avg|min|max)\s*\(|\bgroup\s+by\b").unwrap()
});

static COMPARISON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\border\s+by\b|\bbetween\b|>=|<=|<>|!=|[<>]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Error,
    Empty,
    RetrySuccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Aggregation,
    Lookup,
    Comparison,
    TimeBased,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLogEntry {
    pub timestamp: DateTime<Utc>,
    pub user_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_intent: Option<QueryIntent>,
    pub kpis_used: Vec<String>,
    pub status: LogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_attempted: Option<bool>,
}

impl QueryLogEntry {
    pub fn new(user_query: &str, status: LogStatus, elapsed: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            user_query: user_query.to_string(),
            sql: None,
            query_intent: None,
            kpis_used: Vec::new(),
            status,
            row_count: None,
            execution_time_ms: elapsed.as_millis() as u64,
            error: None,
            retry_attempted: None,
        }
    }

    pub fn with_sql(mut self, sql: &str, explanation: &str, kpi_fields: &[String]) -> Self {
        self.query_intent = detect_intent(sql);
        self.kpis_used = detect_kpis(sql, explanation, kpi_fields);
        self.sql = Some(sql.to_string());
        self
    }

    pub fn with_rows(mut self, row_count: usize) -> Self {
        self.row_count = Some(row_count);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn retried(mut self) -> Self {
        self.retry_attempted = Some(true);
        self
    }
}

/// Best-effort intent of a statement. Date predicates win over aggregates,
/// aggregates over comparisons; anything else that selects is a lookup.
pub fn detect_intent(sql: &str) -> Option<QueryIntent> {
    if sql.trim().is_empty() {
        return None;
    }
    if TIME_BASED.is_match(sql) {
        Some(QueryIntent::TimeBased)
    } else if AGGREGATION.is_match(sql) {
        Some(QueryIntent::Aggregation)
    } else if COMPARISON.is_match(sql) {
        Some(QueryIntent::Comparison)
    } else {
        Some(QueryIntent::Lookup)
    }
}

/// KPI fields mentioned by the statement or its explanation, sorted.
pub fn detect_kpis(sql: &str, explanation: &str, kpi_fields: &[String]) -> Vec<String> {
    let haystack = format!("{}\n{}", sql, explanation).to_lowercase();
    kpi_fields
        .iter()
        .filter(|field| haystack.contains(&field.to_lowercase()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[async_trait]
pub trait QueryLogSink: Send + Sync {
    async fn append(&self, entry: &QueryLogEntry) -> io::Result<()>;
}

/// Emits each entry as a structured event on the `query_log` target.
pub struct TracingSink;

#[async_trait]
impl QueryLogSink for TracingSink {
    async fn append(&self, entry: &QueryLogEntry) -> io::Result<()> {
        let line = serde_json::to_string(entry).map_err(io::Error::other)?;
        info!(target: "query_log", status = ?entry.status, entry = %line);
        Ok(())
    }
}

/// Appends one JSON document per line to a file.
pub struct JsonLinesSink {
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub async fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        info!("Query log appending to {}", path.display());
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl QueryLogSink for JsonLinesSink {
    async fn append(&self, entry: &QueryLogEntry) -> io::Result<()> {
        let mut line = serde_json::to_vec(entry).map_err(io::Error::other)?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await
    }
}

pub struct QueryLogger {
    sink: Arc<dyn QueryLogSink>,
    kpi_fields: Vec<String>,
}

impl QueryLogger {
    pub fn new(sink: Arc<dyn QueryLogSink>, knowledge: &KnowledgeBase) -> Self {
        Self {
            sink,
            kpi_fields: knowledge.kpi_fields.clone(),
        }
    }

    pub async fn from_config(config: &QueryLogConfig, knowledge: &KnowledgeBase) -> io::Result<Self> {
        let sink: Arc<dyn QueryLogSink> = match config.sink.as_str() {
            "tracing" => Arc::new(TracingSink),
            "file" => Arc::new(JsonLinesSink::open(&config.path).await?),
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Unsupported query log sink: {}", other),
                ))
            }
        };
        Ok(Self::new(sink, knowledge))
    }

    pub fn kpi_fields(&self) -> &[String] {
        &self.kpi_fields
    }

    /// Never fails the request; a broken sink is only reported.
    pub async fn record(&self, entry: QueryLogEntry) {
        if let Err(e) = self.sink.append(&entry).await {
            warn!("Failed to append query log entry: {}", e);
        }
    }
}
