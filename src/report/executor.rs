use crate::gateway::{ExecutionResult, GatewayError, QueryGateway};
use crate::report::classify::{ErrorCategory, ErrorClassification, classify};
use regex::Regex;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static MUTATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(insert|update|delete|merge|upsert|drop|alter|create|truncate|grant|revoke|copy|attach|detach|pragma|vacuum|call)\b",
    )
    .unwrap()
});

#[derive(Debug)]
pub enum ExecutionFailure {
    /// Refused before reaching the gateway.
    Rejected(String),
    Gateway(GatewayError),
}

impl ExecutionFailure {
    pub fn classification(&self) -> ErrorClassification {
        match self {
            ExecutionFailure::Rejected(_) => ErrorClassification::of(ErrorCategory::Other),
            ExecutionFailure::Gateway(e) => classify(&e.to_string()),
        }
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionFailure::Rejected(reason) => write!(f, "Query rejected: {}", reason),
            ExecutionFailure::Gateway(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExecutionFailure {}

pub struct QueryExecutor {
    gateway: Arc<dyn QueryGateway>,
    row_cap: usize,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(gateway: Arc<dyn QueryGateway>, row_cap: usize, timeout: Duration) -> Self {
        Self {
            gateway,
            row_cap,
            timeout,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.gateway.has_credentials()
    }

    /// Runs the statement once. Never retries.
    pub async fn execute(&self, sql: &str) -> Result<ExecutionResult, ExecutionFailure> {
        let statement = ensure_read_only(sql).map_err(ExecutionFailure::Rejected)?;

        let start = Instant::now();
        let result = match tokio::time::timeout(
            self.timeout,
            self.gateway.execute(statement, self.row_cap),
        )
        .await
        {
            Ok(result) => result.map_err(ExecutionFailure::Gateway)?,
            Err(_) => {
                warn!("Query exceeded {:?}", self.timeout);
                return Err(ExecutionFailure::Gateway(GatewayError::Timeout(self.timeout)));
            }
        };

        info!(
            "Query returned {} rows in {:?}{}",
            result.row_count,
            start.elapsed(),
            if result.truncated { " (truncated)" } else { "" }
        );
        Ok(result)
    }
}

/// Returns the statement without trailing semicolons if it is a single
/// SELECT or WITH statement with no data-modifying keywords.
pub fn ensure_read_only(sql: &str) -> Result<&str, String> {
    let statement = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    let code = strip_literals(statement);
    debug!("Checking statement: {}", code);

    let first_word = code
        .split(|c: char| c.is_whitespace() || c == '(')
        .find(|w| !w.is_empty())
        .unwrap_or("")
        .to_ascii_lowercase();
    if first_word != "select" && first_word != "with" {
        return Err("only SELECT or WITH statements can be run".to_string());
    }
    if code.contains(';') {
        return Err("only one statement can be run at a time".to_string());
    }
    if let Some(keyword) = MUTATING.find(&code) {
        return Err(format!("'{}' is not allowed in a report query", keyword.as_str()));
    }
    Ok(statement)
}

// Blanks out quoted literals, quoted identifiers and comments so keyword
// checks only see SQL code.
fn strip_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                while let Some(next) = chars.next() {
                    if next == c {
                        if chars.peek() == Some(&c) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                out.push(' ');
            }
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
                out.push('\n');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingGateway {
        statements: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl QueryGateway for CountingGateway {
        async fn execute(&self, sql: &str, row_cap: usize) -> Result<ExecutionResult, GatewayError> {
            self.statements.lock().unwrap().push(sql.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(ExecutionResult::capped(Vec::new(), row_cap))
        }
    }

    #[test]
    fn read_only_statements_pass() {
        assert_eq!(ensure_read_only("SELECT 1;  ").unwrap(), "SELECT 1");
        assert!(ensure_read_only("with t as (select 1) select * from t").is_ok());
        assert!(ensure_read_only("SELECT * FROM logs WHERE action = 'delete; drop'").is_ok());
        assert!(ensure_read_only("SELECT updated_at FROM projects -- update me").is_ok());
        assert!(ensure_read_only("(SELECT 1)").is_ok());
    }

    #[test]
    fn mutations_and_batches_are_refused() {
        assert!(ensure_read_only("DELETE FROM projects").is_err());
        assert!(ensure_read_only("SELECT 1; DROP TABLE projects").is_err());
        assert!(ensure_read_only("WITH gone AS (DELETE FROM projects RETURNING *) SELECT * FROM gone").is_err());
        assert!(ensure_read_only("").is_err());
    }

    #[tokio::test]
    async fn rejected_statement_never_reaches_gateway() {
        let gateway = Arc::new(CountingGateway::default());
        let executor = QueryExecutor::new(gateway.clone(), 10, Duration::from_secs(1));

        let err = executor.execute("UPDATE projects SET status = 'done'").await.unwrap_err();
        assert!(matches!(err, ExecutionFailure::Rejected(_)));
        assert!(!err.classification().retryable);
        assert!(gateway.statements.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_gateway_is_a_retryable_timeout() {
        let gateway = Arc::new(CountingGateway {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let executor = QueryExecutor::new(gateway, 10, Duration::from_millis(20));

        let err = executor.execute("SELECT 1").await.unwrap_err();
        let classification = err.classification();
        assert_eq!(classification.category, ErrorCategory::Timeout);
        assert!(classification.retryable);
    }
}
