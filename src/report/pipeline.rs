use crate::config::PipelineConfig;
use crate::gateway::{ExecutionResult, QueryGateway, SchemaContext, SchemaProvider};
use crate::knowledge::KnowledgeBase;
use crate::llm::LlmManager;
use crate::report::answer::{self, wants_details};
use crate::report::classify::ErrorClassification;
use crate::report::empty::{self, EmptyResultAnalysis};
use crate::report::executor::QueryExecutor;
use crate::report::fields::infer_fields;
use crate::report::generator::{self, GENERATION_HELP, Generation};
use crate::report::log::{LogStatus, QueryLogEntry, QueryLogger};
use crate::report::models::{
    DebugInfo, GeneratedQuery, QueryRequest, ReportFailure, ReportResponse, ReportSuccess,
};
use crate::report::prompt;
use crate::report::retry::{self, RetryOutcome};
use chrono::Utc;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

pub const CONFIGURATION_MESSAGE: &str =
    "The report service is not configured correctly. Please contact an administrator.";

#[derive(Debug)]
pub enum PipelineError {
    /// Missing credentials or similar; nothing was sent to any collaborator.
    Configuration(String),
    InvalidRequest(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            PipelineError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl Error for PipelineError {}

pub struct ReportPipeline {
    llm: Arc<LlmManager>,
    schema: Arc<dyn SchemaProvider>,
    executor: QueryExecutor,
    knowledge: Arc<KnowledgeBase>,
    logger: Arc<QueryLogger>,
    settings: PipelineConfig,
}

impl ReportPipeline {
    pub fn new(
        llm: Arc<LlmManager>,
        schema: Arc<dyn SchemaProvider>,
        gateway: Arc<dyn QueryGateway>,
        knowledge: Arc<KnowledgeBase>,
        logger: Arc<QueryLogger>,
        settings: PipelineConfig,
        query_timeout: Duration,
    ) -> Self {
        let executor = QueryExecutor::new(gateway, settings.row_cap, query_timeout);
        Self {
            llm,
            schema,
            executor,
            knowledge,
            logger,
            settings,
        }
    }

    pub fn kpi_version(&self) -> &str {
        &self.knowledge.version
    }

    pub fn llm_backend(&self) -> &str {
        self.llm.backend()
    }

    fn missing_credentials(&self) -> Option<&'static str> {
        if !self.llm.has_credentials() {
            Some("language model API key is not set")
        } else if !self.schema.has_credentials() || !self.executor.has_credentials() {
            Some("database gateway API key is not set")
        } else {
            None
        }
    }

    #[instrument(skip(self, request), fields(question = %request.natural_language_query))]
    pub async fn run(&self, request: &QueryRequest) -> Result<ReportResponse, PipelineError> {
        let question = request.natural_language_query.trim();
        if question.is_empty() {
            return Err(PipelineError::InvalidRequest("query must not be empty".to_string()));
        }

        let started = Instant::now();

        if let Some(missing) = self.missing_credentials() {
            error!("Refusing report request: {}", missing);
            self.logger
                .record(
                    QueryLogEntry::new(question, LogStatus::Error, started.elapsed())
                        .with_error(missing),
                )
                .await;
            return Err(PipelineError::Configuration(missing.to_string()));
        }

        let schema = match self.fetch_schema().await {
            Ok(schema) => schema,
            Err(message) => {
                error!("Schema fetch failed: {}", message);
                self.logger
                    .record(
                        QueryLogEntry::new(question, LogStatus::Error, started.elapsed())
                            .with_error(message.clone()),
                    )
                    .await;
                return Ok(ReportResponse::Failure(ReportFailure::new(
                    message,
                    "I couldn't load the database structure needed to answer that. Please try again in a moment.",
                )));
            }
        };

        let grounding = prompt::compose(question, &schema, &self.knowledge, Utc::now().date_naive());
        let messages = generator::build_messages(
            grounding,
            &request.conversation_history,
            question,
            self.settings.history_turns,
        );

        let generated = match generator::generate(&self.llm, &messages).await {
            Generation::Query(query) => query,
            Generation::Failed { reason } => {
                warn!("Query generation failed: {}", reason);
                self.logger
                    .record(
                        QueryLogEntry::new(question, LogStatus::Error, started.elapsed())
                            .with_error(reason),
                    )
                    .await;
                return Ok(ReportResponse::Failure(ReportFailure::new(
                    "Could not generate a query for this question",
                    GENERATION_HELP,
                )));
            }
        };
        info!("Generated query: {}", generated.sql);

        match self.executor.execute(&generated.sql).await {
            Ok(result) => {
                let status = if result.row_count == 0 {
                    LogStatus::Empty
                } else {
                    LogStatus::Success
                };
                self.logger
                    .record(
                        self.entry(question, status, started, &generated.sql, &generated.explanation)
                            .with_rows(result.row_count),
                    )
                    .await;
                Ok(self.respond(question, &generated, result, None).await)
            }
            Err(failure) => {
                let raw_error = failure.to_string();
                let classification = failure.classification();
                warn!(
                    "Query failed ({}, retryable: {}): {}",
                    classification.category, classification.retryable, raw_error
                );
                self.logger
                    .record(
                        self.entry(question, LogStatus::Error, started, &generated.sql, &generated.explanation)
                            .with_error(raw_error.clone()),
                    )
                    .await;

                if !classification.retryable {
                    return Ok(ReportResponse::Failure(failure_response(
                        &generated.sql,
                        &generated.sql,
                        raw_error,
                        &classification,
                    )));
                }

                let mut outcome = retry::attempt(
                    &self.llm,
                    &self.executor,
                    question,
                    &generated.sql,
                    &raw_error,
                    &classification,
                )
                .await;

                match outcome.result.take() {
                    Some(result) if outcome.succeeded => {
                        let retried_sql = outcome.simplified_sql.clone().unwrap_or_default();
                        let explanation = outcome.explanation.clone().unwrap_or_default();
                        self.logger
                            .record(
                                self.entry(question, LogStatus::RetrySuccess, started, &retried_sql, &explanation)
                                    .with_rows(result.row_count)
                                    .retried(),
                            )
                            .await;
                        Ok(self.respond(question, &generated, result, Some(outcome)).await)
                    }
                    _ => {
                        let attempted_sql = outcome
                            .simplified_sql
                            .clone()
                            .unwrap_or_else(|| generated.sql.clone());
                        let retry_error = outcome.error.clone().unwrap_or(raw_error);
                        self.logger
                            .record(
                                self.entry(question, LogStatus::Error, started, &attempted_sql, "")
                                    .with_error(retry_error.clone())
                                    .retried(),
                            )
                            .await;
                        Ok(ReportResponse::Failure(failure_response(
                            &generated.sql,
                            &attempted_sql,
                            retry_error,
                            &classification,
                        )))
                    }
                }
            }
        }
    }

    async fn fetch_schema(&self) -> Result<SchemaContext, String> {
        let timeout = Duration::from_secs(self.settings.schema_timeout_secs);
        match tokio::time::timeout(timeout, self.schema.fetch_schema()).await {
            Ok(Ok(schema)) => Ok(schema),
            Ok(Err(e)) => Err(format!("Failed to load schema: {}", e)),
            Err(_) => Err(format!("Schema fetch timed out after {}s", timeout.as_secs())),
        }
    }

    fn entry(
        &self,
        question: &str,
        status: LogStatus,
        started: Instant,
        sql: &str,
        explanation: &str,
    ) -> QueryLogEntry {
        QueryLogEntry::new(question, status, started.elapsed()).with_sql(
            sql,
            explanation,
            self.logger.kpi_fields(),
        )
    }

    async fn respond(
        &self,
        question: &str,
        generated: &GeneratedQuery,
        result: ExecutionResult,
        retry: Option<RetryOutcome>,
    ) -> ReportResponse {
        let executed_sql = retry
            .as_ref()
            .and_then(|r| r.simplified_sql.as_deref())
            .unwrap_or(&generated.sql);

        let analysis = if result.row_count == 0 {
            Some(
                empty::request_analysis(&self.llm, question, executed_sql)
                    .await
                    .unwrap_or_else(|_| EmptyResultAnalysis::fallback()),
            )
        } else {
            None
        };

        let answer = answer::synthesize(
            &self.llm,
            question,
            executed_sql,
            &result,
            analysis.as_ref(),
            self.settings.answer_sample_rows,
        )
        .await;

        let explanation = retry
            .as_ref()
            .and_then(|r| r.explanation.clone())
            .or_else(|| Some(generated.explanation.clone()))
            .filter(|e| !e.is_empty());

        ReportResponse::Success(ReportSuccess {
            success: true,
            answer: answer.text,
            show_details_by_default: wants_details(question) && result.row_count > 0,
            query: generated.sql.clone(),
            explanation,
            fields: infer_fields(result.rows.first()),
            row_count: result.row_count,
            truncated: result.truncated,
            data: result.rows,
            insights: answer.insights,
            retry_attempted: retry.as_ref().map(|r| r.attempted),
            simplified_query: retry.and_then(|r| r.simplified_sql),
            kpi_version: self.knowledge.version.clone(),
        })
    }
}

fn failure_response(
    original_sql: &str,
    attempted_sql: &str,
    error: String,
    classification: &ErrorClassification,
) -> ReportFailure {
    ReportFailure {
        success: false,
        error,
        query: Some(original_sql.to_string()),
        answer: format!(
            "I couldn't run the report for that question. {} {}",
            classification.message, classification.suggestion
        ),
        debug_info: Some(DebugInfo {
            sql_attempted: attempted_sql.to_string(),
            error_type: classification.category.to_string(),
            suggestion: classification.suggestion.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, Row};
    use crate::llm::LlmError;
    use crate::llm::models::{ChatMessage, FunctionCallResponse};
    use crate::llm::testing::{Scripted, ScriptedModel, manager};
    use crate::report::log::testing::MemorySink;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSchema {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SchemaProvider for FakeSchema {
        async fn fetch_schema(&self) -> Result<SchemaContext, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GatewayError::ConnectionError("connection refused".to_string()));
            }
            Ok(serde_json::from_value(json!({
                "tables": [
                    { "name": "payees", "columns": [{ "name": "payee_name", "data_type": "text" }] },
                    { "name": "time_entries", "columns": [{ "name": "hours", "data_type": "numeric" }] }
                ],
                "views": [{ "name": "project_financial_summary", "columns": [] }]
            }))
            .unwrap())
        }
    }

    #[derive(Default)]
    struct FakeGateway {
        replies: Mutex<VecDeque<Result<ExecutionResult, GatewayError>>>,
        statements: Mutex<Vec<String>>,
    }

    impl FakeGateway {
        fn new(replies: Vec<Result<ExecutionResult, GatewayError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                statements: Mutex::new(Vec::new()),
            }
        }

        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryGateway for FakeGateway {
        async fn execute(&self, sql: &str, _row_cap: usize) -> Result<ExecutionResult, GatewayError> {
            self.statements.lock().unwrap().push(sql.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::Query("unexpected statement".to_string())))
        }
    }

    struct Harness {
        model: Arc<ScriptedModel>,
        schema: Arc<FakeSchema>,
        gateway: Arc<FakeGateway>,
        sink: Arc<MemorySink>,
        pipeline: ReportPipeline,
    }

    fn harness_with(
        model: ScriptedModel,
        schema_fails: bool,
        replies: Vec<Result<ExecutionResult, GatewayError>>,
    ) -> Harness {
        let model = Arc::new(model);
        let schema = Arc::new(FakeSchema {
            fail: schema_fails,
            calls: AtomicUsize::new(0),
        });
        let gateway = Arc::new(FakeGateway::new(replies));
        let sink = Arc::new(MemorySink::default());
        let knowledge = Arc::new(KnowledgeBase::builtin());
        let logger = Arc::new(QueryLogger::new(sink.clone(), &knowledge));

        let pipeline = ReportPipeline::new(
            Arc::new(manager(model.clone())),
            schema.clone(),
            gateway.clone(),
            knowledge,
            logger,
            PipelineConfig::default(),
            Duration::from_secs(5),
        );

        Harness {
            model,
            schema,
            gateway,
            sink,
            pipeline,
        }
    }

    fn harness(script: Vec<Scripted>, replies: Vec<Result<ExecutionResult, GatewayError>>) -> Harness {
        harness_with(ScriptedModel::new(script), false, replies)
    }

    fn request(question: &str) -> QueryRequest {
        QueryRequest {
            natural_language_query: question.to_string(),
            conversation_history: Vec::new(),
        }
    }

    fn rows(value: Value) -> ExecutionResult {
        let rows: Vec<Row> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().cloned().unwrap())
            .collect();
        ExecutionResult::capped(rows, 1000)
    }

    fn generated(sql: &str, explanation: &str) -> Scripted {
        Scripted::Function(Ok(FunctionCallResponse::Arguments(json!({
            "sql": sql,
            "explanation": explanation,
        }))))
    }

    fn text(reply: &str) -> Scripted {
        Scripted::Text(Ok(reply.to_string()))
    }

    fn down() -> Scripted {
        Scripted::Text(Err(LlmError::ConnectionError("down".to_string())))
    }

    fn calls_with_system_prompt(model: &ScriptedModel, needle: &str) -> usize {
        model
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|messages| messages.first().is_some_and(|m| m.content.contains(needle)))
            .count()
    }

    fn success(response: ReportResponse) -> ReportSuccess {
        match response {
            ReportResponse::Success(success) => success,
            ReportResponse::Failure(failure) => panic!("expected success, got {:?}", failure),
        }
    }

    fn failure(response: ReportResponse) -> ReportFailure {
        match response {
            ReportResponse::Failure(failure) => failure,
            ReportResponse::Success(success) => panic!("expected failure, got {:?}", success),
        }
    }

    #[tokio::test]
    async fn schema_failure_stops_before_generation() {
        let h = harness_with(ScriptedModel::new(vec![generated("SELECT 1", "")]), true, vec![]);

        let response = failure(h.pipeline.run(&request("Show me projects over budget")).await.unwrap());

        assert!(!response.success);
        assert_eq!(h.model.call_count(), 0);
        assert_eq!(h.schema.calls.load(Ordering::SeqCst), 1);
        assert!(h.gateway.statements().is_empty());
        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries.iter().all(|e| e.sql.is_none()));
        assert_eq!(entries[0].status, LogStatus::Error);
    }

    #[tokio::test]
    async fn nickname_is_grounded_and_query_passes_through() {
        let sql = "SELECT p.payee_name, SUM(t.hours) AS total_hours FROM time_entries t JOIN payees p ON p.id = t.payee_id WHERE p.payee_name ILIKE '%john%' GROUP BY p.payee_name";
        let h = harness(
            vec![
                generated(sql, "Hours for John last week"),
                text("John logged 32 hours last week."),
            ],
            vec![Ok(rows(json!([{ "payee_name": "John Smith", "total_hours": 32 }])))],
        );

        let response = success(
            h.pipeline
                .run(&request("How many hours did Johnny work last week?"))
                .await
                .unwrap(),
        );

        let calls = h.model.calls.lock().unwrap().clone();
        let grounding = &calls[0][0].content;
        assert!(grounding.contains("\"Johnny\" is a nickname for \"john\""));
        assert!(grounding.contains("ILIKE '%john%'"));
        assert_eq!(calls[0].last(), Some(&ChatMessage::user("How many hours did Johnny work last week?")));

        assert_eq!(h.gateway.statements(), vec![sql.to_string()]);
        assert_eq!(response.query, sql);
        assert_eq!(response.answer, "John logged 32 hours last week.");
        assert_eq!(response.retry_attempted, None);
        assert_eq!(response.kpi_version, "2024.3");

        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, LogStatus::Success);
        assert_eq!(entries[0].row_count, Some(1));
    }

    #[tokio::test]
    async fn empty_result_is_analysed_once_and_suggestions_reach_the_answer() {
        let h = harness(
            vec![
                generated(
                    "SELECT project_name, budget_variance FROM project_financial_summary WHERE total_expenses > budget_amount",
                    "Projects whose expenses exceed budget",
                ),
                text(r#"{"reason":"Every project is within budget","suggestions":["Ask which projects are above 90% of budget"],"alternativeQuestion":"Which projects are closest to their budget?"}"#),
                text("Good news: no projects are over budget right now."),
            ],
            vec![Ok(rows(json!([])))],
        );

        let response = success(h.pipeline.run(&request("Show me projects over budget")).await.unwrap());

        assert!(response.success);
        assert_eq!(response.row_count, 0);
        assert!(response.fields.is_empty());
        assert!(response.answer.starts_with("Good news"));
        assert!(response.answer.contains("Ask which projects are above 90% of budget"));
        assert_eq!(response.insights, None);
        assert_eq!(calls_with_system_prompt(&h.model, "returned zero rows"), 1);

        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, LogStatus::Empty);
        assert!(entries[0].kpis_used.contains(&"total_expenses".to_string()));
    }

    #[tokio::test]
    async fn empty_result_with_model_down_uses_generic_suggestions() {
        let h = harness(
            vec![generated("SELECT * FROM projects WHERE client_name ILIKE '%zzz%'", ""), down(), down()],
            vec![Ok(rows(json!([])))],
        );

        let response = success(h.pipeline.run(&request("Projects for client zzz")).await.unwrap());

        assert_eq!(response.row_count, 0);
        assert!(response.answer.starts_with("I didn't find any data"));
        for suggestion in EmptyResultAnalysis::fallback().suggestions {
            assert!(response.answer.contains(&suggestion));
        }
    }

    #[tokio::test]
    async fn missing_table_is_retried_once_with_simpler_query() {
        let h = harness(
            vec![
                generated("SELECT * FROM project_summary", "Project overview"),
                text(r#"{"can_retry": true, "sql": "SELECT project_name, status, contract_amount FROM projects", "explanation": "Read projects directly"}"#),
                text("You have three projects."),
            ],
            vec![
                Err(GatewayError::Query("relation \"project_summary\" does not exist".to_string())),
                Ok(rows(json!([
                    { "project_name": "Miller Kitchen", "status": "active", "contract_amount": 48000 },
                    { "project_name": "Oak St Deck", "status": "active", "contract_amount": 12500 },
                    { "project_name": "Lee Bath", "status": "closed", "contract_amount": 22000 }
                ]))),
            ],
        );

        let response = success(h.pipeline.run(&request("How are my projects doing?")).await.unwrap());

        assert_eq!(response.retry_attempted, Some(true));
        assert_eq!(response.row_count, 3);
        assert_eq!(response.query, "SELECT * FROM project_summary");
        assert_eq!(
            response.simplified_query.as_deref(),
            Some("SELECT project_name, status, contract_amount FROM projects")
        );
        assert_eq!(response.explanation.as_deref(), Some("Read projects directly"));
        assert_eq!(h.gateway.statements().len(), 2);

        let statuses: Vec<LogStatus> = h.sink.entries().iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![LogStatus::Error, LogStatus::RetrySuccess]);
        assert_eq!(h.sink.entries()[1].retry_attempted, Some(true));
    }

    #[tokio::test]
    async fn other_errors_are_never_retried() {
        let h = harness(
            vec![generated("SELECT * FROM payroll", "")],
            vec![Err(GatewayError::Query("permission denied for table payroll".to_string()))],
        );

        let response = failure(h.pipeline.run(&request("Show payroll")).await.unwrap());

        let debug = response.debug_info.unwrap();
        assert_eq!(debug.error_type, "Other");
        assert_eq!(debug.sql_attempted, "SELECT * FROM payroll");
        assert_eq!(response.query.as_deref(), Some("SELECT * FROM payroll"));
        assert_eq!(h.model.call_count(), 1);
        assert_eq!(h.gateway.statements().len(), 1);
        assert_eq!(h.sink.entries().len(), 1);
    }

    #[tokio::test]
    async fn failed_retry_is_terminal() {
        let h = harness(
            vec![
                generated("SELECT budget FROM projects", ""),
                text("```sql\nSELECT budget_amount FROM projects\n```"),
            ],
            vec![
                Err(GatewayError::Query("column \"budget\" does not exist".to_string())),
                Err(GatewayError::Query("column \"budget_amount\" does not exist".to_string())),
            ],
        );

        let response = failure(h.pipeline.run(&request("What is the budget?")).await.unwrap());

        let debug = response.debug_info.unwrap();
        assert_eq!(debug.error_type, "ColumnNotFound");
        assert_eq!(debug.sql_attempted, "SELECT budget_amount FROM projects");
        assert!(!debug.suggestion.is_empty());
        assert_eq!(h.gateway.statements().len(), 2);
        assert_eq!(h.model.call_count(), 2);

        let entries = h.sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].status, LogStatus::Error);
        assert_eq!(entries[1].retry_attempted, Some(true));
    }

    #[tokio::test]
    async fn declined_retry_does_not_execute() {
        let h = harness(
            vec![
                generated("SELECT * FROM estimates_v2", ""),
                text(r#"{"can_retry": false, "reason": "No estimates data is available"}"#),
            ],
            vec![Err(GatewayError::Query("Catalog Error: Table with name estimates_v2 does not exist!".to_string()))],
        );

        let response = failure(h.pipeline.run(&request("Show estimates")).await.unwrap());

        assert_eq!(response.error, "No estimates data is available");
        assert_eq!(response.debug_info.unwrap().error_type, "TableNotFound");
        assert_eq!(h.gateway.statements().len(), 1);
    }

    #[tokio::test]
    async fn scalar_result_states_the_value() {
        let h = harness(
            vec![
                generated("SELECT SUM(amount) AS total_expenses FROM expenses", "Sum of all expenses"),
                down(),
            ],
            vec![Ok(rows(json!([{ "total_expenses": 125000 }])))],
        );

        let response = success(h.pipeline.run(&request("What have we spent in total?")).await.unwrap());

        assert_eq!(response.answer, "Total Expenses: 125000");
        assert_eq!(response.row_count, 1);
        assert!(!response.show_details_by_default);
        assert_eq!(serde_json::to_value(&response.fields).unwrap()[0]["type"], "currency");
    }

    #[tokio::test]
    async fn unusable_generation_returns_help() {
        let h = harness(
            vec![Scripted::Function(Ok(FunctionCallResponse::Text(
                "Could you clarify what you mean?".to_string(),
            )))],
            vec![],
        );

        let response = failure(h.pipeline.run(&request("asdf")).await.unwrap());

        assert_eq!(response.answer, GENERATION_HELP);
        assert!(h.gateway.statements().is_empty());
        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].sql.is_none());
    }

    #[tokio::test]
    async fn missing_credentials_are_fatal_before_any_call() {
        let h = harness_with(ScriptedModel::without_key(), false, vec![]);

        let result = h.pipeline.run(&request("Show me projects over budget")).await;

        assert!(matches!(result, Err(PipelineError::Configuration(_))));
        assert_eq!(h.model.call_count(), 0);
        assert_eq!(h.schema.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let h = harness(vec![], vec![]);
        let result = h.pipeline.run(&request("   ")).await;
        assert!(matches!(result, Err(PipelineError::InvalidRequest(_))));
    }
}
