use crate::config::GatewayConfig;
use crate::gateway::pool::ReadOnlyDuckDbManager;
use crate::gateway::{
    ColumnInfo, EnumInfo, ExecutionResult, GatewayError, QueryGateway, Row, SchemaContext,
    SchemaProvider, TableInfo,
};
use arrow::json::writer::JsonArray;
use arrow::json::WriterBuilder;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use duckdb::Connection;
use r2d2::Pool;
use std::time::Duration;
use tracing::{debug, info};

/// Executes report queries against a local DuckDB file opened read-only.
pub struct DuckDbGateway {
    pool: Pool<ReadOnlyDuckDbManager>,
}

impl DuckDbGateway {
    pub fn open(config: &GatewayConfig) -> Result<Self, GatewayError> {
        info!("Opening DuckDB database read-only: {}", config.database_path);
        let manager = ReadOnlyDuckDbManager::new(config.database_path.clone());
        let pool = Pool::builder()
            .max_size(config.pool_size.max(1) as u32)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn with_connection<T, F>(&self, work: F) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, GatewayError> + Send + 'static,
    {
        let pool = self.pool.clone();
        // DuckDB calls block, keep them off the async workers
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;
            work(&conn)
        })
        .await
        .map_err(|e| GatewayError::ConnectionError(format!("Database task failed: {}", e)))?
    }
}

fn query_error(e: duckdb::Error) -> GatewayError {
    GatewayError::Query(e.to_string())
}

fn run_capped(conn: &Connection, sql: &str, row_cap: usize) -> Result<ExecutionResult, GatewayError> {
    let statement = sql.trim().trim_end_matches(';');
    // Fetch one extra row so truncation can be detected
    let capped_sql = format!(
        "SELECT * FROM ({}) AS capped_result LIMIT {}",
        statement,
        row_cap + 1
    );
    debug!("Capped SQL: {}", capped_sql);

    let mut stmt = conn.prepare(&capped_sql).map_err(query_error)?;
    let batches: Vec<RecordBatch> = stmt.query_arrow([]).map_err(query_error)?.collect();

    let rows = batches_to_rows(&batches)?;
    Ok(ExecutionResult::capped(rows, row_cap))
}

fn batches_to_rows(batches: &[RecordBatch]) -> Result<Vec<Row>, GatewayError> {
    if batches.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    let refs: Vec<&RecordBatch> = batches.iter().collect();
    writer
        .write_batches(&refs)
        .map_err(|e| GatewayError::Query(format!("Failed to encode result rows: {}", e)))?;
    writer
        .finish()
        .map_err(|e| GatewayError::Query(format!("Failed to encode result rows: {}", e)))?;

    let buffer = writer.into_inner();
    if buffer.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&buffer)
        .map_err(|e| GatewayError::Query(format!("Failed to decode result rows: {}", e)))
}

fn introspect(conn: &Connection) -> Result<SchemaContext, GatewayError> {
    let mut tables_stmt = conn
        .prepare(
            "SELECT table_name, table_type FROM information_schema.tables
             WHERE table_schema NOT IN ('information_schema', 'pg_catalog')
             ORDER BY table_name",
        )
        .map_err(query_error)?;
    let relations: Vec<(String, String)> = tables_stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(query_error)?
        .collect::<Result<_, _>>()
        .map_err(query_error)?;

    let mut columns_stmt = conn
        .prepare(
            "SELECT column_name, data_type FROM information_schema.columns
             WHERE table_name = ? AND table_schema NOT IN ('information_schema', 'pg_catalog')
             ORDER BY ordinal_position",
        )
        .map_err(query_error)?;

    let mut schema = SchemaContext::default();
    for (name, table_type) in relations {
        let columns: Vec<ColumnInfo> = columns_stmt
            .query_map([&name], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                })
            })
            .map_err(query_error)?
            .collect::<Result<_, _>>()
            .map_err(query_error)?;

        let table = TableInfo { name, columns };
        if table_type.eq_ignore_ascii_case("VIEW") {
            schema.views.push(table);
        } else {
            schema.tables.push(table);
        }
    }

    let mut enums_stmt = conn
        .prepare(
            "SELECT type_name FROM duckdb_types()
             WHERE logical_type = 'ENUM' AND NOT internal
             ORDER BY type_name",
        )
        .map_err(query_error)?;
    let enum_names: Vec<String> = enums_stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(query_error)?
        .collect::<Result<_, _>>()
        .map_err(query_error)?;

    for name in enum_names {
        let mut values_stmt = conn
            .prepare(&format!(
                "SELECT unnest(enum_range(NULL::\"{}\"))::VARCHAR",
                name.replace('"', "\"\"")
            ))
            .map_err(query_error)?;
        let values: Vec<String> = values_stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(query_error)?
            .collect::<Result<_, _>>()
            .map_err(query_error)?;
        schema.enums.push(EnumInfo { name, values });
    }

    Ok(schema)
}

#[async_trait]
impl QueryGateway for DuckDbGateway {
    async fn execute(&self, sql: &str, row_cap: usize) -> Result<ExecutionResult, GatewayError> {
        let sql = sql.to_string();
        self.with_connection(move |conn| run_capped(conn, &sql, row_cap))
            .await
    }
}

#[async_trait]
impl SchemaProvider for DuckDbGateway {
    async fn fetch_schema(&self) -> Result<SchemaContext, GatewayError> {
        self.with_connection(introspect).await
    }
}
