use duckdb::{AccessMode, Config, Connection};
use r2d2::ManageConnection;

/// Hands out connections that DuckDB itself refuses to write through.
pub struct ReadOnlyDuckDbManager {
    database_path: String,
}

impl ReadOnlyDuckDbManager {
    pub fn new(database_path: String) -> Self {
        Self { database_path }
    }
}

impl ManageConnection for ReadOnlyDuckDbManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        Connection::open_with_flags(&self.database_path, config)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute_batch("SELECT 1")
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
