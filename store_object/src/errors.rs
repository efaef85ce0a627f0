use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorehausError {
    #[error("Database error on {table} during {operation}: {source}")]
    DatabaseOperation {
        table: String,
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Query failed on {table}: {source} (sql: {sql})")]
    QueryExecution {
        table: String,
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(#[from] crate::validation::ValidationError),

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl StorehausError {
    pub fn database_operation(table: &str, operation: &str, source: sqlx::Error) -> Self {
        Self::DatabaseOperation {
            table: table.to_string(),
            operation: operation.to_string(),
            source,
        }
    }

    pub fn query_execution(table: &str, sql: &str, source: sqlx::Error) -> Self {
        Self::QueryExecution {
            table: table.to_string(),
            sql: sql.to_string(),
            source,
        }
    }

    pub fn serialization(context: &str, source: serde_json::Error) -> Self {
        Self::SerializationError(format!("{}: {}", context, source))
    }
}
