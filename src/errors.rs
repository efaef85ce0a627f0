//! Error types for the modelkit crate
//!
//! Validation failures raised by the mixins, plus the store, database and
//! configuration errors they pass through.

use store_object::StorehausError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelKitError {
    #[error("Can't have a begin date after an end date ({begin} > {end})")]
    InvalidRange { begin: String, end: String },

    #[error("Can't have overlapping history dates for {table} where {field} = {group}")]
    OverlappingRange {
        table: &'static str,
        field: &'static str,
        group: String,
    },

    #[error("No current {table} record as of {as_of}")]
    NotFound { table: &'static str, as_of: String },

    #[error("{count} current {table} records as of {as_of}, expected one")]
    MultipleResults {
        table: &'static str,
        as_of: String,
        count: usize,
    },

    #[error("Store error: {0}")]
    Store(#[from] StorehausError),

    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ModelKitError {
    /// Whether this is a validation failure (as opposed to an infrastructure error)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ModelKitError::InvalidRange { .. } | ModelKitError::OverlappingRange { .. }
        )
    }
}
