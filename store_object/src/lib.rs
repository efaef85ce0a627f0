//! Store Object - record stores for modelkit
//!
//! This crate provides the record model, the store and session traits, the
//! query builder shared by every backend, and two stores: `GenericStore`
//! (PostgreSQL through sqlx) and `MemoryStore`.

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod errors;
pub mod generic_store;
pub mod memory_store;
pub mod prelude;
pub mod query_builder;
pub mod traits;
pub mod validation;

pub use errors::StorehausError;
pub use generic_store::{GenericStore, PgSession};
pub use memory_store::{MemorySession, MemoryStore};
pub use query_builder::{QueryBuilder, QueryFilter, QueryOperator, SortOrder, UpdateSet};
pub use traits::*;
pub use validation::{ValidatedFieldName, ValidatedTableName, ValidationError};

use sqlx::PgPool;

pub type DbPool = PgPool;
