//! Convenience re-exports for common store-object usage

// Core traits
pub use crate::traits::{Record, RecordStore, StoreSession};

// Error types
pub use crate::errors::StorehausError;

// Stores
pub use crate::generic_store::GenericStore;
pub use crate::memory_store::MemoryStore;

// Validation
pub use crate::validation::{ValidatedFieldName, ValidatedTableName, ValidationError};

// Query building
pub use crate::query_builder::{QueryBuilder, QueryFilter, SortOrder, UpdateSet};

// Common external dependencies that are frequently used
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
pub use sqlx::{FromRow, PgPool, Row};
pub use uuid::Uuid;
