//! # ModelKit
//!
//! Reusable model mixins for PostgreSQL-backed applications: a primary flag
//! kept unique per group, temporal range queries, and write-time validation
//! of non-overlapping history.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modelkit::prelude::*;
//! use chrono::NaiveDate;
//! use serde_json::{json, Value};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
//! pub struct Email {
//!     pub id: Option<i64>,
//!     pub person_id: i64,
//!     pub address: String,
//!     pub is_primary: bool,
//! }
//!
//! impl Record for Email {
//!     type Key = i64;
//!     fn table_name() -> &'static str { "emails" }
//!     fn key(&self) -> Option<i64> { self.id }
//! }
//!
//! impl PrimaryFlagged for Email {
//!     const PRIMARY_FLAG: PrimaryFlagField = PrimaryFlagField::on("person_id");
//!     fn group_value(&self) -> Value { json!(self.person_id) }
//!     fn is_primary(&self) -> bool { self.is_primary }
//!     fn set_primary(&mut self, value: bool) { self.is_primary = value }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let kit = ModelKit::from_env().await?;
//!     let emails = kit.models::<Email>()?.with_hook(PrimaryFlagHook::new());
//!
//!     let saved = emails
//!         .save(Email {
//!             id: None,
//!             person_id: 1,
//!             address: "ann@example.com".to_string(),
//!             is_primary: false,
//!         })
//!         .await?;
//!     assert!(saved.is_primary);
//!
//!     let as_of = NaiveDate::from_ymd_opt(2020, 3, 1);
//!     let query = QueryBuilder::new().active().current(IntervalFields::default(), as_of);
//!     println!("{:?}", query.build_where_clause());
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macro
/// Compiles to nothing unless the `debug-logging` feature is enabled
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

pub mod address;
pub mod core;
pub mod errors;
pub mod history;
pub mod model_store;
pub mod prelude;
pub mod primary_flag;
pub mod temporal;
pub mod tracked;
pub mod upload;

// Re-export the main public types for convenience
pub use core::ModelKit;
pub use errors::ModelKitError;
pub use history::{validate_history, HistoryFields, HistoryHook, HistoryRecord};
pub use model_store::{ModelStore, SaveHook};
pub use primary_flag::{resolve_primary_flag, PrimaryFlagField, PrimaryFlagHook, PrimaryFlagged};
pub use temporal::{CoreQueryExt, Interval, IntervalFields, Temporal, TemporalStore};

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, HistoryConfig, OverlapPolicy};

// Re-export internal crates used in the public API
pub use store_object;

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
