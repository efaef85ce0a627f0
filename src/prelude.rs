//! Convenience re-exports for common ModelKit usage
//!
//! ```rust
//! use modelkit::prelude::*;
//!
//! let fields = IntervalFields::default();
//! assert_eq!(fields.begin, "date_begin");
//! ```

// Core components
pub use crate::core::ModelKit;
pub use crate::errors::ModelKitError;

// Mixins
pub use crate::address::Address;
pub use crate::history::{validate_history, HistoryFields, HistoryHook, HistoryRecord};
pub use crate::model_store::{ModelStore, SaveHook};
pub use crate::primary_flag::{
    resolve_primary_flag, PrimaryFlagField, PrimaryFlagHook, PrimaryFlagged,
};
pub use crate::temporal::{CoreQueryExt, Interval, IntervalFields, Temporal, TemporalStore};
pub use crate::tracked::{has_changed, latest, TimestampHook, Timestamped};
pub use crate::upload::uuid_upload_to;

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, HistoryConfig, OverlapPolicy};

// Commonly used store-object types
pub use store_object::prelude::*;

// Common external dependencies
pub use anyhow;
pub use async_trait;
pub use sqlx;
pub use tokio;
