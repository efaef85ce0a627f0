//! Traits for database operations
//!
//! This module contains the traits that define the record model and the
//! store interface used by the modelkit hooks.

pub mod record;
pub mod store;

pub use record::{key_value, Record};
pub use store::{RecordStore, StoreSession};
