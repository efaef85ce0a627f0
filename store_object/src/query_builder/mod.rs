//! Query builder utilities
//!
//! This module provides query construction utilities shared by the SQL and
//! in-memory stores.

pub mod builder;
pub mod evaluate;
pub mod filter;
pub mod ordering;
pub mod sql_generation;
pub mod update;



pub use builder::QueryBuilder;
pub use filter::{LogicalOperator, QueryCondition, QueryFilter, QueryOperator};
pub use ordering::SortOrder;
pub use update::UpdateSet;
