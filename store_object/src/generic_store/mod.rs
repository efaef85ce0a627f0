pub mod core;
pub mod store_object;
pub mod transaction;

pub use core::GenericStore;
pub use transaction::PgSession;
