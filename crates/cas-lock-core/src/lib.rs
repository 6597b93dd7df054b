//! Core record model and store contract for distributed locks.

pub mod error;
pub mod prelude;
pub mod record;
pub mod store;

pub use error::{LockError, LockResult, StoreError, StoreResult};
pub use prelude::*;
