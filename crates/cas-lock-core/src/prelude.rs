//! Convenience prelude for the core lock types.

pub use crate::error::{BoxError, LockError, LockResult, StoreError, StoreResult};
pub use crate::record::{GUID_LEN, Guid, LockRecord};
pub use crate::store::{DeleteCondition, LockStore, PutCondition};
