//! The persisted lock record and its compare-and-set witness.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rand::rngs::OsRng;

/// Length in bytes of a lock guid.
pub const GUID_LEN: usize = 64;

/// Per-write compare-and-set witness.
///
/// A guid is 64 bytes of cryptographically strong randomness installed by
/// every successful write. Holding the bytes that match the stored record is
/// the sole proof of current ownership: heartbeat, release, and steal are all
/// conditioned on guid equality.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Guid([u8; GUID_LEN]);

impl Guid {
    /// Generates a fresh guid from the operating system's entropy source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; GUID_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Returns the raw witness bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Reconstructs a guid from bytes read back out of the store.
    ///
    /// Returns `None` unless exactly [`GUID_LEN`] bytes are supplied.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; GUID_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full 64 bytes are noise in logs; the first few identify the write.
        write!(
            f,
            "Guid({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// One row per lock id, as persisted in the store.
///
/// Fail-Closed locks carry only `owner`, `guid`, and a TTL hint. Fail-Open
/// locks additionally carry the fencing token, the lease duration, and, when
/// the holder trusts its local clock, the wall-clock write time.
#[derive(Debug, Clone, PartialEq)]
pub struct LockRecord {
    /// The lock id; value of the table's partition key.
    pub id: String,
    /// Human-readable identifier of the holder.
    pub owner: String,
    /// Witness installed by this write.
    pub guid: Guid,
    /// Monotonically increasing per successful Fail-Open acquisition.
    pub fencing_token: Option<u64>,
    /// Intended validity window of this write, in milliseconds.
    pub lease_duration_ms: Option<u64>,
    /// Wall-clock time of the write, milliseconds since the Unix epoch.
    pub lock_acquired_time_unix_ms: Option<u64>,
    /// TTL hint for the store's background reaper, seconds since the Unix
    /// epoch. Never read back by this library.
    pub expires_at: Option<u64>,
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_guids_are_distinct() {
        let a = Guid::generate();
        let b = Guid::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_bytes().len(), GUID_LEN);
    }

    #[test]
    fn guid_round_trips_through_bytes() {
        let guid = Guid::generate();
        let restored = Guid::from_bytes(guid.as_bytes()).unwrap();
        assert_eq!(guid, restored);
    }

    #[test]
    fn guid_rejects_wrong_length() {
        assert!(Guid::from_bytes(&[0u8; 16]).is_none());
        assert!(Guid::from_bytes(&[0u8; 65]).is_none());
    }

    #[test]
    fn debug_form_is_truncated() {
        let guid = Guid::generate();
        let rendered = format!("{guid:?}");
        assert!(rendered.starts_with("Guid("));
        assert!(rendered.len() < 20);
    }
}
