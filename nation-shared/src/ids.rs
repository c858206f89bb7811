/// Identifier generation
///
/// Every entity id is a UUIDv7 rendered as 32 lowercase hex characters.
/// UUIDv7 values start with a millisecond timestamp and the generator keeps a
/// monotonic counter inside the millisecond, so sorting ids as strings sorts
/// them by creation time. Message pagination depends on this.

use uuid::Uuid;

/// Generates a new time-ordered id
pub fn new_id() -> String {
    Uuid::now_v7().simple().to_string()
}
