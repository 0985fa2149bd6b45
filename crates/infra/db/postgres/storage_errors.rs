use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::domain::repositories::conflict::StorageConflict;

const CONFLICT_MESSAGES: [&str; 3] = ["lock timeout", "could not obtain lock", "deadlock detected"];

/// Turns lost races reported by Postgres into [`StorageConflict`] and
/// passes every other error through untouched.
pub fn into_storage_error(error: anyhow::Error) -> anyhow::Error {
    let conflict = match error.downcast_ref::<DieselError>() {
        Some(DieselError::DatabaseError(kind, info)) => {
            is_conflict(kind, info.message()).then(|| info.message().to_string())
        }
        _ => None,
    };

    match conflict {
        Some(message) => StorageConflict(message).into(),
        None => error,
    }
}

fn is_conflict(kind: &DatabaseErrorKind, message: &str) -> bool {
    matches!(
        kind,
        DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::SerializationFailure
    ) || CONFLICT_MESSAGES
        .iter()
        .any(|needle| message.contains(needle))
}
