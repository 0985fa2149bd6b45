use thiserror::Error;

/// Raised by repositories when a row changed or stayed locked underneath
/// the caller. Travels inside `anyhow::Error`; callers recognise it with
/// [`is_storage_conflict`].
#[derive(Debug, Error)]
#[error("concurrent modification: {0}")]
pub struct StorageConflict(pub String);

pub fn is_storage_conflict(error: &anyhow::Error) -> bool {
    error.downcast_ref::<StorageConflict>().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_survives_context() {
        let error = anyhow::Error::new(StorageConflict("status moved".to_string()))
            .context("save_transition");
        assert!(is_storage_conflict(&error));
        assert!(!is_storage_conflict(&anyhow::anyhow!("connection refused")));
    }
}
