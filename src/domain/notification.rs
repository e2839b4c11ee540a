//! Repository notification types

/// A repository notification as reported by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoNotification {
    pub uuid: String,
    pub title: String,
    pub number_of_failures: u64,
}

impl RepoNotification {
    pub fn new(uuid: impl Into<String>, title: impl Into<String>, failures: u64) -> Self {
        Self {
            uuid: uuid.into(),
            title: title.into(),
            number_of_failures: failures,
        }
    }

    /// Notifications stop firing once they accumulate delivery failures.
    pub fn needs_reset(&self) -> bool {
        self.number_of_failures > 0
    }
}
