use std::fmt;

/// Fencing credentials presented on every tuple write.
///
/// A zero lock (both parts empty) requests no fencing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Lock {
    lock_id: String,
    lock_token: String,
}

impl Lock {
    pub fn new(lock_id: impl Into<String>, lock_token: impl Into<String>) -> Self {
        Self {
            lock_id: lock_id.into(),
            lock_token: lock_token.into(),
        }
    }

    /// Lock id owned by a consumer group member for one partition.
    pub fn partition_id(group_id: &str, partition: u32) -> String {
        format!("{group_id}/{partition}")
    }

    pub fn lock_id(&self) -> &str {
        &self.lock_id
    }

    pub fn lock_token(&self) -> &str {
        &self.lock_token
    }

    pub fn is_zero(&self) -> bool {
        self.lock_id.is_empty() && self.lock_token.is_empty()
    }
}

impl fmt::Display for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lock_id)
    }
}
