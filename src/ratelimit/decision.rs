//! Admission decisions returned by every limiter.

use std::time::Duration;

use serde::Serialize;

/// The outcome of one admission call. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the event was admitted
    pub admitted: bool,
    /// Capacity left for the key after this call
    pub remaining: u64,
    /// How long to wait before the same request could be admitted
    #[serde(with = "retry_after_ms")]
    pub retry_after: Option<Duration>,
}

impl Decision {
    /// An admitted decision.
    pub fn admit(remaining: u64) -> Self {
        Self {
            admitted: true,
            remaining,
            retry_after: None,
        }
    }

    /// A rejected decision. `retry_after` is `None` when waiting cannot help.
    pub fn reject(remaining: u64, retry_after: Option<Duration>) -> Self {
        Self {
            admitted: false,
            remaining,
            retry_after,
        }
    }

    /// Whether the event was rejected.
    pub fn is_rejected(&self) -> bool {
        !self.admitted
    }
}

mod retry_after_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }
}
