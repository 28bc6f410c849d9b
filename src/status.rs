use std::time::{Duration, Instant};

/// Default time before a status message disappears.
pub const STATUS_DISMISS_AFTER: Duration = Duration::from_secs(5);

/// A transient, auto-dismissing message for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub is_error: bool,
    pub timestamp: Instant,
}

impl StatusMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
            timestamp: Instant::now(),
        }
    }

    pub fn is_expired(&self, dismiss_after: Duration) -> bool {
        self.timestamp.elapsed() > dismiss_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_is_not_expired() {
        let msg = StatusMessage::error("offline");
        assert!(msg.is_error);
        assert!(!msg.is_expired(STATUS_DISMISS_AFTER));
    }

    #[test]
    fn test_old_message_is_expired() {
        let mut msg = StatusMessage::error("offline");
        msg.timestamp = Instant::now() - Duration::from_secs(6);
        assert!(msg.is_expired(STATUS_DISMISS_AFTER));
    }
}
