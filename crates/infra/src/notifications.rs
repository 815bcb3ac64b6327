//! Notification collaborator (e.g. mail transport).

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("notification transport failed: {0}")]
    Transport(String),
}

/// Outbound notification transport.
///
/// Calls are blocking; timeouts and retries belong to the implementation.
pub trait Notifier: Send + Sync {
    fn send(&self, to: &str, subject: &str) -> Result<(), NotificationError>;
}

impl<N> Notifier for Arc<N>
where
    N: Notifier + ?Sized,
{
    fn send(&self, to: &str, subject: &str) -> Result<(), NotificationError> {
        (**self).send(to, subject)
    }
}

/// Notifier that only writes a log line. Default for dev setups.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, to: &str, subject: &str) -> Result<(), NotificationError> {
        tracing::info!(to, subject, "notification sent");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn log_notifier_always_succeeds() {
        assert!(LogNotifier.send("stock@made.com", "hello").is_ok());
    }

    #[test]
    fn shared_notifier_forwards_through_arc() {
        let recorder = Arc::new(RecordingNotifier::default());
        let shared: Arc<dyn Notifier> = recorder.clone();

        shared.send("a@b.c", "subject").unwrap();

        assert_eq!(recorder.sent(), vec![("a@b.c".to_string(), "subject".to_string())]);
    }
}
