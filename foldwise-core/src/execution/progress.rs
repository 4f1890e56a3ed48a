//! Progress notifications.

/// Receives human-readable status messages while folds run.
///
/// Notifications are observational only; implementations must not block.
pub trait StatusSink: Send + Sync {
    fn show_status(&self, message: &str);
}

impl<F> StatusSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn show_status(&self, message: &str) {
        self(message)
    }
}

/// Forwards status messages to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn show_status(&self, message: &str) {
        tracing::info!(target: "foldwise::status", "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            move |msg: &str| seen.lock().unwrap().push(msg.to_string())
        };
        sink.show_status("fold 0");
        LogStatusSink.show_status("ignored");
        assert_eq!(*seen.lock().unwrap(), vec!["fold 0".to_string()]);
    }
}
