//! Error-notification collaborator.

use tracing::error;

/// Surfaces action failures to the user. How they are rendered is up to the
/// host application.
pub trait ErrorNotifier: Send + Sync {
    fn show_error(&self, message: &str);
}

/// Writes failures to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorNotifier;

impl ErrorNotifier for LogErrorNotifier {
    fn show_error(&self, message: &str) {
        error!(message = message, "Action failed");
    }
}

impl<F> ErrorNotifier for F
where
    F: Fn(&str) + Send + Sync,
{
    fn show_error(&self, message: &str) {
        self(message)
    }
}
