use log::{error, info};

/// User-facing feedback for transition outcomes (toasts in a UI client,
/// log lines on the server).
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default notifier that forwards everything to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, message: &str) {
        info!("{message}");
    }

    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }
}
