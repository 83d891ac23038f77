//! Transient user notifications emitted while a run progresses.

use std::fmt;

/// One status message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A pipeline step started.
    Progress(String),
    /// An optional step failed; the run continues.
    Warning(String),
    /// The run finished successfully.
    Done(String),
    /// The run aborted.
    Failed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress(message) => write!(f, "… {message}"),
            Self::Warning(message) => write!(f, "⚠ {message}"),
            Self::Done(message) => write!(f, "✓ {message}"),
            Self::Failed(message) => write!(f, "✗ {message}"),
        }
    }
}

/// Sink for [`Notice`]s; the host decides how to surface them.
pub trait Notifier: Send + Sync {
    /// Show `notice` to the user.
    fn notify(&self, notice: Notice);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::Warning(_) => tracing::warn!(notice = %notice, "Notification"),
            Notice::Failed(_) => tracing::error!(notice = %notice, "Notification"),
            Notice::Progress(_) | Notice::Done(_) => {
                tracing::info!(notice = %notice, "Notification")
            }
        }
    }
}

/// Notifier that prints to stderr, used by the command-line surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("{notice}");
    }
}
