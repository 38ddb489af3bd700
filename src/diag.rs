//! Diagnostic taxonomy for the reload loop.
//!
//! Every failure inside the loop is captured locally and converted into a
//! [`Diagnostic`] on the error channel; none escape as panics or early
//! returns across the coordinator boundary. The host process decides what
//! is user-visible by draining the channel.

use thiserror::Error;

use crate::compiler::CompileError;

/// One failure occurrence inside the reload loop
#[derive(Debug, Error)]
pub enum Diagnostic {
    /// Watcher construction or directory registration failed.
    /// Fatal: the watch loop never starts, and no retry is attempted.
    #[error("watch setup failed")]
    Setup(#[source] notify::Error),

    /// The notifier reported an internal error (OS-level watch failure).
    /// Non-fatal: the loop keeps watching.
    #[error("notifier error")]
    Notifier(#[source] notify::Error),

    /// Recompilation failed. Non-fatal: the previous artifact stays live
    /// and the next change event is the next attempt.
    #[error("recompile failed")]
    Compile(#[source] CompileError),

    /// The event stream closed or shutdown was requested.
    /// Fatal for this coordinator instance; nothing is pushed after it.
    #[error("reload coordinator shutting down")]
    ShuttingDown,
}

impl Diagnostic {
    /// Whether this diagnostic means the watch loop is gone.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Setup(_) | Self::ShuttingDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_fatality() {
        assert!(Diagnostic::ShuttingDown.is_fatal());
        assert!(!Diagnostic::Compile(CompileError::Parse {
            path: PathBuf::from("a.tmpl"),
            line: 1,
            message: "bad".to_string(),
        })
        .is_fatal());
    }

    #[test]
    fn test_compile_diagnostic_carries_source() {
        use std::error::Error;

        let diag = Diagnostic::Compile(CompileError::Parse {
            path: PathBuf::from("a.tmpl"),
            line: 1,
            message: "unclosed `{{` slot".to_string(),
        });
        let source = diag.source().expect("source error");
        assert!(source.to_string().contains("a.tmpl"));
    }
}
