//! Reload coordinator - links change detection to recompilation and publish.
//!
//! # Architecture
//!
//! ```text
//! DirWatcher --> Coordinator --> Compile --> ArtifactStore (swap)
//!    (notify)      (loop)         (full         |
//!                    |            recompile)    +--> readers
//!                    +--> DiagnosticSender (bounded error channel)
//! ```
//!
//! One background task per watched directory, alive until the notifier's
//! stream closes or shutdown is requested. Every failure inside the loop
//! becomes a [`Diagnostic`] on the error channel; a bad compile never
//! terminates the loop, and there is no retry logic - the next change event
//! is the next attempt.

use std::path::{Path, PathBuf};

use crossbeam::channel::Receiver;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::{DEFAULT_CAPACITY, DiagnosticSender, OverflowPolicy, diagnostic_channel};
use crate::compiler::{Compile, TemplateCompiler};
use crate::diag::Diagnostic;
use crate::store::ArtifactStore;
use crate::template::TemplateSet;
use crate::watcher::DirWatcher;

/// Builder for a reload coordinator.
///
/// The coordinator is a thin loop: it owns the watcher and the compiler,
/// and publishes through the store and the error channel. It holds no
/// business logic of its own.
pub struct Coordinator<C: Compile> {
    store: ArtifactStore<C::Artifact>,
    dir: PathBuf,
    compiler: C,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<C> Coordinator<C>
where
    C: Compile + Send + 'static,
    C::Artifact: Send + Sync + 'static,
{
    /// Watch `dir`, recompiling into `store` with `compiler`.
    pub fn new(store: ArtifactStore<C::Artifact>, dir: impl Into<PathBuf>, compiler: C) -> Self {
        Self {
            store,
            dir: dir.into(),
            compiler,
            capacity: DEFAULT_CAPACITY,
            policy: OverflowPolicy::default(),
        }
    }

    /// Set the error channel capacity (default 5, clamped to at least 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the error channel overflow policy (default [`OverflowPolicy::Block`]).
    pub fn with_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start the watch loop as a background task.
    ///
    /// Must be called inside a tokio runtime. Watcher construction happens
    /// up front: on failure exactly one [`Diagnostic::Setup`] is pushed, the
    /// loop never starts, and the returned handle's task is already
    /// finished. This is terminal - setup is never retried.
    ///
    /// The caller must keep draining [`ReloadHandle::errors`]: the channel
    /// is bounded, and under the `Block` policy a full channel stalls the
    /// loop on its next push.
    pub fn spawn(self) -> ReloadHandle {
        let (diag, errors) = diagnostic_channel(self.capacity, self.policy);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = match DirWatcher::new(&self.dir) {
            Ok(watcher) => tokio::spawn(run(
                watcher,
                self.store,
                self.dir,
                self.compiler,
                diag,
                shutdown_rx,
            )),
            Err(e) => {
                crate::debug!("watch"; "setup failed for {}: {}", self.dir.display(), e);
                diag.push(Diagnostic::Setup(e));
                tokio::spawn(async {})
            }
        };

        ReloadHandle {
            errors,
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Run the loop over a prebuilt watcher (tests drive synthetic streams).
    #[cfg(test)]
    fn spawn_with_watcher(self, watcher: DirWatcher) -> ReloadHandle {
        let (diag, errors) = diagnostic_channel(self.capacity, self.policy);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(run(
            watcher,
            self.store,
            self.dir,
            self.compiler,
            diag,
            shutdown_rx,
        ));
        ReloadHandle {
            errors,
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running reload coordinator.
pub struct ReloadHandle {
    errors: Receiver<Diagnostic>,
    shutdown: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ReloadHandle {
    /// Consumer side of the error channel. `try_recv`/`try_iter` is the
    /// recommended non-blocking drain.
    pub fn errors(&self) -> &Receiver<Diagnostic> {
        &self.errors
    }

    /// Request an orderly stop. The loop pushes one final
    /// [`Diagnostic::ShuttingDown`] and exits; idempotent.
    pub fn shutdown(&self) {
        let _ = self.shutdown.try_send(());
    }

    /// Whether the watch loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit, returning the drained error receiver.
    pub async fn join(self) -> Receiver<Diagnostic> {
        let _ = self.task.await;
        self.errors
    }
}

/// The watch loop: WATCHING ⇄ COMPILING until the stream closes.
async fn run<C: Compile>(
    mut watcher: DirWatcher,
    store: ArtifactStore<C::Artifact>,
    dir: PathBuf,
    compiler: C,
    diag: DiagnosticSender,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                crate::debug!("watch"; "shutdown requested: {}", dir.display());
                diag.push(Diagnostic::ShuttingDown);
                break;
            }
            msg = watcher.recv() => {
                match msg {
                    None => {
                        crate::debug!("watch"; "event stream closed: {}", dir.display());
                        diag.push(Diagnostic::ShuttingDown);
                        break;
                    }
                    Some(Err(e)) => {
                        crate::debug!("watch"; "notifier error: {}", e);
                        diag.push(Diagnostic::Notifier(e));
                    }
                    Some(Ok(event)) => {
                        crate::debug!("watch"; "{:?}: {:?}", event.kind, event.paths);
                        recompile(&dir, &compiler, &store, &diag);
                    }
                }
            }
        }
    }
    // `watcher` dropped here: the OS watch is released on every exit path
}

/// Full recompile of the directory, then a guarded swap.
///
/// The compile runs outside any lock; the exclusive section covers only the
/// overwrite, so readers are never blocked behind a slow compile. On
/// failure the store is left untouched and the previous artifact stays
/// live.
fn recompile<C: Compile>(
    dir: &Path,
    compiler: &C,
    store: &ArtifactStore<C::Artifact>,
    diag: &DiagnosticSender,
) {
    match compiler.compile(dir) {
        Ok(artifact) => {
            store.swap(artifact);
            crate::debug!("reload"; "swapped new artifact for {}", dir.display());
        }
        Err(e) => {
            crate::debug!("watch"; "recompile failed: {}", e);
            diag.push(Diagnostic::Compile(e));
        }
    }
}

/// Watch `dir` and keep `store` current with its compiled template set.
///
/// Convenience wrapper over [`Coordinator`] with the built-in
/// [`TemplateCompiler`] and default channel settings. Must be called inside
/// a tokio runtime; the caller must keep draining the handle's error
/// channel.
pub fn start_auto_reload(
    store: ArtifactStore<TemplateSet>,
    dir: impl Into<PathBuf>,
) -> ReloadHandle {
    Coordinator::new(store, dir, TemplateCompiler).spawn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::compiler::CompileError;

    /// Counts invocations; artifact is the invocation number.
    struct CountingCompiler(AtomicU32);

    impl Compile for CountingCompiler {
        type Artifact = u32;

        fn compile(&self, _dir: &Path) -> Result<u32, CompileError> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_setup_failure_is_one_diagnostic_and_no_loop() {
        let store = ArtifactStore::new(0u32);
        let handle = Coordinator::new(
            store,
            "/nonexistent/reheat-coordinator",
            CountingCompiler(AtomicU32::new(0)),
        )
        .spawn();

        let errors = handle.join().await;
        let diags: Vec<_> = errors.try_iter().collect();
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0], Diagnostic::Setup(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_pushes_exactly_one_shutting_down() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(0u32);
        let handle = Coordinator::new(store, dir.path(), CountingCompiler(AtomicU32::new(0)))
            .spawn();

        handle.shutdown();
        handle.shutdown(); // idempotent

        let errors = handle.join().await;
        let diags: Vec<_> = errors.try_iter().collect();
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0], Diagnostic::ShuttingDown));
        assert!(errors.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_notifier_error_is_non_fatal() {
        use notify::event::{DataChange, ModifyKind};
        use notify::{Event, EventKind};

        let dir = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(0u32);
        let (events_tx, events_rx) = mpsc::channel(8);

        let handle = Coordinator::new(
            store.clone(),
            dir.path(),
            CountingCompiler(AtomicU32::new(0)),
        )
        .spawn_with_watcher(DirWatcher::from_stream(dir.path(), events_rx));

        events_tx
            .send(Err(notify::Error::generic("watch backend hiccup")))
            .await
            .unwrap();
        // The loop must survive the error and still process this event
        let event = Event {
            kind: EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            paths: vec![dir.path().join("a.tmpl")],
            attrs: Default::default(),
        };
        events_tx.send(Ok(event)).await.unwrap();
        drop(events_tx); // close the stream

        let errors = handle.join().await;
        assert_eq!(*store.read(), 1, "compile did not run after notifier error");

        let diags: Vec<_> = errors.try_iter().collect();
        assert_eq!(diags.len(), 2);
        assert!(matches!(diags[0], Diagnostic::Notifier(_)));
        assert!(matches!(diags[1], Diagnostic::ShuttingDown));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_builder_settings() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(0u32);
        let handle = Coordinator::new(store, dir.path(), CountingCompiler(AtomicU32::new(0)))
            .with_capacity(2)
            .with_overflow(OverflowPolicy::DropOldest)
            .spawn();

        assert!(!handle.is_finished());
        handle.shutdown();
        handle.join().await;
    }
}
