//! Change notifier - a single-directory wrapper over `notify`.
//!
//! ```text
//! notify callback → std mpsc → bridge thread → bounded tokio mpsc
//! ```
//!
//! The callback side is synchronous, so events cross into async land through
//! a bridge thread. Change events and notifier-internal errors arrive as
//! the `Ok`/`Err` arms of one stream; the stream closing means the watch is
//! permanently gone. Dropping a [`DirWatcher`] releases the OS watch, which
//! makes release automatic on every exit path out of the reload loop.

use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::template::is_temp_file;

/// Bridge channel depth: events buffer here while a recompile is running
const EVENT_BUFFER: usize = 64;

/// Watches one flat directory for content changes.
pub struct DirWatcher {
    /// Watcher handle (must be kept alive for events to flow).
    /// `None` only for synthetic streams built by [`DirWatcher::from_stream`].
    _watcher: Option<RecommendedWatcher>,
    events: mpsc::Receiver<notify::Result<Event>>,
    dir: PathBuf,
}

impl DirWatcher {
    /// Register a non-recursive watch on `dir`.
    ///
    /// Construction or registration failure here is the caller's setup
    /// error; there is no retry.
    pub fn new(dir: &Path) -> notify::Result<Self> {
        // Sync channel for notify (its callback can't be async)
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        let (async_tx, async_rx) = mpsc::channel(EVENT_BUFFER);

        // Pump sync → async; exits when the watcher (and with it the notify
        // sender) is dropped, or when the receiver side is gone.
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                let forward = match result {
                    Ok(event) if !is_change(&event) => continue,
                    other => other,
                };
                if async_tx.blocking_send(forward).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            _watcher: Some(watcher),
            events: async_rx,
            dir: dir.to_path_buf(),
        })
    }

    /// A watcher over a prebuilt event stream, with no OS watch behind it.
    ///
    /// Lets tests drive the reload loop with synthetic events and
    /// notifier errors; the stream closes when the sender is dropped.
    #[cfg(test)]
    pub(crate) fn from_stream(dir: &Path, events: mpsc::Receiver<notify::Result<Event>>) -> Self {
        Self {
            _watcher: None,
            events,
            dir: dir.to_path_buf(),
        }
    }

    /// Next change event or notifier-internal error.
    ///
    /// `None` means the stream has closed and no more events will ever
    /// arrive.
    pub async fn recv(&mut self) -> Option<notify::Result<Event>> {
        self.events.recv().await
    }

    /// The watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Is this event an actual content change?
///
/// Access and metadata-only modifications are not changes (mtime/chmod
/// noise would otherwise trigger rebuild loops), and events touching only
/// editor temp/backup files are dropped. The payload is not interpreted
/// beyond this: whatever changed, the whole directory gets recompiled.
fn is_change(event: &Event) -> bool {
    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => {}
        EventKind::Modify(ModifyKind::Metadata(_)) => return false,
        EventKind::Modify(_) => {}
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return false,
    }

    !event.paths.iter().all(|p| is_temp_file(p))
}
