//! Reheat - live reload for compiled template sets.
//!
//! Watches a flat directory of template sources and keeps a shared,
//! in-place artifact current with whatever is on disk, while an arbitrary
//! number of readers keep rendering through the same handle:
//!
//! ```text
//! DirWatcher --> Coordinator --> Compile --> ArtifactStore (swap)
//!    (notify)      (loop)                        |
//!                    |                           +--> readers
//!                    +--> bounded error channel
//! ```
//!
//! # Example
//!
//! ```no_run
//! use reheat::{ArtifactStore, TemplateSet, start_auto_reload};
//!
//! # async fn demo() {
//! let store = ArtifactStore::new(TemplateSet::new());
//! let handle = start_auto_reload(store.clone(), "templates/");
//!
//! // Readers render through the store; edits on disk show up after the
//! // next change event. Keep draining the error channel - it is bounded.
//! for diag in handle.errors().try_iter() {
//!     eprintln!("reload: {diag}");
//! }
//! # }
//! ```

pub mod channel;
pub mod compiler;
pub mod coordinator;
pub mod diag;
pub mod logger;
pub mod store;
pub mod template;
pub mod watcher;

pub use channel::{DEFAULT_CAPACITY, DiagnosticSender, OverflowPolicy, diagnostic_channel};
pub use compiler::{Compile, CompileError, TemplateCompiler};
pub use coordinator::{Coordinator, ReloadHandle, start_auto_reload};
pub use diag::Diagnostic;
pub use store::ArtifactStore;
pub use template::{RenderError, Template, TemplateSet};
pub use watcher::DirWatcher;
