//! The synchronization core.
//!
//! Filesystem changes reach the store along two paths: the [`dispatcher`]
//! applies one live event at a time, and the [`reconciler`] compares the whole
//! directory against the index. Both go through the same find-before-write
//! helpers, so the index holds at most one record per path whichever path a
//! change arrives by. [`watcher`] ties them to the OS notification stream.

pub mod dispatcher;
pub mod event;
pub mod filter;
pub mod reconciler;
pub mod watcher;

pub use dispatcher::{Dispatcher, Outcome};
pub use event::{FsEvent, RenamePairing};
pub use filter::EligibilityFilter;
pub use reconciler::{Reconciler, SyncReport};
pub use watcher::WatcherManager;
