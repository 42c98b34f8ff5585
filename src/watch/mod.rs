// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - the [`WatchSet`] data type and the diff that moves the notifier from one
//!   watch set to the next ([`mutator`]);
//! - wiring the `notify` watcher behind the [`Notifier`] seam;
//! - forwarding raw notifier output into the async world ([`watcher`]);
//! - deciding which events are relevant at all ([`filter`]) and content
//!   hashing for the hash-based reload policy ([`hash`]).
//!
//! It does **not** know about processes or import graphs; it only turns
//! filesystem changes into [`FsEvent`]s.

pub mod filter;
pub mod hash;
pub mod mutator;
pub mod notifier;
pub mod watch_set;
pub mod watcher;

pub use filter::{ExtensionFilter, IgnoreSet, is_content_write};
pub use mutator::{
    WatchChangeRequest, WatchCommand, WatchIntent, WatchMutator, WatchSetManager, plan_changes,
};
pub use notifier::{Notifier, NotifierFactory, NotifyNotifier, RawEventSender};
pub use watch_set::WatchSet;
pub use watcher::{FsEvent, spawn_forwarder};
