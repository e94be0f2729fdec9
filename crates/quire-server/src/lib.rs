//! Development server for quire sites.
//!
//! Serves the built output, watches the project tree and tells connected
//! browsers to reload after a rebuild.

pub mod notifier;
pub mod server;
pub mod watcher;
pub mod websocket;

pub use notifier::{LiveNotifier, NoopNotifier, Notifier};
pub use server::{inject_reload_script, DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent, WatchPaths};
pub use websocket::{ReloadHub, ReloadMessage, RELOAD_CLIENT_SCRIPT};
