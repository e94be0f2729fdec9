//! Rebuild notifications.

use std::path::PathBuf;

use crate::websocket::{ReloadHub, ReloadMessage};

/// Told about every successful rebuild.
pub trait Notifier: Send + Sync {
    /// `changed` are the source paths that triggered the rebuild.
    fn reload(&self, changed: &[PathBuf]);
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn reload(&self, _changed: &[PathBuf]) {}
}

/// Reloads every connected browser.
#[derive(Debug, Clone)]
pub struct LiveNotifier {
    hub: ReloadHub,
}

impl LiveNotifier {
    pub fn new(hub: ReloadHub) -> Self {
        Self { hub }
    }
}

impl Notifier for LiveNotifier {
    fn reload(&self, changed: &[PathBuf]) {
        tracing::debug!(
            "Reloading {} client(s) after {} change(s)",
            self.hub.subscriber_count(),
            changed.len()
        );
        self.hub.send(ReloadMessage::Reload);
    }
}
