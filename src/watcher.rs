//! Change notifications for the mounted hosts config.
//!
//! The kubelet mounts a ConfigMap as a set of symlinks and swaps
//! `<dir>/..data` atomically whenever the map changes. Watching the
//! directory and filtering on that one entry yields exactly one family of
//! events per update, regardless of which keys changed.

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::DnsError;

/// Name of the symlink the kubelet swaps on each ConfigMap update.
pub const KUBELET_DATA_LINK: &str = "..data";

/// Watches a config directory and emits one message per observed update.
///
/// Dropping the watcher stops the OS watch and closes the channel.
pub struct ConfigWatcher {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Start watching `dir`.
    ///
    /// Returns the watcher guard and the receiving end of the change
    /// channel. Signals coalesce: while one is pending, further updates are
    /// dropped since a reload always reads the latest content. A watch error
    /// closes the channel.
    pub fn start(dir: impl Into<PathBuf>) -> Result<(Self, mpsc::Receiver<String>), DnsError> {
        let dir = dir.into();
        let (tx, rx) = mpsc::channel(1);
        let tx = Mutex::new(Some(tx));

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !is_data_link_event(&event) {
                        return;
                    }
                    let msg = format!("config update received: {:?} {:?}", event.kind, event.paths);
                    debug!("{}", msg);
                    if let Some(tx) = tx.lock().as_ref() {
                        // Full means a signal is already pending.
                        let _ = tx.try_send(msg);
                    }
                }
                Err(e) => {
                    error!("error watching config directory: {}", e);
                    tx.lock().take();
                }
            },
            NotifyConfig::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!(dir = %dir.display(), "starting file watch");

        Ok((
            Self {
                dir,
                _watcher: watcher,
            },
            rx,
        ))
    }

    /// The watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn is_data_link_event(event: &Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(OsStr::new(KUBELET_DATA_LINK)))
}
