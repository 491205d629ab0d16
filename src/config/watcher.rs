//! Configuration file watcher for hot reload.
//!
//! Only changes that parse and validate are forwarded; a broken edit is
//! logged and the running configuration stays in place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::EdgeConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Watches one TOML file and sends every valid revision of it.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<EdgeConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for reloaded configs.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<EdgeConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Re-read the file and forward it when valid.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let config = load_config(&self.path)?;
        tracing::info!(
            path = %self.path.display(),
            domain = %config.site.domain_name,
            "Config file reloaded"
        );
        // Receiver gone means the server has stopped.
        let _ = self.update_tx.send(config);
        Ok(())
    }

    /// Start watching in notify's background thread.
    ///
    /// The returned watcher must be kept alive for events to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                    if let Err(e) = self.reload() {
                        tracing::error!(
                            path = %self.path.display(),
                            error = %e,
                            "Rejected config change, keeping current configuration"
                        );
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("static-edge-{}-{name}.toml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_reload_forwards_valid_config() {
        let path = temp_config("valid", "[site]\ndomain_name = \"blog.example.org\"\n");
        let (watcher, mut rx) = ConfigWatcher::new(&path);

        watcher.reload().unwrap();
        let config = rx.try_recv().unwrap();
        assert_eq!(config.site.domain_name, "blog.example.org");
    }

    #[test]
    fn test_reload_rejects_invalid_config() {
        let path = temp_config("invalid", "[origin]\nurl = \"ftp://bucket\"\n");
        let (watcher, mut rx) = ConfigWatcher::new(&path);

        assert!(matches!(watcher.reload(), Err(ConfigError::Validation(_))));
        assert!(rx.try_recv().is_err());
    }
}
