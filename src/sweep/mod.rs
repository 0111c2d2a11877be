//! Temp directory housekeeping
//!
//! Provides:
//! - Periodic background sweep of aged files
//! - One-shot sweeps for startup and shutdown cleanup

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Files removed
    pub removed: usize,
    /// Files that could not be inspected or removed
    pub errors: usize,
}

/// Background task deleting aged files from one directory.
///
/// `stop()` signals the task and waits for it to finish, so no sweep is left
/// mid-pass at shutdown. An interval of zero disables the periodic task
/// entirely; one-shot sweeps stay available either way.
#[derive(Debug)]
pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    /// Spawn the periodic sweep over `dir`
    pub fn start(dir: PathBuf, interval: Duration, max_age: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = if interval.is_zero() {
            info!("temp sweep disabled by configuration");
            None
        } else {
            Some(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            let stats = sweep_once(&dir, max_age);
                            if stats.removed > 0 || stats.errors > 0 {
                                info!(
                                    "temp sweep removed {} file(s), {} error(s)",
                                    stats.removed, stats.errors
                                );
                            }
                        }
                        _ = shutdown_rx.changed() => {
                            debug!("temp sweep task stopping");
                            break;
                        }
                    }
                }
            }))
        };

        Self {
            shutdown_tx,
            handle: Mutex::new(handle),
        }
    }

    /// Signal the task and wait for it to finish. Safe to call twice.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("temp sweep task ended abnormally: {}", e);
            }
        }
    }
}

/// Remove regular files in `dir` whose mtime age is at least `max_age`.
///
/// A missing directory is a no-op. Subdirectories are left alone.
pub fn sweep_once(dir: &Path, max_age: Duration) -> SweepStats {
    let mut stats = SweepStats::default();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("temp sweep skipped, cannot read {}: {}", dir.display(), e);
            return stats;
        }
    };

    let now = SystemTime::now();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => {
                stats.errors += 1;
                continue;
            }
        };

        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("cannot stat {}: {}", path.display(), e);
                stats.errors += 1;
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok())
            .unwrap_or(Duration::ZERO);
        if age < max_age {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("swept {}", path.display());
                stats.removed += 1;
            }
            Err(e) => {
                warn!("cannot remove {}: {}", path.display(), e);
                stats.errors += 1;
            }
        }
    }

    stats
}
