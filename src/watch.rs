//! Reload watcher: polls file modification times under the served root and
//! restarts the process when a known file changes.
//!
//! Deliberately blunt — no graceful hot swap. The whole process image is
//! replaced, which also re-registers every handler from scratch. The
//! watcher shares no state with the dispatch engine.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Per-file mtime record across scans.
///
/// First sight of a path records it without counting as a change; only an
/// mtime moving on a known path does. Deletions are not tracked.
#[derive(Debug, Default)]
pub struct FileTracker {
    mtimes: HashMap<PathBuf, SystemTime>,
}

impl FileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rescan `root` recursively. Returns true when any known file's mtime
    /// moved since the previous scan. Unreadable entries are skipped.
    pub fn scan(&mut self, root: &Path) -> bool {
        let mut changed = false;
        self.visit(root, &mut changed);
        changed
    }

    fn visit(&mut self, dir: &Path, changed: &mut bool) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                self.visit(&path, changed);
                continue;
            }
            let Ok(mtime) = entry.metadata().and_then(|meta| meta.modified()) else {
                continue;
            };
            match self.mtimes.insert(path, mtime) {
                Some(previous) if previous != mtime => *changed = true,
                _ => {}
            }
        }
    }
}

/// Poll `root` every `interval` and restart the process on change.
pub async fn watch(root: PathBuf, interval: Duration) {
    let mut tracker = FileTracker::new();
    tracker.scan(&root);

    loop {
        tokio::time::sleep(interval).await;
        if tracker.scan(&root) {
            tracing::info!(root = %root.display(), "change detected, restarting server");
            restart();
        }
    }
}

/// Replace the process image with a fresh copy of the current binary,
/// keeping the original arguments.
fn restart() {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;

        let exe = match std::env::current_exe() {
            Ok(exe) => exe,
            Err(error) => {
                tracing::error!(%error, "cannot locate the current executable, reload skipped");
                return;
            }
        };
        let error = std::process::Command::new(exe)
            .args(std::env::args_os().skip(1))
            .exec();
        tracing::error!(%error, "exec failed, reload skipped");
    }
    #[cfg(not(unix))]
    {
        // No execve to lean on; exiting lets a supervisor bring us back.
        std::process::exit(0);
    }
}
