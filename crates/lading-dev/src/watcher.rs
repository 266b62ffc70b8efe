//! File system watcher with debouncing.
//!
//! Watches the source root recursively and forwards relevant changes into
//! a channel. Dependency directories, build artifacts, and hidden files
//! are filtered out before they reach the rebuild controller.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::{DevError, DevResult};

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// One relevant file system change.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Modified,
        }
    }
}

/// Patterns filtered out by default: installed dependencies, build output,
/// and editor artifacts.
pub fn default_ignore_patterns() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        "dist".to_string(),
        "*.map".to_string(),
        "*.tmp".to_string(),
    ]
}

/// Recursive watcher feeding a change channel.
///
/// Rapid successive events for the same file inside the debounce window
/// are dropped here; cross-file coalescing is the controller's job.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(
        root: PathBuf,
        ignore_patterns: Vec<String>,
        debounce_ms: u64,
    ) -> DevResult<(Self, mpsc::Receiver<FileChange>)> {
        if !root.exists() {
            return Err(DevError::RootNotFound(root));
        }

        let (tx, rx) = mpsc::channel(128);
        let debounce = Duration::from_millis(debounce_ms);
        let filter_root = root.clone();
        let mut last_event: Option<(PathBuf, Instant)> = None;

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            let kind = match event.kind {
                EventKind::Create(_) => ChangeKind::Created,
                EventKind::Modify(_) => ChangeKind::Modified,
                EventKind::Remove(_) => ChangeKind::Removed,
                _ => return,
            };

            for path in event.paths {
                if should_ignore(&path, &filter_root, &ignore_patterns) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if *last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let _ = tx.blocking_send(FileChange { path, kind });
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Paths outside the root, hidden files, and pattern matches are ignored.
fn should_ignore(path: &Path, root: &Path, patterns: &[String]) -> bool {
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel,
        Err(_) => return true,
    };
    let rel_str = rel.to_string_lossy();

    for pattern in patterns {
        if let Some(suffix) = pattern.strip_prefix('*') {
            if rel_str.ends_with(suffix) {
                return true;
            }
        } else if rel_str.starts_with(pattern.as_str())
            || rel_str.contains(&format!("/{pattern}"))
        {
            return true;
        }
    }

    rel.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignores_dependency_directories() {
        let root = Path::new("/proj/src");
        let patterns = default_ignore_patterns();

        assert!(should_ignore(
            Path::new("/proj/src/node_modules/left-pad/index.js"),
            root,
            &patterns
        ));
        assert!(!should_ignore(
            Path::new("/proj/src/pages/home.js"),
            root,
            &patterns
        ));
    }

    #[test]
    fn test_ignores_extension_patterns() {
        let root = Path::new("/proj/src");
        let patterns = default_ignore_patterns();

        assert!(should_ignore(
            Path::new("/proj/src/index.js.map"),
            root,
            &patterns
        ));
    }

    #[test]
    fn test_ignores_hidden_and_outside_paths() {
        let root = Path::new("/proj/src");
        let patterns: Vec<String> = Vec::new();

        assert!(should_ignore(Path::new("/proj/src/.cache/x.js"), root, &patterns));
        assert!(should_ignore(Path::new("/elsewhere/x.js"), root, &patterns));
        assert!(!should_ignore(Path::new("/proj/src/x.js"), root, &patterns));
    }
}
