//! # lading-dev
//!
//! The development loop around [`lading_bundler`]: a file watcher, a
//! rebuild controller with a one-time vendor pass, and an operator command
//! loop (`restart` / `stop`).
//!
//! The controller is channel-driven, so the pieces compose: `notify` feeds
//! the change channel in real use, tests feed it directly.

pub mod commands;
pub mod controller;
pub mod watcher;

pub use commands::{Command, command_loop};
pub use controller::{WatchController, WatchEvent, WatchState};
pub use watcher::{ChangeKind, FileChange, FileWatcher, default_ignore_patterns};

use std::path::PathBuf;
use std::sync::Arc;

use lading_bundler::{BuildConfig, Bundler, ChunkCompiler};
use tokio::sync::mpsc;

/// Error types for the development loop.
#[derive(Debug, thiserror::Error)]
pub enum DevError {
    /// The configured source root does not exist.
    #[error("source root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// File watching errors.
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// I/O errors (operator input).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the bundler that are fatal to the loop itself
    /// (configuration mistakes on restart).
    #[error("bundler error: {0}")]
    Bundler(#[from] lading_bundler::Error),
}

/// Result type alias for development-loop operations.
pub type DevResult<T> = std::result::Result<T, DevError>;

/// Run the interactive development session: watch the source root, rebuild
/// on change, accept `restart` / `stop` on stdin, and log lifecycle events.
///
/// Returns when the operator stops the session (or input/watcher close).
pub async fn run_dev(config: BuildConfig, compiler: Arc<dyn ChunkCompiler>) -> DevResult<()> {
    let source_root = config.source_root.clone();
    let bundler = Bundler::new(config, compiler)?;

    let (watcher, changes) =
        FileWatcher::new(source_root, default_ignore_patterns(), 150)?;

    let (command_tx, command_rx) = mpsc::channel(8);
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let command_task = tokio::spawn(command_loop(input, command_tx));

    let (controller, mut events) = WatchController::new(bundler, changes, command_rx);
    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                WatchEvent::Start => tracing::info!("watch session (re)starting"),
                WatchEvent::BuildStart => tracing::info!("building an individual bundle"),
                WatchEvent::BuildEnd => tracing::info!("finished building a bundle"),
                WatchEvent::SessionEnd => tracing::info!("finished watching"),
                WatchEvent::Error { diagnostic } => tracing::error!(%diagnostic, "build error"),
            }
        }
    });

    let result = controller.run().await;

    // Release the watcher and the input listener
    drop(watcher);
    command_task.abort();
    event_task.abort();

    result
}
