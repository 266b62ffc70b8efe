//! The watch controller.
//!
//! A finite state machine around the bundler:
//!
//! ```text
//! Idle -> BuildingSource -> (BuildingVendor, once) -> Watching
//!           ^                                            |
//!           +--------------- on change ------------------+
//! ```
//!
//! `Stopped` is terminal and reached only through the operator. The vendor
//! pass is a transition guard on the session (it fires after the first
//! successful source build and is re-armed only by `restart`), not a flag
//! sprinkled over callbacks. Changes arriving while a rebuild is in flight
//! are coalesced into one superseding rebuild. Build failures are reported
//! and the loop keeps watching so the next change can retry.

use lading_bundler::diagnostics::Diagnostic;
use lading_bundler::{Bundler, Error};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::commands::Command;
use crate::watcher::FileChange;
use crate::DevResult;

/// Controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    BuildingSource,
    BuildingVendor,
    Watching,
    Stopped,
}

/// Lifecycle events emitted for observers (logging, dev frontends).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WatchEvent {
    /// A session is starting (also emitted after `restart`).
    Start,
    /// A source rebuild began.
    BuildStart,
    /// A source rebuild finished successfully.
    BuildEnd,
    /// The session ended; no further events follow.
    SessionEnd,
    /// A build phase failed; the session keeps watching.
    Error { diagnostic: Diagnostic },
}

/// Channel-driven rebuild coordinator.
pub struct WatchController {
    bundler: Bundler,
    changes: mpsc::Receiver<FileChange>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<WatchEvent>,
    state: WatchState,
}

impl WatchController {
    /// Wire a controller to its input channels. The returned receiver
    /// carries lifecycle events; dropping it is fine.
    pub fn new(
        bundler: Bundler,
        changes: mpsc::Receiver<FileChange>,
        commands: mpsc::Receiver<Command>,
    ) -> (Self, mpsc::Receiver<WatchEvent>) {
        let (events, event_rx) = mpsc::channel(64);
        (
            Self {
                bundler,
                changes,
                commands,
                events,
                state: WatchState::Idle,
            },
            event_rx,
        )
    }

    /// Drive the session until the operator stops it or both input
    /// channels close. Only configuration errors (entry resolution on
    /// restart) abort the loop itself.
    pub async fn run(mut self) -> DevResult<()> {
        self.start_session().await;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Restart) => {
                        tracing::info!("restarting build session");
                        self.bundler.reset()?;
                        self.start_session().await;
                    }
                    Some(Command::Stop) | None => break,
                },
                change = self.changes.recv() => match change {
                    Some(change) => {
                        tracing::debug!(path = %change.path.display(), "source change detected");
                        self.rebuild_cycle().await;
                    }
                    None => break,
                },
            }
        }

        self.emit(WatchEvent::SessionEnd);
        self.state = WatchState::Stopped;
        Ok(())
    }

    /// Current state (meaningful in tests; `run` consumes the controller).
    pub fn state(&self) -> WatchState {
        self.state
    }

    async fn start_session(&mut self) {
        self.emit(WatchEvent::Start);
        self.rebuild_cycle().await;
    }

    /// One rebuild pass, repeated while changes arrived mid-build.
    ///
    /// Draining the change channel after each build collapses any number
    /// of queued changes into a single superseding rebuild, and the next
    /// cycle's output wins over the superseded one.
    async fn rebuild_cycle(&mut self) {
        loop {
            self.drain_changes();

            self.state = WatchState::BuildingSource;
            self.emit(WatchEvent::BuildStart);

            match self.bundler.build_source().await {
                Ok(_) => {
                    self.emit(WatchEvent::BuildEnd);
                    if !self.bundler.session().vendor_built() {
                        self.state = WatchState::BuildingVendor;
                        if let Err(error) = self.bundler.build_vendors().await {
                            self.report(error);
                        }
                    }
                    if let Err(error) = self.bundler.build_lazy_modules().await {
                        self.report(error);
                    }
                }
                Err(error) => self.report(error),
            }

            self.state = WatchState::Watching;
            if self.drain_changes() == 0 {
                break;
            }
        }
    }

    /// Pull everything currently queued off the change channel.
    fn drain_changes(&mut self) -> usize {
        let mut drained = 0;
        while self.changes.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }

    fn report(&mut self, error: Error) {
        let diagnostic = Diagnostic::from_error(&error);
        tracing::error!(%diagnostic, "build failed; watching for changes");
        self.emit(WatchEvent::Error { diagnostic });
    }

    fn emit(&self, event: WatchEvent) {
        // Observers are optional; a full or closed channel drops the event
        let _ = self.events.try_send(event);
    }
}
