//! Watch controller behavior: change coalescing, the one-time vendor
//! pass, restart, and error reporting.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lading_bundler::test_utils::{MemoryCompiler, MemoryManifests, source_path};
use lading_bundler::{
    BuildConfig, BundleOutput, Bundler, ChunkCompiler, CompileError, CompileJob,
};
use lading_dev::{Command, FileChange, WatchController, WatchEvent};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Wraps the in-memory compiler to record which entries were compiled and
/// to keep builds in flight long enough for changes to pile up.
struct InstrumentedCompiler {
    inner: MemoryCompiler,
    delay: Duration,
    calls: Arc<Mutex<Vec<String>>>,
}

impl InstrumentedCompiler {
    fn new(inner: MemoryCompiler, delay: Duration) -> (Self, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner,
                delay,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl ChunkCompiler for InstrumentedCompiler {
    async fn compile(&self, job: CompileJob) -> Result<BundleOutput, CompileError> {
        let mut ids: Vec<String> = job.entries.keys().cloned().collect();
        ids.sort();
        self.calls.lock().unwrap().extend(ids);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.compile(job).await
    }
}

fn test_config(out: &TempDir) -> BuildConfig {
    BuildConfig::new("app")
        .entry("index.js")
        .externals(["left-pad"])
        .out_dir(out.path())
}

fn base_compiler() -> MemoryCompiler {
    MemoryCompiler::new()
        .source(source_path("app", "index.js"), &["left-pad"], "exports.app = 1;")
        .external("left-pad", &[], "module.exports = pad;")
}

fn bundler(out: &TempDir, compiler: Arc<dyn ChunkCompiler>) -> Bundler {
    Bundler::with_manifests(
        test_config(out),
        compiler,
        Arc::new(MemoryManifests::default()),
    )
    .unwrap()
}

fn count<F: Fn(&WatchEvent) -> bool>(events: &[WatchEvent], pred: F) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

fn compiled(calls: &Arc<Mutex<Vec<String>>>, id: &str) -> usize {
    calls.lock().unwrap().iter().filter(|c| *c == id).count()
}

async fn drain_events(rx: &mut mpsc::Receiver<WatchEvent>) -> Vec<WatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_changes_during_rebuild_coalesce_into_one_supersede() {
    let out = TempDir::new().unwrap();
    let (compiler, calls) =
        InstrumentedCompiler::new(base_compiler(), Duration::from_millis(150));

    let (change_tx, change_rx) = mpsc::channel(16);
    let (command_tx, command_rx) = mpsc::channel(8);
    let (controller, mut events) =
        WatchController::new(bundler(&out, Arc::new(compiler)), change_rx, command_rx);
    let session = tokio::spawn(controller.run());

    // The initial build is in flight; two changes arrive mid-build
    tokio::time::sleep(Duration::from_millis(40)).await;
    change_tx.send(FileChange::modified("app/index.js")).await.unwrap();
    change_tx.send(FileChange::modified("app/index.js")).await.unwrap();

    // Initial build + vendor pass + exactly one superseding rebuild
    tokio::time::sleep(Duration::from_millis(700)).await;
    command_tx.send(Command::Stop).await.unwrap();
    session.await.unwrap().unwrap();

    let events = drain_events(&mut events).await;
    assert_eq!(count(&events, |e| matches!(e, WatchEvent::Start)), 1);
    assert_eq!(count(&events, |e| matches!(e, WatchEvent::BuildStart)), 2);
    assert_eq!(count(&events, |e| matches!(e, WatchEvent::BuildEnd)), 2);
    assert_eq!(count(&events, |e| matches!(e, WatchEvent::SessionEnd)), 1);

    // Source compiled twice, vendors exactly once across the sequence
    assert_eq!(compiled(&calls, "index"), 2);
    assert_eq!(compiled(&calls, "left-pad"), 1);

    let vendors = std::fs::read_to_string(out.path().join("vendors.js")).unwrap();
    assert!(vendors.contains("System.register(\"left-pad\""));
}

#[tokio::test]
async fn test_restart_rearms_the_vendor_pass() {
    let out = TempDir::new().unwrap();
    let (compiler, calls) = InstrumentedCompiler::new(base_compiler(), Duration::ZERO);

    let (_change_tx, change_rx) = mpsc::channel(16);
    let (command_tx, command_rx) = mpsc::channel(8);
    let (controller, mut events) =
        WatchController::new(bundler(&out, Arc::new(compiler)), change_rx, command_rx);
    let session = tokio::spawn(controller.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    command_tx.send(Command::Restart).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    command_tx.send(Command::Stop).await.unwrap();
    session.await.unwrap().unwrap();

    let events = drain_events(&mut events).await;
    assert_eq!(count(&events, |e| matches!(e, WatchEvent::Start)), 2);

    // A fresh session resolves the closure again from its baseline
    assert_eq!(compiled(&calls, "index"), 2);
    assert_eq!(compiled(&calls, "left-pad"), 2);
}

#[tokio::test]
async fn test_compile_errors_keep_the_session_alive() {
    let out = TempDir::new().unwrap();
    let broken = base_compiler().fail_on(source_path("app", "index.js"));
    let (compiler, calls) = InstrumentedCompiler::new(broken, Duration::ZERO);

    let (change_tx, change_rx) = mpsc::channel(16);
    let (command_tx, command_rx) = mpsc::channel(8);
    let (controller, mut events) =
        WatchController::new(bundler(&out, Arc::new(compiler)), change_rx, command_rx);
    let session = tokio::spawn(controller.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    // The failed session is still watching: the next change retries
    change_tx.send(FileChange::modified("app/index.js")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    command_tx.send(Command::Stop).await.unwrap();
    session.await.unwrap().unwrap();

    let events = drain_events(&mut events).await;
    assert_eq!(count(&events, |e| matches!(e, WatchEvent::Error { .. })), 2);
    assert_eq!(count(&events, |e| matches!(e, WatchEvent::BuildEnd)), 0);
    assert_eq!(count(&events, |e| matches!(e, WatchEvent::SessionEnd)), 1);

    // The vendor pass never ran: no successful source build gated it in
    assert_eq!(compiled(&calls, "left-pad"), 0);
    assert!(!out.path().join("vendors.js").exists());
}

#[tokio::test]
async fn test_stop_ends_a_quiet_session() {
    let out = TempDir::new().unwrap();
    let (compiler, _calls) = InstrumentedCompiler::new(base_compiler(), Duration::ZERO);

    let (_change_tx, change_rx) = mpsc::channel(16);
    let (command_tx, command_rx) = mpsc::channel(8);
    let (controller, mut events) =
        WatchController::new(bundler(&out, Arc::new(compiler)), change_rx, command_rx);
    let session = tokio::spawn(controller.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    command_tx.send(Command::Stop).await.unwrap();
    session.await.unwrap().unwrap();

    let events = drain_events(&mut events).await;
    assert_eq!(count(&events, |e| matches!(e, WatchEvent::BuildStart)), 1);
    assert!(matches!(events.last(), Some(WatchEvent::SessionEnd)));
}
