//! The chunk compiler capability.
//!
//! Turning one source file plus its import graph into browser-loadable
//! SystemJS code is the job of an external engine. This crate only decides
//! *what* to compile and with which externality predicate, so the engine is
//! consumed behind the [`ChunkCompiler`] trait and never implemented here.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::entry::EntryMap;
use crate::external::ExternalDecider;

/// The identity a chunk stands for.
///
/// First-party chunks carry the logical entry id they were built from.
/// Vendor chunks carry the external specifier they were compiled for, plus
/// the path the engine resolved it to (when resolution succeeded on disk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Facade {
    /// A first-party entry, identified by its logical id (e.g. `pages/home`).
    Entry(String),
    /// An external module compiled in isolation.
    External {
        specifier: String,
        resolved: Option<PathBuf>,
    },
}

impl Facade {
    /// The raw identifier, for logging.
    pub fn id(&self) -> &str {
        match self {
            Facade::Entry(id) => id,
            Facade::External { specifier, .. } => specifier,
        }
    }
}

/// One unit of compiled, loadable module code.
///
/// Chunks are immutable once generated; ownership passes to whichever
/// merger or writer consumes them.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Generated file name, relative to the output directory.
    pub file_name: String,
    /// Generated SystemJS module-registration code.
    pub code: String,
    /// Source map JSON, when the compile settings asked for one.
    pub map: Option<String>,
    /// Generated file names of sibling chunks this chunk references.
    pub refs: Vec<String>,
    /// The identity this chunk registers under.
    pub facade: Facade,
}

/// Everything a single compile invocation produces.
#[derive(Debug, Clone, Default)]
pub struct BundleOutput {
    pub chunks: Vec<Chunk>,
}

/// Knobs forwarded to the engine, derived from [`BuildConfig`](crate::BuildConfig).
#[derive(Debug, Clone)]
pub struct CompileSettings {
    /// Minify generated code (production builds).
    pub minify: bool,
    /// Value inlined for the `process.env.NODE_ENV` constant.
    pub node_env: String,
    /// Emit a source map per chunk. Vendor compiles never do.
    pub sourcemap: bool,
}

/// One compile invocation: an entry map plus the predicate deciding which
/// imports stay out of the produced chunks.
pub struct CompileJob {
    pub entries: EntryMap,
    pub externals: Arc<dyn ExternalDecider>,
    pub settings: CompileSettings,
}

/// Failure reported by the engine for a single compile invocation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn in_file(mut self, file: impl Into<String>, line: Option<u32>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self
    }
}

/// The compile engine capability.
///
/// Implementations resolve each entry (a path for first-party code, a bare
/// specifier for externals), transform the reachable module graph, leave
/// out every import the job's [`ExternalDecider`] classifies as external,
/// and emit one or more SystemJS chunks.
#[async_trait]
pub trait ChunkCompiler: Send + Sync {
    async fn compile(&self, job: CompileJob) -> Result<BundleOutput, CompileError>;
}
