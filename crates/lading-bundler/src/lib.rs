//! # lading-bundler
//!
//! SystemJS bundle orchestration over a pluggable chunk compiler.
//!
//! This crate packages a modular application's source tree into a set of
//! browser-loadable SystemJS module chunks, splitting first-party code from
//! third-party ("vendor") dependencies. The single-file transform and
//! module-graph engine is *not* implemented here: it is consumed behind the
//! [`ChunkCompiler`] capability trait, and this crate decides what gets
//! compiled, with which externality predicate, and how the resulting chunks
//! are merged and written.
//!
//! ## Quick start
//!
//! ```no_run
//! use lading_bundler::{BuildConfig, BuildMode, Bundler};
//! # use std::sync::Arc;
//! # async fn example(compiler: Arc<dyn lading_bundler::ChunkCompiler>) -> lading_bundler::Result<()> {
//! let config = BuildConfig::new("app")
//!     .entry("index.js")
//!     .lazy_modules(["pages/**/*.js"])
//!     .externals(["react", "react-dom"])
//!     .out_dir("dist/public")
//!     .mode(BuildMode::Production);
//!
//! let mut bundler = Bundler::new(config, compiler)?;
//! let summary = bundler.build().await?;
//! println!("wrote {} vendor registrations", summary.vendor_registrations);
//! # Ok(()) }
//! ```

pub mod bundle;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod entry;
pub mod external;
pub mod manifest;
pub mod merge;
pub mod output;
pub mod vendor;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "logging")]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

// In-memory fixtures (test builds, or the "test-utils" feature for consumers)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bundle::{BuildSession, BuildSummary, Bundler};
pub use compiler::{
    BundleOutput, Chunk, ChunkCompiler, CompileError, CompileJob, CompileSettings, Facade,
};
pub use config::{BuildConfig, BuildMode};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use entry::EntryMap;
pub use external::{ExternalDecider, ProjectClassifier, VendorClassifier};
pub use manifest::{FsManifests, Manifest, ManifestLookup, extract_package_name};

/// Error types for bundling operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An entry pattern does not name a compilable source file.
    #[error("invalid entry pattern '{pattern}': expected a .js source file")]
    InvalidEntry { pattern: String },

    /// Two entry patterns resolved to the same logical module id.
    #[error("duplicate entry id '{id}'")]
    DuplicateEntry { id: String },

    /// The first-party source compile failed.
    #[error("source compile failed: {0}")]
    SourceCompile(#[source] CompileError),

    /// A single external module failed to compile; the whole vendor
    /// closure is discarded.
    #[error("vendor module '{module_id}' failed to compile: {source}")]
    VendorCompile {
        module_id: String,
        #[source]
        source: CompileError,
    },

    /// Two chunks with distinct facades derived the same registration name.
    #[error("registration name collision: '{name}'")]
    RegistrationCollision { name: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),

    /// File write operation failed.
    #[error("write failure: {0}")]
    WriteFailure(String),
}

/// Result type alias for bundling operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error is a configuration mistake that should abort
    /// before any compile starts. Everything else is fatal only to the
    /// build phase it occurred in.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::InvalidEntry { .. } | Error::DuplicateEntry { .. }
        )
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::InvalidEntry { .. } => "INVALID_ENTRY",
            Error::DuplicateEntry { .. } => "DUPLICATE_ENTRY",
            Error::SourceCompile(_) => "SOURCE_COMPILE",
            Error::VendorCompile { .. } => "VENDOR_COMPILE",
            Error::RegistrationCollision { .. } => "REGISTRATION_COLLISION",
            Error::Io(_) => "IO_ERROR",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::WriteFailure(_) => "WRITE_FAILURE",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::InvalidEntry { pattern } => Some(Box::new(format!(
                "Entry patterns must end in '.js'. Got: '{pattern}'"
            ))),
            Error::DuplicateEntry { id } => Some(Box::new(format!(
                "Two entry patterns resolve to the logical id '{id}'. Rename one of the files or narrow the glob."
            ))),
            Error::VendorCompile { module_id, .. } => Some(Box::new(format!(
                "The vendor bundle was not written. Check that '{module_id}' is installed and browser-compatible."
            ))),
            Error::RegistrationCollision { name } => Some(Box::new(format!(
                "Two external modules would register as '{name}' in the merged vendor artifact."
            ))),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{path}' escapes the output directory."
            ))),
            _ => None,
        }
    }
}
