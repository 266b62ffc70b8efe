//! Build configuration.
//!
//! A builder-pattern [`BuildConfig`] describing one project: where the
//! source tree lives, which entries to build, which specifiers are known
//! vendor dependencies, and the development/production switch.

use std::path::PathBuf;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::compiler::CompileSettings;

/// Development or production build.
///
/// Production minifies and inlines `"production"` as the environment
/// constant; development keeps readable output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    /// The value inlined for `process.env.NODE_ENV`.
    pub fn node_env(&self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, BuildMode::Production)
    }
}

/// Build configuration.
///
/// Use the builder methods for ergonomic construction; every field has a
/// workable default except the source root.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root of the first-party source tree.
    pub source_root: PathBuf,

    /// Output directory for all artifacts.
    pub out_dir: PathBuf,

    /// Entry patterns (literal paths or globs), relative to the source root.
    pub entries: Vec<String>,

    /// Glob patterns for lazily loaded modules, built independently of the
    /// main entry map, one output file each.
    pub lazy_modules: Vec<String>,

    /// Specifiers known to be external at the top level, typically the
    /// project's declared runtime dependencies.
    pub externals: Vec<String>,

    /// Declared dependencies that never reach the browser; subtracted from
    /// the external baseline.
    pub server_only: Vec<String>,

    /// Substring patterns that force a specifier to be inlined even though
    /// it would classify as external (e.g. `style-inject` helpers emitted
    /// by CSS tooling).
    pub inline_always: Vec<String>,

    /// Development or production code paths.
    pub mode: BuildMode,

    /// File name of the merged vendor artifact inside `out_dir`.
    pub vendor_file: String,
}

impl BuildConfig {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            out_dir: PathBuf::from("dist/public"),
            entries: vec!["index.js".to_string()],
            lazy_modules: Vec::new(),
            externals: Vec::new(),
            server_only: Vec::new(),
            inline_always: vec!["style-inject".to_string()],
            mode: BuildMode::Development,
            vendor_file: "vendors.js".to_string(),
        }
    }

    /// Replace the entry pattern list with a single pattern.
    pub fn entry(mut self, pattern: impl Into<String>) -> Self {
        self.entries = vec![pattern.into()];
        self
    }

    /// Replace the entry pattern list.
    pub fn entries<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Glob patterns for lazily loaded modules.
    pub fn lazy_modules<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lazy_modules = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Top-level external specifiers.
    pub fn externals<I, S>(mut self, specifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.externals = specifiers.into_iter().map(Into::into).collect();
        self
    }

    /// Declared dependencies excluded from the vendor baseline.
    pub fn server_only<I, S>(mut self, specifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.server_only = specifiers.into_iter().map(Into::into).collect();
        self
    }

    /// Substring patterns that are always inlined.
    pub fn inline_always<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inline_always = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    pub fn mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn vendor_file(mut self, name: impl Into<String>) -> Self {
        self.vendor_file = name.into();
        self
    }

    /// Engine settings for first-party compiles.
    pub fn compile_settings(&self) -> CompileSettings {
        CompileSettings {
            minify: self.mode.is_production(),
            node_env: self.mode.node_env().to_string(),
            sourcemap: true,
        }
    }

    /// The session's initial external set: declared externals minus the
    /// server-only list, in declaration order.
    pub fn external_baseline(&self) -> IndexSet<String> {
        self.externals
            .iter()
            .filter(|id| !self.server_only.contains(id))
            .cloned()
            .collect()
    }
}
