//! The build session and one-shot pipeline.
//!
//! A [`Bundler`] owns one [`BuildSession`] at a time and drives the
//! pipeline: first-party compile, vendor closure, merged vendor artifact,
//! then one independent build per lazily loaded module. Watch mode reuses
//! the same session across rebuilds and replaces it wholesale on restart.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::compiler::{ChunkCompiler, CompileJob, CompileSettings};
use crate::config::BuildConfig;
use crate::entry::{self, EntryMap};
use crate::external::{ExternalDecider, ProjectClassifier};
use crate::manifest::{FsManifests, ManifestLookup};
use crate::{Error, Result, merge, output, vendor};

/// Counts reported by a completed one-shot build.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildSummary {
    pub source_chunks: usize,
    pub vendor_registrations: usize,
    pub lazy_chunks: usize,
}

/// Per-session state: the entry map, the growing external set (owned by
/// the shared classifier), the vendor visited set, and the vendor-pass
/// flag. Discarded wholesale on restart.
pub struct BuildSession {
    entries: EntryMap,
    classifier: Arc<ProjectClassifier>,
    visited: FxHashSet<String>,
    vendor_built: bool,
}

impl BuildSession {
    fn new(config: &BuildConfig, manifests: Arc<dyn ManifestLookup>) -> Result<Self> {
        let entries = entry::resolve(&config.entries, &config.source_root)?;
        let classifier = Arc::new(ProjectClassifier::new(
            &config.source_root,
            config.external_baseline(),
            config.inline_always.clone(),
            manifests,
        ));
        Ok(Self {
            entries,
            classifier,
            visited: FxHashSet::default(),
            vendor_built: false,
        })
    }

    pub fn entries(&self) -> &EntryMap {
        &self.entries
    }

    /// Whether the one-time vendor pass has completed in this session.
    pub fn vendor_built(&self) -> bool {
        self.vendor_built
    }
}

/// Drives compiles through the engine and writes artifacts.
pub struct Bundler {
    config: BuildConfig,
    compiler: Arc<dyn ChunkCompiler>,
    manifests: Arc<dyn ManifestLookup>,
    session: BuildSession,
}

impl Bundler {
    /// Create a bundler with filesystem-backed manifest lookup rooted at
    /// the source root's parent (where `node_modules` lives).
    pub fn new(config: BuildConfig, compiler: Arc<dyn ChunkCompiler>) -> Result<Self> {
        let project_root = config
            .source_root
            .parent()
            .unwrap_or(&config.source_root)
            .to_path_buf();
        let manifests: Arc<dyn ManifestLookup> = Arc::new(FsManifests::new(project_root));
        Self::with_manifests(config, compiler, manifests)
    }

    pub fn with_manifests(
        config: BuildConfig,
        compiler: Arc<dyn ChunkCompiler>,
        manifests: Arc<dyn ManifestLookup>,
    ) -> Result<Self> {
        let session = BuildSession::new(&config, manifests.clone())?;
        Ok(Self {
            config,
            compiler,
            manifests,
            session,
        })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn session(&self) -> &BuildSession {
        &self.session
    }

    /// Discard the session and rebuild it from the configured baseline:
    /// fresh external set, fresh visited set, vendor pass armed again.
    pub fn reset(&mut self) -> Result<()> {
        self.session = BuildSession::new(&self.config, self.manifests.clone())?;
        Ok(())
    }

    /// One-shot build: source, vendors, lazily loaded modules.
    pub async fn build(&mut self) -> Result<BuildSummary> {
        let source_chunks = self.build_source().await?;
        let vendor_registrations = self.build_vendors().await?;
        let lazy_chunks = self.build_lazy_modules().await?;
        Ok(BuildSummary {
            source_chunks,
            vendor_registrations,
            lazy_chunks,
        })
    }

    /// Compile the first-party entry map and write one file per entry.
    pub async fn build_source(&mut self) -> Result<usize> {
        tracing::info!(entries = self.session.entries.len(), "building source bundle");

        let job = CompileJob {
            entries: self.session.entries.clone(),
            externals: self.session.classifier.clone(),
            settings: self.config.compile_settings(),
        };
        let bundle = self
            .compiler
            .compile(job)
            .await
            .map_err(Error::SourceCompile)?;
        output::write_bundle_to(&bundle, &self.config.out_dir)?;

        Ok(bundle.chunks.len())
    }

    /// Resolve the external closure and write the merged vendor artifact.
    ///
    /// Seeds are the session's current external set: the configured
    /// baseline plus everything the source compile discovered. On success
    /// the session's vendor flag is set; on failure it stays unset so a
    /// watch session can retry after the next change.
    pub async fn build_vendors(&mut self) -> Result<usize> {
        tracing::info!("building vendors");

        let seeds = self.session.classifier.snapshot();
        let chunks = vendor::resolve_closure(
            seeds,
            &mut self.session.visited,
            self.compiler.as_ref(),
            self.manifests.as_ref(),
            &self.config.compile_settings(),
        )
        .await?;

        let artifact = merge::merge(&chunks)?;
        let path = self.config.out_dir.join(&self.config.vendor_file);
        output::write_vendor_artifact(&artifact, &path)?;

        self.session.vendor_built = true;
        tracing::info!(registrations = chunks.len(), "finished building vendors");
        Ok(chunks.len())
    }

    /// Build every lazily loaded module independently of the main entry
    /// map, one output file each. Their classifier applies the same rules
    /// as the source build but never grows the vendor set.
    pub async fn build_lazy_modules(&mut self) -> Result<usize> {
        if self.config.lazy_modules.is_empty() {
            return Ok(0);
        }

        let lazy = entry::resolve(&self.config.lazy_modules, &self.config.source_root)?;
        let classifier: Arc<dyn ExternalDecider> = Arc::new(ProjectClassifier::non_recording(
            &self.config.source_root,
            self.config.inline_always.clone(),
            self.manifests.clone(),
        ));

        let mut written = 0;
        for (id, path) in &lazy {
            tracing::debug!(module = %id, "building lazily loaded module");
            let mut entries = EntryMap::default();
            entries.insert(id.clone(), path.clone());

            let job = CompileJob {
                entries,
                externals: classifier.clone(),
                settings: self.config.compile_settings(),
            };
            let bundle = self
                .compiler
                .compile(job)
                .await
                .map_err(Error::SourceCompile)?;
            output::write_bundle_to(&bundle, &self.config.out_dir)?;
            written += bundle.chunks.len();
        }

        Ok(written)
    }

    /// Engine settings for the current configuration.
    pub fn compile_settings(&self) -> CompileSettings {
        self.config.compile_settings()
    }
}
