//! In-memory fixtures for exercising the orchestrator without a real
//! compile engine: a [`MemoryCompiler`] that fabricates SystemJS chunks
//! from a declared module table, and a [`MemoryManifests`] table standing
//! in for `package.json` lookups.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::compiler::{
    BundleOutput, Chunk, ChunkCompiler, CompileError, CompileJob, Facade,
};
use crate::manifest::{Manifest, ManifestLookup, extract_package_name};

/// A declared module: its imports and a code body.
#[derive(Debug, Clone)]
struct MemoryModule {
    imports: Vec<String>,
    body: String,
}

/// Fake engine producing deterministic SystemJS chunks.
///
/// First-party modules are keyed by source path, externals by bare
/// specifier. Imports the job's decider classifies external become
/// dependency-array entries; everything else is inlined into the chunk.
#[derive(Default)]
pub struct MemoryCompiler {
    sources: FxHashMap<String, MemoryModule>,
    externals: FxHashMap<String, MemoryModule>,
    resolved: FxHashMap<String, PathBuf>,
    failures: FxHashSet<String>,
}

impl MemoryCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a first-party module at `path`.
    pub fn source(mut self, path: impl Into<String>, imports: &[&str], body: &str) -> Self {
        self.sources.insert(
            path.into(),
            MemoryModule {
                imports: imports.iter().map(|s| s.to_string()).collect(),
                body: body.to_string(),
            },
        );
        self
    }

    /// Declare an external module under its bare specifier.
    pub fn external(mut self, specifier: impl Into<String>, imports: &[&str], body: &str) -> Self {
        self.externals.insert(
            specifier.into(),
            MemoryModule {
                imports: imports.iter().map(|s| s.to_string()).collect(),
                body: body.to_string(),
            },
        );
        self
    }

    /// Give an external a resolved installation path (affects the
    /// registration name derived for it).
    pub fn resolved_at(mut self, specifier: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.resolved.insert(specifier.into(), path.into());
        self
    }

    /// Make compiling `key` (entry id or specifier) fail.
    pub fn fail_on(mut self, key: impl Into<String>) -> Self {
        self.failures.insert(key.into());
        self
    }

    fn compile_one(&self, id: &str, target: &str, job: &CompileJob) -> Result<Chunk, CompileError> {
        if self.failures.contains(id) || self.failures.contains(target) {
            return Err(CompileError::new(format!("failed to compile '{target}'")).in_file(
                target.to_string(),
                Some(1),
            ));
        }

        let (module, facade) = if let Some(module) = self.sources.get(target) {
            (module, Facade::Entry(id.to_string()))
        } else if let Some(module) = self.externals.get(target) {
            let facade = Facade::External {
                specifier: target.to_string(),
                resolved: self.resolved.get(target).cloned(),
            };
            (module, facade)
        } else {
            return Err(CompileError::new(format!("unresolved entry '{target}'")));
        };

        let mut deps = Vec::new();
        let mut inlined = String::new();
        for import in &module.imports {
            if job.externals.is_external(import, Some(Path::new(target))) {
                deps.push(format!("\"{import}\""));
            } else if let Some(inner) = self.externals.get(import.as_str()) {
                inlined.push_str(&format!("  {}\n", inner.body));
            } else {
                inlined.push_str(&format!("  /* inlined {import} */\n"));
            }
        }

        let code = format!(
            "System.register([{deps}], function (exports) {{\n  \"use strict\";\n  var NODE_ENV = \"{env}\";\n{inlined}  {body}\n  return {{ setters: [], execute: function () {{}} }};\n}});\n",
            deps = deps.join(", "),
            env = job.settings.node_env,
            body = module.body,
        );

        Ok(Chunk {
            file_name: format!("{id}.js"),
            code,
            map: job
                .settings
                .sourcemap
                .then(|| format!("{{\"version\":3,\"file\":\"{id}.js\"}}")),
            refs: Vec::new(),
            facade,
        })
    }
}

#[async_trait]
impl ChunkCompiler for MemoryCompiler {
    async fn compile(&self, job: CompileJob) -> Result<BundleOutput, CompileError> {
        // Deterministic entry order regardless of map iteration
        let mut entries: Vec<(&String, &String)> = job.entries.iter().collect();
        entries.sort();

        let mut chunks = Vec::with_capacity(entries.len());
        for (id, target) in entries {
            chunks.push(self.compile_one(id, target, &job)?);
        }
        Ok(BundleOutput { chunks })
    }
}

/// In-memory manifest table.
#[derive(Default)]
pub struct MemoryManifests {
    packages: FxHashMap<String, Arc<Manifest>>,
    boundaries: FxHashMap<PathBuf, Arc<Manifest>>,
}

fn manifest(name: &str, dependencies: &[&str]) -> Arc<Manifest> {
    Arc::new(Manifest {
        name: Some(name.to_string()),
        dependencies: dependencies
            .iter()
            .map(|dep| (dep.to_string(), "*".to_string()))
            .collect(),
    })
}

impl MemoryManifests {
    /// Declare an installed package's manifest.
    pub fn package(mut self, name: &str, dependencies: &[&str]) -> Self {
        self.packages
            .insert(name.to_string(), manifest(name, dependencies));
        self
    }

    /// Declare a nested package boundary at `dir`.
    pub fn boundary(mut self, dir: impl Into<PathBuf>, name: &str, dependencies: &[&str]) -> Self {
        self.boundaries
            .insert(dir.into(), manifest(name, dependencies));
        self
    }
}

impl ManifestLookup for MemoryManifests {
    fn nearest(&self, dir: &Path, stop: &Path) -> Option<Arc<Manifest>> {
        let mut current = dir;
        loop {
            if !current.starts_with(stop) || current == stop {
                return None;
            }
            if let Some(found) = self.boundaries.get(current) {
                return Some(found.clone());
            }
            current = current.parent()?;
        }
    }

    fn for_package(&self, specifier: &str) -> Option<Arc<Manifest>> {
        self.packages.get(extract_package_name(specifier)).cloned()
    }
}

/// The path string the entry resolver would hand the compiler for `rel`
/// under `root`.
pub fn source_path(root: impl AsRef<Path>, rel: &str) -> String {
    root.as_ref().join(rel).to_string_lossy().into_owned()
}
