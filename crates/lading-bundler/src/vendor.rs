//! Vendor closure resolution.
//!
//! Compiles every external module in isolation and walks the transitive
//! dependencies its manifest declares, guaranteeing each external id is
//! compiled at most once per build session. The walk is an explicit
//! worklist over a visited set, so a cycle among externals terminates and
//! depth is bounded by the number of distinct ids rather than graph depth.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::compiler::{Chunk, ChunkCompiler, CompileJob, CompileSettings};
use crate::entry::EntryMap;
use crate::external::{ExternalDecider, VendorClassifier};
use crate::manifest::ManifestLookup;
use crate::{Error, Result};

/// Resolve the transitive closure of `seeds` into an ordered chunk list.
///
/// Each module's chunks are emitted when its own compile finishes, before
/// the dependencies discovered from it are walked depth-first, matching
/// the registration order the merged artifact is expected to carry.
///
/// `visited` is session-scoped: ids already compiled in this session are
/// skipped, and every id is reserved there before its compile is
/// dispatched. A failed sub-compile aborts the whole closure with
/// [`Error::VendorCompile`]; no partial chunk list is returned.
pub async fn resolve_closure(
    seeds: Vec<String>,
    visited: &mut FxHashSet<String>,
    compiler: &dyn ChunkCompiler,
    manifests: &dyn ManifestLookup,
    settings: &CompileSettings,
) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    let mut stack: Vec<String> = seeds.into_iter().rev().collect();

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }

        tracing::debug!(module = %id, "compiling external module");

        // This compile's external set is the module's own declared
        // dependencies, or empty when it carries no manifest.
        let dependencies = manifests
            .for_package(&id)
            .map(|m| m.dependency_names())
            .unwrap_or_default();
        let classifier = Arc::new(VendorClassifier::new(&id, dependencies));

        let mut entries = EntryMap::default();
        entries.insert(id.clone(), id.clone());

        let job = CompileJob {
            entries,
            externals: classifier.clone(),
            settings: CompileSettings {
                // Vendor chunks never carry source maps
                sourcemap: false,
                ..settings.clone()
            },
        };

        let output = compiler
            .compile(job)
            .await
            .map_err(|source| Error::VendorCompile {
                module_id: id.clone(),
                source,
            })?;
        chunks.extend(output.chunks);

        // Depth-first: newly discovered dependencies are walked before the
        // rest of the worklist.
        for dependency in classifier.take_discovered().into_iter().rev() {
            if !visited.contains(&dependency) {
                stack.push(dependency);
            }
        }
    }

    Ok(chunks)
}
