//! Dependency manifest (`package.json`) lookup.
//!
//! Externality decisions consult the manifest of the package that owns a
//! file (the "package boundary") and the manifests of external packages
//! themselves. Reads are a capability ([`ManifestLookup`]) so tests can
//! substitute an in-memory table; the filesystem implementation caches per
//! directory and treats missing or malformed files as "no manifest".

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

/// Parsed dependency manifest. Only the fields externality decisions need.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    pub name: Option<String>,
    #[serde(default)]
    pub dependencies: FxHashMap<String, String>,
}

impl Manifest {
    /// Runtime dependency names, in no particular order.
    pub fn dependency_names(&self) -> FxHashSet<String> {
        self.dependencies.keys().cloned().collect()
    }

    /// Whether `specifier` (possibly a deep import like `lodash/fp`)
    /// belongs to one of this manifest's declared dependencies.
    pub fn declares(&self, specifier: &str) -> bool {
        self.dependencies
            .contains_key(extract_package_name(specifier))
    }
}

/// Manifest lookup capability.
pub trait ManifestLookup: Send + Sync {
    /// The nearest manifest owning `dir`, walking upward but stopping
    /// before leaving `stop`. The manifest of `stop` itself does not
    /// count: only a manifest nested inside the tree is a boundary.
    fn nearest(&self, dir: &Path, stop: &Path) -> Option<Arc<Manifest>>;

    /// The manifest of the installed package `specifier` resolves into.
    fn for_package(&self, specifier: &str) -> Option<Arc<Manifest>>;
}

/// Filesystem-backed lookup with a per-directory cache.
pub struct FsManifests {
    project_root: PathBuf,
    cache: RwLock<FxHashMap<PathBuf, Option<Arc<Manifest>>>>,
}

impl FsManifests {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// Read and parse `dir/package.json`, caching the outcome either way.
    /// Failures are not errors: an unreadable manifest is no manifest.
    fn load(&self, dir: &Path) -> Option<Arc<Manifest>> {
        if let Some(cached) = self.cache.read().get(dir) {
            return cached.clone();
        }

        let path = dir.join("package.json");
        let parsed = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| match serde_json::from_str::<Manifest>(&text) {
                Ok(manifest) => Some(Arc::new(manifest)),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "ignoring malformed manifest");
                    None
                }
            });

        self.cache
            .write()
            .insert(dir.to_path_buf(), parsed.clone());
        parsed
    }
}

impl ManifestLookup for FsManifests {
    fn nearest(&self, dir: &Path, stop: &Path) -> Option<Arc<Manifest>> {
        let mut current = dir;
        loop {
            if !current.starts_with(stop) || current == stop {
                return None;
            }
            if let Some(manifest) = self.load(current) {
                return Some(manifest);
            }
            current = current.parent()?;
        }
    }

    fn for_package(&self, specifier: &str) -> Option<Arc<Manifest>> {
        let package = extract_package_name(specifier);
        if package.is_empty() || package.starts_with('.') {
            return None;
        }
        let dir = self.project_root.join("node_modules").join(package);
        self.load(&dir)
    }
}

/// Extract the base package name from an npm import specifier.
///
/// Scoped packages keep their namespace segment:
/// `@babel/core/lib/index` -> `@babel/core`, `lodash/fp` -> `lodash`.
pub fn extract_package_name(specifier: &str) -> &str {
    if specifier.starts_with('@') {
        if let Some(first_slash) = specifier.find('/') {
            if let Some(second_slash) = specifier[first_slash + 1..].find('/') {
                return &specifier[..first_slash + 1 + second_slash];
            }
        }
        return specifier;
    }

    match specifier.find('/') {
        Some(idx) => &specifier[..idx],
        None => specifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_extract_package_name() {
        assert_eq!(extract_package_name("@babel/core"), "@babel/core");
        assert_eq!(extract_package_name("@babel/core/lib/index"), "@babel/core");
        assert_eq!(extract_package_name("lodash"), "lodash");
        assert_eq!(extract_package_name("lodash/fp"), "lodash");
        assert_eq!(extract_package_name(""), "");
        assert_eq!(extract_package_name("@org"), "@org");
    }

    #[test]
    fn test_manifest_declares_deep_imports() {
        let manifest: Manifest = serde_json::from_str(
            r#"{ "name": "a", "dependencies": { "lodash": "^4.0.0", "@babel/core": "^7.0.0" } }"#,
        )
        .unwrap();

        assert!(manifest.declares("lodash"));
        assert!(manifest.declares("lodash/fp"));
        assert!(manifest.declares("@babel/core/lib/index"));
        assert!(!manifest.declares("react"));
    }

    #[test]
    fn test_nearest_finds_nested_boundary_only() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/widget/deep")).unwrap();
        fs::write(
            root.join("package.json"),
            r#"{ "name": "project", "dependencies": { "react": "*" } }"#,
        )
        .unwrap();
        fs::write(
            root.join("src/widget/package.json"),
            r#"{ "name": "widget", "dependencies": { "left-pad": "*" } }"#,
        )
        .unwrap();

        let manifests = FsManifests::new(root);
        let src = root.join("src");

        // Inside the widget, the widget manifest wins
        let found = manifests
            .nearest(&root.join("src/widget/deep"), &src)
            .unwrap();
        assert_eq!(found.name.as_deref(), Some("widget"));

        // Outside any nested boundary, the project manifest does not count
        assert!(manifests.nearest(&src, &src).is_none());
    }

    #[test]
    fn test_malformed_manifest_is_silently_none() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("node_modules/broken")).unwrap();
        fs::write(root.join("node_modules/broken/package.json"), "{ nope").unwrap();

        let manifests = FsManifests::new(root);
        assert!(manifests.for_package("broken").is_none());
        // Cached outcome stays None
        assert!(manifests.for_package("broken").is_none());
    }

    #[test]
    fn test_for_package_resolves_scoped_deep_import() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("node_modules/@scope/pkg")).unwrap();
        fs::write(
            root.join("node_modules/@scope/pkg/package.json"),
            r#"{ "name": "@scope/pkg", "dependencies": {} }"#,
        )
        .unwrap();

        let manifests = FsManifests::new(root);
        let found = manifests.for_package("@scope/pkg/lib/util").unwrap();
        assert_eq!(found.name.as_deref(), Some("@scope/pkg"));
    }
}
