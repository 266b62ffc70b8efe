//! External classification.
//!
//! Every import the compiler encounters is run through an
//! [`ExternalDecider`]: external imports are left out of the produced
//! chunks and referenced by name at runtime, everything else is inlined.
//! Two policies exist, one for first-party compiles and one for the
//! isolated per-package vendor compiles.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::manifest::{ManifestLookup, extract_package_name};

/// Externality predicate handed to the compiler, plus the discovery channel
/// feeding the vendor closure walk.
pub trait ExternalDecider: Send + Sync {
    /// Whether `specifier`, imported from `importer`, must stay out of the
    /// produced chunks.
    fn is_external(&self, specifier: &str, importer: Option<&Path>) -> bool;

    /// Drain the specifiers classified external for the first time since
    /// the last call, in discovery order.
    fn take_discovered(&self) -> Vec<String>;
}

/// Classifier for first-party compiles.
///
/// Relative specifiers, absolute paths under the source root, and
/// always-inline patterns are first-party. A specifier declared by the
/// nearest package boundary *inside* the source tree is inlined too, so a
/// widget's private dependency bundles with the widget instead of being
/// hoisted into the vendor artifact. Every other specifier is external and
/// grows the session's external set.
pub struct ProjectClassifier {
    source_root: std::path::PathBuf,
    inline_always: Vec<String>,
    manifests: Arc<dyn ManifestLookup>,
    externals: Mutex<IndexSet<String>>,
    discovered: Mutex<Vec<String>>,
    recording: bool,
}

impl ProjectClassifier {
    pub fn new(
        source_root: impl Into<std::path::PathBuf>,
        baseline: IndexSet<String>,
        inline_always: Vec<String>,
        manifests: Arc<dyn ManifestLookup>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            inline_always,
            manifests,
            externals: Mutex::new(baseline),
            discovered: Mutex::new(Vec::new()),
            recording: true,
        }
    }

    /// A classifier that applies the same rules but leaves the external
    /// set alone. Lazily loaded page builds classify this way: their
    /// externals are not fed into the vendor closure.
    pub fn non_recording(
        source_root: impl Into<std::path::PathBuf>,
        inline_always: Vec<String>,
        manifests: Arc<dyn ManifestLookup>,
    ) -> Self {
        let mut classifier = Self::new(
            source_root,
            IndexSet::new(),
            inline_always,
            manifests,
        );
        classifier.recording = false;
        classifier
    }

    /// Current external set, in insertion order (baseline first, then
    /// discoveries).
    pub fn snapshot(&self) -> Vec<String> {
        self.externals.lock().iter().cloned().collect()
    }

    fn is_first_party(&self, specifier: &str, importer: Option<&Path>) -> bool {
        if specifier.starts_with('.') {
            return true;
        }
        if Path::new(specifier).is_absolute() && Path::new(specifier).starts_with(&self.source_root)
        {
            return true;
        }
        if self
            .inline_always
            .iter()
            .any(|pattern| specifier.contains(pattern.as_str()))
        {
            return true;
        }

        // Package-boundary override: a nested manifest that declares the
        // specifier keeps it inlined.
        if let Some(dir) = importer.and_then(Path::parent) {
            if let Some(boundary) = self.manifests.nearest(dir, &self.source_root) {
                if boundary.declares(specifier) {
                    return true;
                }
            }
        }

        false
    }
}

impl ExternalDecider for ProjectClassifier {
    fn is_external(&self, specifier: &str, importer: Option<&Path>) -> bool {
        if self.is_first_party(specifier, importer) {
            return false;
        }

        if self.recording {
            let mut externals = self.externals.lock();
            if externals.insert(specifier.to_string()) {
                tracing::debug!(specifier = %specifier, "discovered external");
                self.discovered.lock().push(specifier.to_string());
            }
        }
        true
    }

    fn take_discovered(&self) -> Vec<String> {
        std::mem::take(&mut *self.discovered.lock())
    }
}

/// Classifier for one external module's isolated compile.
///
/// The module itself and relative or absolute specifiers are inlined; its
/// own declared dependencies are external and become closure seeds;
/// anything else (undeclared transitive code) is bundled into the module's
/// chunk, which is what a missing manifest degrades to.
pub struct VendorClassifier {
    specifier: String,
    dependencies: FxHashSet<String>,
    discovered: Mutex<IndexSet<String>>,
}

impl VendorClassifier {
    pub fn new(specifier: impl Into<String>, dependencies: FxHashSet<String>) -> Self {
        Self {
            specifier: specifier.into(),
            dependencies,
            discovered: Mutex::new(IndexSet::new()),
        }
    }
}

impl ExternalDecider for VendorClassifier {
    fn is_external(&self, specifier: &str, _importer: Option<&Path>) -> bool {
        if specifier == self.specifier
            || specifier.starts_with('.')
            || Path::new(specifier).is_absolute()
        {
            return false;
        }
        if !self.dependencies.contains(extract_package_name(specifier)) {
            return false;
        }

        self.discovered.lock().insert(specifier.to_string());
        true
    }

    fn take_discovered(&self) -> Vec<String> {
        let mut discovered = self.discovered.lock();
        discovered.drain(..).collect()
    }
}
