//! Entry resolution.
//!
//! Expands a list of entry declarations (literal paths and glob patterns)
//! against the source root into a mapping from logical module id to source
//! path. Ids are root-relative paths with the `.js` extension stripped, so
//! `pages/home.js` becomes the id `pages/home`.

use std::path::Path;

use regex::Regex;
use rustc_hash::FxHashMap;
use walkdir::WalkDir;

use crate::{Error, Result};

/// Recognized source extension for entry files.
pub const SOURCE_EXT: &str = ".js";

/// Logical module id -> source path (absolute, as handed to the compiler).
///
/// Iteration order carries no meaning; only the content does.
pub type EntryMap = FxHashMap<String, String>;

/// Expand entry patterns against a source root.
///
/// Literal patterns map directly; glob patterns (`*`, `?`, `**`) are
/// expanded by walking the root. Fails with [`Error::InvalidEntry`] when a
/// pattern does not end in `.js` and with [`Error::DuplicateEntry`] when
/// two patterns resolve to the same logical id.
pub fn resolve(patterns: &[String], root: &Path) -> Result<EntryMap> {
    let mut entries = EntryMap::default();

    for pattern in patterns {
        if !pattern.ends_with(SOURCE_EXT) {
            return Err(Error::InvalidEntry {
                pattern: pattern.clone(),
            });
        }

        if is_glob(pattern) {
            let matcher = glob_matcher(pattern);
            for dirent in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
                if !dirent.file_type().is_file() {
                    continue;
                }
                let rel = match dirent.path().strip_prefix(root) {
                    Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                    Err(_) => continue,
                };
                if matcher.is_match(&rel) {
                    let path = dirent.path().to_string_lossy().into_owned();
                    insert_entry(&mut entries, logical_id(&rel), path)?;
                }
            }
        } else {
            let path = root.join(pattern).to_string_lossy().into_owned();
            insert_entry(&mut entries, logical_id(pattern), path)?;
        }
    }

    Ok(entries)
}

fn insert_entry(entries: &mut EntryMap, id: String, path: String) -> Result<()> {
    if entries.contains_key(&id) {
        return Err(Error::DuplicateEntry { id });
    }
    tracing::debug!(id = %id, path = %path, "resolved entry");
    entries.insert(id, path);
    Ok(())
}

/// Root-relative path with the source extension stripped.
fn logical_id(rel: &str) -> String {
    let rel = rel.trim_start_matches("./");
    rel.strip_suffix(SOURCE_EXT).unwrap_or(rel).to_string()
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Translate a glob pattern into an anchored regex.
///
/// `**/` matches any number of directories (including none), `*` matches
/// within one path segment, `?` matches a single non-separator character.
fn glob_matcher(pattern: &str) -> Regex {
    let mut re = String::with_capacity(pattern.len() * 2);
    re.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // Swallow the separator so `**/` also matches zero dirs
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        re.push_str("(?:[^/]+/)*");
                    } else {
                        re.push_str(".*");
                    }
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }

    re.push('$');
    // The translation above only emits valid syntax
    Regex::new(&re).expect("glob translation produced invalid regex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "export default 1;\n").unwrap();
    }

    fn fixture_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "index.js");
        touch(dir.path(), "pages/home.js");
        touch(dir.path(), "pages/admin/users.js");
        touch(dir.path(), "pages/readme.md");
        dir
    }

    #[test]
    fn test_literal_pattern_maps_directly() {
        let dir = fixture_tree();
        let entries = resolve(&["index.js".to_string()], dir.path()).unwrap();

        assert_eq!(entries.len(), 1);
        assert!(entries["index"].ends_with("index.js"));
    }

    #[test]
    fn test_glob_expands_recursively() {
        let dir = fixture_tree();
        let entries = resolve(&["pages/**/*.js".to_string()], dir.path()).unwrap();

        let mut ids: Vec<_> = entries.keys().cloned().collect();
        ids.sort();
        assert_eq!(ids, vec!["pages/admin/users", "pages/home"]);
    }

    #[test]
    fn test_glob_single_star_stays_in_one_segment() {
        let dir = fixture_tree();
        let entries = resolve(&["pages/*.js".to_string()], dir.path()).unwrap();

        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("pages/home"));
    }

    #[test]
    fn test_missing_extension_is_invalid() {
        let dir = fixture_tree();
        let err = resolve(&["pages/**/*".to_string()], dir.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidEntry { .. }));
    }

    #[test]
    fn test_duplicate_id_fails() {
        let dir = fixture_tree();
        let patterns = vec!["pages/home.js".to_string(), "pages/*.js".to_string()];
        let err = resolve(&patterns, dir.path()).unwrap_err();
        assert!(matches!(err, Error::DuplicateEntry { ref id } if id == "pages/home"));
    }

    #[test]
    fn test_resolution_is_idempotent_and_order_independent() {
        let dir = fixture_tree();
        let a = vec!["index.js".to_string(), "pages/*.js".to_string()];
        let b = vec!["pages/*.js".to_string(), "index.js".to_string()];

        let first = resolve(&a, dir.path()).unwrap();
        let second = resolve(&a, dir.path()).unwrap();
        let swapped = resolve(&b, dir.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, swapped);
    }
}
