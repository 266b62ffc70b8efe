//! Vendor chunk merging.
//!
//! The closure walk produces one or more chunks per external module, each
//! generated as if it were a standalone file. Concatenating them into a
//! single artifact only works if every `System.register` call carries an
//! explicit name (the loader can no longer infer identity from file
//! position) and every reference to a sibling chunk's file name becomes a
//! reference to that sibling's registration name.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::compiler::{Chunk, Facade};
use crate::manifest::extract_package_name;
use crate::{Error, Result};

/// An anonymous or already-named top-level registration call.
static REGISTER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"System\.register\(\s*(?:["'][^"']*["']\s*,\s*)?\["#)
        .expect("static registration pattern")
});

/// Merge chunks into one artifact, in input order.
///
/// Fails with [`Error::RegistrationCollision`] when two chunks with
/// distinct facades derive the same registration name. First-party and
/// vendor artifacts are merged separately, so their name spaces never
/// cross-check against each other.
pub fn merge(chunks: &[Chunk]) -> Result<String> {
    let mut claimed: FxHashMap<String, &Facade> = FxHashMap::default();
    let mut names = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let name = registration_name(chunk);
        match claimed.get(name.as_str()) {
            Some(facade) if *facade != &chunk.facade => {
                return Err(Error::RegistrationCollision { name });
            }
            _ => {
                claimed.insert(name.clone(), &chunk.facade);
            }
        }
        names.push(name);
    }

    // Sibling file name -> registration name, for reference rewriting
    let by_file: FxHashMap<&str, &str> = chunks
        .iter()
        .zip(&names)
        .map(|(chunk, name)| (chunk.file_name.as_str(), name.as_str()))
        .collect();

    let mut artifact = String::new();
    for (chunk, name) in chunks.iter().zip(&names) {
        let mut code = name_registration(&chunk.code, name);
        for reference in &chunk.refs {
            if let Some(target) = by_file.get(reference.as_str()) {
                code = rewrite_reference(&code, reference, target);
            }
        }
        artifact.push_str(&code);
        if !artifact.ends_with('\n') {
            artifact.push('\n');
        }
    }

    Ok(artifact)
}

/// The stable identifier a chunk registers under in the merged artifact.
///
/// External chunks take the declared package name from the resolved
/// dependency path when one is known (scope segment preserved), falling
/// back to the specifier's package name. Entry chunks keep their
/// file-derived logical id.
pub fn registration_name(chunk: &Chunk) -> String {
    match &chunk.facade {
        Facade::External {
            specifier,
            resolved,
        } => resolved
            .as_deref()
            .and_then(package_name_from_path)
            .unwrap_or_else(|| extract_package_name(specifier).to_string()),
        Facade::Entry(id) => {
            let id = id.trim_start_matches("./");
            id.strip_suffix(".js").unwrap_or(id).to_string()
        }
    }
}

/// Package name from an installed dependency path: the segments following
/// the last `node_modules` component, two of them for scoped packages.
fn package_name_from_path(path: &std::path::Path) -> Option<String> {
    let components: Vec<&str> = path
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    let idx = components.iter().rposition(|c| *c == "node_modules")?;
    let first = components.get(idx + 1)?;

    if first.starts_with('@') {
        let second = components.get(idx + 2)?;
        Some(format!("{first}/{second}"))
    } else {
        Some((*first).to_string())
    }
}

/// Rewrite the first top-level `System.register` call to carry `name` as
/// an explicit argument, replacing any name the compiler already emitted.
fn name_registration(code: &str, name: &str) -> String {
    REGISTER_CALL
        .replace(code, format!(r#"System.register("{name}", ["#))
        .into_owned()
}

/// Replace quoted references to a sibling chunk's file name with its
/// registration name, dropping the relative-path syntax along the way.
fn rewrite_reference(code: &str, file_name: &str, target: &str) -> String {
    let mut code = code.to_string();
    for quoted in [
        format!("\"./{file_name}\""),
        format!("'./{file_name}'"),
        format!("\"{file_name}\""),
        format!("'{file_name}'"),
    ] {
        code = code.replace(&quoted, &format!("\"{target}\""));
    }
    code
}
