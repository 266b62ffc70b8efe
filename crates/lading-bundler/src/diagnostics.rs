//! Structured error reports.
//!
//! Watch mode never lets a phase failure kill the session, so errors are
//! flattened into a cloneable, serializable [`Diagnostic`] that can be
//! logged, broadcast to observers, or rendered by a frontend.

use serde::{Deserialize, Serialize};

use crate::Error;

/// What went wrong, stripped to the fields every consumer needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    InvalidEntry,
    DuplicateEntry,
    SourceCompile,
    VendorCompile,
    RegistrationCollision,
    Io,
    Write,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DiagnosticKind::InvalidEntry => "invalid_entry",
            DiagnosticKind::DuplicateEntry => "duplicate_entry",
            DiagnosticKind::SourceCompile => "source_compile",
            DiagnosticKind::VendorCompile => "vendor_compile",
            DiagnosticKind::RegistrationCollision => "registration_collision",
            DiagnosticKind::Io => "io",
            DiagnosticKind::Write => "write",
        };
        f.write_str(name)
    }
}

impl Diagnostic {
    pub fn from_error(error: &Error) -> Self {
        let kind = match error {
            Error::InvalidEntry { .. } => DiagnosticKind::InvalidEntry,
            Error::DuplicateEntry { .. } => DiagnosticKind::DuplicateEntry,
            Error::SourceCompile(_) => DiagnosticKind::SourceCompile,
            Error::VendorCompile { .. } => DiagnosticKind::VendorCompile,
            Error::RegistrationCollision { .. } => DiagnosticKind::RegistrationCollision,
            Error::Io(_) => DiagnosticKind::Io,
            Error::InvalidOutputPath(_) | Error::WriteFailure(_) => DiagnosticKind::Write,
        };

        let (file, line) = match error {
            Error::SourceCompile(e) | Error::VendorCompile { source: e, .. } => {
                (e.file.clone(), e.line)
            }
            _ => (None, None),
        };

        Self {
            kind,
            message: error.to_string(),
            file,
            line,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(file) = &self.file {
            write!(f, " ({file}")?;
            if let Some(line) = self.line {
                write!(f, ":{line}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileError;

    #[test]
    fn test_source_compile_diagnostic_carries_file_context() {
        let error = Error::SourceCompile(
            CompileError::new("unexpected token").in_file("src/index.js", Some(12)),
        );
        let diagnostic = Diagnostic::from_error(&error);

        assert_eq!(diagnostic.kind, DiagnosticKind::SourceCompile);
        assert_eq!(diagnostic.file.as_deref(), Some("src/index.js"));
        assert_eq!(diagnostic.line, Some(12));
        assert_eq!(
            diagnostic.to_string(),
            "[source_compile] source compile failed: unexpected token (src/index.js:12)"
        );
    }

    #[test]
    fn test_collision_diagnostic_has_no_file_context() {
        let error = Error::RegistrationCollision {
            name: "lodash".to_string(),
        };
        let diagnostic = Diagnostic::from_error(&error);

        assert_eq!(diagnostic.kind, DiagnosticKind::RegistrationCollision);
        assert!(diagnostic.file.is_none());
        assert!(diagnostic.message.contains("lodash"));
    }

    #[test]
    fn test_diagnostic_round_trips_through_json() {
        let error = Error::VendorCompile {
            module_id: "left-pad".to_string(),
            source: CompileError::new("boom"),
        };
        let diagnostic = Diagnostic::from_error(&error);

        let json = serde_json::to_string(&diagnostic).unwrap();
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, DiagnosticKind::VendorCompile);
    }
}
