use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use rq_requirement::RequirementError;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    /// One or more lines of the manifest couldn't be understood. Every bad
    /// line is reported, not just the first one.
    #[error("Failed to parse manifest `{name}`.")]
    #[diagnostic(code(rq::manifest::parse))]
    ParseError {
        name: String,
        #[source_code]
        src: NamedSource,
        #[related]
        errors: Vec<LineError>,
    },

    #[error("Failed to read manifest at {}.", .0.display())]
    #[diagnostic(code(rq::manifest::io))]
    IoError(PathBuf, #[source] std::io::Error),

    /// A `-r` or `-c` line points at a file that can't be read.
    #[error("Failed to read {}, included from {}:{line}.", .path.display(), .from.display())]
    #[diagnostic(
        code(rq::manifest::include),
        help("Include paths are resolved relative to the file that includes them.")
    )]
    IncludeError {
        path: PathBuf,
        from: PathBuf,
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

impl ManifestError {
    /// Per-line problems, for parse errors.
    pub fn line_errors(&self) -> &[LineError] {
        match self {
            ManifestError::ParseError { errors, .. } => errors,
            _ => &[],
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("line {line}: {kind}")]
#[diagnostic(code(rq::manifest::line))]
pub struct LineError {
    pub line: usize,
    #[label("here")]
    pub span: SourceSpan,
    pub kind: LineErrorKind,
}

#[derive(Debug, Error)]
pub enum LineErrorKind {
    #[error("{}", .0.kind)]
    Requirement(RequirementError),
    #[error("`{0}` needs a value.")]
    MissingValue(&'static str),
    #[error("Invalid index URL: {0}")]
    InvalidUrl(url::ParseError),
}
