//! Reading Python requirements manifests (`requirements.txt` and friends).
//!
//! A manifest is parsed into an ordered list of [`Entry`]s: dependency
//! declarations plus the handful of installer options that can appear in
//! the file. Parsing is pure, so reading the same text twice always produces
//! the same entries in the same order.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use miette::{NamedSource, SourceSpan};
use rq_requirement::{parse_requirement, Requirement};
use url::Url;

pub use crate::check::{check, CheckOptions, Checker, Finding, FindingReport, Severity};
pub use crate::error::{LineError, LineErrorKind, ManifestError};
use crate::lines::{logical_lines, strip_comment};

mod check;
mod error;
mod lines;
mod options;

const DEFAULT_NAME: &str = "requirements.txt";

/// One meaningful line of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// 1-based line number where the entry starts.
    pub line: usize,
    /// Byte offset of the entry in the manifest source.
    pub offset: usize,
    /// Length of the entry in the source, including any continuation
    /// backslashes.
    pub len: usize,
    pub kind: EntryKind,
}

impl Entry {
    pub fn span(&self) -> SourceSpan {
        (self.offset, self.len).into()
    }

    pub fn requirement(&self) -> Option<&Requirement> {
        match &self.kind {
            EntryKind::Requirement(req) => Some(req),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Requirement(Requirement),
    /// `-e <path-or-url>`
    Editable(String),
    /// `-r <file>`
    Include(String),
    /// `-c <file>`
    Constraints(String),
    /// `-i <url>` / `--index-url <url>`
    IndexUrl(Url),
    /// `--extra-index-url <url>`
    ExtraIndexUrl(Url),
    /// `-f <path-or-url>`
    FindLinks(String),
    /// `--no-index`
    NoIndex,
    /// Any other option line, verbatim.
    Option(String),
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use EntryKind::*;
        match self {
            Requirement(req) => write!(f, "{}", req),
            Editable(target) => write!(f, "-e {}", target),
            Include(path) => write!(f, "-r {}", path),
            Constraints(path) => write!(f, "-c {}", path),
            IndexUrl(url) => write!(f, "--index-url {}", url),
            ExtraIndexUrl(url) => write!(f, "--extra-index-url {}", url),
            FindLinks(target) => write!(f, "--find-links {}", target),
            NoIndex => write!(f, "--no-index"),
            Option(raw) => write!(f, "{}", raw),
        }
    }
}

/// How a manifest was reached while following includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ManifestRole {
    /// The manifest that was asked for, or one pulled in through `-r`.
    #[default]
    Requirements,
    /// A file pulled in through `-c`, directly or by way of its own `-r`
    /// lines. It only restricts versions, so repeating a package that the
    /// requirements declare is expected.
    Constraints,
}

/// A parsed manifest, along with the text it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    name: String,
    path: Option<PathBuf>,
    role: ManifestRole,
    source: String,
    entries: Vec<Entry>,
}

impl Manifest {
    pub fn parse(source: impl Into<String>) -> Result<Self, ManifestError> {
        Self::parse_named(DEFAULT_NAME, source)
    }

    /// Parses `source`, using `name` to refer to it in diagnostics.
    ///
    /// Every line is parsed even after an error, so the returned
    /// [`ManifestError::ParseError`] lists all the bad lines at once.
    pub fn parse_named(
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, ManifestError> {
        let name = name.into();
        let source = source.into();
        let mut entries = Vec::new();
        let mut errors = Vec::new();

        for logical in logical_lines(&source) {
            let content = strip_comment(&logical.text);
            let lead = content.len() - content.trim_start().len();
            let body = content.trim();
            if body.is_empty() {
                continue;
            }
            let (offset, len) = logical.source_span(lead, lead + body.len());

            let parsed = if body.starts_with('-') {
                options::parse_option(body).map_err(|kind| LineError {
                    line: logical.line,
                    span: (offset, len).into(),
                    kind,
                })
            } else {
                parse_requirement(body)
                    .map(EntryKind::Requirement)
                    .map_err(|e| {
                        let at = logical.source_offset(lead + e.offset().min(body.len()));
                        let at_len = usize::from(at < offset + len);
                        LineError {
                            line: logical.line,
                            span: (at, at_len).into(),
                            kind: LineErrorKind::Requirement(e),
                        }
                    })
            };

            match parsed {
                Ok(kind) => entries.push(Entry {
                    line: logical.line,
                    offset,
                    len,
                    kind,
                }),
                Err(err) => errors.push(err),
            }
        }

        tracing::debug!(
            "parsed {name}: {} entries, {} errors",
            entries.len(),
            errors.len()
        );

        if errors.is_empty() {
            Ok(Manifest {
                name,
                path: None,
                role: ManifestRole::default(),
                source,
                entries,
            })
        } else {
            Err(ManifestError::ParseError {
                src: NamedSource::new(&name, source),
                name,
                errors,
            })
        }
    }

    /// Reads and parses the manifest at `path`.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let source = async_std::fs::read_to_string(path)
            .await
            .map_err(|e| ManifestError::IoError(path.to_path_buf(), e))?;
        let mut manifest = Self::parse_named(path.display().to_string(), source)?;
        manifest.path = Some(path.to_path_buf());
        Ok(manifest)
    }

    /// Reads the manifest at `path` and every manifest it pulls in through
    /// `-r` and `-c` lines, depth-first, in the order an installer would see
    /// them. Each file is loaded once, even if several files include it.
    ///
    /// A file that fails to parse shows up as an `Err` in the list and the
    /// walk carries on with the rest. Files that can't be read at all stop
    /// the walk.
    pub async fn load_with_includes(
        path: impl AsRef<Path>,
    ) -> Result<Vec<Result<Manifest, ManifestError>>, ManifestError> {
        let mut visited = HashSet::new();
        let mut loaded = Vec::new();
        let mut pending: Vec<(PathBuf, ManifestRole, Option<(PathBuf, usize)>)> =
            vec![(path.as_ref().to_path_buf(), ManifestRole::Requirements, None)];

        while let Some((path, role, from)) = pending.pop() {
            let canonical: PathBuf = match async_std::fs::canonicalize(&path).await {
                Ok(canonical) => canonical.into(),
                Err(source) => {
                    return Err(match from {
                        Some((from, line)) => ManifestError::IncludeError {
                            path,
                            from,
                            line,
                            source,
                        },
                        None => ManifestError::IoError(path, source),
                    })
                }
            };
            if !visited.insert(canonical) {
                tracing::warn!("{} was already loaded, skipping it", path.display());
                continue;
            }

            let mut manifest = match Manifest::from_path(&path).await {
                Ok(manifest) => manifest,
                Err(err @ ManifestError::ParseError { .. }) => {
                    tracing::debug!(
                        "{} failed to parse, not following its includes",
                        path.display()
                    );
                    loaded.push(Err(err));
                    continue;
                }
                Err(err) => return Err(err),
            };
            manifest.role = role;

            let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let mut includes = Vec::new();
            for (entry, target) in manifest.includes() {
                if Url::parse(target).is_ok() {
                    tracing::warn!(
                        "{}:{}: not following remote include {target}",
                        path.display(),
                        entry.line
                    );
                    continue;
                }
                let role = match entry.kind {
                    EntryKind::Constraints(_) => ManifestRole::Constraints,
                    _ => role,
                };
                includes.push((base.join(target), role, Some((path.clone(), entry.line))));
            }
            // Reversed so the first include is the next one popped.
            pending.extend(includes.into_iter().rev());
            loaded.push(Ok(manifest));
        }

        Ok(loaded)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn role(&self) -> ManifestRole {
        self.role
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The manifest source, ready to attach to a diagnostic.
    pub fn named_source(&self) -> NamedSource {
        NamedSource::new(&self.name, self.source.clone())
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Dependency declarations, in file order.
    pub fn requirements(&self) -> impl Iterator<Item = (&Entry, &Requirement)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.requirement().map(|req| (entry, req)))
    }

    /// Targets of `-r` and `-c` lines, in file order.
    pub fn includes(&self) -> impl Iterator<Item = (&Entry, &str)> {
        self.entries.iter().filter_map(|entry| match &entry.kind {
            EntryKind::Include(target) | EntryKind::Constraints(target) => {
                Some((entry, target.as_str()))
            }
            _ => None,
        })
    }

    /// Renders the manifest with one canonical entry per line. Comments and
    /// blank lines are dropped. With `sort`, option lines come first in their
    /// original order, followed by declarations sorted by normalized name.
    pub fn to_canonical_string(&self, sort: bool) -> String {
        let mut entries = self.entries.iter().collect::<Vec<_>>();
        if sort {
            entries.sort_by(|a, b| match (a.requirement(), b.requirement()) {
                (Some(a), Some(b)) => a.name.cmp(&b.name),
                (Some(_), None) => std::cmp::Ordering::Greater,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }
        let mut out = String::new();
        for entry in entries {
            out.push_str(&entry.kind.to_string());
            out.push('\n');
        }
        out
    }
}

impl std::str::FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Manifest::parse(s)
    }
}
