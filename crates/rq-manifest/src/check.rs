use std::fmt;

use indexmap::IndexMap;
use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use rq_requirement::Requirement;
use rq_version::{Version, VersionSpecifier};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::{Entry, Manifest, ManifestRole};

const VCS_SCHEMES: &[&str] = &["git+", "hg+", "svn+", "bzr+"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A problem with one declaration in a manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    /// Stable identifier, such as `name::duplicate`.
    pub code: &'static str,
    pub message: String,
    /// Name of the manifest the finding is in.
    pub file: String,
    pub line: usize,
    pub offset: usize,
    pub len: usize,
}

impl Finding {
    fn new(
        severity: Severity,
        code: &'static str,
        manifest: &Manifest,
        entry: &Entry,
        message: String,
    ) -> Self {
        Finding {
            severity,
            code,
            message,
            file: manifest.name().into(),
            line: entry.line,
            offset: entry.offset,
            len: entry.len,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Attaches the manifest source so the finding can be rendered as a
    /// diagnostic.
    pub fn report(&self, manifest: &Manifest) -> FindingReport {
        FindingReport {
            finding: self.clone(),
            src: manifest.named_source(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckOptions {
    /// Warn about declarations that don't pin an exact version.
    pub require_pins: bool,
    /// Whether `name @ url` declarations are acceptable at all.
    pub allow_urls: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            require_pins: false,
            allow_urls: true,
        }
    }
}

/// Checks a manifest, or a manifest and everything it includes.
///
/// A single `Checker` remembers every package it has seen, so declaring the
/// same package in two included files is reported as a duplicate too.
/// Constraints files are tracked separately: they may repeat any package
/// the requirements declare, but not one another's.
#[derive(Debug, Default)]
pub struct Checker {
    options: CheckOptions,
    seen: IndexMap<String, (String, usize)>,
    constrained: IndexMap<String, (String, usize)>,
}

impl Checker {
    pub fn new(options: CheckOptions) -> Self {
        Checker {
            options,
            seen: IndexMap::new(),
            constrained: IndexMap::new(),
        }
    }

    pub fn check(&mut self, manifest: &Manifest) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (entry, req) in manifest.requirements() {
            self.check_name(manifest, entry, req, &mut findings);
            self.check_version(manifest, entry, req, &mut findings);
            self.check_url(manifest, entry, req, &mut findings);
        }
        tracing::debug!("{}: {} findings", manifest.name(), findings.len());
        findings
    }

    fn check_name(
        &mut self,
        manifest: &Manifest,
        entry: &Entry,
        req: &Requirement,
        findings: &mut Vec<Finding>,
    ) {
        // `PackageName` only comes out of the name grammar, so `name` is
        // never empty and never contains whitespace.
        let name = req.name.as_str();
        let seen = match manifest.role() {
            ManifestRole::Requirements => &mut self.seen,
            ManifestRole::Constraints => &mut self.constrained,
        };
        let key = req.name.normalized().to_string();
        if let Some((file, line)) = seen.get(&key) {
            let first = if file == manifest.name() {
                format!("line {line}")
            } else {
                format!("{file}:{line}")
            };
            findings.push(Finding::new(
                Severity::Error,
                "name::duplicate",
                manifest,
                entry,
                format!("`{name}` is already declared on {first}."),
            ));
        } else {
            seen.insert(key, (manifest.name().to_string(), entry.line));
        }
    }

    fn check_version(
        &self,
        manifest: &Manifest,
        entry: &Entry,
        req: &Requirement,
        findings: &mut Vec<Finding>,
    ) {
        match req.pin() {
            Some(VersionSpecifier::Arbitrary(literal)) => {
                if Version::parse(literal).is_err() {
                    findings.push(Finding::new(
                        Severity::Error,
                        "version::invalid",
                        manifest,
                        entry,
                        format!("`{}` is pinned to `{literal}`, which is not a valid version.", req.name),
                    ));
                }
            }
            Some(VersionSpecifier::Compare { .. }) => {}
            None if self.options.require_pins
                && req.url().is_none()
                && manifest.role() == ManifestRole::Requirements =>
            {
                findings.push(Finding::new(
                    Severity::Warning,
                    "version::unpinned",
                    manifest,
                    entry,
                    format!("`{}` is not pinned to an exact version.", req.name),
                ));
            }
            None => {}
        }
    }

    fn check_url(
        &self,
        manifest: &Manifest,
        entry: &Entry,
        req: &Requirement,
        findings: &mut Vec<Finding>,
    ) {
        let Some(url) = req.url() else {
            return;
        };
        if !self.options.allow_urls {
            findings.push(Finding::new(
                Severity::Error,
                "url::forbidden",
                manifest,
                entry,
                format!("`{}` is installed from a URL, but URL sources are not allowed.", req.name),
            ));
        }
        if !is_supported_url(url) {
            findings.push(Finding::new(
                Severity::Error,
                "url::invalid",
                manifest,
                entry,
                format!("`{url}` is not a URL an installer can download from."),
            ));
        } else if scheme_base(url.scheme()) == "http" {
            findings.push(Finding::new(
                Severity::Warning,
                "url::insecure",
                manifest,
                entry,
                format!("`{}` is downloaded over plain HTTP.", req.name),
            ));
        }
    }
}

/// Checks a single manifest.
pub fn check(manifest: &Manifest, options: &CheckOptions) -> Vec<Finding> {
    Checker::new(options.clone()).check(manifest)
}

fn scheme_base(scheme: &str) -> &str {
    VCS_SCHEMES
        .iter()
        .find_map(|prefix| scheme.strip_prefix(prefix))
        .unwrap_or(scheme)
}

fn is_supported_url(url: &Url) -> bool {
    if url.cannot_be_a_base() {
        return false;
    }
    let vcs = VCS_SCHEMES.iter().any(|p| url.scheme().starts_with(p));
    match scheme_base(url.scheme()) {
        "http" | "https" => url.host_str().is_some(),
        "file" => true,
        "ssh" | "git" | "svn" => vcs,
        _ => false,
    }
}

fn help_for(code: &str) -> Option<&'static str> {
    Some(match code {
        "name::duplicate" => "Remove one of the declarations, or merge their constraints.",
        "version::invalid" => "Use a version like `1.2.3`, or `==` instead of `===`.",
        "version::unpinned" => "Pin it with `==x.y.z` for reproducible installs.",
        "url::invalid" => "URL sources must use http(s), file, or a git+/hg+/svn+/bzr+ scheme.",
        "url::insecure" => "Use an https:// URL instead.",
        "url::forbidden" => "Publish the package to an index and depend on it by version.",
        _ => return None,
    })
}

/// A [`Finding`] together with its manifest source, renderable by miette.
#[derive(Debug, Error)]
#[error("{}", .finding.message)]
pub struct FindingReport {
    pub finding: Finding,
    src: NamedSource,
}

impl Diagnostic for FindingReport {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("rq::check::{}", self.finding.code)))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.finding.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        help_for(self.finding.code).map(|help| Box::new(help) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some("here".into()),
            (self.finding.offset, self.finding.len),
        ))))
    }
}
