//! Parsing for single Python dependency declarations, the lines that make
//! up a `requirements.txt`:
//!
//! ```
//! use rq_requirement::{Requirement, RequirementSource};
//!
//! let req: Requirement = "streamlit==1.33.0".parse().unwrap();
//! assert_eq!(req.name.as_str(), "streamlit");
//! assert_eq!(req.constraint().as_deref(), Some("==1.33.0"));
//! assert!(matches!(req.source, RequirementSource::Index { .. }));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use nom::combinator::all_consuming;
use rq_version::{Version, VersionSpecifier, VersionSpecifiers};
use serde::ser::{Serialize, Serializer};
use url::Url;

pub use crate::error::{RequirementError, RequirementErrorKind};
use crate::parsers::{name, requirement};

mod error;
mod parsers;

/// A package identifier as written in a manifest.
///
/// Two names are the same package when their normalized forms match, so
/// `Flask_Login`, `flask-login` and `flask.login` all compare equal.
#[derive(Debug, Clone)]
pub struct PackageName {
    name: String,
    normalized: String,
}

impl PackageName {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, RequirementError> {
        let input = raw.as_ref();
        match all_consuming(name::name)(input) {
            Ok((_, raw)) => Ok(PackageName::from_parsed(raw)),
            Err(err) => Err(RequirementError::from_parse_error(input, err)),
        }
    }

    pub(crate) fn from_parsed(raw: &str) -> Self {
        PackageName {
            name: raw.into(),
            normalized: normalize(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

/// Lowercases `name` and collapses runs of `-`, `_` and `.` into a single
/// `-`.
pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }
    out
}

impl PartialEq for PackageName {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for PackageName {}

impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl PartialOrd for PackageName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl FromStr for PackageName {
    type Err = RequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackageName::new(s)
    }
}

impl Serialize for PackageName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Where a declaration's package comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequirementSource {
    /// The installer's configured package index, narrowed down by an
    /// optional version constraint.
    Index { specifiers: VersionSpecifiers },
    /// A direct download location (`name @ https://...`).
    Url { url: Url },
}

/// One dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    pub name: PackageName,
    pub extras: Vec<String>,
    pub source: RequirementSource,
    /// Environment marker, kept verbatim (`python_version < "3.11"`).
    pub marker: Option<String>,
}

impl Requirement {
    pub fn specifiers(&self) -> Option<&VersionSpecifiers> {
        match &self.source {
            RequirementSource::Index { specifiers } => Some(specifiers),
            RequirementSource::Url { .. } => None,
        }
    }

    pub fn url(&self) -> Option<&Url> {
        match &self.source {
            RequirementSource::Url { url } => Some(url),
            RequirementSource::Index { .. } => None,
        }
    }

    /// The version constraint as written in canonical form, or `None` when
    /// there isn't one.
    pub fn constraint(&self) -> Option<String> {
        self.specifiers()
            .filter(|specs| !specs.is_empty())
            .map(|specs| specs.to_string())
    }

    /// The pin specifier, for `name==x.y.z` and `name===x` declarations.
    pub fn pin(&self) -> Option<&VersionSpecifier> {
        self.specifiers().and_then(VersionSpecifiers::pin)
    }

    pub fn is_pinned(&self) -> bool {
        self.pin().is_some()
    }

    /// The exact version this declaration is pinned to, when the pin is a
    /// real version.
    pub fn pinned_version(&self) -> Option<&Version> {
        self.pin().and_then(VersionSpecifier::version)
    }
}

impl FromStr for Requirement {
    type Err = RequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_requirement(s)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        match &self.source {
            RequirementSource::Index { specifiers } => {
                write!(f, "{}", specifiers)?;
                if let Some(marker) = &self.marker {
                    write!(f, "; {}", marker)?;
                }
            }
            RequirementSource::Url { url } => {
                write!(f, " @ {}", url)?;
                if let Some(marker) = &self.marker {
                    write!(f, " ; {}", marker)?;
                }
            }
        }
        Ok(())
    }
}

pub fn parse_requirement<I>(input: I) -> Result<Requirement, RequirementError>
where
    I: AsRef<str>,
{
    let input = input.as_ref();
    match all_consuming(requirement::requirement)(input) {
        Ok((_, req)) => Ok(req),
        Err(err) => Err(RequirementError::from_parse_error(input, err)),
    }
}
