use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::ParseIntError;

use miette::{Diagnostic, SourceSpan};
use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while1};
use nom::character::complete::{char, digit1, multispace0, one_of};
use nom::combinator::{all_consuming, map, opt, value};
use nom::error::{context, ContextError, ErrorKind, FromExternalError, ParseError};
use nom::multi::separated_list1;
use nom::sequence::{delimited, preceded, terminated, tuple};
use nom::{Err, IResult};
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};
use thiserror::Error;

pub use specifier::{Operator, VersionSpecifier, VersionSpecifiers};

mod specifier;

const MAX_LENGTH: usize = 256;

#[derive(Debug, Error, Diagnostic)]
#[error("Error parsing version string. {kind}")]
#[diagnostic(
    code(rq::version::parse),
    help("Versions look like `1.2.3`, `2!1.0rc1`, or `1.0.post1.dev2+local.7`.")
)]
pub struct VersionError {
    #[source_code]
    input: String,
    #[label("here")]
    span: SourceSpan,
    kind: VersionErrorKind,
}

impl VersionError {
    fn new(input: &str, offset: usize, kind: VersionErrorKind) -> Self {
        let len = if offset < input.len() { 1 } else { 0 };
        VersionError {
            input: input.into(),
            span: (offset, len).into(),
            kind,
        }
    }

    pub(crate) fn from_parse_error(input: &str, err: Err<VersionParseError<&str>>) -> Self {
        match err {
            Err::Error(e) | Err::Failure(e) => {
                let offset = e.input.as_ptr() as usize - input.as_ptr() as usize;
                let kind = if let Some(kind) = e.kind {
                    kind
                } else if let Some(ctx) = e.context {
                    VersionErrorKind::Context(ctx)
                } else {
                    VersionErrorKind::Other
                };
                VersionError::new(input, offset, kind)
            }
            Err::Incomplete(_) => VersionError::new(
                input,
                input.len().saturating_sub(1),
                VersionErrorKind::IncompleteInput,
            ),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Byte offset into the input where parsing gave up.
    pub fn offset(&self) -> usize {
        self.span.offset()
    }

    pub fn kind(&self) -> &VersionErrorKind {
        &self.kind
    }
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum VersionErrorKind {
    #[error("Version string can't be longer than {} bytes.", MAX_LENGTH)]
    MaxLengthError,
    #[error("Incomplete input to version parser.")]
    IncompleteInput,
    #[error("Failed to parse an integer component of a version string: {0}")]
    ParseIntError(ParseIntError),
    #[error("Wildcards (`.*`) are only allowed with `==` and `!=`, not `{0}`.")]
    WildcardNotAllowed(Operator),
    #[error("Wildcards (`.*`) can only follow the release segment of a version.")]
    InvalidWildcard,
    #[error("Local version labels are only allowed with `==`, `!=` and `===`, not `{0}`.")]
    LocalNotAllowed(Operator),
    #[error("The compatible release operator `~=` needs at least two release segments.")]
    CompatibleReleaseTooShort,
    #[error("Failed to parse {0} component of version string.")]
    Context(&'static str),
    #[error("An unspecified error occurred.")]
    Other,
}

#[derive(Debug)]
pub(crate) struct VersionParseError<I> {
    pub(crate) input: I,
    pub(crate) context: Option<&'static str>,
    pub(crate) kind: Option<VersionErrorKind>,
}

impl<I> ParseError<I> for VersionParseError<I> {
    fn from_error_kind(input: I, _kind: ErrorKind) -> Self {
        Self {
            input,
            context: None,
            kind: None,
        }
    }

    fn append(_input: I, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<I> ContextError<I> for VersionParseError<I> {
    fn add_context(_input: I, ctx: &'static str, mut other: Self) -> Self {
        // Keep the innermost context; it names the component that failed.
        if other.context.is_none() {
            other.context = Some(ctx);
        }
        other
    }
}

impl<'a> FromExternalError<&'a str, VersionParseError<&'a str>> for VersionParseError<&'a str> {
    fn from_external_error(
        _input: &'a str,
        _kind: ErrorKind,
        e: VersionParseError<&'a str>,
    ) -> Self {
        e
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreReleaseKind {
    Alpha,
    Beta,
    Rc,
}

impl fmt::Display for PreReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreReleaseKind::Alpha => write!(f, "a"),
            PreReleaseKind::Beta => write!(f, "b"),
            PreReleaseKind::Rc => write!(f, "rc"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreRelease {
    pub kind: PreReleaseKind,
    pub number: u64,
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.number)
    }
}

/// One dot-separated piece of a local version label (`+ubuntu.1`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LocalSegment {
    Number(u64),
    Text(String),
}

impl fmt::Display for LocalSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalSegment::Number(n) => write!(f, "{}", n),
            LocalSegment::Text(s) => write!(f, "{}", s),
        }
    }
}

impl PartialOrd for LocalSegment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LocalSegment {
    fn cmp(&self, other: &Self) -> Ordering {
        use LocalSegment::*;
        match (self, other) {
            (Number(a), Number(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            // Numeric segments always sort after alphanumeric ones.
            (Number(_), Text(_)) => Ordering::Greater,
            (Text(_), Number(_)) => Ordering::Less,
        }
    }
}

/// A Python package version, as described by PEP 440.
///
/// Equality and ordering follow the PEP rather than the literal text:
/// `1.0` and `1.0.0` are equal, and `1.0.dev0 < 1.0a1 < 1.0 < 1.0.post1`.
#[derive(Clone, Debug)]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<PreRelease>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Vec<LocalSegment>,
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    DevOnly,
    Pre(PreRelease),
    Final,
}

impl Version {
    pub fn parse<S: AsRef<str>>(input: S) -> Result<Version, VersionError> {
        let input = input.as_ref();

        if input.len() > MAX_LENGTH {
            return Err(VersionError::new(
                input,
                0,
                VersionErrorKind::MaxLengthError,
            ));
        }

        match all_consuming(delimited(multispace0, version, multispace0))(input) {
            Ok((_, v)) => Ok(v),
            Err(err) => Err(VersionError::from_parse_error(input, err)),
        }
    }

    /// A final release made of the given segments, e.g. `[1, 2, 3]` for `1.2.3`.
    pub fn from_release(release: impl Into<Vec<u64>>) -> Self {
        Version {
            epoch: 0,
            release: release.into(),
            pre: None,
            post: None,
            dev: None,
            local: Vec::new(),
        }
    }

    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn with_pre(mut self, kind: PreReleaseKind, number: u64) -> Self {
        self.pre = Some(PreRelease { kind, number });
        self
    }

    pub fn with_post(mut self, post: u64) -> Self {
        self.post = Some(post);
        self
    }

    pub fn with_dev(mut self, dev: u64) -> Self {
        self.dev = Some(dev);
        self
    }

    pub fn with_local(mut self, local: Vec<LocalSegment>) -> Self {
        self.local = local;
        self
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn pre(&self) -> Option<PreRelease> {
        self.pre
    }

    pub fn post(&self) -> Option<u64> {
        self.post
    }

    pub fn dev(&self) -> Option<u64> {
        self.dev
    }

    pub fn local(&self) -> &[LocalSegment] {
        &self.local
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    pub fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    pub fn is_local(&self) -> bool {
        !self.local.is_empty()
    }

    /// This version with its local label removed.
    pub fn public(&self) -> Version {
        Version {
            local: Vec::new(),
            ..self.clone()
        }
    }

    /// Just the epoch and release segments.
    pub fn base_version(&self) -> Version {
        Version::from_release(self.release.clone()).with_epoch(self.epoch)
    }

    fn trimmed_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|n| *n != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.release[..end]
    }

    fn pre_key(&self) -> PreKey {
        match (self.pre, self.post, self.dev) {
            (Some(pre), _, _) => PreKey::Pre(pre),
            (None, None, Some(_)) => PreKey::DevOnly,
            _ => PreKey::Final,
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        self.trimmed_release().hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
        self.local.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Version) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Version) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            // A missing post release sorts before any post release.
            .then_with(|| self.post.cmp(&other.post))
            // A missing dev release sorts after any dev release.
            .then_with(|| (self.dev.is_none(), self.dev).cmp(&(other.dev.is_none(), other.dev)))
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VersionVisitor;

        impl<'de> Visitor<'de> for VersionVisitor {
            type Value = Version;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a version string")
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                Version::parse(v).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(VersionVisitor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }

        for (i, segment) in self.release.iter().enumerate() {
            if i != 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }

        if let Some(pre) = self.pre {
            write!(f, "{}", pre)?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{}", post)?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{}", dev)?;
        }

        for (i, segment) in self.local.iter().enumerate() {
            if i == 0 {
                write!(f, "+")?;
            } else {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }

        Ok(())
    }
}

impl std::str::FromStr for Version {
    type Err = VersionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl From<(u64, u64, u64)> for Version {
    fn from((major, minor, patch): (u64, u64, u64)) -> Self {
        Version::from_release(vec![major, minor, patch])
    }
}

type ParseResult<'a, T> = IResult<&'a str, T, VersionParseError<&'a str>>;

/// version := [ 'v' ] [ N '!' ] N ( '.' N )* [ pre ] [ post ] [ dev ] [ '+' local ]
pub(crate) fn version(input: &str) -> ParseResult<'_, Version> {
    context(
        "version",
        map(
            tuple((
                opt(tag_no_case("v")),
                opt(epoch),
                release,
                opt(pre_release),
                opt(post_release),
                opt(dev_release),
                opt(local),
            )),
            |(_, epoch, release, pre, post, dev, local)| Version {
                epoch: epoch.unwrap_or(0),
                release,
                pre,
                post,
                dev,
                local: local.unwrap_or_default(),
            },
        ),
    )(input)
}

fn epoch(input: &str) -> ParseResult<'_, u64> {
    context("epoch", terminated(number, char('!')))(input)
}

fn release(input: &str) -> ParseResult<'_, Vec<u64>> {
    context("release", separated_list1(char('.'), number))(input)
}

/// pre := [ sep ] ( 'a' | 'b' | 'rc' | aliases ) [ sep ] [ N ]
fn pre_release(input: &str) -> ParseResult<'_, PreRelease> {
    context(
        "pre-release",
        map(
            tuple((opt(separator), pre_release_kind, opt(separator), opt(number))),
            |(_, kind, _, number)| PreRelease {
                kind,
                number: number.unwrap_or(0),
            },
        ),
    )(input)
}

fn pre_release_kind(input: &str) -> ParseResult<'_, PreReleaseKind> {
    // Longer spellings first, so `alpha` isn't read as `a` + garbage.
    alt((
        value(PreReleaseKind::Alpha, tag_no_case("alpha")),
        value(PreReleaseKind::Beta, tag_no_case("beta")),
        value(PreReleaseKind::Rc, tag_no_case("preview")),
        value(PreReleaseKind::Rc, tag_no_case("pre")),
        value(PreReleaseKind::Rc, tag_no_case("rc")),
        value(PreReleaseKind::Alpha, tag_no_case("a")),
        value(PreReleaseKind::Beta, tag_no_case("b")),
        value(PreReleaseKind::Rc, tag_no_case("c")),
    ))(input)
}

/// post := ( '-' N ) | ( [ sep ] ( 'post' | 'rev' | 'r' ) [ sep ] [ N ] )
fn post_release(input: &str) -> ParseResult<'_, u64> {
    context(
        "post-release",
        alt((
            preceded(char('-'), number),
            map(
                tuple((
                    opt(separator),
                    alt((tag_no_case("post"), tag_no_case("rev"), tag_no_case("r"))),
                    opt(separator),
                    opt(number),
                )),
                |(_, _, _, number)| number.unwrap_or(0),
            ),
        )),
    )(input)
}

/// dev := [ sep ] 'dev' [ sep ] [ N ]
fn dev_release(input: &str) -> ParseResult<'_, u64> {
    context(
        "dev-release",
        map(
            tuple((opt(separator), tag_no_case("dev"), opt(separator), opt(number))),
            |(_, _, _, number)| number.unwrap_or(0),
        ),
    )(input)
}

fn local(input: &str) -> ParseResult<'_, Vec<LocalSegment>> {
    context(
        "local version",
        preceded(char('+'), separated_list1(separator, local_segment)),
    )(input)
}

fn local_segment(input: &str) -> ParseResult<'_, LocalSegment> {
    map(take_while1(|c: char| c.is_ascii_alphanumeric()), |s: &str| {
        s.parse::<u64>()
            .map(LocalSegment::Number)
            .unwrap_or_else(|_| LocalSegment::Text(s.to_ascii_lowercase()))
    })(input)
}

fn separator(input: &str) -> ParseResult<'_, char> {
    one_of("-_.")(input)
}

pub(crate) fn number(input: &str) -> ParseResult<'_, u64> {
    let (rest, raw) = digit1(input)?;
    match raw.parse::<u64>() {
        Ok(n) => Ok((rest, n)),
        // Overflow is fatal: backtracking would only hide it behind a vaguer error.
        Err(e) => Err(Err::Failure(VersionParseError {
            input,
            context: Some("number component"),
            kind: Some(VersionErrorKind::ParseIntError(e)),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn v(input: &str) -> Version {
        Version::parse(input).unwrap()
    }

    #[test]
    fn trivial_version_number() {
        let version = v("1.33.0");
        assert_eq!(version.release(), &[1, 33, 0]);
        assert_eq!(version.epoch(), 0);
        assert_eq!(version.pre(), None);
        assert_eq!(version.to_string(), "1.33.0");
    }

    #[test]
    fn full_version() {
        let version = v("2!1.0rc3.post4.dev5+ubuntu.1");
        assert_eq!(version.epoch(), 2);
        assert_eq!(
            version.pre(),
            Some(PreRelease {
                kind: PreReleaseKind::Rc,
                number: 3
            })
        );
        assert_eq!(version.post(), Some(4));
        assert_eq!(version.dev(), Some(5));
        assert_eq!(
            version.local(),
            &[LocalSegment::Text("ubuntu".into()), LocalSegment::Number(1)]
        );
        assert_eq!(version.to_string(), "2!1.0rc3.post4.dev5+ubuntu.1");
    }

    #[test]
    fn normalizes_alternate_spellings() {
        assert_eq!(v("1.0-alpha.1").to_string(), "1.0a1");
        assert_eq!(v("1.0.PREVIEW2").to_string(), "1.0rc2");
        assert_eq!(v("1.0c1").to_string(), "1.0rc1");
        assert_eq!(v("1.0-1").to_string(), "1.0.post1");
        assert_eq!(v("1.0.rev").to_string(), "1.0.post0");
        assert_eq!(v("1.0_dev").to_string(), "1.0.dev0");
        assert_eq!(v("v1.2").to_string(), "1.2");
        assert_eq!(v("  1.2\n").to_string(), "1.2");
        assert_eq!(v("1.0+Local_007").to_string(), "1.0+local.7");
    }

    #[test]
    fn trailing_zeros_are_insignificant() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0.0.0"));
        assert!(v("1.0") < v("1.0.1"));
    }

    #[test]
    fn ordering() {
        let ordered = [
            "1.0.dev456",
            "1.0a1",
            "1.0a2.dev456",
            "1.0a12",
            "1.0b1.dev456",
            "1.0b2",
            "1.0b2.post345",
            "1.0rc1",
            "1.0",
            "1.0+abc.5",
            "1.0+5",
            "1.0.post456.dev34",
            "1.0.post456",
            "1.1.dev1",
            "1!0.5",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn public_and_base() {
        let version = v("1!2.3rc1.post2+local");
        assert_eq!(version.public().to_string(), "1!2.3rc1.post2");
        assert_eq!(version.base_version().to_string(), "1!2.3");
        assert!(version.is_prerelease());
        assert!(version.is_postrelease());
        assert!(version.is_local());
    }

    #[test]
    fn invalid_versions() {
        for bad in ["", "foo", "1.0.", "1..0", "1.0+", "1.0 1", "1.0-dev-1-", "1.0!"] {
            assert!(Version::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn error_offset_points_at_problem() {
        let err = Version::parse("1.0$").unwrap_err();
        assert_eq!(err.offset(), 3);
        assert_eq!(err.input(), "1.0$");
    }

    #[test]
    fn integer_overflow() {
        let err = Version::parse("1.99999999999999999999999").unwrap_err();
        assert!(matches!(err.kind(), VersionErrorKind::ParseIntError(_)));
    }

    #[test]
    fn version_string_limited_to_256_bytes() {
        let long = (0..300).map(|_| "1").collect::<Vec<_>>().join(".");
        let err = Version::parse(long).unwrap_err();
        assert_eq!(err.kind(), &VersionErrorKind::MaxLengthError);
    }

    #[test]
    fn serde_roundtrip() {
        let version = v("1.0rc1");
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"1.0rc1\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
    }
}
