use std::fmt;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char, space0};
use nom::combinator::{all_consuming, opt, value};
use nom::error::context;
use nom::multi::separated_list1;
use nom::sequence::delimited;
use nom::{Err, IResult};
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};

use crate::{version, Version, VersionError, VersionErrorKind, VersionParseError, MAX_LENGTH};

type ParseResult<'a, T> = IResult<&'a str, T, VersionParseError<&'a str>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<=`
    LessThanEqual,
    /// `>=`
    GreaterThanEqual,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `~=`
    Compatible,
    /// `===`
    ArbitraryEqual,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operator::*;
        let op = match self {
            Equal => "==",
            NotEqual => "!=",
            LessThanEqual => "<=",
            GreaterThanEqual => ">=",
            LessThan => "<",
            GreaterThan => ">",
            Compatible => "~=",
            ArbitraryEqual => "===",
        };
        f.write_str(op)
    }
}

/// A single clause of a version constraint, such as `>=1.2` or `==3.7.*`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VersionSpecifier {
    Compare {
        operator: Operator,
        version: Version,
        /// `==1.2.*` style prefix match.
        wildcard: bool,
    },
    /// `===literal`. The literal doesn't need to be a valid version.
    Arbitrary(String),
}

impl VersionSpecifier {
    pub fn parse<S: AsRef<str>>(input: S) -> Result<Self, VersionError> {
        let input = input.as_ref();
        match all_consuming(delimited(space0, specifier, space0))(input) {
            Ok((_, spec)) => Ok(spec),
            Err(err) => Err(VersionError::from_parse_error(input, err)),
        }
    }

    pub fn operator(&self) -> Operator {
        match self {
            VersionSpecifier::Compare { operator, .. } => *operator,
            VersionSpecifier::Arbitrary(_) => Operator::ArbitraryEqual,
        }
    }

    pub fn version(&self) -> Option<&Version> {
        match self {
            VersionSpecifier::Compare { version, .. } => Some(version),
            VersionSpecifier::Arbitrary(_) => None,
        }
    }

    /// Whether this specifier allows exactly one version.
    pub fn is_pin(&self) -> bool {
        match self {
            VersionSpecifier::Compare {
                operator, wildcard, ..
            } => *operator == Operator::Equal && !wildcard,
            VersionSpecifier::Arbitrary(_) => true,
        }
    }

    /// Whether `candidate` satisfies this specifier. Pre-releases are not
    /// filtered out here; callers that care should check
    /// [`Version::is_prerelease`] themselves.
    pub fn contains(&self, candidate: &Version) -> bool {
        use Operator::*;
        let (operator, version, wildcard) = match self {
            VersionSpecifier::Arbitrary(literal) => {
                return candidate.to_string().eq_ignore_ascii_case(literal.trim())
            }
            VersionSpecifier::Compare {
                operator,
                version,
                wildcard,
            } => (*operator, version, *wildcard),
        };
        match operator {
            Equal if wildcard => prefix_matches(candidate, version.epoch(), version.release()),
            NotEqual if wildcard => !prefix_matches(candidate, version.epoch(), version.release()),
            Equal => exact_matches(candidate, version),
            NotEqual => !exact_matches(candidate, version),
            LessThanEqual => candidate.public() <= *version,
            GreaterThanEqual => candidate.public() >= *version,
            LessThan => {
                // `<1.0` shouldn't let `1.0rc1` through.
                candidate.public() < *version
                    && !(!version.is_prerelease()
                        && candidate.is_prerelease()
                        && candidate.base_version() == version.base_version())
            }
            GreaterThan => {
                // `>1.0` shouldn't let `1.0.post1` or `1.0+local` through.
                candidate.public() > *version
                    && !(!version.is_postrelease()
                        && candidate.is_postrelease()
                        && candidate.base_version() == version.base_version())
                    && !(candidate.is_local()
                        && candidate.base_version() == version.base_version())
            }
            Compatible => {
                let release = version.release();
                candidate.public() >= *version
                    && prefix_matches(candidate, version.epoch(), &release[..release.len().saturating_sub(1)])
            }
            ArbitraryEqual => candidate
                .to_string()
                .eq_ignore_ascii_case(&version.to_string()),
        }
    }
}

fn exact_matches(candidate: &Version, version: &Version) -> bool {
    if version.is_local() {
        candidate == version
    } else {
        candidate.public() == *version
    }
}

fn prefix_matches(candidate: &Version, epoch: u64, prefix: &[u64]) -> bool {
    candidate.epoch() == epoch
        && prefix
            .iter()
            .enumerate()
            .all(|(i, seg)| candidate.release().get(i).copied().unwrap_or(0) == *seg)
}

impl fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpecifier::Compare {
                operator,
                version,
                wildcard,
            } => {
                write!(f, "{}{}", operator, version)?;
                if *wildcard {
                    write!(f, ".*")?;
                }
                Ok(())
            }
            VersionSpecifier::Arbitrary(literal) => write!(f, "==={}", literal),
        }
    }
}

impl std::str::FromStr for VersionSpecifier {
    type Err = VersionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionSpecifier::parse(s)
    }
}

/// A comma-separated set of [`VersionSpecifier`]s. A version must satisfy
/// every one of them. An empty set allows any version.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct VersionSpecifiers(Vec<VersionSpecifier>);

impl VersionSpecifiers {
    pub fn parse<S: AsRef<str>>(input: S) -> Result<Self, VersionError> {
        let input = input.as_ref();
        if input.len() > MAX_LENGTH {
            return Err(VersionError::new(
                input,
                0,
                VersionErrorKind::MaxLengthError,
            ));
        }
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        match all_consuming(delimited(space0, specifiers, space0))(input) {
            Ok((_, specs)) => Ok(VersionSpecifiers(specs)),
            Err(err) => Err(VersionError::from_parse_error(input, err)),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VersionSpecifier> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, candidate: &Version) -> bool {
        self.0.iter().all(|spec| spec.contains(candidate))
    }

    /// The single specifier of an exact pin (`==1.2.3` or `===foo`), if
    /// that's what this set is.
    pub fn pin(&self) -> Option<&VersionSpecifier> {
        match &self.0[..] {
            [spec] if spec.is_pin() => Some(spec),
            _ => None,
        }
    }
}

impl From<Vec<VersionSpecifier>> for VersionSpecifiers {
    fn from(specs: Vec<VersionSpecifier>) -> Self {
        VersionSpecifiers(specs)
    }
}

impl FromIterator<VersionSpecifier> for VersionSpecifiers {
    fn from_iter<T: IntoIterator<Item = VersionSpecifier>>(iter: T) -> Self {
        VersionSpecifiers(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a VersionSpecifiers {
    type Item = &'a VersionSpecifier;
    type IntoIter = std::slice::Iter<'a, VersionSpecifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for VersionSpecifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, spec) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", spec)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for VersionSpecifiers {
    type Err = VersionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionSpecifiers::parse(s)
    }
}

impl Serialize for VersionSpecifiers {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionSpecifiers {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SpecifiersVisitor;

        impl<'de> Visitor<'de> for SpecifiersVisitor {
            type Value = VersionSpecifiers;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a comma-separated list of version specifiers")
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                VersionSpecifiers::parse(v).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(SpecifiersVisitor)
    }
}

/// specifiers := specifier ( ',' specifier )*
fn specifiers(input: &str) -> ParseResult<'_, Vec<VersionSpecifier>> {
    context(
        "version specifiers",
        separated_list1(delimited(space0, char(','), space0), specifier),
    )(input)
}

/// specifier := operator ws ( version [ '.*' ] | arbitrary )
fn specifier(input: &str) -> ParseResult<'_, VersionSpecifier> {
    let (rest, operator) = operator(input)?;
    let (rest, _) = space0(rest)?;

    if operator == Operator::ArbitraryEqual {
        let (rest, literal) = context(
            "arbitrary version",
            take_while1(|c: char| !c.is_whitespace() && c != ',' && c != ';' && c != ')'),
        )(rest)?;
        return Ok((rest, VersionSpecifier::Arbitrary(literal.into())));
    }

    let version_start = rest;
    let (rest, parsed) = version(rest)?;
    let (after, star) = opt(tag(".*"))(rest)?;
    let wildcard = star.is_some();

    if wildcard {
        if !matches!(operator, Operator::Equal | Operator::NotEqual) {
            return fail(rest, VersionErrorKind::WildcardNotAllowed(operator));
        }
        if parsed.pre().is_some()
            || parsed.post().is_some()
            || parsed.dev().is_some()
            || parsed.is_local()
        {
            return fail(rest, VersionErrorKind::InvalidWildcard);
        }
    }
    if parsed.is_local() && !matches!(operator, Operator::Equal | Operator::NotEqual) {
        return fail(version_start, VersionErrorKind::LocalNotAllowed(operator));
    }
    if operator == Operator::Compatible && parsed.release().len() < 2 {
        return fail(version_start, VersionErrorKind::CompatibleReleaseTooShort);
    }

    Ok((
        after,
        VersionSpecifier::Compare {
            operator,
            version: parsed,
            wildcard,
        },
    ))
}

fn fail<T>(input: &str, kind: VersionErrorKind) -> ParseResult<'_, T> {
    Err(Err::Failure(VersionParseError {
        input,
        context: None,
        kind: Some(kind),
    }))
}

fn operator(input: &str) -> ParseResult<'_, Operator> {
    context(
        "operator",
        alt((
            value(Operator::ArbitraryEqual, tag("===")),
            value(Operator::Compatible, tag("~=")),
            value(Operator::Equal, tag("==")),
            value(Operator::NotEqual, tag("!=")),
            value(Operator::LessThanEqual, tag("<=")),
            value(Operator::GreaterThanEqual, tag(">=")),
            value(Operator::LessThan, tag("<")),
            value(Operator::GreaterThan, tag(">")),
        )),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn single_pin() {
        let specs = VersionSpecifiers::parse("==1.33.0").unwrap();
        assert_eq!(specs.len(), 1);
        let pin = specs.pin().unwrap();
        assert_eq!(pin.operator(), Operator::Equal);
        assert_eq!(pin.version(), Some(&Version::from((1, 33, 0))));
        assert_eq!(specs.to_string(), "==1.33.0");
    }

    #[test]
    fn several_clauses() {
        let specs = VersionSpecifiers::parse(" >= 1.0 , < 2.0,!=1.5.*").unwrap();
        assert_eq!(specs.to_string(), ">=1.0,<2.0,!=1.5.*");
        assert!(specs.pin().is_none());
    }

    #[test]
    fn empty_allows_anything() {
        let specs = VersionSpecifiers::parse("  ").unwrap();
        assert!(specs.is_empty());
        assert!(specs.contains(&Version::parse("0.0.1").unwrap()));
    }

    #[test]
    fn specifier_list_length_is_limited() {
        let long = (0..100).map(|_| ">=1.0").collect::<Vec<_>>().join(",");
        let err = VersionSpecifiers::parse(&long).unwrap_err();
        assert_eq!(err.kind(), &VersionErrorKind::MaxLengthError);
        assert!(VersionSpecifiers::parse(">=1.0,<2.0").is_ok());
    }

    #[test]
    fn wildcard_rules() {
        assert!(VersionSpecifier::parse(">=1.*").is_err());
        assert!(VersionSpecifier::parse("==1.0rc1.*").is_err());
        let err = VersionSpecifier::parse("~=1.*").unwrap_err();
        assert_eq!(
            err.kind(),
            &VersionErrorKind::WildcardNotAllowed(Operator::Compatible)
        );
    }

    #[test]
    fn compatible_release_needs_two_segments() {
        let err = VersionSpecifier::parse("~=1").unwrap_err();
        assert_eq!(err.kind(), &VersionErrorKind::CompatibleReleaseTooShort);
        assert_eq!(err.offset(), 2);
    }

    #[test]
    fn local_only_with_equality() {
        assert!(VersionSpecifier::parse("==1.0+local").is_ok());
        let err = VersionSpecifier::parse(">=1.0+local").unwrap_err();
        assert_eq!(
            err.kind(),
            &VersionErrorKind::LocalNotAllowed(Operator::GreaterThanEqual)
        );
    }

    #[test]
    fn unknown_operator() {
        let err = VersionSpecifier::parse("=>1.0").unwrap_err();
        assert_eq!(err.offset(), 0);
    }

    #[test]
    fn arbitrary_equality() {
        let spec = VersionSpecifier::parse("===foobar").unwrap();
        assert_eq!(spec, VersionSpecifier::Arbitrary("foobar".into()));
        assert!(spec.is_pin());
        assert!(spec.version().is_none());
        assert!(VersionSpecifier::parse("===1.0")
            .unwrap()
            .contains(&Version::parse("1.0").unwrap()));
    }
}
