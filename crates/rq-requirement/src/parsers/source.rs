use nom::bytes::complete::{take_till, take_till1};
use nom::character::complete::{char, space0};
use nom::combinator::{cut, map_res, rest};
use nom::error::context;
use nom::sequence::preceded;
use nom::Err;
use rq_version::VersionSpecifiers;
use url::Url;

use crate::error::{RequirementErrorKind, RequirementParseError};
use crate::parsers::ParseResult;
use crate::RequirementSource;

/// url-source := '@' ws url
///
/// The URL runs until the next whitespace, so a marker after a URL needs a
/// space before its `;`.
pub(crate) fn url_source(input: &str) -> ParseResult<'_, RequirementSource> {
    let (input, _) = char('@')(input)?;
    context(
        "source URL",
        cut(preceded(
            space0,
            map_res(take_till1(|c: char| c.is_whitespace()), |raw: &str| {
                Url::parse(raw).map(|url| RequirementSource::Url { url })
            }),
        )),
    )(input)
}

/// index-source := [ '(' ] specifiers [ ')' ]
///
/// Everything up to the marker separator belongs to the version constraint.
/// An empty constraint means "whatever the index has".
pub(crate) fn index_source(input: &str) -> ParseResult<'_, RequirementSource> {
    let (rest, chunk) = take_till(|c| c == ';')(input)?;
    let trimmed = chunk.trim_end();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    match VersionSpecifiers::parse(inner) {
        Ok(specifiers) => Ok((rest, RequirementSource::Index { specifiers })),
        Err(e) => {
            let offset = e.offset().min(inner.len());
            Err(Err::Failure(RequirementParseError {
                input: &inner[offset..],
                context: Some("version constraint"),
                kind: Some(RequirementErrorKind::InvalidVersion(e)),
            }))
        }
    }
}

/// marker := ';' .+
pub(crate) fn marker(input: &str) -> ParseResult<'_, String> {
    let (input, _) = char(';')(input)?;
    let (remaining, raw) = rest(input)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Err::Failure(RequirementParseError {
            input,
            context: Some("environment marker"),
            kind: Some(RequirementErrorKind::EmptyMarker),
        }));
    }
    Ok((remaining, raw.into()))
}
