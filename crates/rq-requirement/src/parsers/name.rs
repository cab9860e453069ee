use nom::bytes::complete::take_while1;
use nom::character::complete::{char, space0};
use nom::combinator::{cut, map_res};
use nom::error::context;
use nom::multi::separated_list0;
use nom::sequence::{delimited, pair};

use crate::error::{RequirementErrorKind, RequirementParseError};
use crate::parsers::ParseResult;

/// name := [A-Za-z0-9] ( [A-Za-z0-9._-]* [A-Za-z0-9] )?
pub(crate) fn name(input: &str) -> ParseResult<'_, &str> {
    context(
        "package name",
        map_res(
            take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')),
            |raw: &str| {
                let starts = raw.chars().next().map_or(false, |c| c.is_ascii_alphanumeric());
                let ends = raw.chars().last().map_or(false, |c| c.is_ascii_alphanumeric());
                if starts && ends {
                    Ok(raw)
                } else {
                    Err(RequirementParseError {
                        input: raw,
                        context: None,
                        kind: Some(RequirementErrorKind::InvalidName(raw.into())),
                    })
                }
            },
        ),
    )(input)
}

/// extras := '[' [ name ( ',' name )* ] ']'
pub(crate) fn extras(input: &str) -> ParseResult<'_, Vec<&str>> {
    let (input, _) = char('[')(input)?;
    context(
        "extras",
        cut(delimited(
            space0,
            separated_list0(delimited(space0, char(','), space0), name),
            pair(space0, char(']')),
        )),
    )(input)
}
