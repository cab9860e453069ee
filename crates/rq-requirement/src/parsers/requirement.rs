use nom::branch::alt;
use nom::character::complete::space0;
use nom::combinator::opt;
use nom::error::context;

use crate::parsers::name::{extras, name};
use crate::parsers::source::{index_source, marker, url_source};
use crate::parsers::ParseResult;
use crate::{PackageName, Requirement};

/// requirement := ws name ws [ extras ] ws ( url-source | index-source ) ws [ marker ]
pub(crate) fn requirement(input: &str) -> ParseResult<'_, Requirement> {
    let (input, _) = space0(input)?;
    let (input, raw_name) = name(input)?;
    let (input, _) = space0(input)?;
    let (input, extras) = opt(extras)(input)?;
    let (input, _) = space0(input)?;
    let (input, source) = context("requirement", alt((url_source, index_source)))(input)?;
    let (input, _) = space0(input)?;
    let (input, marker) = opt(marker)(input)?;
    Ok((
        input,
        Requirement {
            name: PackageName::from_parsed(raw_name),
            extras: extras
                .unwrap_or_default()
                .into_iter()
                .map(String::from)
                .collect(),
            source,
            marker,
        },
    ))
}
