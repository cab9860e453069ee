use nom::IResult;

use crate::error::RequirementParseError;

pub(crate) mod name;
pub(crate) mod requirement;
pub(crate) mod source;

pub(crate) type ParseResult<'a, T> = IResult<&'a str, T, RequirementParseError<&'a str>>;
