use miette::{Diagnostic, SourceSpan};
use nom::error::{ContextError, ErrorKind, FromExternalError, ParseError};
use nom::Err;
use rq_version::VersionError;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("Error while parsing `{input}`: {kind}")]
#[diagnostic(code(rq::requirement::parse))]
pub struct RequirementError {
    #[source_code]
    pub input: String,
    #[label("here")]
    pub span: SourceSpan,
    pub kind: RequirementErrorKind,
}

impl RequirementError {
    pub(crate) fn new(input: &str, offset: usize, kind: RequirementErrorKind) -> Self {
        let len = if offset < input.len() { 1 } else { 0 };
        RequirementError {
            input: input.into(),
            span: (offset, len).into(),
            kind,
        }
    }

    pub(crate) fn from_parse_error(input: &str, err: Err<RequirementParseError<&str>>) -> Self {
        match err {
            Err::Error(e) | Err::Failure(e) => {
                let offset = e.input.as_ptr() as usize - input.as_ptr() as usize;
                let kind = if let Some(kind) = e.kind {
                    kind
                } else if let Some(ctx) = e.context {
                    RequirementErrorKind::Context(ctx)
                } else {
                    RequirementErrorKind::Other
                };
                RequirementError::new(input, offset, kind)
            }
            Err::Incomplete(_) => RequirementError::new(
                input,
                input.len().saturating_sub(1),
                RequirementErrorKind::IncompleteInput,
            ),
        }
    }

    /// Byte offset into the input where the problem was found.
    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}

#[derive(Debug, Error)]
pub enum RequirementErrorKind {
    #[error("Package names must start and end with a letter or digit, and may only contain letters, digits, `-`, `_` and `.`: `{0}`")]
    InvalidName(String),
    #[error("Invalid source URL: {0}")]
    InvalidUrl(url::ParseError),
    #[error("Invalid version constraint: {}", .0.kind())]
    InvalidVersion(VersionError),
    #[error("Environment marker after `;` is empty.")]
    EmptyMarker,
    #[error("Incomplete input to requirement parser.")]
    IncompleteInput,
    #[error("Failed to parse {0}.")]
    Context(&'static str),
    #[error("An unspecified error occurred.")]
    Other,
}

#[derive(Debug)]
pub(crate) struct RequirementParseError<I> {
    pub(crate) input: I,
    pub(crate) context: Option<&'static str>,
    pub(crate) kind: Option<RequirementErrorKind>,
}

impl<I> ParseError<I> for RequirementParseError<I> {
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

impl<I> ContextError<I> for RequirementParseError<I> {
    fn add_context(_input: I, ctx: &'static str, mut other: Self) -> Self {
        if other.context.is_none() {
            other.context = Some(ctx);
        }
        other
    }
}

impl<'a> FromExternalError<&'a str, RequirementParseError<&'a str>>
    for RequirementParseError<&'a str>
{
    fn from_external_error(
        _input: &'a str,
        _kind: ErrorKind,
        e: RequirementParseError<&'a str>,
    ) -> Self {
        e
    }
}

impl<'a> FromExternalError<&'a str, url::ParseError> for RequirementParseError<&'a str> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, e: url::ParseError) -> Self {
        RequirementParseError {
            input,
            context: Some("source URL"),
            kind: Some(RequirementErrorKind::InvalidUrl(e)),
        }
    }
}
