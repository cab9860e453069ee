use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::space1;
use nom::combinator::{all_consuming, eof, value};
use nom::error::Error as NomError;
use nom::sequence::terminated;
use nom::IResult;
use url::Url;

use crate::error::LineErrorKind;
use crate::EntryKind;

#[derive(Clone, Copy, Debug)]
enum Flag {
    Requirement,
    Constraint,
    Editable,
    IndexUrl,
    ExtraIndexUrl,
    FindLinks,
}

impl Flag {
    fn long(self) -> &'static str {
        match self {
            Flag::Requirement => "--requirement",
            Flag::Constraint => "--constraint",
            Flag::Editable => "--editable",
            Flag::IndexUrl => "--index-url",
            Flag::ExtraIndexUrl => "--extra-index-url",
            Flag::FindLinks => "--find-links",
        }
    }
}

/// Parses an option line (one starting with `-`). Options we don't know
/// about are kept verbatim.
pub(crate) fn parse_option(body: &str) -> Result<EntryKind, LineErrorKind> {
    if all_consuming(tag::<_, _, NomError<&str>>("--no-index"))(body).is_ok() {
        return Ok(EntryKind::NoIndex);
    }
    let (rest, flag) = match flag(body) {
        Ok(parsed) => parsed,
        Err(_) => return Ok(EntryKind::Option(body.into())),
    };
    let arg = rest.trim();
    if arg.is_empty() {
        return Err(LineErrorKind::MissingValue(flag.long()));
    }
    Ok(match flag {
        Flag::Requirement => EntryKind::Include(arg.into()),
        Flag::Constraint => EntryKind::Constraints(arg.into()),
        Flag::Editable => EntryKind::Editable(arg.into()),
        Flag::IndexUrl => EntryKind::IndexUrl(Url::parse(arg).map_err(LineErrorKind::InvalidUrl)?),
        Flag::ExtraIndexUrl => {
            EntryKind::ExtraIndexUrl(Url::parse(arg).map_err(LineErrorKind::InvalidUrl)?)
        }
        Flag::FindLinks => EntryKind::FindLinks(arg.into()),
    })
}

/// flag := long ( '=' | ws | eof ) | short
fn flag(input: &str) -> IResult<&str, Flag> {
    alt((
        value(Flag::Requirement, long_or_short("--requirement", "-r")),
        value(Flag::Constraint, long_or_short("--constraint", "-c")),
        value(Flag::Editable, long_or_short("--editable", "-e")),
        value(Flag::ExtraIndexUrl, long("--extra-index-url")),
        value(Flag::IndexUrl, long_or_short("--index-url", "-i")),
        value(Flag::FindLinks, long_or_short("--find-links", "-f")),
    ))(input)
}

fn long<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(name), alt((tag("="), space1, eof)))
}

fn long_or_short<'a>(
    long_name: &'static str,
    short: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    alt((long(long_name), tag(short)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn includes() {
        for line in ["-r base.txt", "-rbase.txt", "--requirement base.txt", "--requirement=base.txt"] {
            assert_eq!(
                parse_option(line).unwrap(),
                EntryKind::Include("base.txt".into()),
                "{line}"
            );
        }
        assert_eq!(
            parse_option("-c constraints.txt").unwrap(),
            EntryKind::Constraints("constraints.txt".into())
        );
    }

    #[test]
    fn index_options() {
        assert_eq!(
            parse_option("--index-url https://pypi.org/simple").unwrap(),
            EntryKind::IndexUrl(Url::parse("https://pypi.org/simple").unwrap())
        );
        assert_eq!(
            parse_option("--extra-index-url=https://download.pytorch.org/whl/cpu").unwrap(),
            EntryKind::ExtraIndexUrl(Url::parse("https://download.pytorch.org/whl/cpu").unwrap())
        );
        assert_eq!(parse_option("--no-index").unwrap(), EntryKind::NoIndex);
        assert!(matches!(
            parse_option("-i not-a-url"),
            Err(LineErrorKind::InvalidUrl(_))
        ));
    }

    #[test]
    fn missing_values() {
        assert!(matches!(
            parse_option("-r"),
            Err(LineErrorKind::MissingValue("--requirement"))
        ));
        assert!(matches!(
            parse_option("--editable   "),
            Err(LineErrorKind::MissingValue("--editable"))
        ));
    }

    #[test]
    fn unknown_options_are_kept() {
        assert_eq!(
            parse_option("--prefer-binary").unwrap(),
            EntryKind::Option("--prefer-binary".into())
        );
        assert_eq!(
            parse_option("--trusted-host example.com").unwrap(),
            EntryKind::Option("--trusted-host example.com".into())
        );
    }
}
