/// A manifest line after `\` continuations have been joined.
#[derive(Debug)]
pub(crate) struct LogicalLine {
    /// 1-based number of the first physical line.
    pub(crate) line: usize,
    pub(crate) text: String,
    /// `(offset in text, offset in source)` for each physical line that
    /// went into `text`.
    segments: Vec<(usize, usize)>,
}

impl LogicalLine {
    /// Maps a byte offset in `text` back to a byte offset in the source.
    pub(crate) fn source_offset(&self, offset: usize) -> usize {
        let (text_start, source_start) = self
            .segments
            .iter()
            .rev()
            .find(|(text_start, _)| *text_start <= offset)
            .copied()
            .unwrap_or((0, 0));
        source_start + (offset - text_start)
    }

    /// Source span `(offset, len)` covering `text[start..end]`.
    pub(crate) fn source_span(&self, start: usize, end: usize) -> (usize, usize) {
        let from = self.source_offset(start);
        if end <= start {
            return (from, 0);
        }
        let last = self.text[start..end]
            .chars()
            .last()
            .map(char::len_utf8)
            .unwrap_or(0);
        let to = self.source_offset(end - last) + last;
        (from, to - from)
    }
}

/// Splits `source` into logical lines. A line ending in `\` continues on the
/// next one, unless it has a comment anywhere on it.
pub(crate) fn logical_lines(source: &str) -> Vec<LogicalLine> {
    let mut out = Vec::new();
    let mut current: Option<LogicalLine> = None;
    let mut offset = 0;
    for (idx, raw) in source.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += raw.len();
        let content = raw.strip_suffix('\n').unwrap_or(raw);
        let content = content.strip_suffix('\r').unwrap_or(content);
        let has_comment = strip_comment(content).len() != content.len();
        let (body, continues) = match content.strip_suffix('\\') {
            Some(body) if !has_comment => (body, true),
            _ => (content, false),
        };
        let logical = current.get_or_insert_with(|| LogicalLine {
            line: idx + 1,
            text: String::new(),
            segments: Vec::new(),
        });
        logical.segments.push((logical.text.len(), start));
        logical.text.push_str(body);
        if !continues {
            out.extend(current.take());
        }
    }
    // A trailing `\` on the last line just ends the file.
    out.extend(current.take());
    out
}

/// Cuts `text` at the first `#` that starts the line or follows whitespace.
/// A `#` glued to other text (a URL fragment, say) is kept.
pub(crate) fn strip_comment(text: &str) -> &str {
    let mut after_space = true;
    for (i, c) in text.char_indices() {
        if c == '#' && after_space {
            return &text[..i];
        }
        after_space = c.is_whitespace();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn joins_continuations() {
        let src = "a\nb>=1,\\\n  <2\nc\n";
        let lines = logical_lines(src);
        let texts = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["a", "b>=1,  <2", "c"]);
        assert_eq!(lines[1].line, 2);
        assert_eq!(lines[2].line, 4);
        // `<` in the logical line lives on the third physical line.
        let lt = lines[1].text.find('<').unwrap();
        assert_eq!(&src[lines[1].source_offset(lt)..][..1], "<");
    }

    #[test]
    fn comments_do_not_continue() {
        let lines = logical_lines("# note \\\nfoo\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].text, "foo");
    }

    #[test]
    fn inline_comments_do_not_continue() {
        let lines = logical_lines("foo==1.0  # see docs \\\nbar==2.0\n");
        let texts = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["foo==1.0  # see docs \\", "bar==2.0"]);
        assert_eq!(lines[1].line, 2);
        // A `#` glued to a URL is not a comment, so the line still continues.
        let lines = logical_lines("pkg @ https://x.org/p.zip#egg=pkg \\\n ; os_name == 'nt'\n");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn crlf_and_trailing_backslash() {
        let lines = logical_lines("foo\r\nbar\\");
        let texts = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["foo", "bar"]);
    }

    #[test]
    fn spans_cross_continuations() {
        let src = "pkg>=1,\\\n<2\n";
        let lines = logical_lines(src);
        let (offset, len) = lines[0].source_span(0, lines[0].text.len());
        assert_eq!(&src[offset..offset + len], "pkg>=1,\\\n<2");
    }

    #[test]
    fn inline_comments() {
        assert_eq!(strip_comment("foo==1.0  # pinned"), "foo==1.0  ");
        assert_eq!(strip_comment("# whole line"), "");
        assert_eq!(
            strip_comment("pkg @ https://example.com/x.tar.gz#sha256=abc"),
            "pkg @ https://example.com/x.tar.gz#sha256=abc"
        );
    }
}
