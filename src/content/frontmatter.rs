//! Front-matter splitting
//!
//! A document may start with a metadata block. Two delimiter conventions are
//! understood, selected by [`FrontMatterStyle`]:
//!
//! * `Fenced`: the first non-blank line is `---` and the block runs to the
//!   next line that is exactly `---`. The closing line may be the last line of
//!   the file without a newline. A lone opening delimiter is not front-matter.
//! * `Split`: everything before the first `\n---\n` is metadata.
//!
//! Splitting never parses the block; see [`super::metadata::decode`].

use std::io::{self, BufRead, Cursor, Read};

use crate::config::FrontMatterStyle;

const DELIMITER: &str = "---";
const BOM: char = '\u{feff}';

/// Split `raw` into `(metadata, body)` using the given convention.
///
/// When no complete block is found the metadata is empty and the body is the
/// whole document.
pub fn split(raw: &str, style: FrontMatterStyle) -> (&str, &str) {
    match style {
        FrontMatterStyle::Fenced => split_fenced(raw),
        FrontMatterStyle::Split => split_at_separator(raw),
    }
}

/// `---` / `---` fenced block at the start of the document
pub fn split_fenced(raw: &str) -> (&str, &str) {
    let raw = raw.strip_prefix(BOM).unwrap_or(raw);

    let mut lines = LineOffsets::new(raw);

    // Skip leading blank lines, then require the opening delimiter
    let opening = loop {
        match lines.next() {
            Some((_, line)) if line.trim().is_empty() => continue,
            Some(found) => break found,
            None => return ("", raw),
        }
    };
    if !is_delimiter(opening.1) {
        return ("", raw);
    }
    let meta_start = opening.0 + opening.1.len();

    for (offset, line) in lines {
        if is_delimiter(line) {
            let metadata = &raw[meta_start..offset];
            let body = &raw[offset + line.len()..];
            return (metadata, body);
        }
    }

    // Opening delimiter without a closing one
    ("", raw)
}

/// Everything before the first `\n---\n` is metadata
pub fn split_at_separator(raw: &str) -> (&str, &str) {
    let raw = raw.strip_prefix(BOM).unwrap_or(raw);
    match raw.split_once("\n---\n") {
        Some((metadata, body)) => (metadata, body),
        None => ("", raw),
    }
}

/// Body reader returned by [`split_reader`]: any bytes read while looking for
/// a header that turned out not to be one, followed by the untouched source.
pub type BodyReader<R> = io::Chain<Cursor<Vec<u8>>, R>;

/// Read only the fenced header from a stream.
///
/// Returns the metadata text and a reader positioned right after the closing
/// delimiter. If the stream has no complete header the metadata is empty and
/// the returned reader yields the whole document.
pub fn split_reader<R: BufRead>(mut reader: R) -> io::Result<(String, BodyReader<R>)> {
    let mut consumed: Vec<u8> = Vec::new();
    let mut line: Vec<u8> = Vec::new();

    // Skip leading blank lines and find the opening delimiter
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok((String::new(), Cursor::new(consumed).chain(reader)));
        }
        consumed.extend_from_slice(&line);
        let text = String::from_utf8_lossy(&line);
        let text = text.trim_start_matches(BOM);
        if text.trim().is_empty() {
            continue;
        }
        if !is_delimiter(text) {
            return Ok((String::new(), Cursor::new(consumed).chain(reader)));
        }
        break;
    }

    let meta_start = consumed.len();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            // Unclosed header: hand everything back as body
            return Ok((String::new(), Cursor::new(consumed).chain(reader)));
        }
        if is_delimiter(&String::from_utf8_lossy(&line)) {
            let metadata = String::from_utf8(consumed.split_off(meta_start))
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            return Ok((metadata, Cursor::new(Vec::new()).chain(reader)));
        }
        consumed.extend_from_slice(&line);
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

/// Iterator over `(byte_offset, line_including_newline)`
struct LineOffsets<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> LineOffsets<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }
}

impl<'a> Iterator for LineOffsets<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.text.len() {
            return None;
        }
        let rest = &self.text[self.pos..];
        let len = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
        let item = (self.pos, &rest[..len]);
        self.pos += len;
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block() {
        let content = "---\nTitle: Hello\nSlug: hello\n---\n# Body\n";
        let (meta, body) = split_fenced(content);
        assert_eq!(meta, "Title: Hello\nSlug: hello\n");
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn test_no_delimiter_is_all_body() {
        let content = "# Just markdown\n\nNo header here.";
        let (meta, body) = split_fenced(content);
        assert_eq!(meta, "");
        assert_eq!(body, content);
    }

    #[test]
    fn test_single_delimiter_is_not_front_matter() {
        let content = "---\nTitle: Dangling\n\nSome text that never closes.\n";
        let (meta, body) = split_fenced(content);
        assert_eq!(meta, "");
        assert_eq!(body, content);
    }

    #[test]
    fn test_delimiter_later_in_document_is_ignored() {
        let content = "Intro paragraph\n\n---\n\nAfter a rule\n";
        let (meta, body) = split_fenced(content);
        assert_eq!(meta, "");
        assert_eq!(body, content);
    }

    #[test]
    fn test_closing_delimiter_without_newline() {
        let content = "---\nTitle: Short\n---";
        let (meta, body) = split_fenced(content);
        assert_eq!(meta, "Title: Short\n");
        assert_eq!(body, "");
    }

    #[test]
    fn test_crlf_and_leading_blank_lines() {
        let content = "\r\n---\r\nTitle: Windows\r\n---\r\nBody\r\n";
        let (meta, body) = split_fenced(content);
        assert_eq!(meta, "Title: Windows\r\n");
        assert_eq!(body, "Body\r\n");
    }

    #[test]
    fn test_empty_block() {
        let (meta, body) = split_fenced("---\n---\nBody");
        assert_eq!(meta, "");
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_byte_order_mark() {
        let (meta, body) = split_fenced("\u{feff}---\nTitle: Bom\n---\nBody");
        assert_eq!(meta, "Title: Bom\n");
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_split_convention_without_opening_delimiter() {
        let content = "Title: Legacy\nOrder: 2\n---\nBody text\n";
        let (meta, body) = split(content, FrontMatterStyle::Split);
        assert_eq!(meta, "Title: Legacy\nOrder: 2");
        assert_eq!(body, "Body text\n");
    }

    #[test]
    fn test_split_convention_with_opening_delimiter() {
        let content = "---\nTitle: Both\n---\nBody\n";
        let (meta, body) = split(content, FrontMatterStyle::Split);
        assert_eq!(meta, "---\nTitle: Both");
        assert_eq!(body, "Body\n");
    }

    #[test]
    fn test_split_convention_without_separator() {
        let content = "# Title\n\nbody";
        assert_eq!(split(content, FrontMatterStyle::Split), ("", content));
    }

    fn read_all<R: Read>(mut reader: R) -> String {
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_reader_stops_after_header() {
        let content = "---\nTitle: Stream\n---\n# Body\n\nMore.\n";
        let (meta, rest) = split_reader(content.as_bytes()).unwrap();
        assert_eq!(meta, "Title: Stream\n");
        assert_eq!(read_all(rest), "# Body\n\nMore.\n");
    }

    #[test]
    fn test_reader_tolerates_missing_trailing_newline() {
        let (meta, rest) = split_reader("---\nTitle: Tail\n---".as_bytes()).unwrap();
        assert_eq!(meta, "Title: Tail\n");
        assert_eq!(read_all(rest), "");
    }

    #[test]
    fn test_reader_without_header_returns_everything() {
        let content = "# No header\n\ntext\n";
        let (meta, rest) = split_reader(content.as_bytes()).unwrap();
        assert_eq!(meta, "");
        assert_eq!(read_all(rest), content);
    }

    #[test]
    fn test_reader_rejects_non_utf8_header() {
        let content: &[u8] = b"---\nTitle: \xff\xfe\n---\nBody\n";
        let err = split_reader(content).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_reader_unclosed_header_returns_everything() {
        let content = "---\nTitle: Open\nstill going\n";
        let (meta, rest) = split_reader(content.as_bytes()).unwrap();
        assert_eq!(meta, "");
        assert_eq!(read_all(rest), content);
    }
}
