/// Line classification for the block parser.
///
/// Every function here is pure: it looks at one line (already tab-expanded)
/// and says which block could start on it, without knowing what is open.
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    BlockQuote,
    Heading { level: u8 },
    FencedCode { fence_len: usize, info: String },
    ThematicBreak,
    HtmlBlock,
    OrderedList { start: u32, delimiter: char },
    UnorderedList { marker: char },
    PlainText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: LineKind,
    /// Leading spaces before the marker or text
    pub indent: usize,
    /// Byte offset where the block's content starts; may point past the end
    /// of the line for markers that are followed by nothing
    pub marker_end: usize,
}

impl Classified {
    /// Content after the marker
    pub fn content<'a>(&self, line: &'a str) -> &'a str {
        line.get(self.marker_end..).unwrap_or("")
    }
}

/// Classify a non-blank line. The first matching rule wins.
pub fn classify(line: &str) -> Classified {
    let indent = leading_spaces(line);
    let rest = &line[indent..];
    let classified = |kind, marker_end| Classified {
        kind,
        indent,
        marker_end,
    };

    if indent <= 3 {
        if let Some(marker_end) = quote_marker_end(line) {
            return classified(LineKind::BlockQuote, marker_end);
        }
        if let Some((level, width)) = atx_heading(rest) {
            return classified(LineKind::Heading { level }, indent + width);
        }
    }

    if let Some((fence_len, info)) = fence_open(rest) {
        return classified(LineKind::FencedCode { fence_len, info }, indent);
    }

    if indent <= 3 {
        let list = list_marker(rest);
        if list.is_none() && is_thematic_break(rest) {
            return classified(LineKind::ThematicBreak, indent);
        }
        if is_html_start(rest) {
            return classified(LineKind::HtmlBlock, indent);
        }
        if let Some((kind, width)) = list {
            return classified(kind, indent + width);
        }
    }

    classified(LineKind::PlainText, indent)
}

pub fn is_blank(line: &str) -> bool {
    line.chars().all(char::is_whitespace)
}

pub fn leading_spaces(line: &str) -> usize {
    line.bytes().take_while(|&b| b == b' ').count()
}

/// Expand tabs to the next multiple of `tab_width` columns
pub fn expand_tabs(line: &str, tab_width: usize) -> Cow<'_, str> {
    if !line.contains('\t') {
        return Cow::Borrowed(line);
    }
    let tab_width = tab_width.max(1);
    let mut result = String::with_capacity(line.len() + tab_width);
    let mut col = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let next_stop = (col / tab_width + 1) * tab_width;
            result.extend(std::iter::repeat_n(' ', next_stop - col));
            col = next_stop;
        } else {
            result.push(ch);
            col += 1;
        }
    }
    Cow::Owned(result)
}

/// Remove up to `columns` leading spaces
pub fn strip_indent(line: &str, columns: usize) -> &str {
    let strip = leading_spaces(line).min(columns);
    &line[strip..]
}

/// If the line continues a block quote, the offset just past `>` and one optional space
pub fn quote_marker_end(line: &str) -> Option<usize> {
    let indent = leading_spaces(line);
    if indent > 3 {
        return None;
    }
    let after = line[indent..].strip_prefix('>')?;
    Some(indent + 1 + usize::from(after.starts_with(' ')))
}

/// Whether `line` closes a fence opened with `fence_len` backticks
pub fn is_closing_fence(line: &str, fence_len: usize) -> bool {
    let indent = leading_spaces(line);
    if indent > 3 {
        return false;
    }
    let rest = &line[indent..];
    let run = rest.bytes().take_while(|&b| b == b'`').count();
    run >= fence_len && rest[run..].trim().is_empty()
}

/// Heading text without the optional closing `#` sequence
pub fn heading_content(content: &str) -> &str {
    let text = content.trim();
    let without_hashes = text.trim_end_matches('#');
    if without_hashes.is_empty() {
        return "";
    }
    if without_hashes.len() < text.len() && without_hashes.ends_with(' ') {
        without_hashes.trim_end()
    } else {
        text
    }
}

/// `(level, width of hashes plus the following space)`
fn atx_heading(rest: &str) -> Option<(u8, usize)> {
    let hashes = rest.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let after = &rest[hashes..];
    if after.is_empty() {
        Some((hashes as u8, hashes))
    } else if after.starts_with(' ') {
        Some((hashes as u8, hashes + 1))
    } else {
        None
    }
}

fn fence_open(rest: &str) -> Option<(usize, String)> {
    let fence_len = rest.bytes().take_while(|&b| b == b'`').count();
    if fence_len < 3 {
        return None;
    }
    let after = &rest[fence_len..];
    if after.contains('`') {
        return None;
    }
    Some((fence_len, after.trim().to_string()))
}

fn is_thematic_break(rest: &str) -> bool {
    let Some(marker) = rest.chars().find(|c| !c.is_whitespace()) else {
        return false;
    };
    if !matches!(marker, '*' | '-' | '_') {
        return false;
    }

    let mut count = 0;
    for ch in rest.chars() {
        if ch == marker {
            count += 1;
        } else if !ch.is_whitespace() {
            return false;
        }
    }
    count >= 3
}

fn is_html_start(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '/')
}

/// `(kind, width of marker plus the spaces that belong to it)`
fn list_marker(rest: &str) -> Option<(LineKind, usize)> {
    let bytes = rest.as_bytes();
    let (kind, marker_len) = match *bytes.first()? {
        b @ (b'-' | b'+' | b'*') => (LineKind::UnorderedList { marker: b as char }, 1),
        b'0'..=b'9' => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            if digits > 9 {
                return None;
            }
            let delimiter = match bytes.get(digits) {
                Some(b'.') => '.',
                Some(b')') => ')',
                _ => return None,
            };
            let start = rest[..digits].parse().ok()?;
            (LineKind::OrderedList { start, delimiter }, digits + 1)
        }
        _ => return None,
    };

    let after = &rest[marker_len..];
    let spaces = leading_spaces(after);
    if spaces == 0 && !after.is_empty() {
        return None;
    }
    // A long space run means indented content; only one space belongs to the marker
    let width = if spaces >= 4 || is_blank(after) {
        1
    } else {
        spaces
    };
    Some((kind, marker_len + width))
}
