/// Inline parser for paragraph and heading text.
///
/// Text is tokenized into a doubly-linked run of nodes. Code spans, escapes,
/// autolinks and raw HTML are resolved while tokenizing. Links and images are
/// resolved next, then emphasis. A resolved construct is collapsed into one
/// closed node that already holds its rendered HTML, so the output is the
/// concatenation of the nodes left in the run.
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    Open,
    ImageOpen,
    Close,
    ParenOpen,
    ParenClose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Category {
    PlainText,
    Whitespace,
    EmphasisMarker {
        run_char: char,
        run_length: usize,
        can_open: bool,
        can_close: bool,
    },
    BracketMarker(Bracket),
    /// A backtick run with no closing run of the same length
    CodeSpanMarker,
    InlineContent,
}

#[derive(Debug, Clone)]
struct RunNode {
    /// Rendered HTML of this node
    content: String,
    /// Plain-text rendition, used for image alt text
    literal: String,
    category: Category,
    closed: bool,
    /// Character range in the source text
    span: Range<usize>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Per-leaf arena of run nodes linked in source order
#[derive(Debug, Default)]
struct Run {
    nodes: Vec<RunNode>,
    head: Option<usize>,
    tail: Option<usize>,
}

/// Render the inline content of one paragraph or heading to HTML.
pub fn render_inline(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut run = tokenize(&chars);
    log::trace!("inline run: {} nodes", run.nodes.len());
    run.resolve_links(&chars);
    run.resolve_emphasis(run.head, None);
    run.render()
}

fn tokenize(chars: &[char]) -> Run {
    let mut run = Run::default();
    let mut i = 0;

    while i < chars.len() {
        let start = i;
        match chars[i] {
            ' ' | '\t' | '\n' => {
                i = run.push_whitespace(chars, i);
            }
            '\\' => {
                i += 1;
                match chars.get(i) {
                    Some('\n') => {
                        i = skip_spaces(chars, i + 1);
                        run.push(Category::Whitespace, "<br />\n", " ", start..i);
                    }
                    Some(&escaped) if escaped.is_ascii_punctuation() => {
                        i += 1;
                        let content = encode_literal(&escaped.to_string());
                        run.push_closed(content, escaped.to_string(), start..i);
                    }
                    _ => {
                        run.push(Category::PlainText, "\\", "\\", start..i);
                    }
                }
            }
            '`' => match try_parse_code_span(chars, i) {
                Some((code, end)) => {
                    i = end;
                    let content = format!("<code>{}</code>", encode_literal(&code));
                    run.push_closed(content, code, start..i);
                }
                None => {
                    while i < chars.len() && chars[i] == '`' {
                        i += 1;
                    }
                    let ticks: String = chars[start..i].iter().collect();
                    run.push(Category::CodeSpanMarker, &ticks, &ticks, start..i);
                }
            },
            '*' | '_' => {
                let run_char = chars[i];
                while i < chars.len() && chars[i] == run_char {
                    i += 1;
                }
                let category = emphasis_marker(chars, start, i);
                // Unmatched markers stay literal on every later pass too
                let marker: String = chars[start..i].iter().collect();
                run.push(category, &encode_literal(&marker), &marker, start..i);
            }
            '!' if chars.get(i + 1) == Some(&'[') => {
                i += 2;
                run.push(Category::BracketMarker(Bracket::ImageOpen), "![", "![", start..i);
            }
            '[' | ']' | '(' | ')' => {
                let bracket = match chars[i] {
                    '[' => Bracket::Open,
                    ']' => Bracket::Close,
                    '(' => Bracket::ParenOpen,
                    _ => Bracket::ParenClose,
                };
                i += 1;
                let text = chars[start].to_string();
                run.push(Category::BracketMarker(bracket), &text, &text, start..i);
            }
            '<' => {
                if let Some((html, text, end)) = try_parse_autolink(chars, i) {
                    i = end;
                    run.push_closed(html, text, start..i);
                } else if let Some(end) = try_parse_html_inline(chars, i) {
                    i = end;
                    run.push_closed(chars[start..i].iter().collect(), String::new(), start..i);
                } else {
                    i += 1;
                    run.push(Category::PlainText, "&lt;", "<", start..i);
                }
            }
            '&' => {
                let end = try_parse_entity(chars, i).unwrap_or(i + 1);
                let raw: String = chars[start..end].iter().collect();
                i = end;
                if end - start > 1 {
                    run.push_closed(raw.clone(), raw, start..i);
                } else {
                    run.push(Category::PlainText, "&amp;", "&", start..i);
                }
            }
            _ => {
                i += 1;
                while i < chars.len() && !starts_token(chars, i) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                run.push(Category::PlainText, &escape_html(&text), &text, start..i);
            }
        }
    }

    run
}

/// Whether a token other than plain text may begin at `i`
fn starts_token(chars: &[char], i: usize) -> bool {
    match chars[i] {
        ' ' | '\t' | '\n' | '\\' | '`' | '*' | '_' | '[' | ']' | '(' | ')' | '<' | '&' => true,
        '!' => chars.get(i + 1) == Some(&'['),
        _ => false,
    }
}

fn skip_spaces(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && (chars[i] == ' ' || chars[i] == '\t') {
        i += 1;
    }
    i
}

/// Flanking is simplified: a run opens when followed by non-whitespace and
/// closes when preceded by non-whitespace. `_` may not do either inside a word.
fn emphasis_marker(chars: &[char], start: usize, end: usize) -> Category {
    let run_char = chars[start];
    let before = start.checked_sub(1).map(|i| chars[i]);
    let after = chars.get(end).copied();

    let mut can_open = after.is_some_and(|c| !c.is_whitespace());
    let mut can_close = before.is_some_and(|c| !c.is_whitespace());
    if run_char == '_' {
        can_open &= !before.is_some_and(char::is_alphanumeric);
        can_close &= !after.is_some_and(char::is_alphanumeric);
    }

    Category::EmphasisMarker {
        run_char,
        run_length: end - start,
        can_open,
        can_close,
    }
}

impl Run {
    fn push(&mut self, category: Category, content: &str, literal: &str, span: Range<usize>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(RunNode {
            content: content.to_string(),
            literal: literal.to_string(),
            category,
            closed: false,
            span,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        id
    }

    fn push_closed(&mut self, content: String, literal: String, span: Range<usize>) {
        let id = self.push(Category::InlineContent, "", "", span);
        let node = &mut self.nodes[id];
        node.content = content;
        node.literal = literal;
        node.closed = true;
    }

    /// Spaces, tabs and line breaks. A line break after two or more spaces is
    /// a hard break; the indentation of the following line is dropped.
    fn push_whitespace(&mut self, chars: &[char], start: usize) -> usize {
        let mut i = skip_spaces(chars, start);
        if chars.get(i) == Some(&'\n') {
            let hard = i - start >= 2;
            i = skip_spaces(chars, i + 1);
            let content = if hard { "<br />\n" } else { "\n" };
            self.push(Category::Whitespace, content, " ", start..i);
        } else {
            let spaces: String = chars[start..i].iter().collect();
            self.push(Category::Whitespace, &spaces, &spaces, start..i);
        }
        i
    }

    fn unlink(&mut self, id: usize) {
        let (prev, next) = (self.nodes[id].prev, self.nodes[id].next);
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
        let node = &mut self.nodes[id];
        node.prev = None;
        node.next = None;
        node.closed = true;
    }

    /// Insert a closed node right after `after`
    fn insert_after(&mut self, after: usize, content: String, literal: String, span: Range<usize>) {
        let id = self.nodes.len();
        let next = self.nodes[after].next;
        self.nodes.push(RunNode {
            content,
            literal,
            category: Category::InlineContent,
            closed: true,
            span,
            prev: Some(after),
            next,
        });
        self.nodes[after].next = Some(id);
        match next {
            Some(next) => self.nodes[next].prev = Some(id),
            None => self.tail = Some(id),
        }
    }

    /// Unlink every node strictly between `from` and `to`, returning their
    /// rendered HTML and plain text
    fn take_between(&mut self, from: usize, to: usize) -> (String, String) {
        let mut html = String::new();
        let mut literal = String::new();
        let mut cursor = self.nodes[from].next;
        while let Some(id) = cursor {
            if id == to {
                break;
            }
            html.push_str(&self.nodes[id].content);
            literal.push_str(&self.nodes[id].literal);
            cursor = self.nodes[id].next;
            self.unlink(id);
        }
        (html, literal)
    }

    fn render(&self) -> String {
        let mut html = String::new();
        let mut cursor = self.head;
        while let Some(id) = cursor {
            html.push_str(&self.nodes[id].content);
            cursor = self.nodes[id].next;
        }
        html
    }

    fn resolve_links(&mut self, chars: &[char]) {
        // (opener, active)
        let mut openers: Vec<(usize, bool)> = Vec::new();
        let mut cursor = self.head;

        while let Some(id) = cursor {
            cursor = self.nodes[id].next;
            let category = self.nodes[id].category.clone();
            match category {
                Category::BracketMarker(Bracket::Open | Bracket::ImageOpen) => {
                    openers.push((id, true));
                }
                Category::BracketMarker(Bracket::Close) => {
                    let Some((opener, active)) = openers.pop() else {
                        continue;
                    };
                    if !active {
                        continue;
                    }
                    let is_link = self.nodes[opener].category == Category::BracketMarker(Bracket::Open);
                    if let Some(resolved) = self.try_link(chars, opener, id) {
                        cursor = self.nodes[resolved].next;
                        // Links may not contain other links
                        if is_link {
                            for (candidate, active) in openers.iter_mut() {
                                if self.nodes[*candidate].category
                                    == Category::BracketMarker(Bracket::Open)
                                {
                                    *active = false;
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Resolve `opener ... closer ( destination title )` into one node
    fn try_link(&mut self, chars: &[char], opener: usize, closer: usize) -> Option<usize> {
        let paren = self.nodes[closer].next.filter(|&id| {
            self.nodes[id].category == Category::BracketMarker(Bracket::ParenOpen)
        })?;
        let tail = parse_link_tail(chars, self.nodes[paren].span.start)?;
        let paren_close = self.node_ending_at(paren, tail.end)?;

        log::trace!(
            "link {:?} spans {}..{}",
            tail.destination,
            self.nodes[opener].span.start,
            tail.end
        );
        let image = self.nodes[opener].category == Category::BracketMarker(Bracket::ImageOpen);
        self.resolve_emphasis(self.nodes[opener].next, Some(closer));
        let (text, literal) = self.take_between(opener, closer);

        let mut cursor = Some(closer);
        while let Some(id) = cursor {
            cursor = self.nodes[id].next;
            self.unlink(id);
            if id == paren_close {
                break;
            }
        }

        let title = tail
            .title
            .map(|title| format!(" title=\"{}\"", escape_html(&title)))
            .unwrap_or_default();
        let destination = escape_html(&url_encode(&tail.destination));
        let content = if image {
            format!(
                "<img src=\"{}\" alt=\"{}\"{} />",
                destination,
                escape_text(&literal),
                title
            )
        } else {
            format!("<a href=\"{}\"{}>{}</a>", destination, title, text)
        };

        let node = &mut self.nodes[opener];
        node.span = node.span.start..tail.end;
        node.content = content;
        node.literal = literal;
        node.category = Category::InlineContent;
        node.closed = true;
        Some(opener)
    }

    /// The `)` node after `from` whose span ends exactly at `end`
    fn node_ending_at(&self, from: usize, end: usize) -> Option<usize> {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let node = &self.nodes[id];
            if node.span.end > end {
                return None;
            }
            if node.span.end == end {
                return (node.category == Category::BracketMarker(Bracket::ParenClose)).then_some(id);
            }
            cursor = node.next;
        }
        None
    }

    /// Match emphasis markers between `first` and `stop` (exclusive)
    fn resolve_emphasis(&mut self, first: Option<usize>, stop: Option<usize>) {
        let mut openers: Vec<usize> = Vec::new();
        let mut cursor = first;

        while let Some(id) = cursor {
            if Some(id) == stop {
                break;
            }
            let next = self.nodes[id].next;
            if self.nodes[id].closed {
                cursor = next;
                continue;
            }
            let Category::EmphasisMarker {
                run_char,
                can_open,
                can_close,
                ..
            } = self.nodes[id].category
            else {
                cursor = next;
                continue;
            };

            let matching = openers
                .iter()
                .rposition(|&opener| self.marker(opener).0 == run_char);
            match matching {
                Some(position) if can_close => {
                    let opener = openers[position];
                    // Unmatched openers in between can never close now
                    openers.truncate(position);
                    let (opener_left, closer_left) = self.wrap_emphasis(opener, id);
                    if opener_left > 0 {
                        openers.push(opener);
                    }
                    if closer_left == 0 {
                        cursor = next;
                    }
                }
                _ => {
                    if can_open {
                        openers.push(id);
                    }
                    cursor = next;
                }
            }
        }
    }

    fn marker(&self, id: usize) -> (char, usize) {
        match self.nodes[id].category {
            Category::EmphasisMarker {
                run_char,
                run_length,
                ..
            } => (run_char, run_length),
            _ => ('\0', 0),
        }
    }

    /// Wrap the nodes between two markers in `<em>` or `<strong>` and return
    /// how many marker characters each side has left
    fn wrap_emphasis(&mut self, opener: usize, closer: usize) -> (usize, usize) {
        let used = if self.marker(opener).1 >= 2 && self.marker(closer).1 >= 2 {
            2
        } else {
            1
        };
        let tag = if used == 2 { "strong" } else { "em" };

        let (inner, literal) = self.take_between(opener, closer);
        let span = self.nodes[opener].span.end..self.nodes[closer].span.start;
        self.insert_after(opener, format!("<{tag}>{inner}</{tag}>"), literal, span);

        (self.shrink_marker(opener, used), self.shrink_marker(closer, used))
    }

    fn shrink_marker(&mut self, id: usize, used: usize) -> usize {
        let node = &mut self.nodes[id];
        let left = match &mut node.category {
            Category::EmphasisMarker {
                run_char,
                run_length,
                ..
            } => {
                *run_length = run_length.saturating_sub(used);
                node.literal = run_char.to_string().repeat(*run_length);
                node.content = encode_literal(&node.literal);
                *run_length
            }
            _ => 0,
        };
        if left == 0 {
            self.unlink(id);
        }
        left
    }
}

/// Destination, title and end position of `(destination "title")`
#[derive(Debug, PartialEq)]
struct LinkTail {
    destination: String,
    title: Option<String>,
    end: usize,
}

/// Parse the parenthesised part of an inline link starting at the `(` at `start`
fn parse_link_tail(chars: &[char], start: usize) -> Option<LinkTail> {
    let mut i = skip_link_space(chars, start + 1);
    let (destination, after) = parse_link_destination(chars, i)?;
    i = skip_link_space(chars, after);

    let mut title = None;
    if i > after
        && let Some((parsed, after_title)) = parse_link_title(chars, i)
    {
        title = Some(parsed);
        i = skip_link_space(chars, after_title);
    }

    (chars.get(i) == Some(&')')).then_some(LinkTail {
        destination,
        title,
        end: i + 1,
    })
}

/// Spaces, tabs and at most one line break
fn skip_link_space(chars: &[char], mut i: usize) -> usize {
    let mut newline_seen = false;
    while let Some(&c) = chars.get(i) {
        match c {
            ' ' | '\t' => {}
            '\n' if !newline_seen => newline_seen = true,
            _ => break,
        }
        i += 1;
    }
    i
}

fn parse_link_destination(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut destination = String::new();
    let mut i = start;

    if chars.get(i) == Some(&'<') {
        i += 1;
        while let Some(&c) = chars.get(i) {
            match c {
                '>' => return Some((destination, i + 1)),
                '\n' | '<' => return None,
                '\\' if chars.get(i + 1).is_some_and(char::is_ascii_punctuation) => {
                    destination.push(chars[i + 1]);
                    i += 1;
                }
                _ => destination.push(c),
            }
            i += 1;
        }
        return None;
    }

    let mut depth = 0usize;
    while let Some(&c) = chars.get(i) {
        if c == '\\' && chars.get(i + 1).is_some_and(char::is_ascii_punctuation) {
            destination.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c.is_whitespace() || c.is_control() {
            break;
        }
        if c == '(' {
            depth += 1;
        } else if c == ')' {
            if depth == 0 {
                break;
            }
            depth -= 1;
        }
        destination.push(c);
        i += 1;
    }

    (depth == 0).then_some((destination, i))
}

fn parse_link_title(chars: &[char], start: usize) -> Option<(String, usize)> {
    let close = match chars.get(start)? {
        '"' => '"',
        '\'' => '\'',
        '(' => ')',
        _ => return None,
    };
    let mut title = String::new();
    let mut i = start + 1;

    while let Some(&c) = chars.get(i) {
        if c == close {
            return Some((title, i + 1));
        }
        if c == '(' && close == ')' {
            return None;
        }
        if c == '\\' && chars.get(i + 1).is_some_and(char::is_ascii_punctuation) {
            title.push(chars[i + 1]);
            i += 2;
            continue;
        }
        // No blank line inside a title
        if c == '\n' && chars.get(i + 1) == Some(&'\n') {
            return None;
        }
        title.push(c);
        i += 1;
    }
    None
}

/// Backtick run at `start` closed by the next run of the same length.
/// Returns the span's content and the position after the closing run.
fn try_parse_code_span(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut i = start;
    while i < chars.len() && chars[i] == '`' {
        i += 1;
    }
    let ticks = i - start;
    let content_start = i;

    while i < chars.len() {
        if chars[i] != '`' {
            i += 1;
            continue;
        }
        let close_start = i;
        while i < chars.len() && chars[i] == '`' {
            i += 1;
        }
        if i - close_start == ticks {
            let mut content: String = chars[content_start..close_start].iter().collect();
            content = content.replace('\n', " ");
            if content.starts_with(' ') && content.ends_with(' ') && !content.trim().is_empty() {
                content = content[1..content.len() - 1].to_string();
            }
            return Some((content, i));
        }
    }
    None
}

/// `<scheme:...>` or `<user@host>`. Returns the link HTML, its text and the end position.
fn try_parse_autolink(chars: &[char], start: usize) -> Option<(String, String, usize)> {
    let mut i = start + 1;
    while i < chars.len() && chars[i] != '>' && chars[i] != '<' && !chars[i].is_whitespace() {
        i += 1;
    }
    if chars.get(i) != Some(&'>') || i == start + 1 {
        return None;
    }
    let content: String = chars[start + 1..i].iter().collect();

    let href = if is_absolute_uri(&content) {
        escape_html(&url_encode(&content))
    } else if is_email_address(&content) {
        format!("mailto:{}", escape_html(&content))
    } else {
        return None;
    };
    let html = format!("<a href=\"{}\">{}</a>", href, encode_literal(&content));
    Some((html, content, i + 1))
}

fn is_absolute_uri(text: &str) -> bool {
    let Some((scheme, rest)) = text.split_once(':') else {
        return false;
    };
    (2..=32).contains(&scheme.len())
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        && !rest.is_empty()
}

fn is_email_address(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~-".contains(c));
    let domain_ok = domain.split('.').all(|part| {
        !part.is_empty()
            && !part.starts_with('-')
            && !part.ends_with('-')
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    local_ok && domain_ok
}

/// Raw inline HTML: an open tag with attributes, a closing tag or a comment.
/// Returns the position after the construct.
fn try_parse_html_inline(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;

    if chars[i..].starts_with(&['!', '-', '-']) {
        i += 3;
        while i < chars.len() {
            if chars[i..].starts_with(&['-', '-', '>']) {
                return Some(i + 3);
            }
            i += 1;
        }
        return None;
    }

    if chars.get(i) == Some(&'/') {
        i = tag_name_end(chars, i + 1)?;
        i = skip_spaces(chars, i);
        return (chars.get(i) == Some(&'>')).then_some(i + 1);
    }

    i = tag_name_end(chars, i)?;
    loop {
        let before_space = i;
        i = skip_link_space(chars, i);
        match chars.get(i)? {
            '>' => return Some(i + 1),
            '/' => return (chars.get(i + 1) == Some(&'>')).then_some(i + 2),
            _ if i == before_space => return None,
            _ => {}
        }

        // Attribute name
        if !chars.get(i).is_some_and(|&c| c.is_ascii_alphabetic() || c == '_' || c == ':') {
            return None;
        }
        while chars
            .get(i)
            .is_some_and(|&c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
        {
            i += 1;
        }

        // Optional value
        let after_name = i;
        i = skip_link_space(chars, i);
        if chars.get(i) != Some(&'=') {
            i = after_name;
            continue;
        }
        i = skip_link_space(chars, i + 1);
        match chars.get(i)? {
            &quote @ ('"' | '\'') => {
                i += 1;
                while chars.get(i)? != &quote {
                    if chars[i] == '\n' {
                        return None;
                    }
                    i += 1;
                }
                i += 1;
            }
            _ => {
                let unquoted_end = |c: &char| c.is_whitespace() || "\"'=<>`".contains(*c);
                if unquoted_end(chars.get(i)?) {
                    return None;
                }
                while chars.get(i).is_some_and(|c| !unquoted_end(c)) {
                    i += 1;
                }
            }
        }
    }
}

fn tag_name_end(chars: &[char], start: usize) -> Option<usize> {
    if !chars.get(start)?.is_ascii_alphabetic() {
        return None;
    }
    let mut i = start + 1;
    while chars.get(i).is_some_and(|&c| c.is_ascii_alphanumeric() || c == '-') {
        i += 1;
    }
    Some(i)
}

/// `&name;`, `&#123;` or `&#x1F;`, returning the position after the `;`
fn try_parse_entity(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    let (max, is_digit): (usize, fn(&char) -> bool) = match chars.get(i)? {
        '#' if matches!(chars.get(i + 1), Some('x' | 'X')) => {
            i += 2;
            (6, char::is_ascii_hexdigit)
        }
        '#' => {
            i += 1;
            (7, char::is_ascii_digit)
        }
        _ => (32, char::is_ascii_alphanumeric),
    };

    let digits_start = i;
    while i - digits_start < max && chars.get(i).is_some_and(is_digit) {
        i += 1;
    }
    (i > digits_start && chars.get(i) == Some(&';')).then_some(i + 1)
}

/// Percent-encode a link destination, leaving reserved URL characters and existing escapes alone
pub(crate) fn url_encode(text: &str) -> String {
    let mut result = String::new();
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || "-_.~!*'();:@&=+$,/?#[]%".contains(ch) {
            result.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Like [`escape_html`], but an `&` that already starts an entity reference is kept
fn escape_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut escaped = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == '&' && try_parse_entity(&chars, i).is_some() {
            escaped.push('&');
        } else {
            escaped.push_str(&escape_html(&c.to_string()));
        }
    }
    escaped
}

/// Escape text that must stay literal, writing inline syntax characters as
/// numeric references so a second pass leaves them alone
fn encode_literal(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '*' => encoded.push_str("&#42;"),
            '_' => encoded.push_str("&#95;"),
            '`' => encoded.push_str("&#96;"),
            '[' => encoded.push_str("&#91;"),
            ']' => encoded.push_str("&#93;"),
            '\\' => encoded.push_str("&#92;"),
            _ => encoded.push_str(&escape_html(&c.to_string())),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("plain words", "plain words")]
    #[case("*a*b*", "<em>a</em>b&#42;")]
    #[case("**bold** and *em*", "<strong>bold</strong> and <em>em</em>")]
    #[case("***both***", "<em><strong>both</strong></em>")]
    #[case("**a*", "&#42;<em>a</em>")]
    #[case("*unterminated", "&#42;unterminated")]
    #[case("a * b", "a &#42; b")]
    #[case("_snake_case_", "<em>snake&#95;case</em>")]
    #[case("snake_case_word", "snake&#95;case&#95;word")]
    #[case("__init__", "<strong>init</strong>")]
    fn test_emphasis(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(render_inline(input), expected);
    }

    #[rstest]
    #[case("[a](b)", r#"<a href="b">a</a>"#)]
    #[case(r#"[link](/url "title")"#, r#"<a href="/url" title="title">link</a>"#)]
    #[case("[a](<b c>)", r#"<a href="b%20c">a</a>"#)]
    #[case("[a](b(c))", r#"<a href="b(c)">a</a>"#)]
    #[case("[a]()", r#"<a href="">a</a>"#)]
    #[case("[*em* text](u)", r#"<a href="u"><em>em</em> text</a>"#)]
    #[case("*[a](b)*", r#"<em><a href="b">a</a></em>"#)]
    #[case("[a [b](c) d](e)", r#"[a <a href="c">b</a> d](e)"#)]
    #[case("[![i](s)](t)", r#"<a href="t"><img src="s" alt="i" /></a>"#)]
    #[case("[text](unterminated", "[text](unterminated")]
    #[case("[no destination]", "[no destination]")]
    #[case("[a] (b)", "[a] (b)")]
    fn test_links(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(render_inline(input), expected);
    }

    #[test]
    fn test_images() {
        assert_eq!(
            render_inline("![alt *x*](img.png \"T\")"),
            r#"<img src="img.png" alt="alt x" title="T" />"#
        );
        assert_eq!(
            render_inline("![a \"q\"](p.png)"),
            r#"<img src="p.png" alt="a &quot;q&quot;" />"#
        );
    }

    #[rstest]
    #[case("`code`", "<code>code</code>")]
    #[case("`` a ` b ``", "<code>a &#96; b</code>")]
    #[case("` `` `", "<code>&#96;&#96;</code>")]
    #[case("`<b>*x*</b>`", "<code>&lt;b&gt;&#42;x&#42;&lt;/b&gt;</code>")]
    #[case("`a\nb`", "<code>a b</code>")]
    #[case("``unmatched`", "``unmatched`")]
    #[case("*`a*`", "&#42;<code>a&#42;</code>")]
    fn test_code_spans(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(render_inline(input), expected);
    }

    #[rstest]
    #[case("a  \nb", "a<br />\nb")]
    #[case("a\\\nb", "a<br />\nb")]
    #[case("a\nb", "a\nb")]
    #[case("a \n   b", "a\nb")]
    fn test_line_breaks(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(render_inline(input), expected);
    }

    #[rstest]
    #[case("\\*not em\\*", "&#42;not em&#42;")]
    #[case("\\[x\\]", "&#91;x&#93;")]
    #[case("\\a", "\\a")]
    #[case("a < b & c", "a &lt; b &amp; c")]
    #[case("&copy; &#169; &#xA9;", "&copy; &#169; &#xA9;")]
    #[case("5 > \"3\"", "5 &gt; &quot;3&quot;")]
    fn test_escaping(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(render_inline(input), expected);
    }

    #[rstest]
    #[case(
        "<https://example.com/a_b>",
        r#"<a href="https://example.com/a_b">https://example.com/a&#95;b</a>"#
    )]
    #[case("<me@example.com>", r#"<a href="mailto:me@example.com">me@example.com</a>"#)]
    #[case("a <3 b", "a &lt;3 b")]
    #[case("<not a link", "&lt;not a link")]
    #[case(r#"a <span class="x">b</span>"#, r#"a <span class="x">b</span>"#)]
    #[case("<br/> and <!-- note -->", "<br/> and <!-- note -->")]
    fn test_autolinks_and_html(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(render_inline(input), expected);
    }

    #[rstest]
    #[case("*a*b*")]
    #[case("**bold** and `code`")]
    #[case("[a](b \"t\")")]
    #[case("a < b & c")]
    #[case("\\*x\\* and \\_y\\_")]
    #[case("<https://x.io>")]
    #[case("x  \ny")]
    #[case("***both***")]
    #[case("_snake_case_ and snake_case")]
    #[case("[x](y")]
    #[case("![img *a*](p.png)")]
    #[case("`*code*` then *em*")]
    #[case("*[a*](b)")]
    #[case("**a* and _b")]
    fn test_render_is_fixed_point(#[case] input: &str) {
        let once = render_inline(input);
        assert_eq!(render_inline(&once), once);
    }

    #[test]
    fn test_markers_split_by_link_stay_literal() {
        assert_eq!(render_inline("*[a*](b)"), r#"&#42;<a href="b">a&#42;</a>"#);
        assert_eq!(
            render_inline("![x *y](p.png)"),
            r#"<img src="p.png" alt="x *y" />"#
        );
    }

    #[test]
    fn test_link_tail() {
        let chars: Vec<char> = "(/u 'x' )".chars().collect();
        assert_eq!(
            parse_link_tail(&chars, 0),
            Some(LinkTail {
                destination: "/u".to_string(),
                title: Some("x".to_string()),
                end: 9,
            })
        );

        let chars: Vec<char> = "(a\"t\")".chars().collect();
        assert_eq!(parse_link_tail(&chars, 0).map(|t| t.destination), Some("a\"t\"".to_string()));

        let chars: Vec<char> = "(a b)".chars().collect();
        assert_eq!(parse_link_tail(&chars, 0), None);
    }

    #[test]
    fn test_url_encode() {
        assert_eq!(url_encode("/a b/ü?x=1&y=%20"), "/a%20b/%C3%BC?x=1&y=%20");
    }
}
