/// Block-structure parser.
///
/// Lines are consumed one at a time. For each line the open path (root down to
/// the deepest open container) is walked from the top, letting every block
/// quote and list item strip its own prefix. Whatever does not continue is
/// closed, and the rest of the line is classified and added under the deepest
/// container that did continue. Block quotes and list items parse the text
/// after their marker recursively, which is how nesting of any depth is built.
use crate::ast::{BlockKind, Document, NodeId};
use crate::classify::{
    Classified, LineKind, classify, expand_tabs, heading_content, is_blank, is_closing_fence,
    leading_spaces, quote_marker_end, strip_indent,
};
use crate::config::Options;
use crate::error::ParseError;

/// Indentation at which a line becomes indented code
const CODE_INDENT: usize = 4;

pub struct Parser {
    options: Options,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            options: Options::default(),
        }
    }

    pub fn with_options(options: Options) -> Self {
        Parser { options }
    }

    /// Build the block tree for `input`. Leaf text is left raw; inline
    /// syntax is resolved by the renderer.
    pub fn parse(&self, input: &str) -> Result<Document, ParseError> {
        let mut builder = TreeBuilder {
            doc: Document::new(),
            max_nesting: self.options.nesting_limit(),
        };
        let mut tip = builder.doc.root();

        for (number, raw) in input.split('\n').enumerate() {
            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            let line = expand_tabs(raw, self.options.tab_width);
            log::trace!("line {}: {:?}", number + 1, line);
            tip = builder.parse_line(&line, tip)?;
        }

        builder.doc.finish()?;
        Ok(builder.doc)
    }
}

/// Mutable parse state for one document
struct TreeBuilder {
    doc: Document,
    max_nesting: usize,
}

impl TreeBuilder {
    /// Apply one line to the tree and return the new deepest open container
    fn parse_line(&mut self, line: &str, tip: NodeId) -> Result<NodeId, ParseError> {
        let path = self.doc.open_path(tip)?;
        let mut rest = line;
        let mut matched = self.doc.root();
        let mut unmatched = None;

        for &id in path.iter().skip(1) {
            match self.doc[id].kind {
                BlockKind::BlockQuote => match quote_marker_end(rest) {
                    Some(marker_end) => {
                        rest = &rest[marker_end..];
                        matched = id;
                    }
                    None => {
                        unmatched = Some(id);
                        break;
                    }
                },
                BlockKind::ListItem => {
                    let indent_level = self.doc[id].indent_level;
                    if is_blank(rest) {
                        matched = id;
                    } else if leading_spaces(rest) >= indent_level {
                        rest = &rest[indent_level..];
                        matched = id;
                    } else {
                        unmatched = Some(id);
                        break;
                    }
                }
                // Lists continue exactly when their open item does
                _ => {}
            }
        }

        if let Some(first_unmatched) = unmatched {
            if let Some(paragraph) = self.lazy_paragraph(tip, rest) {
                log::trace!("lazy continuation of paragraph #{}", paragraph.index());
                self.doc.push_line(paragraph, rest.trim_start());
                return Ok(tip);
            }
            self.doc.close(first_unmatched)?;
        }

        let depth = self.doc.nesting_depth(matched);
        self.add_line(matched, rest, depth)
    }

    /// An open paragraph at the tip that a line outside its containers may still extend
    fn lazy_paragraph(&self, tip: NodeId, rest: &str) -> Option<NodeId> {
        if is_blank(rest) {
            return None;
        }
        let paragraph = self
            .doc
            .open_last_child(tip)
            .filter(|&id| self.doc[id].kind == BlockKind::Paragraph)?;
        let classified = classify(rest);
        let continues =
            classified.kind == LineKind::PlainText || classified.indent >= CODE_INDENT;
        continues.then_some(paragraph)
    }

    /// Add `line` (already stripped of its containers' prefixes) under `container`.
    /// Recurses for block quotes and list items.
    fn add_line(
        &mut self,
        container: NodeId,
        line: &str,
        depth: usize,
    ) -> Result<NodeId, ParseError> {
        let trailing = self.doc.open_last_child(container);

        // Open fences and HTML blocks swallow every line until their own end condition
        if let Some(leaf) = trailing {
            match self.doc[leaf].kind {
                BlockKind::FencedCode {
                    fence_len,
                    fence_indent,
                    ..
                } => {
                    if is_closing_fence(line, fence_len) {
                        self.doc.close(leaf)?;
                    } else {
                        self.doc.push_line(leaf, strip_indent(line, fence_indent));
                    }
                    return Ok(container);
                }
                BlockKind::HtmlBlock => {
                    if is_blank(line) {
                        self.doc.close(leaf)?;
                    } else {
                        self.doc.push_line(leaf, line);
                    }
                    return Ok(container);
                }
                _ => {}
            }
        }

        if is_blank(line) {
            return self.add_blank_line(container, trailing, line);
        }

        let paragraph = trailing.filter(|&id| self.doc[id].kind == BlockKind::Paragraph);
        let classified = classify(line);

        if classified.indent >= CODE_INDENT {
            // Indented code cannot interrupt a paragraph
            if let Some(paragraph) = paragraph {
                self.doc.push_line(paragraph, line.trim_start());
                return Ok(container);
            }
            return self.add_indented_code(container, trailing, &line[CODE_INDENT..]);
        }

        let content = classified.content(line);
        match classified.kind {
            LineKind::PlainText => {
                match paragraph {
                    Some(paragraph) => self.doc.push_line(paragraph, line.trim_start()),
                    None => {
                        self.close_trailing(trailing)?;
                        self.doc
                            .append_leaf(container, BlockKind::Paragraph, line.trim_start())?;
                    }
                }
                Ok(container)
            }
            LineKind::Heading { level } => {
                self.close_trailing(trailing)?;
                let heading = self.doc.append_leaf(
                    container,
                    BlockKind::Heading { level },
                    heading_content(content),
                )?;
                self.doc.close(heading)?;
                Ok(container)
            }
            LineKind::ThematicBreak => {
                self.close_trailing(trailing)?;
                let rule = self.doc.append(container, BlockKind::ThematicBreak)?;
                self.doc.close(rule)?;
                Ok(container)
            }
            LineKind::HtmlBlock => {
                self.close_trailing(trailing)?;
                self.doc.append_leaf(container, BlockKind::HtmlBlock, line)?;
                Ok(container)
            }
            LineKind::FencedCode { fence_len, info } => {
                self.close_trailing(trailing)?;
                self.doc.append(
                    container,
                    BlockKind::FencedCode {
                        fence_len,
                        info_string: info,
                        fence_indent: classified.indent,
                    },
                )?;
                Ok(container)
            }
            LineKind::BlockQuote => {
                self.check_depth(depth + 1)?;
                self.close_trailing(trailing)?;
                let quote = self.doc.append(container, BlockKind::BlockQuote)?;
                self.add_line(quote, content, depth + 1)
            }
            LineKind::OrderedList { .. } | LineKind::UnorderedList { .. } => {
                // An empty item cannot interrupt a paragraph
                if let Some(paragraph) = paragraph
                    && is_blank(content)
                {
                    self.doc.push_line(paragraph, line.trim_start());
                    return Ok(container);
                }
                self.add_list_item(container, trailing, line, &classified, depth)
            }
        }
    }

    fn add_blank_line(
        &mut self,
        container: NodeId,
        trailing: Option<NodeId>,
        line: &str,
    ) -> Result<NodeId, ParseError> {
        if let Some(leaf) = trailing {
            match self.doc[leaf].kind {
                BlockKind::Paragraph => self.doc.close(leaf)?,
                // Kept for now, dropped on close if no more code follows
                BlockKind::IndentedCode => {
                    self.doc.push_line(leaf, strip_indent(line, CODE_INDENT))
                }
                _ => {}
            }
        }
        Ok(container)
    }

    fn add_indented_code(
        &mut self,
        container: NodeId,
        trailing: Option<NodeId>,
        code: &str,
    ) -> Result<NodeId, ParseError> {
        match trailing.filter(|&id| self.doc[id].kind == BlockKind::IndentedCode) {
            Some(block) => self.doc.push_line(block, code),
            None => {
                self.close_trailing(trailing)?;
                self.doc
                    .append_leaf(container, BlockKind::IndentedCode, code)?;
            }
        }
        Ok(container)
    }

    fn add_list_item(
        &mut self,
        container: NodeId,
        trailing: Option<NodeId>,
        line: &str,
        classified: &Classified,
        depth: usize,
    ) -> Result<NodeId, ParseError> {
        self.check_depth(depth + 1)?;

        let wanted = match classified.kind {
            LineKind::OrderedList { start, delimiter } => {
                BlockKind::OrderedList { start, delimiter }
            }
            LineKind::UnorderedList { marker } => BlockKind::UnorderedList { marker },
            _ => return Err(ParseError::internal("list item without a list marker")),
        };

        let list = match trailing {
            Some(id) if same_list(&self.doc[id].kind, &wanted) => id,
            _ => {
                self.close_trailing(trailing)?;
                self.doc.append(container, wanted)?
            }
        };

        let item = self.doc.append(list, BlockKind::ListItem)?;
        // Text on the marker line starts the item's content directly, so it is
        // parsed before the item's indentation is known
        let tip = self.add_line(item, classified.content(line), depth + 1)?;
        self.doc.set_indent_level(item, classified.marker_end);
        Ok(tip)
    }

    fn close_trailing(&mut self, trailing: Option<NodeId>) -> Result<(), ParseError> {
        match trailing {
            Some(id) => self.doc.close(id),
            None => Ok(()),
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), ParseError> {
        if depth > self.max_nesting {
            log::debug!("nesting depth {} over limit {}", depth, self.max_nesting);
            return Err(ParseError::NestingTooDeep {
                depth,
                limit: self.max_nesting,
            });
        }
        Ok(())
    }
}

/// Whether a new item of kind `wanted` can join the open list `open`
fn same_list(open: &BlockKind, wanted: &BlockKind) -> bool {
    match (open, wanted) {
        (BlockKind::UnorderedList { marker: a }, BlockKind::UnorderedList { marker: b }) => a == b,
        (
            BlockKind::OrderedList { delimiter: a, .. },
            BlockKind::OrderedList { delimiter: b, .. },
        ) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_NESTING_CEILING;
    use pretty_assertions::assert_eq;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn parse(input: &str) -> Document {
        init_logger();
        Parser::new().parse(input).unwrap()
    }

    /// Compact outline of the tree: kind names with leaf text, children in brackets
    fn outline(doc: &Document, id: NodeId) -> String {
        let block = &doc[id];
        let name = match &block.kind {
            BlockKind::Document => "doc".to_string(),
            BlockKind::Paragraph => format!("p({:?})", block.text),
            BlockKind::Heading { level } => format!("h{}({:?})", level, block.text),
            BlockKind::BlockQuote => "quote".to_string(),
            BlockKind::OrderedList { start, .. } => format!("ol{}", start),
            BlockKind::UnorderedList { marker } => format!("ul{}", marker),
            BlockKind::ListItem => format!("li{}", block.indent_level),
            BlockKind::FencedCode { info_string, .. } => {
                format!("fence[{}]({:?})", info_string, block.text)
            }
            BlockKind::IndentedCode => format!("code({:?})", block.text),
            BlockKind::ThematicBreak => "hr".to_string(),
            BlockKind::HtmlBlock => format!("html({:?})", block.text),
        };
        if block.children.is_empty() {
            name
        } else {
            let children: Vec<String> = block
                .children
                .iter()
                .map(|&child| outline(doc, child))
                .collect();
            format!("{}[{}]", name, children.join(", "))
        }
    }

    fn tree(input: &str) -> String {
        let doc = parse(input);
        outline(&doc, doc.root())
    }

    #[test]
    fn test_blank_document() {
        for input in ["", "\n", "   \n\n\t\n", "\n\n\n"] {
            let doc = parse(input);
            assert!(doc.children(doc.root()).is_empty(), "input {:?}", input);
        }
    }

    #[test]
    fn test_paragraphs() {
        assert_eq!(tree("a\nb\n\nc"), r#"doc[p("a\nb"), p("c")]"#);
        assert_eq!(tree("  indented\n   lines"), r#"doc[p("indented\nlines")]"#);
    }

    #[test]
    fn test_heading_is_self_closing() {
        assert_eq!(
            tree("# Title #\ntext"),
            r#"doc[h1("Title"), p("text")]"#
        );
        assert_eq!(tree("para\n## Sub"), r#"doc[p("para"), h2("Sub")]"#);
    }

    #[test]
    fn test_thematic_break_interrupts_paragraph() {
        assert_eq!(tree("a\n***\nb"), r#"doc[p("a"), hr, p("b")]"#);
    }

    #[test]
    fn test_fence_closes_on_matching_run() {
        assert_eq!(
            tree("```rust\nfn main() {}\n\nlet x;\n```\nafter"),
            r#"doc[fence[rust]("fn main() {}\n\nlet x;"), p("after")]"#
        );
    }

    #[test]
    fn test_longer_fence_needs_longer_close() {
        assert_eq!(
            tree("````\n```\n````"),
            r#"doc[fence[]("```")]"#
        );
        assert_eq!(tree("```\na\n`````"), r#"doc[fence[]("a")]"#);
    }

    #[test]
    fn test_fence_suppresses_block_syntax() {
        assert_eq!(
            tree("```\n# not a heading\n> not a quote\n- not a list\n```"),
            r##"doc[fence[]("# not a heading\n> not a quote\n- not a list")]"##
        );
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        assert_eq!(tree("```\na\n``` b"), r#"doc[fence[]("a\n``` b")]"#);
        let doc = parse("```\nopen");
        assert!(doc[doc.children(doc.root())[0]].closed);
    }

    #[test]
    fn test_trailing_newline_is_an_empty_line() {
        assert_eq!(tree("```\na\n"), r#"doc[fence[]("a\n")]"#);
        assert_eq!(tree("a\n"), r#"doc[p("a")]"#);
    }

    #[test]
    fn test_fence_strips_its_own_indent() {
        assert_eq!(tree("  ```\n  a\n    b\nc\n  ```"), r#"doc[fence[]("a\n  b\nc")]"#);
    }

    #[test]
    fn test_indented_code() {
        assert_eq!(
            tree("    a\n\n    b\n\n\nc"),
            r#"doc[code("a\n\nb"), p("c")]"#
        );
    }

    #[test]
    fn test_indented_code_cannot_interrupt_paragraph() {
        assert_eq!(tree("a\n    b"), r#"doc[p("a\nb")]"#);
    }

    #[test]
    fn test_html_block_ends_at_blank_line() {
        assert_eq!(
            tree("<div>\n*raw*\n</div>\n\ntext"),
            r#"doc[html("<div>\n*raw*\n</div>"), p("text")]"#
        );
    }

    #[test]
    fn test_list_continuation() {
        assert_eq!(tree("- a\n  b"), r#"doc[ul-[li2[p("a\nb")]]]"#);
    }

    #[test]
    fn test_sibling_items_share_a_list() {
        assert_eq!(
            tree("- a\n- b\n\n- c"),
            r#"doc[ul-[li2[p("a")], li2[p("b")], li2[p("c")]]]"#
        );
    }

    #[test]
    fn test_new_marker_starts_new_list() {
        assert_eq!(
            tree("- a\n+ b\n1. c\n2) d"),
            r#"doc[ul-[li2[p("a")]], ul+[li2[p("b")]], ol1[li3[p("c")]], ol2[li3[p("d")]]]"#
        );
    }

    #[test]
    fn test_ordered_list_start() {
        assert_eq!(
            tree("3. three\n4. four"),
            r#"doc[ol3[li3[p("three")], li3[p("four")]]]"#
        );
    }

    #[test]
    fn test_nested_lists() {
        assert_eq!(
            tree("- a\n  - b\n    - c\n  - d\n- e"),
            r#"doc[ul-[li2[p("a"), ul-[li2[p("b"), ul-[li2[p("c")]]], li2[p("d")]]], li2[p("e")]]]"#
        );
    }

    #[test]
    fn test_dedent_closes_item() {
        assert_eq!(
            tree("- a\n\nb"),
            r#"doc[ul-[li2[p("a")]], p("b")]"#
        );
    }

    #[test]
    fn test_lazy_list_continuation() {
        assert_eq!(tree("- a\nb"), r#"doc[ul-[li2[p("a\nb")]]]"#);
    }

    #[test]
    fn test_blank_line_inside_item_keeps_list_open() {
        assert_eq!(
            tree("- a\n\n  b\n- c"),
            r#"doc[ul-[li2[p("a"), p("b")], li2[p("c")]]]"#
        );
        assert_eq!(tree("-\n  a"), r#"doc[ul-[li2[p("a")]]]"#);
    }

    #[test]
    fn test_wide_marker_gap_is_capped() {
        assert_eq!(tree("-     code"), r#"doc[ul-[li2[code("code")]]]"#);
    }

    #[test]
    fn test_empty_item_cannot_interrupt_paragraph() {
        assert_eq!(tree("a\n-"), r#"doc[p("a\n-")]"#);
    }

    #[test]
    fn test_block_quote_closes_on_blank_line() {
        assert_eq!(tree(">a\n\nb"), r#"doc[quote[p("a")], p("b")]"#);
    }

    #[test]
    fn test_block_quote_continuation() {
        assert_eq!(
            tree("> a\n> b\n>\n> c"),
            r#"doc[quote[p("a\nb"), p("c")]]"#
        );
        assert_eq!(tree("> a\nlazy"), r#"doc[quote[p("a\nlazy")]]"#);
    }

    #[test]
    fn test_block_quote_ends_before_other_blocks() {
        assert_eq!(tree("> a\n---"), r#"doc[quote[p("a")], hr]"#);
        assert_eq!(
            tree("> ```\ncode"),
            r#"doc[quote[fence[]("")], p("code")]"#
        );
    }

    #[test]
    fn test_nested_block_quotes() {
        assert_eq!(
            tree(">> a\n> > b\n> c"),
            r#"doc[quote[quote[p("a\nb\nc")]]]"#
        );
        assert_eq!(
            tree(">> a\n>\n> c"),
            r#"doc[quote[quote[p("a")], p("c")]]"#
        );
    }

    #[test]
    fn test_list_inside_block_quote() {
        assert_eq!(tree("> - item"), r#"doc[quote[ul-[li2[p("item")]]]]"#);
        assert_eq!(
            tree("> - a\n>   b\n> - c"),
            r#"doc[quote[ul-[li2[p("a\nb")], li2[p("c")]]]]"#
        );
    }

    #[test]
    fn test_block_quote_inside_list() {
        assert_eq!(
            tree("- > a\n  > b\n- c"),
            r#"doc[ul-[li2[quote[p("a\nb")]], li2[p("c")]]]"#
        );
    }

    #[test]
    fn test_code_inside_list_item() {
        assert_eq!(
            tree("1. step\n\n       cargo run\n2. next"),
            r#"doc[ol1[li3[p("step"), code("cargo run")], li3[p("next")]]]"#
        );
        assert_eq!(
            tree("- ```\n  a\n  ```\n- b"),
            r#"doc[ul-[li2[fence[]("a")], li2[p("b")]]]"#
        );
    }

    #[test]
    fn test_closed_nodes_are_not_reused() {
        let doc = parse("> a\n\n> b");
        let root = doc.root();
        assert_eq!(doc.children(root).len(), 2);
        assert_eq!(outline(&doc, root), r#"doc[quote[p("a")], quote[p("b")]]"#);
    }

    #[test]
    fn test_everything_closed_after_parse() {
        let doc = parse("> - a\n>   ```\n>   code");
        let mut pending = vec![doc.root()];
        let mut seen = 0;
        while let Some(id) = pending.pop() {
            assert!(doc[id].closed, "{:?} left open", doc[id].kind);
            pending.extend(doc.children(id).iter().copied());
            seen += 1;
        }
        assert_eq!(seen, doc.len());
    }

    #[test]
    fn test_tabs_expand_to_four_columns() {
        assert_eq!(tree("\tcode"), r#"doc[code("code")]"#);
        assert_eq!(tree("-\tItem"), r#"doc[ul-[li4[p("Item")]]]"#);
    }

    #[test]
    fn test_crlf_lines() {
        assert_eq!(tree("a\r\nb\r\n\r\nc"), r#"doc[p("a\nb"), p("c")]"#);
    }

    #[test]
    fn test_nesting_limit() {
        init_logger();
        let parser = Parser::with_options(Options {
            max_nesting: 3,
            ..Options::default()
        });
        assert!(parser.parse("> > > a").is_ok());
        assert_eq!(
            parser.parse("> > > > a"),
            Err(ParseError::NestingTooDeep { depth: 4, limit: 3 })
        );
        assert_eq!(
            parser.parse("- - - - a"),
            Err(ParseError::NestingTooDeep { depth: 4, limit: 3 })
        );
    }

    #[test]
    fn test_nesting_limit_is_capped() {
        let parser = Parser::with_options(Options {
            max_nesting: usize::MAX,
            ..Options::default()
        });
        let input = ">".repeat(MAX_NESTING_CEILING + 10);
        assert_eq!(
            parser.parse(&input),
            Err(ParseError::NestingTooDeep {
                depth: MAX_NESTING_CEILING + 1,
                limit: MAX_NESTING_CEILING,
            })
        );
    }

    #[test]
    fn test_deep_quote_line_does_not_overflow() {
        let input = ">".repeat(10_000);
        assert!(matches!(
            Parser::new().parse(&input),
            Err(ParseError::NestingTooDeep { .. })
        ));
    }
}
