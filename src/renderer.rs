/// HTML renderer for the block tree
use crate::ast::{BlockKind, Document, NodeId};
use crate::config::Options;
use crate::inline::{escape_html, render_inline};

/// Turns the body of a code block into the HTML placed inside `<code>`.
/// `language` is the first word of a fence's info string.
pub trait CodeHighlighter {
    fn highlight(&self, language: Option<&str>, code: &str) -> String;
}

/// Escapes code without adding any markup
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainHighlighter;

impl CodeHighlighter for PlainHighlighter {
    fn highlight(&self, _language: Option<&str>, code: &str) -> String {
        escape_html(code)
    }
}

pub struct HtmlRenderer {
    indent_width: usize,
    highlighter: Box<dyn CodeHighlighter>,
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self::with_options(&Options::default())
    }

    pub fn with_options(options: &Options) -> Self {
        HtmlRenderer {
            indent_width: options.indent_width,
            highlighter: Box::new(PlainHighlighter),
        }
    }

    pub fn with_highlighter(mut self, highlighter: impl CodeHighlighter + 'static) -> Self {
        self.highlighter = Box::new(highlighter);
        self
    }

    pub fn render(&self, doc: &Document) -> String {
        self.render_node(doc, doc.root(), 0)
    }

    /// Render `id` and its subtree with its opening tag indented by `indent` spaces
    pub fn render_node(&self, doc: &Document, id: NodeId, indent: usize) -> String {
        let block = &doc[id];
        let pad = " ".repeat(indent);

        match &block.kind {
            BlockKind::Document => self.render_children(doc, id, indent),
            BlockKind::Paragraph => {
                format!("{}<p>{}</p>\n", pad, render_inline(block.text.trim_end()))
            }
            BlockKind::Heading { level } => format!(
                "{}<h{}>{}</h{}>\n",
                pad,
                level,
                render_inline(block.text.trim_end()),
                level
            ),
            BlockKind::ThematicBreak => format!("{}<hr />\n", pad),
            BlockKind::HtmlBlock => block
                .text
                .lines()
                .map(|line| format!("{}{}\n", pad, line))
                .collect(),
            BlockKind::FencedCode { info_string, .. } => {
                let language = info_string.split_whitespace().next();
                self.render_code(&pad, language, &block.text)
            }
            BlockKind::IndentedCode => self.render_code(&pad, None, &block.text),
            BlockKind::BlockQuote => self.render_container(doc, id, indent, "blockquote", ""),
            BlockKind::UnorderedList { .. } => self.render_container(doc, id, indent, "ul", ""),
            BlockKind::OrderedList { start, .. } => {
                let attrs = if *start == 1 {
                    String::new()
                } else {
                    format!(" start=\"{}\"", start)
                };
                self.render_container(doc, id, indent, "ol", &attrs)
            }
            BlockKind::ListItem => self.render_list_item(doc, id, indent),
        }
    }

    fn render_children(&self, doc: &Document, id: NodeId, indent: usize) -> String {
        doc.children(id)
            .iter()
            .map(|&child| self.render_node(doc, child, indent))
            .collect()
    }

    fn render_container(
        &self,
        doc: &Document,
        id: NodeId,
        indent: usize,
        tag: &str,
        attrs: &str,
    ) -> String {
        let pad = " ".repeat(indent);
        format!(
            "{pad}<{tag}{attrs}>\n{}{pad}</{tag}>\n",
            self.render_children(doc, id, indent + self.indent_width)
        )
    }

    fn render_list_item(&self, doc: &Document, id: NodeId, indent: usize) -> String {
        let pad = " ".repeat(indent);
        match doc.children(id) {
            [] => format!("{}<li></li>\n", pad),
            // A single one-line paragraph is written inline
            &[only]
                if doc[only].kind == BlockKind::Paragraph && doc[only].line_count() == 1 =>
            {
                format!("{}<li>{}</li>\n", pad, render_inline(doc[only].text.trim_end()))
            }
            _ => self.render_container(doc, id, indent, "li", ""),
        }
    }

    fn render_code(&self, pad: &str, language: Option<&str>, text: &str) -> String {
        let class = language
            .map(|language| format!(" class=\"language-{}\"", escape_html(language)))
            .unwrap_or_default();
        let code = if text.is_empty() {
            String::new()
        } else {
            format!("{}\n", text)
        };
        format!(
            "{}<pre><code{}>{}</code></pre>\n",
            pad,
            class,
            self.highlighter.highlight(language, &code)
        )
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}
