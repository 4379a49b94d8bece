/// A Markdown to HTML compiler built on an arena block tree
pub mod ast;
pub mod classify;
pub mod config;
pub mod error;
pub mod inline;
pub mod parser;
pub mod renderer;

pub use ast::{Block, BlockKind, Document, NodeId};
pub use config::Options;
pub use error::ParseError;
pub use inline::render_inline;
pub use parser::Parser;
pub use renderer::{CodeHighlighter, HtmlRenderer, PlainHighlighter};

/// Build the block tree with default options
pub fn parse(markdown: &str) -> Result<Document, ParseError> {
    Parser::new().parse(markdown)
}

pub fn parse_with_options(markdown: &str, options: &Options) -> Result<Document, ParseError> {
    Parser::with_options(options.clone()).parse(markdown)
}

/// Parse markdown text and render to HTML
pub fn markdown_to_html(markdown: &str) -> Result<String, ParseError> {
    markdown_to_html_with_options(markdown, &Options::default())
}

pub fn markdown_to_html_with_options(
    markdown: &str,
    options: &Options,
) -> Result<String, ParseError> {
    let doc = parse_with_options(markdown, options)?;
    Ok(HtmlRenderer::with_options(options).render(&doc))
}
