/// Errors surfaced by the block parser
use thiserror::Error;

/// Malformed Markdown never produces an error; it degrades to plain text.
/// The variants here are either a resource guard or a parser bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("block nesting depth {depth} exceeds the limit of {limit}")]
    NestingTooDeep { depth: usize, limit: usize },

    #[error("internal parser error: {reason}")]
    Internal { reason: &'static str },
}

impl ParseError {
    pub(crate) fn internal(reason: &'static str) -> Self {
        ParseError::Internal { reason }
    }
}
