/// Parser and renderer options
use serde::{Deserialize, Serialize};

/// Upper bound on `max_nesting`; larger values are clamped so that deep
/// input still fails cleanly instead of exhausting the stack
pub const MAX_NESTING_CEILING: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Tab stops are placed every `tab_width` columns before a line is classified
    pub tab_width: usize,
    /// Maximum number of nested block quotes and list items
    pub max_nesting: usize,
    /// Spaces added per nesting level in the rendered HTML
    pub indent_width: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            tab_width: 4,
            max_nesting: 64,
            indent_width: 2,
        }
    }
}

impl Options {
    /// Read options from a JSON object; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// `max_nesting`, clamped to [`MAX_NESTING_CEILING`]
    pub fn nesting_limit(&self) -> usize {
        if self.max_nesting > MAX_NESTING_CEILING {
            log::warn!(
                "max_nesting {} clamped to {}",
                self.max_nesting,
                MAX_NESTING_CEILING
            );
        }
        self.max_nesting.min(MAX_NESTING_CEILING)
    }
}
