/// Block tree for Markdown documents, stored in an arena
use crate::error::ParseError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::ops::Index;

/// Handle of a block inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Document,
    Paragraph,
    Heading {
        level: u8,
    },
    BlockQuote,
    OrderedList {
        start: u32,
        delimiter: char, // '.' or ')'
    },
    UnorderedList {
        marker: char, // '-', '+' or '*'
    },
    ListItem,
    FencedCode {
        fence_len: usize,
        info_string: String,
        fence_indent: usize,
    },
    IndentedCode,
    ThematicBreak,
    HtmlBlock,
}

impl BlockKind {
    /// Containers hold other blocks, everything else holds text
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            BlockKind::Document
                | BlockKind::BlockQuote
                | BlockKind::OrderedList { .. }
                | BlockKind::UnorderedList { .. }
                | BlockKind::ListItem
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Accumulated raw text of a leaf, newline-joined
    pub text: String,
    /// Column where the content of a list item starts, relative to its parent's content
    pub indent_level: usize,
    pub closed: bool,
    lines: usize,
}

impl Block {
    fn new(kind: BlockKind, parent: Option<NodeId>) -> Self {
        Block {
            kind,
            parent,
            children: Vec::new(),
            text: String::new(),
            indent_level: 0,
            closed: false,
            lines: 0,
        }
    }

    /// Number of source lines appended to this leaf
    pub fn line_count(&self) -> usize {
        self.lines
    }
}

/// The parsed block tree. Node 0 is always the `Document` root.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<Block>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<NodeId> for Document {
    type Output = Block;

    fn index(&self, id: NodeId) -> &Block {
        &self.nodes[id.0]
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            nodes: vec![Block::new(BlockKind::Document, None)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> Option<&Block> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.last().copied()
    }

    /// The last child of `id` if it still accepts content
    pub fn open_last_child(&self, id: NodeId) -> Option<NodeId> {
        self.last_child(id).filter(|&child| !self.nodes[child.0].closed)
    }

    /// Containers from the root down to `tip`, inclusive.
    /// Every node on the path must still be open.
    pub(crate) fn open_path(&self, tip: NodeId) -> Result<Vec<NodeId>, ParseError> {
        let mut path = Vec::new();
        let mut cursor = Some(tip);
        while let Some(id) = cursor {
            let block = self
                .get(id)
                .ok_or_else(|| ParseError::internal("node handle out of range"))?;
            if block.closed {
                return Err(ParseError::internal("open path passes through a closed node"));
            }
            path.push(id);
            cursor = block.parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Number of block quotes and list items enclosing `id`, counting `id` itself
    pub fn nesting_depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let block = &self.nodes[current.0];
            if matches!(block.kind, BlockKind::BlockQuote | BlockKind::ListItem) {
                depth += 1;
            }
            cursor = block.parent;
        }
        depth
    }

    /// Append a new open child to `parent`
    pub(crate) fn append(&mut self, parent: NodeId, kind: BlockKind) -> Result<NodeId, ParseError> {
        let parent_block = self
            .get(parent)
            .ok_or_else(|| ParseError::internal("node handle out of range"))?;
        if parent_block.closed {
            return Err(ParseError::internal("append to a closed node"));
        }
        if !parent_block.kind.is_container() {
            return Err(ParseError::internal("append to a leaf node"));
        }

        let id = NodeId(self.nodes.len());
        log::debug!("open {:?} as #{} under #{}", kind, id.0, parent.0);
        self.nodes.push(Block::new(kind, Some(parent)));
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Append a leaf whose first line is `line`
    pub(crate) fn append_leaf(
        &mut self,
        parent: NodeId,
        kind: BlockKind,
        line: &str,
    ) -> Result<NodeId, ParseError> {
        let id = self.append(parent, kind)?;
        self.push_line(id, line);
        Ok(id)
    }

    pub(crate) fn set_indent_level(&mut self, id: NodeId, indent_level: usize) {
        self.nodes[id.0].indent_level = indent_level;
    }

    /// Extend a leaf's text with one more line
    pub(crate) fn push_line(&mut self, id: NodeId, line: &str) {
        let block = &mut self.nodes[id.0];
        if block.lines > 0 {
            block.text.push('\n');
        }
        block.text.push_str(line);
        block.lines += 1;
    }

    /// Close `id` and everything beneath it. Closing an already closed node is a no-op.
    pub(crate) fn close(&mut self, id: NodeId) -> Result<(), ParseError> {
        let block = self
            .get(id)
            .ok_or_else(|| ParseError::internal("node handle out of range"))?;
        if block.closed {
            return Ok(());
        }
        if let Some(parent) = block.parent
            && self.nodes[parent.0].closed
        {
            return Err(ParseError::internal("closing a node with no open ancestor"));
        }

        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if self.nodes[current.0].closed {
                continue;
            }
            log::debug!("close {:?} #{}", self.nodes[current.0].kind, current.0);
            self.finalize(current);
            self.nodes[current.0].closed = true;
            pending.extend(self.nodes[current.0].children.iter().copied());
        }
        Ok(())
    }

    /// Close every node that is still open, root included
    pub(crate) fn finish(&mut self) -> Result<(), ParseError> {
        self.close(self.root())
    }

    fn finalize(&mut self, id: NodeId) {
        let block = &mut self.nodes[id.0];
        if block.kind != BlockKind::IndentedCode {
            return;
        }
        // Blank lines only belong to indented code when more code follows them
        let mut lines: Vec<&str> = block.text.split('\n').collect();
        while lines.len() > 1 && lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        let kept = lines.len();
        block.text = lines.join("\n");
        block.lines = kept;
    }
}

/// Nested view of one node, used to serialize the arena as a tree
struct Subtree<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl Serialize for Subtree<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let block = &self.doc[self.id];
        let children: Vec<Subtree<'_>> = block
            .children
            .iter()
            .map(|&id| Subtree { doc: self.doc, id })
            .collect();

        let mut state = serializer.serialize_struct("Block", 4)?;
        state.serialize_field("kind", &block.kind)?;
        state.serialize_field("text", &block.text)?;
        state.serialize_field("indent_level", &block.indent_level)?;
        state.serialize_field("children", &children)?;
        state.end()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Subtree {
            doc: self,
            id: self.root(),
        }
        .serialize(serializer)
    }
}
