use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::position::Span;
use crate::visitor::Visitable;

/// The delimiter family used around an element's children. `None` means no
/// delimiters were written, which implies zero or one child.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum BlockKind {
    #[default]
    None,
    Normal,
    Group,
    Generic,
}

impl BlockKind {
    /// The `_groupType` marker emitted by the XML encoder for shapes that
    /// would otherwise be lost. `Normal` and `None` have no marker.
    pub fn group_type(self) -> Option<&'static str> {
        match self {
            BlockKind::Group => Some("()"),
            BlockKind::Generic => Some("<>"),
            BlockKind::Normal | BlockKind::None => None,
        }
    }
}

/// A single attribute on an element, in definition order.
#[derive(Clone, Debug, Serialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
    pub span: Span,
}

/// The ordered attribute list of one element. Keys are unique; the parser
/// rejects duplicates before they ever reach a tree.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AttributeList {
    entries: Vec<Attribute>,
}

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|attr| attr.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn push(&mut self, attribute: Attribute) {
        debug_assert!(
            !self.contains(&attribute.key),
            "duplicate attribute key {:?} slipped past the parser",
            attribute.key
        );
        self.entries.push(attribute);
    }
}

/// An element node: a name, its attributes, the delimiter family of its
/// children, and the children themselves. Children are owned directly, so
/// the tree is acyclic by construction and carries no parent pointers.
#[derive(Clone, Debug, Serialize)]
pub struct Element {
    pub name: String,
    pub attributes: AttributeList,
    pub block: BlockKind,
    pub children: Vec<TreeNode>,
    pub span: Span,
}

impl Element {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            attributes: AttributeList::new(),
            block: BlockKind::None,
            children: Vec::new(),
            span,
        }
    }
}

/// One node of a parsed DYML document. Text and comments are always leaves.
#[derive(Clone, Debug, Serialize)]
pub enum TreeNode {
    Text { value: String, span: Span },
    Comment { value: String, span: Span },
    Element(Element),
}

impl TreeNode {
    pub fn is_element(&self) -> bool {
        matches!(self, TreeNode::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, TreeNode::Text { .. })
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, TreeNode::Comment { .. })
    }

    /// The element name, or `None` for text and comments.
    pub fn name(&self) -> Option<&str> {
        match self {
            TreeNode::Element(element) => Some(&element.name),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            TreeNode::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            TreeNode::Text { span, .. } | TreeNode::Comment { span, .. } => span,
            TreeNode::Element(element) => &element.span,
        }
    }

    /// The children of an element, or an empty slice for leaves.
    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::Element(element) => &element.children,
            _ => &[],
        }
    }

    pub fn block(&self) -> BlockKind {
        match self {
            TreeNode::Element(element) => element.block,
            _ => BlockKind::None,
        }
    }

    /// Look up an attribute value on an element node.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.as_element().and_then(|element| element.attributes.get(key))
    }

    /// The first child element with the given name.
    pub fn find(&self, name: &str) -> Option<&TreeNode> {
        self.children()
            .iter()
            .find(|child| child.name() == Some(name))
    }

    /// All child elements with the given name, in document order.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TreeNode> {
        self.children()
            .iter()
            .filter(move |child| child.name() == Some(name))
    }

    /// Replay this subtree through a `Visitable` in document order, exactly
    /// as the parser reported it. `finalize` is left to the caller.
    pub fn replay(&self, visitor: &mut impl Visitable) -> Result<()> {
        match self {
            TreeNode::Text { value, span } => visitor.text(value, span, false),
            TreeNode::Comment { value, span } => visitor.comment(value, span),
            TreeNode::Element(element) => {
                visitor.open(&element.name, &element.span, false)?;
                for attr in element.attributes.iter() {
                    visitor.attribute(&attr.key, &attr.value, &attr.span)?;
                }
                visitor.set_block_kind(element.block)?;
                for child in &element.children {
                    child.replay(visitor)?;
                }
                visitor.close(&element.span)
            }
        }
    }

    /// All directly contained text, concatenated.
    pub fn text_content(&self) -> String {
        match self {
            TreeNode::Text { value, .. } => value.clone(),
            TreeNode::Comment { .. } => String::new(),
            TreeNode::Element(element) => {
                let mut out = String::new();
                for child in &element.children {
                    if let TreeNode::Text { value, .. } = child {
                        out.push_str(value);
                    }
                }
                out
            }
        }
    }
}

/// The compact, span-free canonical form used by tests and debugging:
/// `root{item @id="1" "text"}`. `Normal` and `None` blocks render alike
/// (both are curly), so G1 and G2 spellings of the same document display
/// identically; the exact kind stays available through `block()`.
impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeNode::Text { value, .. } => write!(f, "{:?}", value),
            TreeNode::Comment { value, .. } => write!(f, "#?{:?}", value),
            TreeNode::Element(element) => {
                f.write_str(&element.name)?;
                for attr in element.attributes.iter() {
                    write!(f, " @{}={:?}", attr.key, attr.value)?;
                }
                let (open, close) = match element.block {
                    BlockKind::Group => ("(", ")"),
                    BlockKind::Generic => ("<", ">"),
                    BlockKind::Normal => ("{", "}"),
                    BlockKind::None if element.children.is_empty() => return Ok(()),
                    BlockKind::None => ("{", "}"),
                };
                f.write_str(open)?;
                for (index, child) in element.children.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    fmt::Display::fmt(child, f)?;
                }
                f.write_str(close)
            }
        }
    }
}
