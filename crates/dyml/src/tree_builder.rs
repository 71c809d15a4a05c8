use crate::error::Result;
use crate::position::Span;
use crate::tree::{Attribute, BlockKind, Element, TreeNode};
use crate::visitor::Visitable;

/// A `Visitable` that builds an owned `TreeNode` tree.
///
/// The builder keeps a working stack of open elements. Forwarded frames are
/// marked on open; when such a frame closes, the finished subtree moves to
/// `forwarded` instead of its lexical parent and is spliced in as the first
/// children of the next non-forwarded element that opens.
#[derive(Default)]
pub struct TreeBuilder {
    stack: Vec<Frame>,
    forwarded: Vec<TreeNode>,
    result: Option<TreeNode>,
}

struct Frame {
    element: Element,
    forward: bool,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished tree. Only available after a successful parse.
    pub fn into_tree(self) -> Option<TreeNode> {
        self.result
    }

    fn top(&mut self) -> &mut Element {
        &mut self
            .stack
            .last_mut()
            .expect("visitor callbacks arrived without an open element")
            .element
    }
}

impl Visitable for TreeBuilder {
    fn open(&mut self, name: &str, span: &Span, forward: bool) -> Result<()> {
        let mut element = Element::new(name, span.clone());
        if !forward {
            // Forwarded subtrees become the first children of their host.
            element.children = std::mem::take(&mut self.forwarded);
        }
        self.stack.push(Frame { element, forward });
        Ok(())
    }

    fn attribute(&mut self, key: &str, value: &str, span: &Span) -> Result<()> {
        self.top().attributes.push(Attribute {
            key: key.to_string(),
            value: value.to_string(),
            span: span.clone(),
        });
        Ok(())
    }

    fn set_block_kind(&mut self, kind: BlockKind) -> Result<()> {
        self.top().block = kind;
        Ok(())
    }

    fn text(&mut self, value: &str, span: &Span, forward: bool) -> Result<()> {
        let node = TreeNode::Text {
            value: value.to_string(),
            span: span.clone(),
        };
        if forward {
            self.forwarded.push(node);
        } else {
            self.top().children.push(node);
        }
        Ok(())
    }

    fn comment(&mut self, value: &str, span: &Span) -> Result<()> {
        let node = TreeNode::Comment {
            value: value.to_string(),
            span: span.clone(),
        };
        self.top().children.push(node);
        Ok(())
    }

    fn close(&mut self, span: &Span) -> Result<()> {
        let frame = self
            .stack
            .pop()
            .expect("close arrived without an open element");
        let mut element = frame.element;
        element.span = element.span.to(span);
        let node = TreeNode::Element(element);

        if frame.forward {
            self.forwarded.push(node);
        } else if let Some(parent) = self.stack.last_mut() {
            parent.element.children.push(node);
        } else {
            self.result = Some(node);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        // The driver reports orphaned forwards as positional errors before
        // finalize; by the time we get here both stores must be drained.
        debug_assert!(self.stack.is_empty(), "unbalanced open/close callbacks");
        debug_assert!(
            self.forwarded.is_empty(),
            "forwarded nodes left without a host"
        );
        debug_assert!(self.result.is_some(), "finalize before the root closed");
        Ok(())
    }
}
