use std::io::{BufWriter, Write};

use crate::error::Result;
use crate::format::util::encode_xml_text;
use crate::position::Span;
use crate::tree::{Attribute, BlockKind, Element, TreeNode};
use crate::visitor::Visitable;

/// A `Visitable` that streams well-formed XML to a writer.
///
/// Opening tags are lazy: `open` only records a pending entry so that the
/// attributes arriving afterwards can still land inside the tag. The tag is
/// flushed by the first event that needs the element committed — a child
/// opening, text, a comment, or the close itself.
///
/// Forwarded frames cannot be streamed because their host is not known yet;
/// they are buffered as detached `TreeNode` subtrees and written right after
/// the host's opening tag.
pub struct XmlEncoder<W: Write> {
    out: BufWriter<W>,
    pending: Vec<PendingTag>,
    /// Completed forwarded subtrees waiting for their host.
    forwarded: Vec<TreeNode>,
    /// Elements of a forwarded subtree currently under construction.
    forward_stack: Vec<Element>,
    group_types: bool,
}

struct PendingTag {
    name: String,
    attributes: Vec<(String, String)>,
    committed: bool,
    /// Forwarded subtrees to splice in right after this tag opens.
    forwarded: Vec<TreeNode>,
}

impl<W: Write> XmlEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: BufWriter::new(writer),
            pending: Vec::new(),
            forwarded: Vec::new(),
            forward_stack: Vec::new(),
            group_types: true,
        }
    }

    /// Whether non-`Normal` block shapes surface as `_groupType` attributes
    /// (`"()"` and `"<>"`). On by default.
    pub fn with_group_types(mut self, enabled: bool) -> Self {
        self.group_types = enabled;
        self
    }

    /// Write the pending opening tag of the innermost element, if it has not
    /// been written yet, followed by its buffered forwarded children.
    fn commit_top(&mut self) -> Result<()> {
        let Some(top) = self.pending.last_mut() else {
            return Ok(());
        };
        if top.committed {
            return Ok(());
        }
        top.committed = true;
        let name = std::mem::take(&mut top.name);
        let attributes = std::mem::take(&mut top.attributes);
        let forwarded = std::mem::take(&mut top.forwarded);

        self.write_open_tag(&name, &attributes)?;
        for node in &forwarded {
            self.write_node(node)?;
        }
        // The name still has to close the tag later.
        self.pending.last_mut().expect("just inspected").name = name;
        Ok(())
    }

    fn write_open_tag(&mut self, name: &str, attributes: &[(String, String)]) -> Result<()> {
        write!(self.out, "<{}", name)?;
        for (key, value) in attributes {
            write!(self.out, " {}=\"", key)?;
            self.write_escaped(value)?;
            write!(self.out, "\"")?;
        }
        write!(self.out, ">")?;
        Ok(())
    }

    fn write_escaped(&mut self, text: &str) -> Result<()> {
        for chunk in encode_xml_text(text) {
            self.out.write_all(chunk.as_bytes())?;
        }
        Ok(())
    }

    fn write_comment(&mut self, value: &str) -> Result<()> {
        write!(self.out, "<!--")?;
        self.write_escaped(value)?;
        write!(self.out, "-->")?;
        Ok(())
    }

    /// Serialize a buffered subtree. Used for forwarded nodes, which only
    /// become writable once their host commits.
    fn write_node(&mut self, node: &TreeNode) -> Result<()> {
        match node {
            TreeNode::Text { value, .. } => self.write_escaped(value),
            TreeNode::Comment { value, .. } => self.write_comment(value),
            TreeNode::Element(element) => {
                let mut attributes: Vec<(String, String)> = element
                    .attributes
                    .iter()
                    .map(|attr| (attr.key.clone(), attr.value.clone()))
                    .collect();
                if self.group_types {
                    if let Some(group_type) = element.block.group_type() {
                        attributes.push(("_groupType".to_string(), group_type.to_string()));
                    }
                }
                self.write_open_tag(&element.name, &attributes)?;
                for child in &element.children {
                    self.write_node(child)?;
                }
                write!(self.out, "</{}>", element.name)?;
                Ok(())
            }
        }
    }
}

impl<W: Write> Visitable for XmlEncoder<W> {
    fn open(&mut self, name: &str, span: &Span, forward: bool) -> Result<()> {
        if forward || !self.forward_stack.is_empty() {
            self.forward_stack.push(Element::new(name, span.clone()));
            return Ok(());
        }

        self.commit_top()?;
        let forwarded = std::mem::take(&mut self.forwarded);
        self.pending.push(PendingTag {
            name: name.to_string(),
            attributes: Vec::new(),
            committed: false,
            forwarded,
        });
        Ok(())
    }

    fn attribute(&mut self, key: &str, value: &str, span: &Span) -> Result<()> {
        if let Some(element) = self.forward_stack.last_mut() {
            element.attributes.push(Attribute {
                key: key.to_string(),
                value: value.to_string(),
                span: span.clone(),
            });
            return Ok(());
        }

        let top = self
            .pending
            .last_mut()
            .expect("attribute callback without an open element");
        debug_assert!(!top.committed, "attribute arrived after the tag flushed");
        top.attributes.push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn set_block_kind(&mut self, kind: BlockKind) -> Result<()> {
        if let Some(element) = self.forward_stack.last_mut() {
            element.block = kind;
            return Ok(());
        }

        if self.group_types {
            if let Some(group_type) = kind.group_type() {
                let top = self
                    .pending
                    .last_mut()
                    .expect("block kind callback without an open element");
                top.attributes
                    .push(("_groupType".to_string(), group_type.to_string()));
            }
        }
        Ok(())
    }

    fn text(&mut self, value: &str, span: &Span, forward: bool) -> Result<()> {
        if let Some(element) = self.forward_stack.last_mut() {
            element.children.push(TreeNode::Text {
                value: value.to_string(),
                span: span.clone(),
            });
            return Ok(());
        }
        if forward {
            self.forwarded.push(TreeNode::Text {
                value: value.to_string(),
                span: span.clone(),
            });
            return Ok(());
        }

        self.commit_top()?;
        self.write_escaped(value)
    }

    fn comment(&mut self, value: &str, span: &Span) -> Result<()> {
        if let Some(element) = self.forward_stack.last_mut() {
            element.children.push(TreeNode::Comment {
                value: value.to_string(),
                span: span.clone(),
            });
            return Ok(());
        }

        self.commit_top()?;
        self.write_comment(value)
    }

    fn close(&mut self, _span: &Span) -> Result<()> {
        if let Some(element) = self.forward_stack.pop() {
            let node = TreeNode::Element(element);
            match self.forward_stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => self.forwarded.push(node),
            }
            return Ok(());
        }

        self.commit_top()?;
        let top = self
            .pending
            .pop()
            .expect("close callback without an open element");
        write!(self.out, "</{}>", top.name)?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        debug_assert!(self.pending.is_empty(), "finalize with unclosed elements");
        debug_assert!(
            self.forwarded.is_empty() && self.forward_stack.is_empty(),
            "finalize with unhosted forwarded nodes"
        );
        self.out.flush()?;
        Ok(())
    }
}
