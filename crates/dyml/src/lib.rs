//! DYML is a markup language with two interchangeable surface syntaxes over
//! one tree-shaped information model: a text-first grammar (G1) where prose
//! is punctuated by `#name{…}` elements and `@key{value}` attributes, and a
//! node-first grammar (G2) introduced by `#!` that reads like a programming
//! language. The two can interleave freely.
//!
//! This crate lexes a byte stream, drives a push parser over it, and either
//! builds an owned [`TreeNode`] tree or transcodes the document straight to
//! XML without materialising it.

pub use error::{ErrorDetail, Result, SyntaxError};
pub use format::XmlEncoder;
pub use lexer::{Lexer, Mode};
pub use position::{Position, Span};
pub use token::{Token, TokenFlags, TokenKind};
pub use tree::{Attribute, AttributeList, BlockKind, Element, TreeNode};
pub use tree_builder::TreeBuilder;
pub use visitor::Visitable;

mod error;
mod format;
mod lexer;
mod parser;
mod position;
mod reader;
mod token;
mod tree;
mod tree_builder;
mod visitor;

use std::io;

use parser::Parser;

/// The file name positions carry when the caller does not provide one.
const DEFAULT_FILE: &str = "<input>";

/// Parse a DYML byte stream into a tree. The root is always an element
/// named `root` with a curly block.
pub fn parse(reader: impl io::Read) -> Result<TreeNode> {
    parse_with_file(reader, DEFAULT_FILE)
}

/// Like [`parse`], with `file` threaded into every position for diagnostics.
pub fn parse_with_file(reader: impl io::Read, file: &str) -> Result<TreeNode> {
    let lexer = Lexer::new(reader, file);
    let builder = Parser::new(lexer, TreeBuilder::new()).run()?;
    Ok(builder
        .into_tree()
        .expect("a successful parse always yields a root"))
}

/// Parse DYML source held in memory.
pub fn parse_str(input: &str) -> Result<TreeNode> {
    parse(input.as_bytes())
}

/// Drive an arbitrary [`Visitable`] over a DYML byte stream.
pub fn visit(reader: impl io::Read, visitable: &mut impl Visitable) -> Result<()> {
    visit_with_file(reader, visitable, DEFAULT_FILE)
}

/// Like [`visit`], with `file` threaded into every position for diagnostics.
pub fn visit_with_file(
    reader: impl io::Read,
    visitable: &mut impl Visitable,
    file: &str,
) -> Result<()> {
    let lexer = Lexer::new(reader, file);
    Parser::new(lexer, visitable).run()?;
    Ok(())
}

/// Transcode a DYML byte stream to XML on `writer`, without building a tree.
/// Output is wrapped in `<root>…</root>`; non-curly G2 block shapes surface
/// as `_groupType` attributes.
pub fn encode(reader: impl io::Read, writer: impl io::Write) -> Result<()> {
    encode_with_file(reader, writer, DEFAULT_FILE)
}

/// Like [`encode`], with `file` threaded into every position for diagnostics.
pub fn encode_with_file(
    reader: impl io::Read,
    writer: impl io::Write,
    file: &str,
) -> Result<()> {
    let mut encoder = XmlEncoder::new(writer);
    visit_with_file(reader, &mut encoder, file)
}

/// Transcode in-memory DYML source to an XML string.
pub fn encode_str(input: &str) -> Result<String> {
    let mut out = Vec::new();
    encode(input.as_bytes(), &mut out)?;
    Ok(String::from_utf8(out).expect("the encoder only writes utf-8"))
}
