use std::collections::VecDeque;
use std::io::Read;

use crate::error::{ErrorDetail, Result, SyntaxError};
use crate::lexer::Lexer;
use crate::position::Span;
use crate::token::{Token, TokenKind};
use crate::tree::BlockKind;
use crate::visitor::Visitable;

#[cfg(feature = "debug-tracing")]
macro_rules! trace_parse {
    ($($arg:tt)*) => { eprintln!($($arg)*) };
}

#[cfg(not(feature = "debug-tracing"))]
macro_rules! trace_parse {
    ($($arg:tt)*) => {{}};
}

mod g1;
mod g2;

/// The parser driver. Pulls tokens from the lexer, applies the grammar, and
/// reports the document to a `Visitable` as a flat sequence of callbacks.
/// The driver never builds the tree itself.
///
/// A synthetic `#root{ … }` frames every document: the lead-in tokens are
/// buffered before the first real token, and the matching closer is queued
/// once the lexer reports the end of input.
pub struct Parser<R: Read, V: Visitable> {
    lexer: Lexer<R>,
    visitor: V,
    buffer: VecDeque<Token>,
    eof_seen: bool,
    frames: Vec<Frame>,
    /// `@@key{value}` / `@@key="value"` attributes waiting for the next
    /// opened element.
    forwarded_attributes: Vec<PendingAttribute>,
    /// Spans of `##` subtrees already handed to the visitor but not yet
    /// hosted. Mirrors the visitor's own stash so orphans can be reported
    /// with a real position.
    forwarded_nodes: Vec<Span>,
}

struct Frame {
    span: Span,
    keys: Vec<(String, Span)>,
    forward: bool,
}

struct PendingAttribute {
    key: String,
    value: String,
    key_span: Span,
    span: Span,
}

pub(crate) fn unexpected_token(token: &Token, expected: &[TokenKind]) -> SyntaxError {
    SyntaxError::ParseUnexpectedToken {
        found: token.to_string(),
        expected: expected.to_vec(),
        span: token.span().clone(),
    }
}

/// A plain `@` attribute may only follow an element name.
fn misplaced_attribute(token: &Token) -> SyntaxError {
    SyntaxError::ParseForwardMisplaced {
        message: "an attribute is only allowed directly after an element name; use '@@' to forward it onto the next element".to_string(),
        span: token.span().clone(),
        details: vec![],
    }
}

impl<R: Read, V: Visitable> Parser<R, V> {
    pub fn new(lexer: Lexer<R>, visitor: V) -> Self {
        Self {
            lexer,
            visitor,
            buffer: VecDeque::new(),
            eof_seen: false,
            frames: Vec::new(),
            forwarded_attributes: Vec::new(),
            forwarded_nodes: Vec::new(),
        }
    }

    /// Run the parse to completion, returning the visitor for the caller to
    /// harvest.
    pub fn run(mut self) -> Result<V> {
        // Pre-roll the virtual root element.
        let start = self.lexer.position().span();
        self.buffer
            .push_back(Token::new(TokenKind::DefineElement, start.clone()));
        self.buffer.push_back(
            Token::new(TokenKind::Identifier, start.clone()).with_text("root".to_string()),
        );
        self.buffer.push_back(Token::new(TokenKind::BlockStart, start));

        g1::parse_element(&mut self, false)?;

        if self.peek_kind()? != TokenKind::EndOfInput {
            let token = self.bump()?;
            return Err(unexpected_token(&token, &[TokenKind::EndOfInput]));
        }

        self.check_no_pending_forward_attributes()?;
        if let Some(span) = self.forwarded_nodes.first() {
            return Err(SyntaxError::ParseForwardMisplaced {
                message: "nothing to forward into".to_string(),
                span: span.clone(),
                details: vec![],
            });
        }

        self.visitor.finalize()?;
        Ok(self.visitor)
    }

    //#region Token supply

    /// Keep at least `count` tokens buffered. Once the lexer reports the end
    /// of input, the virtual root closer is queued first, and `EndOfInput`
    /// repeats forever after it.
    fn ensure(&mut self, count: usize) -> Result<()> {
        while self.buffer.len() < count {
            if self.eof_seen {
                self.buffer.push_back(Token::new(
                    TokenKind::EndOfInput,
                    self.lexer.position().span(),
                ));
                continue;
            }
            let token = self.lexer.token()?;
            if token.kind() == TokenKind::EndOfInput {
                self.eof_seen = true;
                self.buffer
                    .push_back(Token::new(TokenKind::BlockEnd, token.span().clone()));
            }
            self.buffer.push_back(token);
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<&Token> {
        self.ensure(1)?;
        Ok(&self.buffer[0])
    }

    fn peek_at(&mut self, index: usize) -> Result<&Token> {
        self.ensure(index + 1)?;
        Ok(&self.buffer[index])
    }

    fn peek_kind(&mut self) -> Result<TokenKind> {
        Ok(self.peek()?.kind())
    }

    fn bump(&mut self) -> Result<Token> {
        self.ensure(1)?;
        Ok(self.buffer.pop_front().expect("buffer was just filled"))
    }

    /// Consume the current token if it matches, fail with an expectation
    /// list otherwise.
    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.peek_kind()? == kind {
            return self.bump();
        }
        Err(unexpected_token(self.peek()?, &[kind]))
    }

    //#endregion

    //#region Visitor bookkeeping

    /// Open an element and resolve any waiting forwarded attributes onto it.
    fn open_element(&mut self, name: &str, span: &Span, forward: bool) -> Result<()> {
        trace_parse!("open {:?} (forward: {})", name, forward);
        self.visitor.open(name, span, forward)?;
        self.frames.push(Frame {
            span: span.clone(),
            keys: Vec::new(),
            forward,
        });
        if !forward {
            // The visitor splices its stashed forwarded subtrees into this
            // element; mirror that here.
            self.forwarded_nodes.clear();
        }
        let pending = std::mem::take(&mut self.forwarded_attributes);
        for attr in pending {
            self.attribute(&attr.key, &attr.value, &attr.key_span, &attr.span)?;
        }
        Ok(())
    }

    fn close_element(&mut self, span: &Span) -> Result<()> {
        trace_parse!("close at {}", span);
        let frame = self.frames.pop().expect("close without an open frame");
        self.visitor.close(span)?;
        if frame.forward {
            self.forwarded_nodes.push(frame.span.to(span));
        }
        Ok(())
    }

    /// Report an attribute on the innermost open element, rejecting
    /// duplicate keys with a pointer at the original definition.
    fn attribute(&mut self, key: &str, value: &str, key_span: &Span, span: &Span) -> Result<()> {
        let frame = self.frames.last_mut().expect("attribute without a frame");
        if let Some((_, original)) = frame.keys.iter().find(|(existing, _)| existing == key) {
            return Err(SyntaxError::ParseDuplicateAttribute {
                key: key.to_string(),
                span: key_span.clone(),
                details: vec![ErrorDetail::new("first defined here", original.clone())],
            });
        }
        frame.keys.push((key.to_string(), key_span.clone()));
        self.visitor.attribute(key, value, span)
    }

    fn set_block_kind(&mut self, kind: BlockKind) -> Result<()> {
        self.visitor.set_block_kind(kind)
    }

    /// Emit a text child. Attributes can never forward onto character data.
    fn text(&mut self, value: &str, span: &Span, forward: bool) -> Result<()> {
        if let Some(attr) = self.forwarded_attributes.first() {
            return Err(SyntaxError::ParseForwardMisplaced {
                message: "attributes cannot be forwarded onto character data".to_string(),
                span: attr.span.clone(),
                details: vec![ErrorDetail::new("character data is here", span.clone())],
            });
        }
        self.visitor.text(value, span, forward)
    }

    fn comment(&mut self, value: &str, span: &Span) -> Result<()> {
        self.visitor.comment(value, span)
    }

    fn push_forward_attribute(&mut self, key: String, value: String, key_span: Span, span: Span) {
        self.forwarded_attributes.push(PendingAttribute {
            key,
            value,
            key_span,
            span,
        });
    }

    fn has_pending_forward_attributes(&self) -> bool {
        !self.forwarded_attributes.is_empty()
    }

    /// Closing a block (or ending the input) with forwarded attributes still
    /// waiting is an error; there is nothing left for them to attach to.
    fn check_no_pending_forward_attributes(&mut self) -> Result<()> {
        match self.forwarded_attributes.first() {
            Some(attr) => Err(SyntaxError::ParseForwardMisplaced {
                message: format!("nothing to forward attribute {:?} into", attr.key),
                span: attr.span.clone(),
                details: vec![],
            }),
            None => Ok(()),
        }
    }

    //#endregion
}
