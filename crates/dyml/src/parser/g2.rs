use std::io::Read;

use crate::error::{Result, SyntaxError};
use crate::position::Span;
use crate::token::TokenKind;
use crate::tree::BlockKind;
use crate::visitor::Visitable;

use super::{g1, misplaced_attribute, unexpected_token, Parser};

/// Parse a G2 region starting at its `#!` preamble. A braced region hangs
/// its nodes off the current element; a bare region holds exactly one node.
/// The root surface must be curly: `(` or `<` directly after `#!` is a
/// shape error.
pub(super) fn parse_region<R: Read, V: Visitable>(p: &mut Parser<R, V>) -> Result<()> {
    p.expect(TokenKind::G2Preamble)?;
    match p.peek_kind()? {
        TokenKind::BlockStart => {
            p.bump()?;
            parse_children(p)?;
            p.expect(TokenKind::BlockEnd)?;
            Ok(())
        }
        TokenKind::GroupStart | TokenKind::GenericStart => {
            let token = p.bump()?;
            Err(SyntaxError::ParseRootShape {
                span: token.span().clone(),
            })
        }
        _ => loop {
            match p.peek_kind()? {
                TokenKind::G2Comment => parse_comment(p)?,
                TokenKind::DefineAttribute if p.peek()?.is_forward() => {
                    drain_forward_attribute(p)?
                }
                TokenKind::DefineAttribute => {
                    let token = p.bump()?;
                    return Err(misplaced_attribute(&token));
                }
                TokenKind::Identifier => {
                    parse_node(p)?;
                    return Ok(());
                }
                TokenKind::CharData => {
                    let text = p.bump()?;
                    p.text(text.text(), text.span(), false)?;
                    return Ok(());
                }
                TokenKind::DefineElement => {
                    parse_line(p)?;
                    return Ok(());
                }
                TokenKind::G2Arrow => {
                    let token = p.bump()?;
                    return Err(SyntaxError::ParseArrowMisuse {
                        message: "a return arrow requires a preceding node".to_string(),
                        span: token.span().clone(),
                    });
                }
                _ => {
                    let token = p.bump()?;
                    return Err(unexpected_token(
                        &token,
                        &[TokenKind::Identifier, TokenKind::CharData, TokenKind::BlockStart],
                    ));
                }
            }
        },
    }
}

/// Parse G2 children up to, but not consuming, the next closing bracket.
/// The caller validates that the closer actually matches its opener, which
/// is what rejects a `)` closing a `{` block.
fn parse_children<R: Read, V: Visitable>(p: &mut Parser<R, V>) -> Result<()> {
    loop {
        match p.peek_kind()? {
            TokenKind::BlockEnd | TokenKind::GroupEnd | TokenKind::GenericEnd => {
                p.check_no_pending_forward_attributes()?;
                return Ok(());
            }
            TokenKind::EndOfInput => return Ok(()),
            TokenKind::G2Comment => parse_comment(p)?,
            TokenKind::DefineAttribute => {
                if p.peek()?.is_forward() {
                    drain_forward_attribute(p)?;
                } else {
                    let token = p.bump()?;
                    return Err(misplaced_attribute(&token));
                }
            }
            TokenKind::Identifier => parse_node(p)?,
            TokenKind::CharData => {
                let text = p.bump()?;
                p.text(text.text(), text.span(), false)?;
                if p.peek_kind()?.is_separator() {
                    p.bump()?;
                }
            }
            TokenKind::DefineElement => parse_line(p)?,
            TokenKind::G2Arrow => {
                let token = p.bump()?;
                return Err(SyntaxError::ParseArrowMisuse {
                    message: "a return arrow cannot follow a separator or start a block"
                        .to_string(),
                    span: token.span().clone(),
                });
            }
            _ => {
                let token = p.bump()?;
                return Err(unexpected_token(
                    &token,
                    &[
                        TokenKind::Identifier,
                        TokenKind::CharData,
                        TokenKind::DefineElement,
                        TokenKind::DefineAttribute,
                        TokenKind::BlockEnd,
                    ],
                ));
            }
        }
    }
}

/// Parse one G2 node starting at its identifier: attributes, an optional
/// child surface (bracketed block, G1 line, chained node, or quoted text),
/// at most one return arrow, and an optional trailing separator.
fn parse_node<R: Read, V: Visitable>(p: &mut Parser<R, V>) -> Result<()> {
    let name = p.expect(TokenKind::Identifier)?;
    let name_span = name.span().clone();
    p.open_element(name.text(), &name_span, false)?;

    parse_attributes(p)?;

    let mut end_span = name_span;
    match p.peek_kind()? {
        kind if kind.is_block_opener() => {
            let open = p.bump()?;
            p.set_block_kind(block_kind_of(open.kind()))?;
            parse_children(p)?;
            let close = p.expect(closer_of(open.kind()))?;
            end_span = close.span().clone();
        }
        TokenKind::DefineElement => parse_line(p)?,
        TokenKind::Identifier => parse_node(p)?,
        TokenKind::CharData => {
            let text = p.bump()?;
            end_span = text.span().clone();
            p.text(text.text(), text.span(), false)?;
        }
        _ => {}
    }

    while p.peek_kind()? == TokenKind::G2Comment {
        parse_comment(p)?;
    }

    if p.peek_kind()? == TokenKind::G2Arrow {
        let ret_end = parse_arrow(p)?;
        end_span = ret_end;
        if p.peek_kind()? == TokenKind::G2Arrow {
            let token = p.bump()?;
            return Err(SyntaxError::ParseArrowMisuse {
                message: "a node can carry only one return arrow".to_string(),
                span: token.span().clone(),
            });
        }
    }

    if p.peek_kind()?.is_separator() {
        p.bump()?;
    }

    p.close_element(&end_span)
}

/// Parse a `->` return group. The children that follow form a pseudo-element
/// named `ret` (or the identifier overriding it) appended to the current
/// node. Returns the span where the group ended.
fn parse_arrow<R: Read, V: Visitable>(p: &mut Parser<R, V>) -> Result<Span> {
    let arrow = p.expect(TokenKind::G2Arrow)?;
    if p.has_pending_forward_attributes() {
        return Err(SyntaxError::ParseForwardMisplaced {
            message: "attributes cannot be forwarded into a return group".to_string(),
            span: arrow.span().clone(),
            details: vec![],
        });
    }

    match p.peek_kind()? {
        kind if kind.is_block_opener() => {
            p.open_element("ret", arrow.span(), false)?;
            let open = p.bump()?;
            p.set_block_kind(block_kind_of(open.kind()))?;
            parse_children(p)?;
            let close = p.expect(closer_of(open.kind()))?;
            let end = close.span().clone();
            p.close_element(&end)?;
            Ok(end)
        }
        TokenKind::Identifier if p.peek_at(1)?.kind().is_block_opener() => {
            // The identifier renames the return group.
            let name = p.expect(TokenKind::Identifier)?;
            p.open_element(name.text(), name.span(), false)?;
            let open = p.bump()?;
            p.set_block_kind(block_kind_of(open.kind()))?;
            parse_children(p)?;
            let close = p.expect(closer_of(open.kind()))?;
            let end = close.span().clone();
            p.close_element(&end)?;
            Ok(end)
        }
        TokenKind::Identifier => {
            // No block: the group holds exactly the next node.
            p.open_element("ret", arrow.span(), false)?;
            parse_node(p)?;
            let end = arrow.span().clone();
            p.close_element(&end)?;
            Ok(end)
        }
        TokenKind::CharData => {
            let text = p.bump()?;
            p.open_element("ret", arrow.span(), false)?;
            p.text(text.text(), text.span(), false)?;
            let end = text.span().clone();
            p.close_element(&end)?;
            Ok(end)
        }
        _ => {
            let token = p.bump()?;
            Err(SyntaxError::ParseArrowMisuse {
                message: "a return arrow requires a name, a block, or a value".to_string(),
                span: token.span().clone(),
            })
        }
    }
}

/// Parse one G1 line embedded in G2, starting at its leading `#`/`##`. The
/// line's children attach to the current node, or are stashed for the next
/// host when the line itself forwards.
fn parse_line<R: Read, V: Visitable>(p: &mut Parser<R, V>) -> Result<()> {
    let define = p.expect(TokenKind::DefineElement)?;
    let line_forward = define.is_forward();
    loop {
        match p.peek_kind()? {
            TokenKind::G1LineEnd => {
                p.bump()?;
                return Ok(());
            }
            // The enclosing G2 block can close a line without a line ending;
            // the closer stays in the stream for the block's owner.
            TokenKind::BlockEnd | TokenKind::EndOfInput => return Ok(()),
            TokenKind::CharData => {
                let text = p.bump()?;
                p.text(text.text(), text.span(), line_forward)?;
            }
            TokenKind::DefineElement => {
                let nested = p.peek()?;
                if nested.is_forward() && line_forward {
                    let span = nested.span().clone();
                    return Err(SyntaxError::ParseForwardMisplaced {
                        message: "a forwarded line cannot contain another forward marker"
                            .to_string(),
                        span,
                        details: vec![],
                    });
                }
                g1::parse_element(p, line_forward)?;
            }
            TokenKind::DefineAttribute => {
                if p.peek()?.is_forward() {
                    g1::drain_forward_attribute(p)?;
                } else {
                    let token = p.bump()?;
                    return Err(misplaced_attribute(&token));
                }
            }
            _ => {
                let token = p.bump()?;
                return Err(unexpected_token(
                    &token,
                    &[
                        TokenKind::CharData,
                        TokenKind::DefineElement,
                        TokenKind::G1LineEnd,
                    ],
                ));
            }
        }
    }
}

/// `// …` — a comment on the innermost open node.
fn parse_comment<R: Read, V: Visitable>(p: &mut Parser<R, V>) -> Result<()> {
    p.expect(TokenKind::G2Comment)?;
    let text = p.expect(TokenKind::CharData)?;
    p.comment(text.text(), text.span())
}

/// Drain the `@key="value"` attributes directly after a node name. A
/// forwarding `@@` here belongs to a later sibling and ends the run.
fn parse_attributes<R: Read, V: Visitable>(p: &mut Parser<R, V>) -> Result<()> {
    while p.peek_kind()? == TokenKind::DefineAttribute && !p.peek()?.is_forward() {
        p.bump()?;
        let key = p.expect(TokenKind::Identifier)?;
        p.expect(TokenKind::Assign)?;
        let value = p.expect(TokenKind::CharData)?;
        let span = key.span().to(value.span());
        p.attribute(key.text(), value.text(), key.span(), &span)?;
    }
    Ok(())
}

/// Stash one `@@key="value"` for the next element that opens.
fn drain_forward_attribute<R: Read, V: Visitable>(p: &mut Parser<R, V>) -> Result<()> {
    let define = p.expect(TokenKind::DefineAttribute)?;
    let key = p.expect(TokenKind::Identifier)?;
    p.expect(TokenKind::Assign)?;
    let value = p.expect(TokenKind::CharData)?;
    p.push_forward_attribute(
        key.text().to_string(),
        value.text().to_string(),
        key.span().clone(),
        define.span().to(value.span()),
    );
    Ok(())
}

fn block_kind_of(kind: TokenKind) -> BlockKind {
    match kind {
        TokenKind::BlockStart => BlockKind::Normal,
        TokenKind::GroupStart => BlockKind::Group,
        TokenKind::GenericStart => BlockKind::Generic,
        _ => unreachable!("not a block opener: {:?}", kind),
    }
}

fn closer_of(kind: TokenKind) -> TokenKind {
    match kind {
        TokenKind::BlockStart => TokenKind::BlockEnd,
        TokenKind::GroupStart => TokenKind::GroupEnd,
        TokenKind::GenericStart => TokenKind::GenericEnd,
        _ => unreachable!("not a block opener: {:?}", kind),
    }
}
