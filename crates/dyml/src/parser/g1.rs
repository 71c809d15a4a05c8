use std::io::Read;

use crate::error::Result;
use crate::token::TokenKind;
use crate::tree::BlockKind;
use crate::visitor::Visitable;

use super::{g2, misplaced_attribute, unexpected_token, Parser};

/// Parse one G1 element starting at its `DefineElement` token. With
/// `force_forward` set the element belongs to a forwarded G1 line and is
/// stashed for the next host even when written with a single `#`.
pub(super) fn parse_element<R: Read, V: Visitable>(
    p: &mut Parser<R, V>,
    force_forward: bool,
) -> Result<()> {
    let define = p.expect(TokenKind::DefineElement)?;
    let forward = define.is_forward() || force_forward;

    let name = p.expect(TokenKind::Identifier)?;
    let name_span = name.span().clone();
    p.open_element(name.text(), &name_span, forward)?;

    parse_attributes(p)?;

    let mut end_span = name_span;
    match p.peek_kind()? {
        TokenKind::BlockStart => {
            p.bump()?;
            p.set_block_kind(BlockKind::Normal)?;
            parse_children(p)?;
            let close = p.expect(TokenKind::BlockEnd)?;
            end_span = close.span().clone();
        }
        TokenKind::CharData => {
            // Inline text: a single character data child without braces.
            let text = p.bump()?;
            p.text(text.text(), text.span(), false)?;
            end_span = text.span().clone();
        }
        _ => {}
    }

    p.close_element(&end_span)
}

/// Parse the children of a G1 block up to, but not consuming, the closing
/// `}` (or the end of input, which the caller reports).
pub(super) fn parse_children<R: Read, V: Visitable>(p: &mut Parser<R, V>) -> Result<()> {
    loop {
        match p.peek_kind()? {
            TokenKind::BlockEnd => {
                p.check_no_pending_forward_attributes()?;
                return Ok(());
            }
            TokenKind::EndOfInput => return Ok(()),
            TokenKind::CharData => {
                let text = p.bump()?;
                p.text(text.text(), text.span(), false)?;
            }
            TokenKind::G1Comment => {
                p.bump()?;
                let text = p.expect(TokenKind::CharData)?;
                p.comment(text.text(), text.span())?;
            }
            TokenKind::G2Preamble => g2::parse_region(p)?,
            TokenKind::DefineElement => parse_element(p, false)?,
            TokenKind::DefineAttribute => {
                if p.peek()?.is_forward() {
                    drain_forward_attribute(p)?;
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
                        TokenKind::DefineAttribute,
                        TokenKind::BlockEnd,
                    ],
                ));
            }
        }
    }
}

/// Drain the `@key{value}` attributes directly after an element name.
/// A forwarding `@@` in this position belongs to a later sibling and ends
/// the run.
fn parse_attributes<R: Read, V: Visitable>(p: &mut Parser<R, V>) -> Result<()> {
    while p.peek_kind()? == TokenKind::DefineAttribute && !p.peek()?.is_forward() {
        p.bump()?;
        let key = p.expect(TokenKind::Identifier)?;
        p.expect(TokenKind::BlockStart)?;
        let value = p.expect(TokenKind::CharData)?;
        let close = p.expect(TokenKind::BlockEnd)?;
        let span = key.span().to(close.span());
        p.attribute(key.text(), value.text(), key.span(), &span)?;
    }
    Ok(())
}

/// Stash one `@@key{value}` for the next element that opens.
pub(super) fn drain_forward_attribute<R: Read, V: Visitable>(p: &mut Parser<R, V>) -> Result<()> {
    let define = p.expect(TokenKind::DefineAttribute)?;
    let key = p.expect(TokenKind::Identifier)?;
    p.expect(TokenKind::BlockStart)?;
    let value = p.expect(TokenKind::CharData)?;
    let close = p.expect(TokenKind::BlockEnd)?;
    p.push_forward_attribute(
        key.text().to_string(),
        value.text().to_string(),
        key.span().clone(),
        define.span().to(close.span()),
    );
    Ok(())
}
