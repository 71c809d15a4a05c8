use std::fmt::Write as _;

use thiserror::Error;

use crate::position::Span;
use crate::token::TokenKind;

pub type Result<T> = std::result::Result<T, SyntaxError>;

/// An additional labelled source site attached to an error, such as the
/// first definition of a duplicated attribute.
#[derive(Clone, Debug)]
pub struct ErrorDetail {
    pub label: String,
    pub span: Span,
}

impl ErrorDetail {
    pub fn new(label: impl Into<String>, span: Span) -> Self {
        Self {
            label: label.into(),
            span,
        }
    }
}

/// Any failure produced while lexing, parsing, or encoding a DYML stream.
/// All non-IO variants are positional; none are recovered internally.
#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{span}: invalid utf-8 sequence")]
    LexInvalidUtf8 { span: Span },

    #[error("{span}: unexpected char {found:?}: {message}")]
    LexUnexpectedChar {
        found: char,
        message: String,
        span: Span,
    },

    #[error("{span}: unterminated {what}")]
    LexUnterminated { what: &'static str, span: Span },

    #[error("{span}: unexpected {found}, expected {}", describe_expected(.expected))]
    ParseUnexpectedToken {
        found: String,
        expected: Vec<TokenKind>,
        span: Span,
    },

    #[error("{span}: {message}")]
    ParseForwardMisplaced {
        message: String,
        span: Span,
        details: Vec<ErrorDetail>,
    },

    #[error("{span}: attribute {key:?} is already defined")]
    ParseDuplicateAttribute {
        key: String,
        span: Span,
        details: Vec<ErrorDetail>,
    },

    #[error("{span}: the root block must use curly braces")]
    ParseRootShape { span: Span },

    #[error("{span}: {message}")]
    ParseArrowMisuse { message: String, span: Span },
}

fn describe_expected(expected: &[TokenKind]) -> String {
    match expected {
        [] => "nothing".to_string(),
        [single] => single.describe().to_string(),
        [head @ .., last] => {
            let mut out = String::new();
            for (index, kind) in head.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                out.push_str(kind.describe());
            }
            out.push_str(" or ");
            out.push_str(last.describe());
            out
        }
    }
}

impl SyntaxError {
    /// The primary span of the error, if it has one. IO errors have no
    /// source position.
    pub fn span(&self) -> Option<&Span> {
        match self {
            SyntaxError::Io(_) => None,
            SyntaxError::LexInvalidUtf8 { span }
            | SyntaxError::LexUnexpectedChar { span, .. }
            | SyntaxError::LexUnterminated { span, .. }
            | SyntaxError::ParseUnexpectedToken { span, .. }
            | SyntaxError::ParseForwardMisplaced { span, .. }
            | SyntaxError::ParseDuplicateAttribute { span, .. }
            | SyntaxError::ParseRootShape { span }
            | SyntaxError::ParseArrowMisuse { span, .. } => Some(span),
        }
    }

    /// Secondary sites attached to the error, in relevance order.
    pub fn details(&self) -> &[ErrorDetail] {
        match self {
            SyntaxError::ParseForwardMisplaced { details, .. }
            | SyntaxError::ParseDuplicateAttribute { details, .. } => details,
            _ => &[],
        }
    }

    /// Render a multi-line, caret-aligned message suitable for terminals.
    /// Purely presentational; the semantic contract is the variant data.
    pub fn render(&self) -> String {
        let mut out = format!("error: {}", self);
        if let Some(span) = self.span() {
            let _ = write!(out, "\n  --> {}", span.begin);
            let width = span_rune_width(span).max(1);
            let _ = write!(
                out,
                "\n   | {}{}",
                " ".repeat(span.begin.column.saturating_sub(1) as usize),
                "^".repeat(width)
            );
        }
        for detail in self.details() {
            let _ = write!(out, "\n  note: {} at {}", detail.label, detail.span.begin);
        }
        out
    }
}

/// The caret width for a span, in columns. Spans crossing a line boundary
/// collapse to a single caret because the source text is not retained.
fn span_rune_width(span: &Span) -> usize {
    if span.begin.line == span.end.line && span.end.column > span.begin.column {
        (span.end.column - span.begin.column) as usize
    } else {
        1
    }
}

#[cfg(test)]
mod test {
    use arcstr::ArcStr;

    use super::*;
    use crate::position::Position;

    fn span_at(line: u32, column: u32, width: u32) -> Span {
        let file = ArcStr::from("doc.dyml");
        let begin = Position {
            file: file.clone(),
            line,
            column,
            offset: column - 1,
        };
        let end = Position {
            file,
            line,
            column: column + width,
            offset: column - 1 + width,
        };
        Span::new(begin, end)
    }

    #[test]
    fn unexpected_token_lists_expectations() {
        let err = SyntaxError::ParseUnexpectedToken {
            found: "','".to_string(),
            expected: vec![TokenKind::Identifier, TokenKind::CharData],
            span: span_at(1, 4, 1),
        };
        let message = err.to_string();
        assert!(message.contains("expected identifier or character data"));
        assert!(message.contains("doc.dyml:1:4"));
    }

    #[test]
    fn render_aligns_carets_with_the_column() {
        let err = SyntaxError::ParseDuplicateAttribute {
            key: "id".to_string(),
            span: span_at(2, 5, 2),
            details: vec![ErrorDetail::new("first defined here", span_at(1, 3, 2))],
        };
        let rendered = err.render();
        assert!(rendered.contains("--> doc.dyml:2:5"));
        assert!(rendered.contains("    ^^"));
        assert!(rendered.contains("first defined here at doc.dyml:1:3"));
    }
}
