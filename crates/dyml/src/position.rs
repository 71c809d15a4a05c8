use std::fmt;

use arcstr::ArcStr;
use serde::Serialize;

/// A single coordinate in a source stream. Lines and columns are 1-based and
/// columns count runes rather than bytes; `offset` is the 0-based byte offset
/// from the start of the stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Position {
    pub file: ArcStr,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Position {
    /// Returns the position of the very first rune of the named stream.
    pub fn start(file: ArcStr) -> Self {
        Self {
            file,
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    /// Advance this position over `ch`. The offset grows by the UTF-8 width
    /// of the rune, the column by exactly one, and a line feed starts the
    /// next line.
    pub(crate) fn advance(&mut self, ch: char) {
        self.offset += ch.len_utf8() as u32;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    /// Returns a zero-width span sitting at this position.
    pub fn span(&self) -> Span {
        Span::new(self.clone(), self.clone())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A half-open region of the source, from the first rune of a construct up to
/// the position just past its last rune. `begin` never exceeds `end` in lex
/// order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Span {
    pub begin: Position,
    pub end: Position,
}

impl Span {
    pub fn new(begin: Position, end: Position) -> Self {
        debug_assert!(
            begin.offset <= end.offset,
            "span begins at {} after its own end {}",
            begin,
            end
        );
        Self { begin, end }
    }

    /// Merge two spans into one covering both, keeping the earliest begin and
    /// the latest end.
    pub fn to(&self, other: &Span) -> Span {
        let begin = if self.begin.offset <= other.begin.offset {
            self.begin.clone()
        } else {
            other.begin.clone()
        };
        let end = if self.end.offset >= other.end.offset {
            self.end.clone()
        } else {
            other.end.clone()
        };
        Span { begin, end }
    }

    /// The number of bytes covered by this span.
    pub fn len(&self) -> u32 {
        self.end.offset - self.begin.offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.begin, f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn advance_tracks_lines_columns_and_offsets() {
        let mut pos = Position::start(arcstr::literal!("test.dyml"));
        for ch in "ab\nc".chars() {
            pos.advance(ch);
        }
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 2);
        assert_eq!(pos.offset, 4);
    }

    #[test]
    fn advance_counts_runes_not_bytes() {
        let mut pos = Position::start(arcstr::literal!("test.dyml"));
        pos.advance('ä');
        assert_eq!(pos.column, 2);
        assert_eq!(pos.offset, 2);
    }

    #[test]
    fn spans_merge_in_lex_order() {
        let mut begin = Position::start(arcstr::literal!("test.dyml"));
        let mut end = begin.clone();
        end.advance('a');
        let first = Span::new(begin.clone(), end.clone());
        end.advance('b');
        let second = Span::new(first.end.clone(), end);
        let merged = first.to(&second);
        assert_eq!(merged.begin.offset, 0);
        assert_eq!(merged.end.offset, 2);
    }
}
