use std::io::Read;

use arcstr::ArcStr;

use crate::error::{Result, SyntaxError};
use crate::position::Position;

/// The maximum number of runes that can sit in the pushback ring at once.
/// The lexer never unreads more than two; the ring is bounded so memory
/// stays constant on arbitrarily long streams.
pub(crate) const MAX_PUSHBACK: usize = 8;

const CHUNK_SIZE: usize = 4096;

/// A buffered rune reader over an arbitrary byte stream. Decodes UTF-8 one
/// scalar at a time, tracks file/line/column/offset positions, and supports
/// a small bounded pushback.
///
/// The reader does not own closing the underlying stream; the caller does.
pub(crate) struct RuneReader<R> {
    input: R,
    buf: Vec<u8>,
    /// Consumed bytes at the front of `buf`.
    start: usize,
    input_exhausted: bool,
    /// Position of the next rune that `next` will deliver.
    pos: Position,
    /// Unread runes, most recently unread last.
    pushback: Vec<(char, Position)>,
}

impl<R: Read> RuneReader<R> {
    pub fn new(input: R, file: ArcStr) -> Self {
        Self {
            input,
            buf: Vec::with_capacity(CHUNK_SIZE),
            start: 0,
            input_exhausted: false,
            pos: Position::start(file),
            pushback: Vec::with_capacity(MAX_PUSHBACK),
        }
    }

    /// The position of the next rune `next` would return.
    pub fn position(&self) -> Position {
        self.pos.clone()
    }

    /// Read the next rune, or `None` at end of input. Invalid UTF-8 is a
    /// positional error at the offending byte.
    pub fn next(&mut self) -> Result<Option<char>> {
        if let Some((ch, begin)) = self.pushback.pop() {
            self.pos = begin;
            self.pos.advance(ch);
            return Ok(Some(ch));
        }

        let Some(ch) = self.decode_next()? else {
            return Ok(None);
        };
        self.pos.advance(ch);
        Ok(Some(ch))
    }

    /// Push `ch` back so that the next `next` call returns it again. `begin`
    /// must be the position the rune was read at.
    pub fn unread(&mut self, ch: char, begin: Position) {
        debug_assert!(
            self.pushback.len() < MAX_PUSHBACK,
            "rune pushback exceeded its bound of {}",
            MAX_PUSHBACK
        );
        self.pos = begin.clone();
        self.pushback.push((ch, begin));
    }

    /// Look at the next rune without consuming it.
    pub fn peek(&mut self) -> Result<Option<char>> {
        let begin = self.position();
        match self.next()? {
            Some(ch) => {
                self.unread(ch, begin);
                Ok(Some(ch))
            }
            None => Ok(None),
        }
    }

    /// True if the next rune matches `ch`, consuming it. Otherwise the rune
    /// stays in the stream.
    pub fn advance_if(&mut self, ch: char) -> Result<bool> {
        let begin = self.position();
        match self.next()? {
            Some(found) if found == ch => Ok(true),
            Some(found) => {
                self.unread(found, begin);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Append the remainder of the current line onto `out`, consuming but
    /// not including the terminating line feed. A trailing `\r` is dropped
    /// from the captured text. Returns true if any line feed was consumed.
    ///
    /// Scans the buffered bytes with memchr so comment-heavy documents do
    /// not pay the per-rune decode cost.
    pub fn take_line(&mut self, out: &mut String) -> Result<bool> {
        // Drain any pushback runes first; they are no longer contiguous with
        // the byte buffer.
        while let Some((ch, _)) = self.pushback.pop() {
            self.pos.advance(ch);
            if ch == '\n' {
                trim_carriage_return(out);
                return Ok(true);
            }
            out.push(ch);
        }

        loop {
            if self.start == self.buf.len() && !self.fill()? {
                trim_carriage_return(out);
                return Ok(false);
            }

            let window = &self.buf[self.start..];
            match memchr::memchr(b'\n', window) {
                Some(index) => {
                    self.push_valid(index, true, out)?;
                    // Consume the line feed itself.
                    self.start += 1;
                    self.pos.advance('\n');
                    trim_carriage_return(out);
                    return Ok(true);
                }
                None => {
                    let len = window.len();
                    self.push_valid(len, false, out)?;
                    if self.start < self.buf.len() {
                        // A rune is split across the chunk boundary; pull
                        // more bytes to complete it.
                        let had = self.buf.len() - self.start;
                        self.fill()?;
                        if self.buf.len() - self.start == had {
                            return Err(SyntaxError::LexInvalidUtf8 {
                                span: self.pos.span(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Validate and append up to `len` buffered bytes onto `out`, updating
    /// the position over every rune. When `complete` is false the tail may
    /// hold a rune split across the chunk boundary, which is left buffered
    /// for the next refill.
    fn push_valid(&mut self, len: usize, complete: bool, out: &mut String) -> Result<()> {
        let bytes = &self.buf[self.start..self.start + len];
        let (text, taken) = match std::str::from_utf8(bytes) {
            Ok(text) => (text, len),
            Err(cause) => {
                let valid = cause.valid_up_to();
                if cause.error_len().is_some() || complete {
                    let mut pos = self.pos.clone();
                    let prefix =
                        std::str::from_utf8(&bytes[..valid]).expect("validated prefix");
                    for ch in prefix.chars() {
                        pos.advance(ch);
                    }
                    return Err(SyntaxError::LexInvalidUtf8 { span: pos.span() });
                }
                let prefix = std::str::from_utf8(&bytes[..valid]).expect("validated prefix");
                (prefix, valid)
            }
        };
        for ch in text.chars() {
            self.pos.advance(ch);
        }
        out.push_str(text);
        self.start += taken;
        Ok(())
    }

    /// Decode one rune from the byte buffer, refilling as needed.
    fn decode_next(&mut self) -> Result<Option<char>> {
        if self.start == self.buf.len() && !self.fill()? {
            return Ok(None);
        }

        let first = self.buf[self.start];
        if first < 0x80 {
            self.start += 1;
            return Ok(Some(first as char));
        }

        let width = match first {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Err(SyntaxError::LexInvalidUtf8 { span: self.pos.span() }),
        };
        while self.buf.len() - self.start < width {
            let had = self.buf.len() - self.start;
            self.fill()?;
            if self.buf.len() - self.start == had {
                return Err(SyntaxError::LexInvalidUtf8 { span: self.pos.span() });
            }
        }

        let bytes = &self.buf[self.start..self.start + width];
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                let ch = text.chars().next().expect("validated rune");
                self.start += width;
                Ok(Some(ch))
            }
            Err(_) => Err(SyntaxError::LexInvalidUtf8 { span: self.pos.span() }),
        }
    }

    /// Pull another chunk from the underlying reader. Returns false once the
    /// input is exhausted and no bytes remain buffered.
    fn fill(&mut self) -> Result<bool> {
        // Drop consumed bytes so the buffer stays bounded.
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }
        if self.input_exhausted {
            return Ok(!self.buf.is_empty());
        }

        let old_len = self.buf.len();
        self.buf.resize(old_len + CHUNK_SIZE, 0);
        let read = self.input.read(&mut self.buf[old_len..])?;
        self.buf.truncate(old_len + read);
        if read == 0 {
            self.input_exhausted = true;
        }
        Ok(!self.buf.is_empty())
    }
}

fn trim_carriage_return(out: &mut String) {
    if out.ends_with('\r') {
        out.pop();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reader(input: &str) -> RuneReader<&[u8]> {
        RuneReader::new(input.as_bytes(), arcstr::literal!("test.dyml"))
    }

    #[test]
    fn reads_runes_with_positions() {
        let mut r = reader("a\nü");
        assert_eq!(r.next().unwrap(), Some('a'));
        assert_eq!(r.next().unwrap(), Some('\n'));
        let pos = r.position();
        assert_eq!((pos.line, pos.column, pos.offset), (2, 1, 2));
        assert_eq!(r.next().unwrap(), Some('ü'));
        assert_eq!(r.next().unwrap(), None);
        assert_eq!(r.next().unwrap(), None);
    }

    #[test]
    fn unread_restores_the_position() {
        let mut r = reader("ab");
        let begin = r.position();
        let ch = r.next().unwrap().unwrap();
        r.unread(ch, begin);
        assert_eq!(r.position().offset, 0);
        assert_eq!(r.next().unwrap(), Some('a'));
        assert_eq!(r.next().unwrap(), Some('b'));
    }

    #[test]
    fn take_line_stops_at_the_line_feed() {
        let mut r = reader("first line\r\nsecond");
        let mut out = String::new();
        assert!(r.take_line(&mut out).unwrap());
        assert_eq!(out, "first line");
        assert_eq!(r.next().unwrap(), Some('s'));
        let pos = r.position();
        assert_eq!((pos.line, pos.column), (2, 2));
    }

    #[test]
    fn take_line_at_end_of_input() {
        let mut r = reader("tail");
        let mut out = String::new();
        assert!(!r.take_line(&mut out).unwrap());
        assert_eq!(out, "tail");
        assert_eq!(r.next().unwrap(), None);
    }

    #[test]
    fn invalid_utf8_is_positional() {
        let mut r = RuneReader::new(&[b'a', 0xFF][..], arcstr::literal!("test.dyml"));
        assert_eq!(r.next().unwrap(), Some('a'));
        match r.next() {
            Err(SyntaxError::LexInvalidUtf8 { span }) => {
                assert_eq!(span.begin.offset, 1);
            }
            other => panic!("expected invalid utf-8 error, got {:?}", other.map(|_| ())),
        }
    }
}
