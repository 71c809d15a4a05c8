use std::io::Read;

use arcstr::ArcStr;

use crate::error::{Result, SyntaxError};
use crate::position::{Position, Span};
use crate::reader::RuneReader;
use crate::token::{Token, TokenFlags, TokenKind};

/// The grammar sub-language the lexer is currently reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Text-first grammar: free character data with `#`/`@` markers.
    G1,
    /// Node-first grammar inside a bracket-balanced `#!` region.
    G2,
    /// A single G1 line embedded in G2, terminated by end-of-line.
    G1Line,
    /// As G1Line, but the whole line's children are forwarded.
    G1LineForward,
}

impl Mode {
    fn is_g1_line(self) -> bool {
        matches!(self, Mode::G1Line | Mode::G1LineForward)
    }
}

/// Forces the interpretation of the next run of bytes regardless of the
/// usual mode rules. This is how `@key{value}` (G1) and `= "value"` (G2)
/// are handled without lookahead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Want {
    #[default]
    Nothing,
    Identifier,
    CommentLine,
    G1AttrIdent,
    G1AttrStart,
    G1AttrCharData,
    G1AttrEnd,
    G2AttrValue,
}

/// The DYML lexer: turns a byte stream into a stream of typed tokens, one
/// token per `token()` call, reporting `EndOfInput` forever once exhausted.
/// No backtracking happens beyond the reader's bounded rune pushback.
pub struct Lexer<R> {
    reader: RuneReader<R>,
    mode: Mode,
    want: Want,
    /// Open `{`/`(`/`<` while in G2. Returning to zero drops back to G1,
    /// which is what permits multiple G2 regions in one document.
    bracket_depth: u32,
    /// Nesting of `{}` blocks belonging to G1 elements inside a G1 line,
    /// needed to tell a nested block closer from the enclosing G2 closer.
    g1_line_depth: u32,
    started: bool,
}

impl<R: Read> Lexer<R> {
    pub fn new(input: R, file: impl Into<ArcStr>) -> Self {
        Self {
            reader: RuneReader::new(input, file.into()),
            mode: Mode::G1,
            want: Want::Nothing,
            bracket_depth: 0,
            g1_line_depth: 0,
            started: false,
        }
    }

    /// The position of the next unread rune. Synthetic parser tokens are
    /// stamped with this so errors keep pointing at real source.
    pub fn position(&self) -> Position {
        self.reader.position()
    }

    /// Lex the next token.
    pub fn token(&mut self) -> Result<Token> {
        if !self.started {
            self.started = true;
            // Leading whitespace is insignificant; the `#!` entry rule talks
            // about the first two *significant* characters.
            self.skip_whitespace(true)?;
        }

        match std::mem::take(&mut self.want) {
            Want::Nothing => self.dispatch(),
            Want::Identifier => {
                let token = self.identifier()?;
                self.skip_after_token()?;
                Ok(token)
            }
            Want::G1AttrIdent => {
                let token = self.identifier()?;
                self.want = Want::G1AttrStart;
                self.skip_after_token()?;
                Ok(token)
            }
            Want::G1AttrStart => {
                let token = self.expect_char('{', TokenKind::BlockStart)?;
                self.want = Want::G1AttrCharData;
                Ok(token)
            }
            Want::G1AttrCharData => {
                let begin = self.reader.position();
                let token = self.char_data(begin, "}")?;
                self.want = Want::G1AttrEnd;
                Ok(token)
            }
            Want::G1AttrEnd => {
                let token = self.expect_char('}', TokenKind::BlockEnd)?;
                self.skip_after_token()?;
                Ok(token)
            }
            Want::G2AttrValue => {
                self.skip_whitespace(true)?;
                let begin = self.reader.position();
                if !self.reader.advance_if('"')? {
                    return match self.reader.peek()? {
                        Some(found) => Err(SyntaxError::LexUnexpectedChar {
                            found,
                            message: "attribute value is required".to_string(),
                            span: Span::new(begin.clone(), begin),
                        }),
                        None => Err(SyntaxError::LexUnterminated {
                            what: "attribute value",
                            span: begin.span(),
                        }),
                    };
                }
                self.quoted(begin)
            }
            Want::CommentLine => {
                let begin = self.reader.position();
                let mut value = String::new();
                self.reader.take_line(&mut value)?;
                let token =
                    Token::new(TokenKind::CharData, Span::new(begin, self.reader.position()))
                        .with_text(value);
                self.skip_after_token()?;
                Ok(token)
            }
        }
    }

    fn dispatch(&mut self) -> Result<Token> {
        match self.mode {
            Mode::G1 => self.g1_token(),
            Mode::G1Line | Mode::G1LineForward => self.g1_line_token(),
            Mode::G2 => self.g2_token(),
        }
    }

    //#region G1

    fn g1_token(&mut self) -> Result<Token> {
        let begin = self.reader.position();
        let Some(ch) = self.reader.peek()? else {
            return Ok(self.end_of_input());
        };

        match ch {
            '#' => {
                self.reader.next()?;
                self.hash(begin, false)
            }
            '@' => {
                self.reader.next()?;
                self.attribute_lead(begin)
            }
            '{' => {
                self.reader.next()?;
                let token = self.emit(TokenKind::BlockStart, begin);
                self.skip_after_token()?;
                Ok(token)
            }
            '}' => {
                self.reader.next()?;
                let token = self.emit(TokenKind::BlockEnd, begin);
                self.skip_after_token()?;
                Ok(token)
            }
            _ => self.char_data(begin, "#}"),
        }
    }

    fn g1_line_token(&mut self) -> Result<Token> {
        let begin = self.reader.position();
        let Some(ch) = self.reader.peek()? else {
            // An unterminated final line still closes cleanly.
            self.mode = Mode::G2;
            self.g1_line_depth = 0;
            return Ok(self.emit(TokenKind::G1LineEnd, begin));
        };

        match ch {
            '\n' => {
                self.reader.next()?;
                self.mode = Mode::G2;
                self.g1_line_depth = 0;
                Ok(self.emit(TokenKind::G1LineEnd, begin))
            }
            '#' => {
                self.reader.next()?;
                self.hash(begin, true)
            }
            '@' => {
                self.reader.next()?;
                self.attribute_lead(begin)
            }
            '{' => {
                self.reader.next()?;
                self.g1_line_depth += 1;
                let token = self.emit(TokenKind::BlockStart, begin);
                self.skip_after_token()?;
                Ok(token)
            }
            '}' if self.g1_line_depth > 0 => {
                self.reader.next()?;
                self.g1_line_depth -= 1;
                let token = self.emit(TokenKind::BlockEnd, begin);
                self.skip_after_token()?;
                Ok(token)
            }
            '}' => {
                // The enclosing G2 block closes without a line ending.
                self.reader.next()?;
                let token = self.emit(TokenKind::BlockEnd, begin);
                self.close_g2_bracket()?;
                Ok(token)
            }
            _ => self.char_data(begin, "#}\n"),
        }
    }

    /// Lex what follows an already-consumed `#` in G1 or a G1 line.
    fn hash(&mut self, begin: Position, in_line: bool) -> Result<Token> {
        match self.reader.peek()? {
            Some('!') if !in_line => {
                self.reader.next()?;
                let token = self.emit(TokenKind::G2Preamble, begin);
                self.mode = Mode::G2;
                self.bracket_depth = 0;
                self.skip_whitespace(true)?;
                Ok(token)
            }
            Some('?') if !in_line => {
                self.reader.next()?;
                let token = self.emit(TokenKind::G1Comment, begin);
                self.skip_whitespace(false)?;
                self.want = Want::CommentLine;
                Ok(token)
            }
            Some('#') => {
                self.reader.next()?;
                self.want = Want::Identifier;
                Ok(self
                    .emit(TokenKind::DefineElement, begin)
                    .with_flags(TokenFlags::FORWARD))
            }
            _ => {
                self.want = Want::Identifier;
                Ok(self.emit(TokenKind::DefineElement, begin))
            }
        }
    }

    /// Lex what follows an already-consumed `@` in G1 or a G1 line.
    fn attribute_lead(&mut self, begin: Position) -> Result<Token> {
        let forward = self.reader.advance_if('@')?;
        self.want = Want::G1AttrIdent;
        let mut token = self.emit(TokenKind::DefineAttribute, begin);
        if forward {
            token = token.with_flags(TokenFlags::FORWARD);
        }
        Ok(token)
    }

    //#endregion

    //#region G2

    fn g2_token(&mut self) -> Result<Token> {
        self.skip_whitespace(true)?;
        let begin = self.reader.position();
        let Some(ch) = self.reader.peek()? else {
            return Ok(self.end_of_input());
        };

        match ch {
            '{' => self.open_bracket(begin, TokenKind::BlockStart),
            '(' => self.open_bracket(begin, TokenKind::GroupStart),
            '<' => self.open_bracket(begin, TokenKind::GenericStart),
            '}' => self.close_bracket(begin, TokenKind::BlockEnd),
            ')' => self.close_bracket(begin, TokenKind::GroupEnd),
            '>' => self.close_bracket(begin, TokenKind::GenericEnd),
            '"' => {
                self.reader.next()?;
                let token = self.quoted(begin)?;
                if self.bracket_depth == 0 {
                    self.mode = Mode::G1;
                    self.skip_whitespace(true)?;
                }
                Ok(token)
            }
            '@' => {
                self.reader.next()?;
                let forward = self.reader.advance_if('@')?;
                let mut token = self.emit(TokenKind::DefineAttribute, begin);
                if forward {
                    token = token.with_flags(TokenFlags::FORWARD);
                }
                Ok(token)
            }
            '=' => {
                self.reader.next()?;
                self.want = Want::G2AttrValue;
                Ok(self.emit(TokenKind::Assign, begin))
            }
            ',' => self.separator(begin, TokenKind::Comma),
            ';' => self.separator(begin, TokenKind::Semicolon),
            '/' => {
                self.reader.next()?;
                if !self.reader.advance_if('/')? {
                    return Err(SyntaxError::LexUnexpectedChar {
                        found: '/',
                        message: "expected '//' to start a comment".to_string(),
                        span: Span::new(begin.clone(), self.reader.position()),
                    });
                }
                let token = self.emit(TokenKind::G2Comment, begin);
                self.skip_whitespace(false)?;
                self.want = Want::CommentLine;
                Ok(token)
            }
            '-' => {
                self.reader.next()?;
                if !self.reader.advance_if('>')? {
                    return Err(SyntaxError::LexUnexpectedChar {
                        found: '-',
                        message: "expected '->'".to_string(),
                        span: Span::new(begin.clone(), self.reader.position()),
                    });
                }
                Ok(self.emit(TokenKind::G2Arrow, begin))
            }
            '#' => {
                self.reader.next()?;
                let forward = self.reader.advance_if('#')?;
                self.mode = if forward {
                    Mode::G1LineForward
                } else {
                    Mode::G1Line
                };
                self.g1_line_depth = 0;
                let mut token = self.emit(TokenKind::DefineElement, begin);
                if forward {
                    token = token.with_flags(TokenFlags::FORWARD);
                }
                self.skip_whitespace(false)?;
                Ok(token)
            }
            c if is_identifier_rune(c) => self.identifier(),
            found => Err(SyntaxError::LexUnexpectedChar {
                found,
                message: "no token starts with this character here".to_string(),
                span: Span::new(begin.clone(), begin),
            }),
        }
    }

    fn open_bracket(&mut self, begin: Position, kind: TokenKind) -> Result<Token> {
        self.reader.next()?;
        self.bracket_depth += 1;
        Ok(self.emit(kind, begin))
    }

    fn close_bracket(&mut self, begin: Position, kind: TokenKind) -> Result<Token> {
        self.reader.next()?;
        let token = self.emit(kind, begin);
        self.close_g2_bracket()?;
        Ok(token)
    }

    /// Leave one level of G2 bracket nesting. At depth zero the region is
    /// over and the lexer drops back to G1, where the whitespace that
    /// follows the region is insignificant.
    fn close_g2_bracket(&mut self) -> Result<()> {
        self.bracket_depth = self.bracket_depth.saturating_sub(1);
        if self.bracket_depth == 0 {
            self.mode = Mode::G1;
            self.skip_whitespace(true)?;
        } else {
            self.mode = Mode::G2;
        }
        Ok(())
    }

    fn separator(&mut self, begin: Position, kind: TokenKind) -> Result<Token> {
        self.reader.next()?;
        let token = self.emit(kind, begin);
        if self.bracket_depth == 0 {
            self.mode = Mode::G1;
            self.skip_whitespace(true)?;
        }
        Ok(token)
    }

    //#endregion

    //#region Shared scanners

    /// Scan character data until a rune from `stop` is found. A backslash
    /// escapes exactly the runes in `stop` plus the backslash itself; the
    /// escape is consumed and the escaped rune never terminates the scan.
    fn char_data(&mut self, begin: Position, stop: &str) -> Result<Token> {
        let mut value = String::new();
        loop {
            let rune_begin = self.reader.position();
            match self.reader.next()? {
                None => break,
                Some('\\') => match self.reader.next()? {
                    None => {
                        return Err(SyntaxError::LexUnterminated {
                            what: "escape sequence",
                            span: Span::new(rune_begin, self.reader.position()),
                        })
                    }
                    Some(escaped) if escaped == '\\' || stop.contains(escaped) => {
                        value.push(escaped);
                    }
                    Some(escaped) => {
                        return Err(SyntaxError::LexUnexpectedChar {
                            found: escaped,
                            message: "this character cannot be escaped here".to_string(),
                            span: Span::new(rune_begin, self.reader.position()),
                        })
                    }
                },
                Some(ch) if stop.contains(ch) => {
                    self.reader.unread(ch, rune_begin);
                    break;
                }
                Some(ch) => value.push(ch),
            }
        }
        Ok(
            Token::new(TokenKind::CharData, Span::new(begin, self.reader.position()))
                .with_text(value),
        )
    }

    /// Scan a quoted G2 string; the opening quote is already consumed. `\"`
    /// and `\\` are the only escaped forms.
    fn quoted(&mut self, begin: Position) -> Result<Token> {
        let mut value = String::new();
        loop {
            let rune_begin = self.reader.position();
            match self.reader.next()? {
                None => {
                    return Err(SyntaxError::LexUnterminated {
                        what: "string",
                        span: Span::new(begin, self.reader.position()),
                    })
                }
                Some('"') => break,
                Some('\\') => match self.reader.next()? {
                    Some(escaped @ ('"' | '\\')) => value.push(escaped),
                    Some(escaped) => {
                        return Err(SyntaxError::LexUnexpectedChar {
                            found: escaped,
                            message: "this character cannot be escaped here".to_string(),
                            span: Span::new(rune_begin, self.reader.position()),
                        })
                    }
                    None => {
                        return Err(SyntaxError::LexUnterminated {
                            what: "string",
                            span: Span::new(begin, self.reader.position()),
                        })
                    }
                },
                Some(ch) => value.push(ch),
            }
        }
        Ok(
            Token::new(TokenKind::CharData, Span::new(begin, self.reader.position()))
                .with_text(value),
        )
    }

    /// Scan `[A-Za-z0-9_]+`. At least one rune is required.
    fn identifier(&mut self) -> Result<Token> {
        let begin = self.reader.position();
        let mut value = String::new();
        loop {
            let rune_begin = self.reader.position();
            match self.reader.next()? {
                Some(ch) if is_identifier_rune(ch) => value.push(ch),
                Some(ch) => {
                    self.reader.unread(ch, rune_begin);
                    break;
                }
                None => break,
            }
        }
        if value.is_empty() {
            return match self.reader.peek()? {
                Some(found) => Err(SyntaxError::LexUnexpectedChar {
                    found,
                    message: "expected identifier".to_string(),
                    span: Span::new(begin.clone(), begin),
                }),
                None => Err(SyntaxError::LexUnterminated {
                    what: "identifier",
                    span: begin.span(),
                }),
            };
        }
        Ok(
            Token::new(TokenKind::Identifier, Span::new(begin, self.reader.position()))
                .with_text(value),
        )
    }

    fn expect_char(&mut self, expected: char, kind: TokenKind) -> Result<Token> {
        let begin = self.reader.position();
        if self.reader.advance_if(expected)? {
            return Ok(self.emit(kind, begin));
        }
        match self.reader.peek()? {
            Some(found) => Err(SyntaxError::LexUnexpectedChar {
                found,
                message: format!("expected {}", kind.describe()),
                span: Span::new(begin.clone(), begin),
            }),
            None => Err(SyntaxError::LexUnterminated {
                what: "attribute",
                span: begin.span(),
            }),
        }
    }

    fn emit(&self, kind: TokenKind, begin: Position) -> Token {
        Token::new(kind, Span::new(begin, self.reader.position()))
    }

    fn end_of_input(&self) -> Token {
        Token::new(TokenKind::EndOfInput, self.reader.position().span())
    }

    /// Skip insignificant whitespace. In G1 line modes the line feed is
    /// significant and never skipped here.
    fn skip_whitespace(&mut self, include_newlines: bool) -> Result<()> {
        loop {
            let begin = self.reader.position();
            match self.reader.next()? {
                Some(ch) if ch.is_whitespace() && (include_newlines || ch != '\n') => continue,
                Some(ch) => {
                    self.reader.unread(ch, begin);
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    fn skip_after_token(&mut self) -> Result<()> {
        let include_newlines = !self.mode.is_g1_line();
        self.skip_whitespace(include_newlines)
    }

    //#endregion
}

fn is_identifier_rune(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
