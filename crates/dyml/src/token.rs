use std::fmt;

use bitflags::bitflags;

use crate::position::Span;

bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TokenFlags: u8 {
        /// The token was written in its doubled, forwarding form (`##`/`@@`).
        const FORWARD = 1;
    }
}

/// The kind of a single lexed token. G1 and G2 share one kind space; which
/// kinds can actually occur depends on the lexer mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Raw text, between markup or inside braces, after unescaping.
    CharData,
    /// `[A-Za-z0-9_]+`. Dotted paths are left to downstream tooling.
    Identifier,
    BlockStart,   // {
    BlockEnd,     // }
    GroupStart,   // (
    GroupEnd,     // )
    GenericStart, // <
    GenericEnd,   // >
    /// `#` or `##`; the doubled form carries `TokenFlags::FORWARD`.
    DefineElement,
    /// `@` or `@@`; the doubled form carries `TokenFlags::FORWARD`.
    DefineAttribute,
    Assign,    // = (G2)
    Comma,     // , (G2)
    Semicolon, // ; (G2)
    /// End of a G1 line embedded in G2.
    G1LineEnd,
    G1Comment,  // #?
    G2Comment,  // //
    G2Preamble, // #!
    G2Arrow,    // ->
    EndOfInput,
}

impl TokenKind {
    pub fn is_block_closer(self) -> bool {
        matches!(
            self,
            TokenKind::BlockEnd | TokenKind::GroupEnd | TokenKind::GenericEnd
        )
    }

    pub fn is_block_opener(self) -> bool {
        matches!(
            self,
            TokenKind::BlockStart | TokenKind::GroupStart | TokenKind::GenericStart
        )
    }

    pub fn is_separator(self) -> bool {
        matches!(self, TokenKind::Comma | TokenKind::Semicolon)
    }

    /// Human-readable name used when listing expected tokens in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::CharData => "character data",
            TokenKind::Identifier => "identifier",
            TokenKind::BlockStart => "'{'",
            TokenKind::BlockEnd => "'}'",
            TokenKind::GroupStart => "'('",
            TokenKind::GroupEnd => "')'",
            TokenKind::GenericStart => "'<'",
            TokenKind::GenericEnd => "'>'",
            TokenKind::DefineElement => "'#'",
            TokenKind::DefineAttribute => "'@'",
            TokenKind::Assign => "'='",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::G1LineEnd => "end of line",
            TokenKind::G1Comment => "'#?'",
            TokenKind::G2Comment => "'//'",
            TokenKind::G2Preamble => "'#!'",
            TokenKind::G2Arrow => "'->'",
            TokenKind::EndOfInput => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A single lexed token: its kind, its span in the source, and for CharData
/// and Identifier the unescaped text value. Escape sequences are resolved
/// during lexing, so `text` never contains a backslash that was consumed as
/// an escape.
#[derive(Clone, Debug)]
pub struct Token {
    kind: TokenKind,
    text: String,
    span: Span,
    flags: TokenFlags,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            text: String::new(),
            span,
            flags: TokenFlags::default(),
        }
    }

    pub fn with_text(mut self, text: String) -> Self {
        self.text = text;
        self
    }

    pub fn with_flags(mut self, flags: TokenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn flags(&self) -> TokenFlags {
        self.flags
    }

    pub fn is_forward(&self) -> bool {
        self.flags.contains(TokenFlags::FORWARD)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::CharData => write!(f, "character data {:?}", self.text),
            TokenKind::Identifier => write!(f, "identifier {:?}", self.text),
            _ => f.write_str(self.kind.describe()),
        }
    }
}
