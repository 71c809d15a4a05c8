use crate::error::Result;
use crate::position::Span;
use crate::tree::BlockKind;

/// The callback contract driven by the parser. A `Visitable` receives the
/// document in document order and builds whatever output it wants — an
/// in-memory tree, streamed XML, or something else entirely.
///
/// Forwarding is surfaced as a flag on `open` and `text`: a forwarded frame
/// (and everything inside it, delivered with `forward = false`) belongs to
/// the *next* non-forwarded element that opens, not to its lexical parent.
/// Implementations buffer forwarded frames themselves and splice them in as
/// the first children when that host opens.
///
/// Guarantees made by the driver:
/// - `open`/`close` calls are balanced and nested.
/// - `attribute` calls for an element arrive between its `open` and its
///   first child-producing callback, with keys already checked for
///   duplicates.
/// - `set_block_kind` arrives at most once per element, before children.
/// - `finalize` is called exactly once, last, on success paths.
pub trait Visitable {
    /// An element named `name` opens. With `forward` set the element is a
    /// forwarded frame awaiting its host.
    fn open(&mut self, name: &str, span: &Span, forward: bool) -> Result<()>;

    /// An attribute on the most recently opened element.
    fn attribute(&mut self, key: &str, value: &str, span: &Span) -> Result<()>;

    /// The delimiter family used around the children of the most recently
    /// opened element. Absent for elements without delimiters.
    fn set_block_kind(&mut self, kind: BlockKind) -> Result<()>;

    /// A text child. With `forward` set the text is awaiting its host, like
    /// a forwarded element.
    fn text(&mut self, value: &str, span: &Span, forward: bool) -> Result<()>;

    /// A comment child on the most recently opened element.
    fn comment(&mut self, value: &str, span: &Span) -> Result<()>;

    /// The most recently opened element closes.
    fn close(&mut self, span: &Span) -> Result<()>;

    /// The parse ended; flush buffers and surface pending failures.
    fn finalize(&mut self) -> Result<()>;
}

impl<V: Visitable + ?Sized> Visitable for &mut V {
    fn open(&mut self, name: &str, span: &Span, forward: bool) -> Result<()> {
        (**self).open(name, span, forward)
    }

    fn attribute(&mut self, key: &str, value: &str, span: &Span) -> Result<()> {
        (**self).attribute(key, value, span)
    }

    fn set_block_kind(&mut self, kind: BlockKind) -> Result<()> {
        (**self).set_block_kind(kind)
    }

    fn text(&mut self, value: &str, span: &Span, forward: bool) -> Result<()> {
        (**self).text(value, span, forward)
    }

    fn comment(&mut self, value: &str, span: &Span) -> Result<()> {
        (**self).comment(value, span)
    }

    fn close(&mut self, span: &Span) -> Result<()> {
        (**self).close(span)
    }

    fn finalize(&mut self) -> Result<()> {
        (**self).finalize()
    }
}
