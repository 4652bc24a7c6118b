use serde::{Deserialize, Serialize};
use std::cmp;
use std::ops::{Add, Range};

/// A half-open byte range `[start, end)` into one source unit's text.
///
/// The scanner stamps every token with a span and the parser joins them
/// bottom-up, so a node's span always runs from its first token through
/// its last. Spans order by start offset first, which lets diagnostics be
/// sorted into source order without touching the text itself.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span ends before it starts");
        Span { start, end }
    }

    /// The empty span at offset zero, for nodes with no surface syntax.
    pub fn empty() -> Self {
        Span::new(0, 0)
    }

    /// The smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        Span::new(
            cmp::min(self.start, other.start),
            cmp::max(self.end, other.end),
        )
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether the byte at `offset` falls inside the span.
    pub fn contains(&self, offset: usize) -> bool {
        (self.start..self.end).contains(&offset)
    }
}

/// `a + b` is shorthand for [`Span::join`]; the grammar leans on it when
/// gluing a node's span out of its first and last token.
impl Add for Span {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.join(other)
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

/// A span paired with the name of the source unit it points into.
///
/// This is the location attached to every user-facing error. The byte
/// offsets are translated to line/column pairs on request, not eagerly.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Hash, Eq)]
pub struct SourceLocation {
    pub span: Span,
    pub source: String,
}

impl SourceLocation {
    pub fn new(span: Span, source: impl Into<String>) -> Self {
        Self {
            span,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Span;

    #[test]
    fn join_covers_both_operands() {
        assert_eq!(Span::new(5, 10).join(Span::new(2, 7)), Span::new(2, 10));
        assert_eq!(Span::new(5, 10) + Span::new(12, 14), Span::new(5, 14));
    }

    #[test]
    fn containment_is_half_open() {
        let span = Span::new(3, 6);
        assert!(span.contains(3));
        assert!(span.contains(5));
        assert!(!span.contains(6));
        assert_eq!(span.len(), 3);
        assert!(Span::empty().is_empty());
    }

    #[test]
    fn spans_order_by_start_offset() {
        let mut spans = vec![Span::new(8, 9), Span::new(2, 20), Span::new(2, 4)];
        spans.sort();
        assert_eq!(spans[0], Span::new(2, 4));
        assert_eq!(spans[2], Span::new(8, 9));
    }
}
