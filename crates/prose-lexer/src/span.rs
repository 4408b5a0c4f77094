//! Source positions and spans.
//!
//! Lines are 1-indexed. Columns are 0-indexed and counted in UTF-16 code
//! units, the default position encoding of the Language Server Protocol.

use std::ops::Range;

/// A single point in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Position {
    /// Byte offset into the source.
    pub offset: usize,
    /// 1-indexed line number.
    pub line: u32,
    /// 0-indexed column in UTF-16 code units.
    pub column: u32,
}

impl Position {
    pub fn new(offset: usize, line: u32, column: u32) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// A position that only knows its byte offset. Line and column are
    /// filled in later by [`LineIndex::locate`].
    pub fn at_offset(offset: usize) -> Self {
        Self {
            offset,
            line: 0,
            column: 0,
        }
    }
}

/// Source span representing a range in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A span known only by byte offsets.
    pub fn from_offsets(start: usize, end: usize) -> Self {
        Self {
            start: Position::at_offset(start),
            end: Position::at_offset(end),
        }
    }

    /// A zero-width span at `pos`.
    pub fn point(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: if other.start.offset < self.start.offset {
                other.start
            } else {
                self.start
            },
            end: if other.end.offset > self.end.offset {
                other.end
            } else {
                self.end
            },
        }
    }

    pub fn dummy() -> Self {
        Self::default()
    }

    pub fn is_dummy(&self) -> bool {
        *self == Self::default()
    }

    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_multiline(&self) -> bool {
        self.start.line != self.end.line
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.offset >= self.start.offset && pos.offset < self.end.offset
    }

    pub fn range(&self) -> Range<usize> {
        self.start.offset..self.end.offset
    }
}

/// Maps byte offsets to line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex<'src> {
    source: &'src str,
    line_starts: Vec<usize>,
}

impl<'src> LineIndex<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            source,
            line_starts,
        }
    }

    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.source.len());
        let line_idx = self.line_starts.partition_point(|&s| s <= offset) - 1;
        let line_start = self.line_starts[line_idx];
        let column = self
            .source
            .get(line_start..offset)
            .map(|text| text.encode_utf16().count())
            .unwrap_or(0);
        Position::new(offset, line_idx as u32 + 1, column as u32)
    }

    pub fn span(&self, range: Range<usize>) -> Span {
        Span::new(self.position(range.start), self.position(range.end))
    }

    /// Fill in line and column for a span that only carries offsets.
    pub fn locate(&self, span: &mut Span) {
        *span = self.span(span.range());
    }

    /// Byte offset of the first character of `line` (1-indexed).
    pub fn line_start(&self, line: u32) -> Option<usize> {
        self.line_starts.get(line.checked_sub(1)? as usize).copied()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_lookup() {
        let index = LineIndex::new("abc\ndef\n\nx");
        assert_eq!(index.position(0), Position::new(0, 1, 0));
        assert_eq!(index.position(2), Position::new(2, 1, 2));
        assert_eq!(index.position(4), Position::new(4, 2, 0));
        assert_eq!(index.position(8), Position::new(8, 3, 0));
        assert_eq!(index.position(9), Position::new(9, 4, 0));
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn test_utf16_columns() {
        // 'é' is one UTF-16 unit, '𝄞' is two
        let index = LineIndex::new("é𝄞x");
        assert_eq!(index.position(2).column, 1);
        assert_eq!(index.position(6).column, 3);
    }

    #[test]
    fn test_span_merge() {
        let index = LineIndex::new("session \"a\"\nsession \"b\"");
        let a = index.span(0..7);
        let b = index.span(12..19);
        let merged = a.merge(b);
        assert_eq!(merged.start.offset, 0);
        assert_eq!(merged.end.offset, 19);
        assert!(merged.is_multiline());
    }
}
