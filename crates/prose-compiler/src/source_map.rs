//! Mapping from canonical text back to the user's source.

use prose_ast::{Position, Span};

/// One printed node: where it landed in the canonical text and where it
/// came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapping {
    pub generated: Span,
    pub original: Span,
}

/// Built by the canonical printer. Nodes synthesized by the compiler have no
/// original location and are not recorded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceMap {
    pub entries: Vec<SourceMapping>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, generated: Span, original: Span) {
        if !original.is_dummy() {
            self.entries.push(SourceMapping {
                generated,
                original,
            });
        }
    }

    /// The original span of the innermost node printed at `generated`.
    pub fn original_span(&self, generated: Position) -> Option<Span> {
        self.entries
            .iter()
            .filter(|m| m.generated.contains(generated))
            .min_by_key(|m| m.generated.len())
            .map(|m| m.original)
    }

    /// Every canonical location printed from `original`.
    pub fn generated_spans(&self, original: Span) -> impl Iterator<Item = Span> + '_ {
        self.entries
            .iter()
            .filter(move |m| m.original == original)
            .map(|m| m.generated)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
