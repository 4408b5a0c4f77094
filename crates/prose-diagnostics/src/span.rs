//! File-qualified spans and the labels attached to them.

/// A byte range in a named source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub file: String,
    /// Inclusive byte offset.
    pub start: usize,
    /// Exclusive byte offset.
    pub end: usize,
}

impl SourceSpan {
    pub fn new(file: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            file: file.into(),
            start,
            end: end.max(start),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// `None` when the spans belong to different files.
    pub fn merge(&self, other: &SourceSpan) -> Option<SourceSpan> {
        (self.file == other.file).then(|| SourceSpan {
            file: self.file.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        })
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LabelStyle {
    /// Underlined with the severity's marker.
    #[default]
    Primary,
    /// Underlined with `-`.
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub span: SourceSpan,
    pub message: String,
    pub style: LabelStyle,
}

impl Label {
    pub fn primary(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Primary,
        }
    }

    pub fn secondary(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Secondary,
        }
    }
}

/// The primary location of a diagnostic plus any related locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiSpan {
    primary: Option<SourceSpan>,
    labels: Vec<Label>,
}

impl MultiSpan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_span(span: SourceSpan) -> Self {
        Self {
            primary: Some(span),
            labels: Vec::new(),
        }
    }

    pub fn primary_span(&self) -> Option<&SourceSpan> {
        self.primary.as_ref()
    }

    /// The first primary label also becomes the primary span.
    pub fn push_primary(&mut self, span: SourceSpan, message: impl Into<String>) {
        if self.primary.is_none() {
            self.primary = Some(span.clone());
        }
        self.labels.push(Label::primary(span, message));
    }

    pub fn push_secondary(&mut self, span: SourceSpan, message: impl Into<String>) {
        self.labels.push(Label::secondary(span, message));
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.labels.is_empty()
    }
}

/// 1-based line and column, the column counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

impl LineColumn {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A span resolved against its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSpan {
    pub span: SourceSpan,
    pub start: LineColumn,
    pub end: LineColumn,
    /// Full text of every line the span touches, without line breaks.
    pub source_lines: Vec<String>,
}

impl ResolvedSpan {
    pub fn is_multiline(&self) -> bool {
        self.start.line != self.end.line
    }
}
