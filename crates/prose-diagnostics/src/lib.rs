//! Diagnostics shared by every stage of the OpenProse toolchain.
//!
//! Lexer, parser and validator errors are converted into [`Diagnostic`]s by
//! the facade crate. A diagnostic carries a `P`-prefixed code from
//! [`codes`], a [`Severity`], a message and labelled source spans. Rendering
//! lives in [`render`] and always writes to a caller-supplied sink.
//!
//! ```rust
//! use prose_diagnostics::{codes, Diagnostic, Severity};
//! use prose_diagnostics::span::SourceSpan;
//!
//! let diagnostic = Diagnostic::error(codes::UNDEFINED_AGENT, "undefined agent 'writer'")
//!     .with_primary_span(SourceSpan::new("main.prose", 17, 23), "not defined");
//!
//! assert_eq!(diagnostic.severity, Severity::Error);
//! assert_eq!(diagnostic.code.as_deref(), Some("P3002"));
//! ```

pub mod codes;
pub mod render;
pub mod span;

use span::{MultiSpan, SourceSpan};
use thiserror::Error;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Note,
    Help,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Help => "help",
        }
    }

    /// Errors make a program invalid; everything else is advisory.
    pub fn blocks_compilation(&self) -> bool {
        matches!(self, Severity::Error)
    }

    /// LSP `DiagnosticSeverity` number (1=Error, 2=Warning, 3=Information, 4=Hint).
    pub fn to_lsp_severity(&self) -> u8 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Note => 3,
            Severity::Help => 4,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reportable problem with its locations and attached notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Registry code such as `P2001`. Notes and helps usually have none.
    pub code: Option<String>,
    pub severity: Severity,
    pub message: String,
    pub spans: MultiSpan,
    /// Notes and helps rendered beneath the main message.
    pub children: Vec<Diagnostic>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            severity,
            message: message.into(),
            spans: MultiSpan::new(),
            children: Vec::new(),
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, Some(code), message)
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, Some(code), message)
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, None, message)
    }

    pub fn help(message: impl Into<String>) -> Self {
        Self::new(Severity::Help, None, message)
    }

    pub fn with_primary_span(mut self, span: SourceSpan, label: impl Into<String>) -> Self {
        self.spans.push_primary(span, label);
        self
    }

    pub fn with_secondary_span(mut self, span: SourceSpan, label: impl Into<String>) -> Self {
        self.spans.push_secondary(span, label);
        self
    }

    pub fn with_child(mut self, child: Diagnostic) -> Self {
        self.children.push(child);
        self
    }

    pub fn primary_span(&self) -> Option<&SourceSpan> {
        self.spans.primary_span()
    }

    pub fn is_error(&self) -> bool {
        self.severity.blocks_compilation()
    }

    /// The registry category of this diagnostic's code.
    pub fn category(&self) -> Option<ErrorCategory> {
        self.code.as_deref().and_then(ErrorCategory::from_code)
    }
}

/// Code families. The first digit after `P` selects the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// P1xxx
    Lexical,
    /// P2xxx
    Syntax,
    /// P3xxx
    Reference,
    /// P4xxx
    Structure,
    /// P5xxx
    Property,
    /// P6xxx
    Style,
}

impl ErrorCategory {
    pub fn from_code(code: &str) -> Option<Self> {
        let mut chars = code.chars();
        if chars.next()? != 'P' || code.len() != 5 {
            return None;
        }
        match chars.next()? {
            '1' => Some(ErrorCategory::Lexical),
            '2' => Some(ErrorCategory::Syntax),
            '3' => Some(ErrorCategory::Reference),
            '4' => Some(ErrorCategory::Structure),
            '5' => Some(ErrorCategory::Property),
            '6' => Some(ErrorCategory::Style),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorCategory::Lexical => "Lexical",
            ErrorCategory::Syntax => "Syntax",
            ErrorCategory::Reference => "Naming/Reference",
            ErrorCategory::Structure => "Structure",
            ErrorCategory::Property => "Property Values",
            ErrorCategory::Style => "Style",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    pub code: &'static str,
    pub category: ErrorCategory,
    pub description: &'static str,
}

/// Lookup table over [`codes::ALL`].
#[derive(Debug, Default)]
pub struct ErrorCodeRegistry {
    codes: rustc_hash::FxHashMap<&'static str, ErrorCodeInfo>,
}

impl ErrorCodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every code the toolchain emits.
    pub fn with_standard_codes() -> Self {
        let mut registry = Self::new();
        for &(code, description) in codes::ALL {
            registry.register(code, description);
        }
        registry
    }

    /// Returns false if the code is malformed.
    pub fn register(&mut self, code: &'static str, description: &'static str) -> bool {
        let Some(category) = ErrorCategory::from_code(code) else {
            return false;
        };
        self.codes.insert(
            code,
            ErrorCodeInfo {
                code,
                category,
                description,
            },
        );
        true
    }

    pub fn get(&self, code: &str) -> Option<&ErrorCodeInfo> {
        self.codes.get(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes_in_category(
        &self,
        category: ErrorCategory,
    ) -> impl Iterator<Item = &ErrorCodeInfo> {
        self.codes.values().filter(move |info| info.category == category)
    }
}

pub type DiagnosticResult<T> = Result<T, DiagnosticError>;

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source file not found: {0}")]
    SourceNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_severity() {
        assert_eq!(Severity::Error.as_str(), "error");
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert!(Severity::Error.blocks_compilation());
        assert!(!Severity::Warning.blocks_compilation());
        assert_eq!(Severity::Help.to_lsp_severity(), 4);
    }

    #[test]
    fn test_builder() {
        let diag = Diagnostic::error(codes::DUPLICATE_AGENT, "duplicate agent name 'a'")
            .with_primary_span(SourceSpan::new("x.prose", 30, 31), "redefined here")
            .with_secondary_span(SourceSpan::new("x.prose", 6, 7), "first defined here")
            .with_child(Diagnostic::help("rename one of the agents"));

        assert_eq!(diag.primary_span(), Some(&SourceSpan::new("x.prose", 30, 31)));
        assert_eq!(diag.spans.labels().len(), 2);
        assert_eq!(diag.children.len(), 1);
        assert_eq!(diag.category(), Some(ErrorCategory::Reference));
        assert!(diag.is_error());
    }

    #[test]
    fn test_category_from_code() {
        assert_eq!(ErrorCategory::from_code("P1001"), Some(ErrorCategory::Lexical));
        assert_eq!(ErrorCategory::from_code("P6003"), Some(ErrorCategory::Style));
        assert_eq!(ErrorCategory::from_code("E0001"), None);
        assert_eq!(ErrorCategory::from_code("P9001"), None);
        assert_eq!(ErrorCategory::from_code("P1"), None);
    }

    #[test]
    fn test_registry_covers_every_code() {
        let registry = ErrorCodeRegistry::with_standard_codes();
        assert_eq!(registry.len(), codes::ALL.len());
        let info = registry.get(codes::EMPTY_PARALLEL).unwrap();
        assert_eq!(info.category, ErrorCategory::Structure);
        assert!(registry.codes_in_category(ErrorCategory::Lexical).count() >= 6);
    }

    #[test]
    fn test_registry_rejects_malformed_codes() {
        let mut registry = ErrorCodeRegistry::new();
        assert!(!registry.register("X1000", "bogus"));
        assert!(registry.is_empty());
    }
}
