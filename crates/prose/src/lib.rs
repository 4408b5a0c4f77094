//! OpenProse front end.
//!
//! One dependency for hosts that work with `.prose` programs: tokenize,
//! parse, validate, compile to canonical form and compute semantic tokens.
//!
//! ```rust
//! let report = prose::check("main.prose", "session \"Hello world\"");
//! assert!(report.is_valid());
//!
//! let output = prose::compile(&report.program, &prose::CompileOptions::default()).unwrap();
//! assert_eq!(output.text, "session _anon_0: { prompt: \"Hello world\", context: [] }\n");
//! ```

pub use prose_ast as ast;
pub use prose_ast::Program;
pub use prose_compiler::{
    compile, compile_checked, CompileError, CompileOptions, CompiledOutput, SourceMap,
};
pub use prose_diagnostics::{codes, Diagnostic, Severity};
pub use prose_lexer::{tokenize, LexError, LexOutput, Token, TokenKind};
pub use prose_lsp::{
    get_encoded_semantic_tokens, get_semantic_tokens, get_semantic_tokens_legend, SemanticToken,
    TokenType,
};
pub use prose_parser::{parse, ParseError, ParseOutput};
pub use prose_validator::{validate, validate_with, ValidationError, ValidationResult, ValidatorOptions};

use prose_ast::Span;
use prose_diagnostics::render::{render_short, SourceCache};
use prose_diagnostics::span::SourceSpan;
use tracing::{debug, instrument};

/// Everything found while checking one source file.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub file: String,
    /// The parsed program. Parts that failed to parse are missing.
    pub program: Program,
    /// Lexer, parser and validator findings, in that order.
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckReport {
    /// No error-level diagnostics. Warnings are allowed.
    pub fn is_valid(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    /// One `file:line:col: severity: message` line per diagnostic.
    pub fn render_short(&self, source: &str) -> Vec<String> {
        let mut sources = SourceCache::new();
        sources.add_source(self.file.clone(), source);
        self.diagnostics
            .iter()
            .map(|d| render_short(d, &sources))
            .collect()
    }
}

/// Parse and validate with [`ValidatorOptions::default`].
pub fn check(file: &str, source: &str) -> CheckReport {
    check_with(file, source, &ValidatorOptions::default())
}

/// Parse and validate. Validation only runs on a program that parsed
/// cleanly.
#[instrument(skip(source, options), fields(len = source.len()))]
pub fn check_with(file: &str, source: &str, options: &ValidatorOptions) -> CheckReport {
    let output = parse(source);
    let mut diagnostics: Vec<Diagnostic> = output
        .lex_errors
        .iter()
        .map(|e| error_diagnostic(file, e.code(), e.to_string(), e.span()))
        .collect();
    diagnostics.extend(
        output
            .errors
            .iter()
            .map(|e| error_diagnostic(file, e.code(), e.to_string(), e.span())),
    );

    if !output.has_errors() {
        let result = validate_with(&output.program, options);
        diagnostics.extend(result.diagnostics().into_iter().map(|e| validation_diagnostic(file, e)));
    }

    debug!(diagnostics = diagnostics.len(), "checked");
    CheckReport {
        file: file.to_string(),
        program: output.program,
        diagnostics,
    }
}

fn source_span(file: &str, span: Span) -> SourceSpan {
    SourceSpan::new(file, span.start.offset, span.end.offset)
}

fn error_diagnostic(file: &str, code: &str, message: String, span: Span) -> Diagnostic {
    Diagnostic::error(code, message).with_primary_span(source_span(file, span), "")
}

fn validation_diagnostic(file: &str, error: &ValidationError) -> Diagnostic {
    error.related.iter().fold(
        Diagnostic::new(error.severity, Some(error.code), error.message.clone())
            .with_primary_span(source_span(file, error.span), ""),
        |diagnostic, (span, label)| diagnostic.with_secondary_span(source_span(file, *span), label.clone()),
    )
}
