//! Conversion of lexer, parser and validator findings into LSP diagnostics.

use prose_ast::Span;
use prose_diagnostics::Severity;
use prose_lexer::LexError;
use prose_parser::{ParseError, ParseOutput};
use prose_validator::{ValidationError, ValidationResult};
use tower_lsp::lsp_types::{self, NumberOrString, Url};

/// Name shown as the diagnostic source in the editor.
pub const SOURCE: &str = "openprose";

/// Builds LSP diagnostics for one document.
pub struct DiagnosticConverter {
    uri: Url,
}

impl DiagnosticConverter {
    pub fn new(uri: Url) -> Self {
        Self { uri }
    }

    pub fn lex_error(&self, error: &LexError) -> lsp_types::Diagnostic {
        self.diagnostic(error.code(), Severity::Error, error.to_string(), error.span(), &[])
    }

    pub fn parse_error(&self, error: &ParseError) -> lsp_types::Diagnostic {
        self.diagnostic(error.code(), Severity::Error, error.to_string(), error.span(), &[])
    }

    pub fn validation_error(&self, error: &ValidationError) -> lsp_types::Diagnostic {
        self.diagnostic(
            error.code,
            error.severity,
            error.message.clone(),
            error.span,
            &error.related,
        )
    }

    /// Every finding for a document, lexer errors first.
    pub fn convert_all(
        &self,
        output: &ParseOutput,
        validation: Option<&ValidationResult>,
    ) -> Vec<lsp_types::Diagnostic> {
        let mut diagnostics: Vec<_> = output.lex_errors.iter().map(|e| self.lex_error(e)).collect();
        diagnostics.extend(output.errors.iter().map(|e| self.parse_error(e)));
        if let Some(result) = validation {
            diagnostics.extend(result.diagnostics().into_iter().map(|e| self.validation_error(e)));
        }
        diagnostics
    }

    fn diagnostic(
        &self,
        code: &str,
        severity: Severity,
        message: String,
        span: Span,
        related: &[(Span, String)],
    ) -> lsp_types::Diagnostic {
        let related_information = (!related.is_empty()).then(|| {
            related
                .iter()
                .map(|(span, label)| lsp_types::DiagnosticRelatedInformation {
                    location: lsp_types::Location {
                        uri: self.uri.clone(),
                        range: to_range(*span),
                    },
                    message: label.clone(),
                })
                .collect()
        });

        lsp_types::Diagnostic {
            range: to_range(span),
            severity: Some(to_lsp_severity(severity)),
            code: Some(NumberOrString::String(code.to_string())),
            code_description: None,
            source: Some(SOURCE.to_string()),
            message,
            related_information,
            tags: None,
            data: None,
        }
    }
}

/// Convenience wrapper around [`DiagnosticConverter::convert_all`].
pub fn to_lsp_diagnostics(
    uri: Url,
    output: &ParseOutput,
    validation: Option<&ValidationResult>,
) -> Vec<lsp_types::Diagnostic> {
    DiagnosticConverter::new(uri).convert_all(output, validation)
}

pub fn to_lsp_severity(severity: Severity) -> lsp_types::DiagnosticSeverity {
    match severity {
        Severity::Error => lsp_types::DiagnosticSeverity::ERROR,
        Severity::Warning => lsp_types::DiagnosticSeverity::WARNING,
        Severity::Note => lsp_types::DiagnosticSeverity::INFORMATION,
        Severity::Help => lsp_types::DiagnosticSeverity::HINT,
    }
}

/// Spans use 1-based lines; LSP ranges are 0-based.
fn to_range(span: Span) -> lsp_types::Range {
    let position = |p: prose_ast::Position| lsp_types::Position {
        line: p.line.saturating_sub(1),
        character: p.column,
    };
    lsp_types::Range {
        start: position(span.start),
        end: position(span.end),
    }
}
