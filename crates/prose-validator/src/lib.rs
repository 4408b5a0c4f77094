//! Semantic validation for OpenProse programs.
//!
//! [`validate`] walks a parsed [`Program`] once, in textual order, with a
//! stack of lexical scopes. Agents, blocks and imports are collected up
//! front so they may be referenced before their definition; variables may
//! not. The tree is never modified.
//!
//! Errors make a program invalid and must stop it from being compiled.
//! Warnings are advisory.

mod checker;
mod options;
mod scope;

pub use options::ValidatorOptions;
pub use prose_diagnostics::Severity;

use checker::Checker;
use prose_ast::{Program, Span};
use thiserror::Error;
use tracing::{debug, instrument};

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Registry code, see [`prose_diagnostics::codes`].
    pub code: &'static str,
    pub message: String,
    pub severity: Severity,
    pub span: Span,
    /// Other locations involved, such as an earlier definition.
    pub related: Vec<(Span, String)>,
}

impl ValidationError {
    pub fn error(code: &'static str, span: Span, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Error,
            span,
            related: Vec::new(),
        }
    }

    pub fn warning(code: &'static str, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, span, message)
        }
    }

    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related.push((span, label.into()));
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity.blocks_compilation()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationResult {
    /// True when there are no errors. Warnings do not count.
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    /// Errors and warnings merged in source order.
    pub fn diagnostics(&self) -> Vec<&ValidationError> {
        let mut all: Vec<_> = self.errors.iter().chain(&self.warnings).collect();
        all.sort_by_key(|d| d.span.start.offset);
        all
    }
}

/// Validate with [`ValidatorOptions::default`].
pub fn validate(program: &Program) -> ValidationResult {
    validate_with(program, &ValidatorOptions::default())
}

#[instrument(skip_all, fields(statements = program.statements.len()))]
pub fn validate_with(program: &Program, options: &ValidatorOptions) -> ValidationResult {
    let mut checker = Checker::new(options);
    checker.check_program(program);
    let mut findings = checker.finish();
    findings.sort_by_key(|d| (d.span.start.offset, d.span.end.offset));

    let (errors, warnings): (Vec<_>, Vec<_>) =
        findings.into_iter().partition(ValidationError::is_error);
    debug!(errors = errors.len(), warnings = warnings.len(), "validation finished");
    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
