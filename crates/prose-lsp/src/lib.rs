//! Editor support for OpenProse.
//!
//! This crate turns a parsed program into the two things an editor needs
//! from a language server:
//!
//! - [`semantic_tokens`]: classified ranges for syntax highlighting, and the
//!   legend that gives their type indices meaning
//! - [`diagnostics`]: lexer, parser and validator findings as LSP diagnostics
//!
//! It uses `tower-lsp` for its protocol types only. Hosting a server is left
//! to the editor integration.

pub mod diagnostics;
pub mod semantic_tokens;

pub use diagnostics::{to_lsp_diagnostics, DiagnosticConverter};
pub use semantic_tokens::{
    get_encoded_semantic_tokens, get_semantic_tokens, get_semantic_tokens_legend, SemanticToken,
    TokenType,
};

use tower_lsp::lsp_types::{
    SemanticTokensFullOptions, SemanticTokensOptions, SemanticTokensServerCapabilities,
};

/// Semantic-token capability to advertise during initialization. Only full
/// document requests are supported.
pub fn semantic_tokens_capability() -> SemanticTokensServerCapabilities {
    SemanticTokensServerCapabilities::SemanticTokensOptions(SemanticTokensOptions {
        work_done_progress_options: Default::default(),
        legend: get_semantic_tokens_legend(),
        range: Some(false),
        full: Some(SemanticTokensFullOptions::Bool(true)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_carries_legend() {
        let SemanticTokensServerCapabilities::SemanticTokensOptions(options) =
            semantic_tokens_capability()
        else {
            panic!("expected semantic token options");
        };
        assert_eq!(options.legend, get_semantic_tokens_legend());
        assert_eq!(options.full, Some(SemanticTokensFullOptions::Bool(true)));
    }
}
