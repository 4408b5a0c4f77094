//! OpenProse compiler.
//!
//! Turns a validated [`Program`] into its canonical form: every default the
//! language leaves implicit is written out, comments are set aside, and the
//! result is printed as source text that parses back to the same tree.
//!
//! ```text
//! session "Hello world"
//! ```
//! compiles to
//! ```text
//! session _anon_0: { prompt: "Hello world", context: [] }
//! ```

mod canonical;
mod printer;
mod source_map;
mod strip;

pub use source_map::{SourceMap, SourceMapping};
pub use strip::{strip_comments, strip_program_comments, StrippedComment, StrippedSource};

use canonical::Canonicalizer;
use prose_ast::Program;
use prose_validator::{ValidationError, ValidatorOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// The only output target.
pub const CANONICAL_TARGET: &str = "canonical";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("unsupported compile target '{0}'; the only target is \"canonical\"")]
    UnsupportedTarget(String),
    #[error("program has {} validation error(s)", errors.len())]
    InvalidProgram { errors: Vec<ValidationError> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// `None` or `"canonical"`.
    pub target: Option<String>,
    /// Drop comment statements and report them in
    /// [`CompiledOutput::stripped_comments`].
    pub strip_comments: bool,
    /// Spaces per indentation level in the canonical text.
    pub indent_width: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target: None,
            strip_comments: true,
            indent_width: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledOutput {
    /// The canonical tree. Nodes the compiler added carry dummy spans.
    pub program: Program,
    pub text: String,
    pub source_map: SourceMap,
    pub stripped_comments: Vec<StrippedComment>,
}

/// Compile a program that is already known to be valid.
///
/// The input is not modified. Compiling the parsed canonical text again
/// yields the same text.
#[instrument(skip_all, fields(statements = program.statements.len()))]
pub fn compile(program: &Program, options: &CompileOptions) -> Result<CompiledOutput, CompileError> {
    if let Some(target) = &options.target {
        if target != CANONICAL_TARGET {
            return Err(CompileError::UnsupportedTarget(target.clone()));
        }
    }

    let (program, stripped_comments) = if options.strip_comments {
        strip_program_comments(program)
    } else {
        (program.clone(), Vec::new())
    };
    let program = Canonicalizer::new(&program).run(program);
    let (text, source_map) = printer::print_program(&program, options.indent_width);

    debug!(
        bytes = text.len(),
        mappings = source_map.len(),
        comments = stripped_comments.len(),
        "compiled"
    );
    Ok(CompiledOutput {
        program,
        text,
        source_map,
        stripped_comments,
    })
}

/// Validate, then compile. Warnings do not block compilation.
pub fn compile_checked(
    program: &Program,
    options: &CompileOptions,
    validator_options: &ValidatorOptions,
) -> Result<CompiledOutput, CompileError> {
    let result = prose_validator::validate_with(program, validator_options);
    if !result.valid {
        return Err(CompileError::InvalidProgram {
            errors: result.errors,
        });
    }
    compile(program, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_options_from_toml() {
        let options: CompileOptions = toml::from_str("indent_width = 4").unwrap();
        assert_eq!(options.indent_width, 4);
        assert!(options.strip_comments);
        assert_eq!(options.target, None);

        let options: CompileOptions =
            toml::from_str("target = \"canonical\"\nstrip_comments = false").unwrap();
        assert_eq!(options.target.as_deref(), Some(CANONICAL_TARGET));
        assert!(!options.strip_comments);
    }

    #[test]
    fn test_unsupported_target() {
        let options = CompileOptions {
            target: Some("python".into()),
            ..CompileOptions::default()
        };
        let error = compile(&Program::default(), &options).unwrap_err();
        assert_eq!(error, CompileError::UnsupportedTarget("python".into()));
        assert!(error.to_string().contains("'python'"));
    }

    #[test]
    fn test_indent_width() {
        let program = prose_parser::parse("do:\n  session \"a\"\n").program;
        let options = CompileOptions {
            indent_width: 4,
            ..CompileOptions::default()
        };
        let output = compile(&program, &options).unwrap();
        assert_eq!(
            output.text,
            "do:\n    session _anon_0: { prompt: \"a\", context: [] }\n"
        );
    }
}
