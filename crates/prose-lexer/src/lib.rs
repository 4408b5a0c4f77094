//! OpenProse Lexer
//!
//! Tokenizes `.prose` source text. Raw tokens come from the `logos` crate;
//! a layout pass then applies the off-side rule and inserts the structural
//! `Newline`, `Indent` and `Dedent` tokens the parser relies on.

mod layout;
pub mod literal;
pub mod span;

use logos::Logos;
use prose_diagnostics::codes;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, instrument};

pub use literal::{DiscretionLiteral, EscapeSequence, StringLiteral, StringSegment};
pub use span::{LineIndex, Position, Span};

/// A token with its kind and source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Error kinds raised while scanning a single token.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexErrorKind {
    #[default]
    UnexpectedCharacter,
    UnterminatedString,
    UnterminatedDiscretion,
}

/// All token types in OpenProse
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f]+")] // Skip whitespace (but not newlines)
#[logos(error = LexErrorKind)]
pub enum TokenKind {
    // ========== Keywords ==========
    #[token("agent")]
    Agent,
    #[token("session")]
    Session,
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("import")]
    Import,
    #[token("from")]
    From,
    #[token("block")]
    Block,
    #[token("do")]
    Do,
    #[token("parallel")]
    Parallel,
    #[token("repeat")]
    Repeat,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("as")]
    As,
    #[token("loop")]
    Loop,
    #[token("until")]
    Until,
    #[token("while")]
    While,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("throw")]
    Throw,
    #[token("choice")]
    Choice,
    #[token("option")]
    Option,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,

    // ========== Operators and delimiters ==========
    #[token("->")]
    Arrow,
    #[token("|")]
    Pipe,
    #[token("=")]
    Eq,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // ========== Literals ==========
    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| SmolStr::new(lex.slice()))]
    Number(SmolStr),

    /// `"..."` or `"""..."""`
    #[token("\"", literal::lex_string)]
    #[token("\"\"\"", literal::lex_triple_string)]
    String(Box<StringLiteral>),

    /// `**...**` or `***...***`
    #[token("**", literal::lex_inline_discretion)]
    #[token("***", literal::lex_multiline_discretion)]
    Discretion(DiscretionLiteral),

    // ========== Identifiers ==========
    /// Identifiers may contain inner hyphens (`on-fail`, `web-search`)
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(-[A-Za-z0-9_]+)*", |lex| SmolStr::new(lex.slice()))]
    Identifier(SmolStr),

    // ========== Trivia ==========
    #[regex(r"#[^\n]*", |lex| SmolStr::new(lex.slice()))]
    Comment(SmolStr),

    #[regex(r"\r?\n")]
    Newline,

    // ========== Layout (never produced by logos) ==========
    Indent,
    Dedent,
    Eof,

    /// Lexer error - unrecognized or malformed input
    Error,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Arrow => write!(f, "'->'"),
            TokenKind::Pipe => write!(f, "'|'"),
            TokenKind::Eq => write!(f, "'='"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::String(s) => write!(f, "string {}", s.raw),
            TokenKind::Discretion(d) => write!(f, "discretion {}", d.raw),
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::Comment(_) => write!(f, "comment"),
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::Indent => write!(f, "indentation"),
            TokenKind::Dedent => write!(f, "end of block"),
            TokenKind::Eof => write!(f, "end of file"),
            TokenKind::Error => write!(f, "invalid input"),
            keyword => match keyword.keyword_text() {
                Some(text) => write!(f, "'{}'", text),
                None => write!(f, "{:?}", keyword),
            },
        }
    }
}

impl TokenKind {
    /// Source text of a keyword token.
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Agent => "agent",
            TokenKind::Session => "session",
            TokenKind::Let => "let",
            TokenKind::Const => "const",
            TokenKind::Import => "import",
            TokenKind::From => "from",
            TokenKind::Block => "block",
            TokenKind::Do => "do",
            TokenKind::Parallel => "parallel",
            TokenKind::Repeat => "repeat",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::As => "as",
            TokenKind::Loop => "loop",
            TokenKind::Until => "until",
            TokenKind::While => "while",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::Throw => "throw",
            TokenKind::Choice => "choice",
            TokenKind::Option => "option",
            TokenKind::If => "if",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            _ => return None,
        };
        Some(text)
    }

    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        self.keyword_text().is_some()
    }

    /// Layout tokens carry no source text of their own.
    pub fn is_layout(&self) -> bool {
        matches!(
            self,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof
        )
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, TokenKind::Comment(_))
    }
}

/// The reserved words of the language, in declaration order.
pub const KEYWORDS: &[&str] = &[
    "agent", "session", "let", "const", "import", "from", "block", "do", "parallel", "repeat",
    "for", "in", "as", "loop", "until", "while", "try", "catch", "finally", "throw", "choice",
    "option", "if", "elif", "else",
];

fn keyword_table() -> &'static FxHashSet<&'static str> {
    static TABLE: OnceLock<FxHashSet<&'static str>> = OnceLock::new();
    TABLE.get_or_init(|| KEYWORDS.iter().copied().collect())
}

/// True if `word` is reserved and cannot be used as a name.
pub fn is_keyword(word: &str) -> bool {
    keyword_table().contains(word)
}

/// Lexer error type with detailed error messages
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, span: Span },

    #[error("unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("unterminated discretion span - expected closing '{marker}'")]
    UnterminatedDiscretion { marker: &'static str, span: Span },

    #[error("invalid escape sequence '{sequence}'")]
    InvalidEscape { sequence: SmolStr, span: Span },

    #[error("tab character in indentation - indent with spaces only")]
    TabIndentation { span: Span },

    #[error("unindent does not match any outer indentation level")]
    InconsistentDedent { span: Span },
}

impl LexError {
    /// Registry code, see [`prose_diagnostics::codes`].
    pub fn code(&self) -> &'static str {
        match self {
            LexError::UnexpectedCharacter { .. } => codes::UNEXPECTED_CHARACTER,
            LexError::UnterminatedString { .. } => codes::UNTERMINATED_STRING,
            LexError::UnterminatedDiscretion { .. } => codes::UNTERMINATED_DISCRETION,
            LexError::InvalidEscape { .. } => codes::INVALID_ESCAPE,
            LexError::TabIndentation { .. } => codes::TAB_INDENTATION,
            LexError::InconsistentDedent { .. } => codes::INCONSISTENT_DEDENT,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedCharacter { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedDiscretion { span, .. }
            | LexError::InvalidEscape { span, .. }
            | LexError::TabIndentation { span }
            | LexError::InconsistentDedent { span } => *span,
        }
    }
}

/// Lexer for OpenProse source code
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            inner: TokenKind::lexer(source),
        }
    }

    /// Get the source code being lexed
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Tokenize the entire source, including layout tokens and comments.
    /// The stream always ends with `Eof`.
    #[instrument(level = "debug", skip_all, fields(len = self.source.len()))]
    pub fn tokenize(self) -> (Vec<Token>, Vec<LexError>) {
        let index = LineIndex::new(self.source);
        let mut layout = layout::Layout::new(self.source, &index);

        for (result, range) in self.inner.spanned() {
            let span = index.span(range.clone());
            match result {
                Ok(TokenKind::Newline) => layout.newline(span),
                Ok(TokenKind::Comment(text)) => layout.comment(text, span),
                Ok(TokenKind::String(mut literal)) => {
                    literal.locate(&index);
                    for escape in literal.invalid_escapes() {
                        layout.error(LexError::InvalidEscape {
                            sequence: escape.sequence.clone(),
                            span: escape.span,
                        });
                    }
                    layout.token(TokenKind::String(literal), span);
                }
                Ok(kind) => layout.token(kind, span),
                Err(kind) => {
                    let text = &self.source[range];
                    let error = match kind {
                        LexErrorKind::UnexpectedCharacter => LexError::UnexpectedCharacter {
                            ch: text.chars().next().unwrap_or('?'),
                            span,
                        },
                        LexErrorKind::UnterminatedString => LexError::UnterminatedString { span },
                        LexErrorKind::UnterminatedDiscretion => {
                            LexError::UnterminatedDiscretion {
                                marker: if text.starts_with("***") { "***" } else { "**" },
                                span,
                            }
                        }
                    };
                    layout.error(error);
                    layout.token(TokenKind::Error, span);
                }
            }
        }

        let (tokens, errors) = layout.finish();
        debug!(tokens = tokens.len(), errors = errors.len(), "tokenized");
        (tokens, errors)
    }

    /// Tokenize, dropping comments.
    pub fn tokenize_filtered(self) -> (Vec<Token>, Vec<LexError>) {
        let (tokens, errors) = self.tokenize();
        let filtered = tokens
            .into_iter()
            .filter(|t| !t.kind.is_comment())
            .collect();
        (filtered, errors)
    }
}

/// Tokens and errors from a single [`tokenize`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

/// Tokenize `source`. Never fails; problems are reported in `errors`.
pub fn tokenize(source: &str) -> LexOutput {
    let (tokens, errors) = Lexer::new(source).tokenize();
    LexOutput { tokens, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Lexer::new(source).tokenize();
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Identifier(name.into())
    }

    #[test]
    fn test_keywords() {
        let source = KEYWORDS.join(" ");
        let (tokens, errors) = Lexer::new(&source).tokenize();
        assert!(errors.is_empty());
        for (token, word) in tokens.iter().zip(KEYWORDS) {
            assert!(token.kind.is_keyword(), "{} did not lex as a keyword", word);
            assert_eq!(token.kind.keyword_text(), Some(*word));
        }
    }

    #[test]
    fn test_keyword_table() {
        assert!(is_keyword("parallel"));
        assert!(is_keyword("elif"));
        assert!(!is_keyword("model"));
        assert!(!is_keyword("Session"));
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(
            kinds("sessions agents"),
            vec![ident("sessions"), ident("agents"), TokenKind::Newline, TokenKind::Eof]
        );
    }

    #[test]
    fn test_hyphenated_identifier_and_arrow() {
        assert_eq!(
            kinds("on-fail a->b"),
            vec![
                ident("on-fail"),
                ident("a"),
                TokenKind::Arrow,
                ident("b"),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("x = [a, b] | {c} (d): e"),
            vec![
                ident("x"),
                TokenKind::Eq,
                TokenKind::LBracket,
                ident("a"),
                TokenKind::Comma,
                ident("b"),
                TokenKind::RBracket,
                TokenKind::Pipe,
                TokenKind::LBrace,
                ident("c"),
                TokenKind::RBrace,
                TokenKind::LParen,
                ident("d"),
                TokenKind::RParen,
                TokenKind::Colon,
                ident("e"),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("repeat 3 1.5");
        assert_eq!(tokens[1], TokenKind::Number("3".into()));
        assert_eq!(tokens[2], TokenKind::Number("1.5".into()));
    }

    #[test]
    fn test_simple_string() {
        let (tokens, _) = Lexer::new(r#"session "Hello world""#).tokenize();
        let TokenKind::String(lit) = &tokens[1].kind else {
            panic!("expected string, got {:?}", tokens[1].kind);
        };
        assert_eq!(lit.value, "Hello world");
        assert!(!lit.triple);
        assert_eq!(tokens[1].span.start.column, 8);
        assert_eq!(tokens[1].span.end.column, 21);
    }

    #[test]
    fn test_interpolation_positions_are_located() {
        let (tokens, _) = Lexer::new("\n  \"x {name}\"").tokenize();
        let string = tokens
            .iter()
            .find_map(|t| match &t.kind {
                TokenKind::String(lit) => Some(lit.clone()),
                _ => None,
            })
            .unwrap();
        let (name, span) = string.interpolations().next().unwrap();
        assert_eq!(name, "name");
        assert_eq!(span.start.line, 2);
        assert_eq!(span.start.column, 5);
        assert_eq!(span.end.column, 11);
    }

    #[test]
    fn test_triple_string_spans_lines() {
        let source = "let p = \"\"\"\nline one\nline two\n\"\"\"\nsession p";
        let (tokens, errors) = Lexer::new(source).tokenize();
        assert!(errors.is_empty());
        let TokenKind::String(lit) = &tokens[3].kind else {
            panic!("expected string");
        };
        assert!(lit.triple);
        assert_eq!(lit.value, "\nline one\nline two\n");
        assert_eq!(tokens[3].span.start.line, 1);
        assert_eq!(tokens[3].span.end.line, 4);
        // no layout tokens from inside the literal
        assert_eq!(tokens[4].kind, TokenKind::Newline);
        assert_eq!(tokens[5].kind, TokenKind::Session);
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, errors) = Lexer::new("session \"oops\nsession \"ok\"").tokenize();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LexError::UnterminatedString { .. }));
        assert_eq!(tokens[1].kind, TokenKind::Error);
        // the next line still lexes
        assert!(tokens
            .iter()
            .any(|t| matches!(&t.kind, TokenKind::String(s) if s.value == "ok")));
    }

    #[test]
    fn test_invalid_escape_reported() {
        let (tokens, errors) = Lexer::new(r#"session "a\qb""#).tokenize();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], LexError::InvalidEscape { sequence, .. } if sequence == "\\q"));
        assert!(matches!(&tokens[1].kind, TokenKind::String(s) if s.value == "a\\qb"));
    }

    #[test]
    fn test_discretion_inline() {
        let tokens = kinds("loop until **the user approves**:");
        assert_eq!(tokens[0], TokenKind::Loop);
        assert_eq!(tokens[1], TokenKind::Until);
        let TokenKind::Discretion(d) = &tokens[2] else {
            panic!("expected discretion, got {:?}", tokens[2]);
        };
        assert_eq!(d.text, "the user approves");
        assert!(!d.multiline);
        assert_eq!(tokens[3], TokenKind::Colon);
    }

    #[test]
    fn test_discretion_multiline() {
        let tokens = kinds("if ***first line\nsecond line***:\n  session \"x\"");
        let TokenKind::Discretion(d) = &tokens[1] else {
            panic!("expected discretion");
        };
        assert_eq!(d.text, "first line\nsecond line");
        assert!(d.multiline);
        assert_eq!(tokens[2], TokenKind::Colon);
        assert_eq!(tokens[3], TokenKind::Newline);
        assert_eq!(tokens[4], TokenKind::Indent);
    }

    #[test]
    fn test_double_star_not_closed_by_triple() {
        let (_, errors) = Lexer::new("if **done***").tokenize();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            LexError::UnterminatedDiscretion { marker: "**", .. }
        ));
    }

    #[test]
    fn test_unexpected_character() {
        let (tokens, errors) = Lexer::new("session $").tokenize();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LexError::UnexpectedCharacter { ch: '$', .. }));
        assert_eq!(tokens[1].kind, TokenKind::Error);
    }

    #[test]
    fn test_tokenize_filtered_drops_comments() {
        let (tokens, _) = Lexer::new("# heading\nsession \"a\" # trailing").tokenize_filtered();
        assert!(tokens.iter().all(|t| !t.kind.is_comment()));
        assert_eq!(tokens[0].kind, TokenKind::Session);
    }
}
