//! OpenProse Parser
//!
//! Recursive descent parser that produces an AST from the token stream.
//! Blocks are delimited by the `Indent`/`Dedent` tokens of the lexer's layout
//! pass. A failed statement records a [`ParseError`] and parsing resumes at
//! the next statement boundary, so one pass reports every error it can find.

mod expr;
mod session;
mod statement;

use prose_ast::*;
use prose_diagnostics::codes;
use prose_lexer::{LexError, Lexer, Token, TokenKind};
use thiserror::Error;
use tracing::{debug, instrument};

/// Parser error type with detailed, helpful error messages
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("expected an indented block after ':' in {construct}")]
    ExpectedIndentedBlock { construct: &'static str, span: Span },

    #[error("unexpected indentation")]
    UnexpectedIndent { span: Span },

    #[error(
        "unexpected property '{name}:' outside of an agent or session block; \
         sessions must start with the `session` keyword"
    )]
    StrayProperty { name: SmolStr, span: Span },

    #[error("modifier values must be quoted strings or numbers, found bare word '{word}'")]
    BareModifierValue { word: SmolStr, span: Span },

    #[error("unknown {construct} modifier '{name}'")]
    UnknownModifier {
        construct: &'static str,
        name: SmolStr,
        span: Span,
    },

    #[error("property '{key}' expects {expected}")]
    InvalidPropertyValue {
        key: SmolStr,
        expected: &'static str,
        span: Span,
    },

    #[error("property '{key}' is already set")]
    DuplicateProperty { key: SmolStr, span: Span },

    #[error("expected a whole number, found '{text}'")]
    InvalidNumber { text: SmolStr, span: Span },

    #[error("try block needs a catch or finally clause")]
    MissingHandler { span: Span },
}

impl ParseError {
    /// Registry code, see [`prose_diagnostics::codes`].
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::UnexpectedToken { .. } => codes::UNEXPECTED_TOKEN,
            ParseError::ExpectedIndentedBlock { .. } => codes::EXPECTED_INDENTED_BLOCK,
            ParseError::UnexpectedIndent { .. } => codes::UNEXPECTED_INDENT,
            ParseError::StrayProperty { .. } => codes::STRAY_PROPERTY,
            ParseError::BareModifierValue { .. } => codes::BARE_MODIFIER_VALUE,
            ParseError::UnknownModifier { .. } => codes::UNKNOWN_MODIFIER,
            ParseError::InvalidPropertyValue { .. } => codes::INVALID_PROPERTY_VALUE,
            ParseError::DuplicateProperty { .. } => codes::DUPLICATE_PROPERTY,
            ParseError::InvalidNumber { .. } => codes::INVALID_NUMBER,
            ParseError::MissingHandler { .. } => codes::MISSING_HANDLER,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::ExpectedIndentedBlock { span, .. }
            | ParseError::UnexpectedIndent { span }
            | ParseError::StrayProperty { span, .. }
            | ParseError::BareModifierValue { span, .. }
            | ParseError::UnknownModifier { span, .. }
            | ParseError::InvalidPropertyValue { span, .. }
            | ParseError::DuplicateProperty { span, .. }
            | ParseError::InvalidNumber { span, .. }
            | ParseError::MissingHandler { span } => *span,
        }
    }
}

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Everything a parse produces. The program is always present, possibly
/// partial when `errors` is non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    pub program: Program,
    pub errors: Vec<ParseError>,
    pub lex_errors: Vec<LexError>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || !self.lex_errors.is_empty()
    }
}

/// Parser state
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    lex_errors: Vec<LexError>,
    comments: Vec<Comment>,
    /// End of the last non-layout token consumed.
    last_end: Position,
    /// Cleared while parsing the inline body of a pipe operation so the
    /// next `|` continues the enclosing chain.
    allow_pipe: bool,
}

impl Parser {
    /// Create a new parser from source code
    pub fn new(source: &str) -> Self {
        let (tokens, lex_errors) = Lexer::new(source).tokenize();
        let mut parser = Self::from_tokens(tokens);
        parser.lex_errors = lex_errors;
        parser
    }

    /// Create a parser over an existing token stream, comments included.
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let (tokens, comments) = split_comments(tokens);
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            lex_errors: Vec::new(),
            comments,
            last_end: Position::default(),
            allow_pipe: true,
        }
    }

    /// Parse the entire program
    #[instrument(level = "debug", skip_all)]
    pub fn parse_program(mut self) -> ParseOutput {
        let start = self.current_span();
        let statements = self.parse_statements(false);
        let end = self.current_span();
        debug!(
            statements = statements.len(),
            errors = self.errors.len(),
            "parsed program"
        );
        ParseOutput {
            program: Program {
                statements,
                comments: self.comments,
                span: Span::new(start.start, end.end),
            },
            errors: self.errors,
            lex_errors: self.lex_errors,
        }
    }

    // ========================================================================
    // Token Navigation
    // ========================================================================

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn peek_kind(&self) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + 1).min(last)].kind
    }

    fn previous_kind(&self) -> Option<&TokenKind> {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| &t.kind)
    }

    fn is_eof(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !self.is_eof() {
            self.pos += 1;
        }
        if !token.kind.is_layout() {
            self.last_end = token.span.end;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_ident(&mut self, what: &str) -> ParseResult<Ident> {
        match self.current_kind() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = self.advance().span;
                Ok(Ident::new(name, span))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_string(&mut self, what: &str) -> ParseResult<StringLit> {
        match self.current_kind() {
            TokenKind::String(literal) => {
                let lit = StringLit::from_literal(literal, self.current_span());
                self.advance();
                Ok(lit)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_discretion(&mut self, what: &str) -> ParseResult<Discretion> {
        match self.current_kind() {
            TokenKind::Discretion(d) => {
                let discretion = Discretion {
                    text: d.text.clone(),
                    multiline: d.multiline,
                    raw: d.raw.clone(),
                    span: self.current_span(),
                };
                self.advance();
                Ok(discretion)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// Parse a NUMBER token as a non-negative whole number.
    fn expect_count(&mut self, what: &str) -> ParseResult<Spanned<u32>> {
        match self.current_kind() {
            TokenKind::Number(text) => {
                let text = text.clone();
                let span = self.advance().span;
                number_to_count(&text, span)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current_kind().to_string(),
            span: self.current_span(),
        }
    }

    /// Span from `start` to the end of the last consumed source token.
    fn span_from(&self, start: Span) -> Span {
        Span::new(start.start, self.last_end)
    }

    /// True if `kind` is next once standalone comments are skipped.
    fn check_past_comments(&self, kind: &TokenKind) -> bool {
        self.tokens[self.pos..]
            .iter()
            .find(|t| !t.kind.is_comment())
            .is_some_and(|t| &t.kind == kind)
    }

    /// Skip standalone comments. They stay recorded in `Program::comments`.
    fn skip_comments(&mut self) {
        while self.current_kind().is_comment() {
            self.advance();
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    // ========================================================================
    // Statement Sequences and Recovery
    // ========================================================================

    /// Parse statements until `Eof`, or until `Dedent` when `in_block`.
    /// The closing `Dedent` is left for the caller.
    fn parse_statements(&mut self, in_block: bool) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            match self.current_kind() {
                TokenKind::Eof => break,
                TokenKind::Dedent if in_block => break,
                TokenKind::Dedent => {
                    self.advance();
                    continue;
                }
                TokenKind::Indent => {
                    let span = self.current_span();
                    self.report(ParseError::UnexpectedIndent { span });
                    self.synchronize();
                    continue;
                }
                _ => {}
            }

            let result = self
                .parse_statement(&mut statements)
                .and_then(|()| self.end_statement());
            if let Err(error) = result {
                self.report(error);
                self.synchronize();
            }
        }
        statements
    }

    /// A statement ends at a line break, a closing `Dedent`, the end of
    /// input, or right after its own indented block.
    fn end_statement(&mut self) -> ParseResult<()> {
        if matches!(
            self.previous_kind(),
            Some(TokenKind::Dedent | TokenKind::Comment(_))
        ) {
            return Ok(());
        }
        match self.current_kind() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Dedent | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    /// Skip to the next statement boundary at the current nesting depth.
    /// Nested `Indent`..`Dedent` regions are skipped whole.
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current_kind() {
                TokenKind::Eof => return,
                TokenKind::Newline if depth == 0 => {
                    self.advance();
                    // the failed statement may still own an indented body
                    if !self.check(&TokenKind::Indent) {
                        return;
                    }
                    continue;
                }
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent if depth == 0 => return,
                TokenKind::Dedent => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Record an error unless it points at a token the lexer already
    /// rejected.
    fn report(&mut self, error: ParseError) {
        let at_lex_error = self
            .tokens
            .iter()
            .any(|t| t.kind == TokenKind::Error && t.span == error.span());
        if !at_lex_error {
            self.errors.push(error);
        }
    }

    /// Parse `':' NL Indent statement+ Dedent`.
    fn parse_block(&mut self, construct: &'static str) -> ParseResult<Vec<Statement>> {
        self.expect(TokenKind::Colon)?;
        self.parse_block_body(construct, false)
    }

    /// Parse `NL Indent statement+ Dedent` after a colon. A missing body is
    /// an error unless `allow_empty`.
    fn parse_block_body(
        &mut self,
        construct: &'static str,
        allow_empty: bool,
    ) -> ParseResult<Vec<Statement>> {
        if !(self.check(&TokenKind::Newline) && matches!(self.peek_kind(), TokenKind::Indent)) {
            if allow_empty {
                return Ok(Vec::new());
            }
            return Err(ParseError::ExpectedIndentedBlock {
                construct,
                span: Span::point(self.last_end),
            });
        }
        self.advance();
        self.advance();

        let allow_pipe = std::mem::replace(&mut self.allow_pipe, true);
        let body = self.parse_statements(true);
        self.allow_pipe = allow_pipe;

        self.expect(TokenKind::Dedent)?;
        Ok(body)
    }
}

/// Separate comments from the token stream. Every comment is recorded; only
/// comments that stand on their own line stay in the stream, where they
/// become comment statements.
fn split_comments(tokens: Vec<Token>) -> (Vec<Token>, Vec<Comment>) {
    let mut kept: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut comments = Vec::new();
    for token in tokens {
        if let TokenKind::Comment(text) = &token.kind {
            comments.push(Comment {
                text: text.clone(),
                span: token.span,
            });
            let standalone = kept.last().map_or(true, |prev| {
                matches!(
                    prev.kind,
                    TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Comment(_)
                )
            });
            if !standalone {
                continue;
            }
        }
        kept.push(token);
    }
    if !matches!(kept.last(), Some(t) if t.kind == TokenKind::Eof) {
        let end = kept.last().map(|t| t.span.end).unwrap_or_default();
        kept.push(Token::new(TokenKind::Eof, Span::point(end)));
    }
    comments.sort_by_key(|c| c.span.start.offset);
    (kept, comments)
}

fn number_to_count(text: &str, span: Span) -> ParseResult<Spanned<u32>> {
    text.parse::<u32>()
        .map(|n| Spanned::new(n, span))
        .map_err(|_| ParseError::InvalidNumber {
            text: text.into(),
            span,
        })
}

/// Parse source text into a program.
pub fn parse(source: &str) -> ParseOutput {
    Parser::new(source).parse_program()
}

/// Parse an already tokenized program.
pub fn parse_tokens(tokens: Vec<Token>) -> ParseOutput {
    Parser::from_tokens(tokens).parse_program()
}
