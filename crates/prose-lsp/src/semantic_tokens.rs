//! Semantic tokens for OpenProse syntax highlighting.
//!
//! Tokens come from the tree, not the token stream, so a name is an agent
//! only where the grammar expects an agent. Keywords are located from the
//! start of the node that owns them.

use prose_ast::*;
use std::sync::OnceLock;
use tower_lsp::lsp_types::{self, SemanticTokenModifier, SemanticTokenType, SemanticTokensLegend};
use tracing::{instrument, trace};

/// Token types, in legend order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenType {
    Keyword,
    Operator,
    String,
    Comment,
    Number,
    Agent,
    Skill,
    Variable,
    Parameter,
    Discretion,
    Property,
    Function,
}

impl TokenType {
    pub const ALL: [TokenType; 12] = [
        TokenType::Keyword,
        TokenType::Operator,
        TokenType::String,
        TokenType::Comment,
        TokenType::Number,
        TokenType::Agent,
        TokenType::Skill,
        TokenType::Variable,
        TokenType::Parameter,
        TokenType::Discretion,
        TokenType::Property,
        TokenType::Function,
    ];

    /// Position in the legend.
    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn lsp_type(self) -> SemanticTokenType {
        match self {
            TokenType::Keyword => SemanticTokenType::KEYWORD,
            TokenType::Operator => SemanticTokenType::OPERATOR,
            TokenType::String => SemanticTokenType::STRING,
            TokenType::Comment => SemanticTokenType::COMMENT,
            TokenType::Number => SemanticTokenType::NUMBER,
            TokenType::Agent => SemanticTokenType::new("agent"),
            TokenType::Skill => SemanticTokenType::new("skill"),
            TokenType::Variable => SemanticTokenType::VARIABLE,
            TokenType::Parameter => SemanticTokenType::PARAMETER,
            TokenType::Discretion => SemanticTokenType::new("discretion"),
            TokenType::Property => SemanticTokenType::PROPERTY,
            TokenType::Function => SemanticTokenType::FUNCTION,
        }
    }
}

/// Token modifier bits, in legend order.
pub mod modifiers {
    pub const DECLARATION: u32 = 1 << 0;
    pub const READONLY: u32 = 1 << 1;
    pub const DEFINITION: u32 = 1 << 2;
}

/// One highlighted range. `line` and `start_char` are 0-based, and
/// `start_char` and `length` count UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticToken {
    pub line: u32,
    pub start_char: u32,
    pub length: u32,
    pub token_type: TokenType,
    pub token_modifiers: u32,
}

/// The fixed legend every encoded token refers to.
pub fn get_semantic_tokens_legend() -> SemanticTokensLegend {
    static LEGEND: OnceLock<SemanticTokensLegend> = OnceLock::new();
    LEGEND
        .get_or_init(|| SemanticTokensLegend {
            token_types: TokenType::ALL.iter().map(|t| t.lsp_type()).collect(),
            token_modifiers: vec![
                SemanticTokenModifier::DECLARATION,
                SemanticTokenModifier::READONLY,
                SemanticTokenModifier::DEFINITION,
            ],
        })
        .clone()
}

/// Classify every highlighted range of `program`, in document order.
/// Tokens never overlap; strings and discretions that span lines are split
/// into one token per line.
#[instrument(skip_all, fields(statements = program.statements.len()))]
pub fn get_semantic_tokens(program: &Program) -> Vec<SemanticToken> {
    let mut collector = TokenCollector::default();
    for comment in &program.comments {
        collector.text(comment.span.start, &comment.text, TokenType::Comment, 0);
    }
    collector.visit_program(program);

    let mut tokens = collector.tokens;
    tokens.sort_by_key(|t| (t.line, t.start_char));
    tokens.dedup_by_key(|t| (t.line, t.start_char));
    trace!(tokens = tokens.len(), "semantic tokens");
    tokens
}

/// Tokens in the LSP wire format: five integers per token, positions
/// relative to the previous token.
pub fn get_encoded_semantic_tokens(program: &Program) -> Vec<u32> {
    encode(&get_semantic_tokens(program))
        .into_iter()
        .flat_map(|t| {
            [
                t.delta_line,
                t.delta_start,
                t.length,
                t.token_type,
                t.token_modifiers_bitset,
            ]
        })
        .collect()
}

/// Delta-encode sorted tokens.
pub fn encode(tokens: &[SemanticToken]) -> Vec<lsp_types::SemanticToken> {
    let mut builder = SemanticTokensBuilder::new();
    for token in tokens {
        builder.push(
            token.line,
            token.start_char,
            token.length,
            token.token_type.index(),
            token.token_modifiers,
        );
    }
    builder.build()
}

/// Builder for delta-encoded tokens.
pub struct SemanticTokensBuilder {
    tokens: Vec<lsp_types::SemanticToken>,
    prev_line: u32,
    prev_start: u32,
}

impl SemanticTokensBuilder {
    pub fn new() -> Self {
        Self {
            tokens: Vec::new(),
            prev_line: 0,
            prev_start: 0,
        }
    }

    /// Push the next token. Tokens must arrive in document order.
    pub fn push(&mut self, line: u32, start: u32, length: u32, token_type: u32, token_modifiers: u32) {
        let delta_line = line.saturating_sub(self.prev_line);
        let delta_start = if delta_line == 0 {
            start.saturating_sub(self.prev_start)
        } else {
            start
        };

        self.tokens.push(lsp_types::SemanticToken {
            delta_line,
            delta_start,
            length,
            token_type,
            token_modifiers_bitset: token_modifiers,
        });

        self.prev_line = line;
        self.prev_start = start;
    }

    pub fn build(self) -> Vec<lsp_types::SemanticToken> {
        self.tokens
    }
}

impl Default for SemanticTokensBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct TokenCollector {
    tokens: Vec<SemanticToken>,
}

impl TokenCollector {
    fn push(&mut self, line: u32, start_char: u32, length: u32, token_type: TokenType, token_modifiers: u32) {
        if length == 0 {
            return;
        }
        self.tokens.push(SemanticToken {
            line,
            start_char,
            length,
            token_type,
            token_modifiers,
        });
    }

    /// A token that starts and ends on one line.
    fn span(&mut self, span: Span, token_type: TokenType, modifiers: u32) {
        if span.is_dummy() || span.start.line != span.end.line {
            return;
        }
        self.push(
            span.start.line.saturating_sub(1),
            span.start.column,
            span.end.column.saturating_sub(span.start.column),
            token_type,
            modifiers,
        );
    }

    fn ident(&mut self, ident: &Ident, token_type: TokenType, modifiers: u32) {
        self.span(ident.span, token_type, modifiers);
    }

    /// A keyword at the start of `span`.
    fn keyword(&mut self, span: Span, word: &str) {
        if span.is_dummy() {
            return;
        }
        let start = span.start;
        self.push(
            start.line.saturating_sub(1),
            start.column,
            utf16_len(word),
            TokenType::Keyword,
            0,
        );
    }

    /// Source text starting at `start`, one token per line.
    fn text(&mut self, start: Position, text: &str, token_type: TokenType, modifiers: u32) {
        if start.line == 0 {
            return;
        }
        for (i, line) in text.split('\n').enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let column = if i == 0 { start.column } else { 0 };
            self.push(
                start.line - 1 + i as u32,
                column,
                utf16_len(line),
                token_type,
                modifiers,
            );
        }
    }

    /// A string literal, with each `{name}` highlighted as a variable.
    fn string(&mut self, string: &StringLit, token_type: TokenType) {
        if string.span.is_dummy() {
            return;
        }
        let base = string.span.start.offset;
        let mut cursor = 0;
        let mut cursor_at = string.span.start;
        for name in &string.interpolations {
            let open = name.span.start.offset.saturating_sub(base);
            let close = name.span.end.offset.saturating_sub(base);
            // `{` stays with the text before it and `}` with the text after
            let Some(before) = string.raw.get(cursor..open + 1) else {
                break;
            };
            self.text(cursor_at, before, token_type, 0);
            self.push(
                name.span.start.line.saturating_sub(1),
                name.span.start.column + 1,
                utf16_len(&name.node),
                TokenType::Variable,
                0,
            );
            cursor = close.saturating_sub(1);
            cursor_at = Position::new(
                name.span.end.offset.saturating_sub(1),
                name.span.end.line,
                name.span.end.column.saturating_sub(1),
            );
        }
        if let Some(rest) = string.raw.get(cursor..) {
            self.text(cursor_at, rest, token_type, 0);
        }
    }

    /// Skill names are written as strings.
    fn skills(&mut self, skills: &[Ident]) {
        for skill in skills {
            self.ident(skill, TokenType::Skill, 0);
        }
    }

    /// A model is highlighted only when it is written as a string.
    fn model(&mut self, model: &Ident) {
        if model.span.len() > model.node.len() {
            self.ident(model, TokenType::String, 0);
        }
    }

    fn keys(&mut self, keys: &[Ident]) {
        for key in keys {
            self.ident(key, TokenType::Property, 0);
        }
    }

    fn number(&mut self, span: Span) {
        self.span(span, TokenType::Number, 0);
    }

    fn as_binding(&mut self, binding: Option<&AsBinding>) {
        if let Some(binding) = binding {
            self.keyword(binding.as_kw, "as");
            self.ident(&binding.name, TokenType::Parameter, modifiers::DECLARATION);
        }
    }
}

impl Visitor for TokenCollector {
    fn visit_import(&mut self, import: &ImportStatement) {
        self.keyword(import.span, "import");
        self.string(&import.skill, TokenType::Skill);
        self.keyword(import.from_kw, "from");
        self.string(&import.source, TokenType::String);
    }

    fn visit_agent(&mut self, agent: &AgentDefinition) {
        self.keyword(agent.span, "agent");
        self.ident(
            &agent.name,
            TokenType::Agent,
            modifiers::DECLARATION | modifiers::DEFINITION,
        );
        self.keys(&agent.keys);
        if let Some(model) = &agent.model {
            self.model(model);
        }
        self.skills(&agent.skills);
        walk_agent(self, agent);
    }

    fn visit_block_definition(&mut self, block: &BlockDefinition) {
        self.keyword(block.span, "block");
        self.ident(
            &block.name,
            TokenType::Function,
            modifiers::DECLARATION | modifiers::DEFINITION,
        );
        for param in &block.params {
            self.ident(param, TokenType::Parameter, modifiers::DECLARATION);
        }
        self.visit_body(&block.body);
    }

    fn visit_session(&mut self, session: &SessionStatement) {
        self.keyword(session.span, "session");
        if let Some(name) = &session.name {
            self.ident(name, TokenType::Variable, modifiers::DECLARATION);
        }
        if let Some(agent) = &session.agent {
            self.ident(agent, TokenType::Agent, 0);
        }
        if let Some(model) = &session.model {
            self.model(model);
        }
        if let Some(skills) = &session.skills {
            self.skills(skills);
        }
        self.keys(&session.keys);
        if let Some(retry) = &session.retry {
            self.number(retry.span);
        }
        if let Some(backoff) = &session.backoff {
            self.span(backoff.span, TokenType::String, 0);
        }
        if let Some(arrow) = session.arrow {
            self.span(arrow, TokenType::Operator, 0);
        }
        walk_session(self, session);
    }

    fn visit_binding(&mut self, binding: &Binding, kind: BindingKind) {
        let (word, modifiers) = match kind {
            BindingKind::Let => ("let", modifiers::DECLARATION),
            BindingKind::Const => ("const", modifiers::DECLARATION | modifiers::READONLY),
        };
        self.keyword(binding.span, word);
        self.ident(&binding.name, TokenType::Variable, modifiers);
        self.visit_expr(&binding.value);
    }

    fn visit_reassignment(&mut self, assignment: &Reassignment) {
        self.ident(&assignment.name, TokenType::Variable, 0);
        self.visit_expr(&assignment.value);
    }

    fn visit_do(&mut self, block: &DoBlock) {
        self.keyword(block.span, "do");
        self.visit_body(&block.body);
    }

    fn visit_parallel(&mut self, block: &ParallelBlock) {
        self.keyword(block.span, "parallel");
        self.keys(&block.keys);
        for modifier in [&block.join, &block.on_fail].into_iter().flatten() {
            self.span(modifier.span, TokenType::String, 0);
        }
        if let Some(count) = &block.count {
            self.number(count.span);
        }
        self.visit_body(&block.body);
    }

    fn visit_repeat(&mut self, block: &RepeatBlock) {
        self.keyword(block.span, "repeat");
        self.number(block.count.span);
        self.as_binding(block.index_var.as_ref());
        self.visit_body(&block.body);
    }

    fn visit_for_each(&mut self, block: &ForEachBlock) {
        if block.parallel {
            self.keyword(block.span, "parallel");
        }
        self.keyword(block.for_kw, "for");
        self.ident(&block.item_var, TokenType::Parameter, modifiers::DECLARATION);
        if let Some(index) = &block.index_var {
            self.ident(index, TokenType::Parameter, modifiers::DECLARATION);
        }
        self.keyword(block.in_kw, "in");
        self.visit_expr(&block.collection);
        self.visit_body(&block.body);
    }

    fn visit_loop(&mut self, block: &LoopBlock) {
        self.keyword(block.span, "loop");
        if let Some(condition) = &block.condition {
            self.keyword(condition.keyword, condition.kind.as_str());
        }
        self.as_binding(block.index_var.as_ref());
        self.keys(&block.keys);
        if let Some(max) = &block.max_iterations {
            self.number(max.span);
        }
        walk_loop(self, block);
    }

    fn visit_try(&mut self, block: &TryBlock) {
        self.keyword(block.span, "try");
        if let Some(catch) = &block.catch {
            self.keyword(catch.span, "catch");
            self.as_binding(catch.error_var.as_ref());
        }
        if let Some(finally) = &block.finally {
            self.keyword(finally.span, "finally");
        }
        walk_try(self, block);
    }

    fn visit_throw(&mut self, throw: &ThrowStatement) {
        self.keyword(throw.span, "throw");
        if let Some(message) = &throw.message {
            self.visit_string(message);
        }
    }

    fn visit_pipe_operation(&mut self, op: &PipeOperation) {
        // the `|` that opens the operation
        if !op.span.is_dummy() {
            let start = op.span.start;
            self.push(start.line.saturating_sub(1), start.column, 1, TokenType::Operator, 0);
        }
        self.span(op.operator.span, TokenType::Function, 0);
        for var in [&op.acc_var, &op.item_var].into_iter().flatten() {
            self.ident(var, TokenType::Parameter, modifiers::DECLARATION);
        }
        self.visit_body(&op.body);
    }

    fn visit_choice(&mut self, block: &ChoiceBlock) {
        self.keyword(block.span, "choice");
        for option in &block.options {
            self.keyword(option.span, "option");
        }
        walk_choice(self, block);
    }

    fn visit_if(&mut self, block: &IfElseBlock) {
        for (i, branch) in block.branches.iter().enumerate() {
            self.keyword(branch.keyword, if i == 0 { "if" } else { "elif" });
        }
        if let Some(else_branch) = &block.else_branch {
            self.keyword(else_branch.span, "else");
        }
        walk_if(self, block);
    }

    fn visit_invocation(&mut self, invocation: &BlockInvocation) {
        self.keyword(invocation.span, "do");
        self.ident(&invocation.name, TokenType::Function, 0);
        for arg in &invocation.args {
            self.visit_expr(arg);
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Number(number) => self.number(number.span),
            Expr::Object(object) => {
                for entry in object.entries.iter().filter(|e| e.value.is_some()) {
                    self.ident(&entry.key, TokenType::Property, 0);
                }
                walk_expr(self, expr);
            }
            _ => walk_expr(self, expr),
        }
    }

    fn visit_property(&mut self, property: &Property) {
        self.ident(&property.key, TokenType::Property, 0);
        walk_property(self, property);
    }

    fn visit_context(&mut self, context: &ContextSpec) {
        for name in context.references() {
            self.ident(name, TokenType::Variable, 0);
        }
    }

    fn visit_string(&mut self, string: &StringLit) {
        self.string(string, TokenType::String);
    }

    fn visit_discretion(&mut self, discretion: &Discretion) {
        if !discretion.span.is_dummy() {
            self.text(discretion.span.start, &discretion.raw, TokenType::Discretion, 0);
        }
    }

    fn visit_reference(&mut self, ident: &Ident) {
        self.ident(ident, TokenType::Variable, 0);
    }
}

fn utf16_len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(source: &str) -> Vec<(u32, u32, u32, TokenType, u32)> {
        let output = prose_parser::parse(source);
        assert!(!output.has_errors(), "{:?}", output.errors);
        get_semantic_tokens(&output.program)
            .into_iter()
            .map(|t| (t.line, t.start_char, t.length, t.token_type, t.token_modifiers))
            .collect()
    }

    #[test]
    fn test_legend_matches_indices() {
        let legend = get_semantic_tokens_legend();
        assert_eq!(legend.token_types.len(), TokenType::ALL.len());
        for token_type in TokenType::ALL {
            assert_eq!(
                legend.token_types[token_type.index() as usize],
                token_type.lsp_type()
            );
        }
        assert_eq!(legend.token_types[5].as_str(), "agent");
        assert_eq!(legend.token_modifiers.len(), 3);
    }

    #[test]
    fn test_session_tokens() {
        assert_eq!(
            tokens("session \"Hello world\""),
            vec![
                (0, 0, 7, TokenType::Keyword, 0),
                (0, 8, 13, TokenType::String, 0),
            ]
        );
    }

    #[test]
    fn test_interpolation_splits_string() {
        let found = tokens("let topic = session \"Pick\"\nsession \"About {topic} now\"");
        assert_eq!(
            found,
            vec![
                (0, 0, 3, TokenType::Keyword, 0),
                (0, 4, 5, TokenType::Variable, modifiers::DECLARATION),
                (0, 12, 7, TokenType::Keyword, 0),
                (0, 20, 6, TokenType::String, 0),
                (1, 0, 7, TokenType::Keyword, 0),
                (1, 8, 8, TokenType::String, 0),
                (1, 16, 5, TokenType::Variable, 0),
                (1, 21, 6, TokenType::String, 0),
            ]
        );
    }

    #[test]
    fn test_multiline_discretion_is_split() {
        let found = tokens("if ***flaky\nor slow***:\n  session \"x\"");
        assert_eq!(
            found,
            vec![
                (0, 0, 2, TokenType::Keyword, 0),
                (0, 3, 8, TokenType::Discretion, 0),
                (1, 0, 10, TokenType::Discretion, 0),
                (2, 2, 7, TokenType::Keyword, 0),
                (2, 10, 3, TokenType::String, 0),
            ]
        );
    }

    #[test]
    fn test_builder_deltas() {
        let mut builder = SemanticTokensBuilder::new();
        builder.push(0, 0, 7, 0, 0);
        builder.push(0, 8, 3, 2, 0);
        builder.push(2, 4, 5, 7, 1);
        let data: Vec<_> = builder
            .build()
            .into_iter()
            .map(|t| (t.delta_line, t.delta_start, t.length))
            .collect();
        assert_eq!(data, vec![(0, 0, 7), (0, 8, 3), (2, 4, 5)]);
    }
}
