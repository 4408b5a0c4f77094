//! OpenProse Abstract Syntax Tree
//!
//! Defines all AST node types for OpenProse programs. The tree is pure data:
//! the parser builds it, and the validator, compiler and semantic-token
//! provider read it (the compiler builds a new tree rather than mutating).

pub mod visit;

// Re-export common types for use by other crates
pub use prose_lexer::{Position, Span, StringLiteral};
pub use smol_str::SmolStr;
pub use visit::*;

/// A spanned value - wraps any value with source location info
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self {
            node,
            span: Span::dummy(),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}

/// Identifier (variable, agent, block and parameter names)
pub type Ident = Spanned<SmolStr>;

// ============================================================================
// Program Structure
// ============================================================================

/// A complete `.prose` file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
    /// Every comment in the file, standalone and trailing, in source order.
    pub comments: Vec<Comment>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Comment text including the leading `#`.
    pub text: SmolStr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A comment on its own line.
    Comment(Comment),
    Import(ImportStatement),
    Agent(AgentDefinition),
    Block(BlockDefinition),
    Session(SessionStatement),
    Let(Binding),
    Const(Binding),
    Reassignment(Reassignment),
    Do(DoBlock),
    Parallel(ParallelBlock),
    Repeat(RepeatBlock),
    ForEach(ForEachBlock),
    Loop(LoopBlock),
    Try(TryBlock),
    Throw(ThrowStatement),
    Pipe(PipeExpression),
    Choice(ChoiceBlock),
    If(IfElseBlock),
    Invoke(BlockInvocation),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Comment(c) => c.span,
            Statement::Import(s) => s.span,
            Statement::Agent(s) => s.span,
            Statement::Block(s) => s.span,
            Statement::Session(s) => s.span,
            Statement::Let(s) | Statement::Const(s) => s.span,
            Statement::Reassignment(s) => s.span,
            Statement::Do(s) => s.span,
            Statement::Parallel(s) => s.span,
            Statement::Repeat(s) => s.span,
            Statement::ForEach(s) => s.span,
            Statement::Loop(s) => s.span,
            Statement::Try(s) => s.span,
            Statement::Throw(s) => s.span,
            Statement::Pipe(s) => s.span,
            Statement::Choice(s) => s.span,
            Statement::If(s) => s.span,
            Statement::Invoke(s) => s.span,
        }
    }

    /// Comments, imports and definitions describe the program; everything
    /// else is something the orchestrator runs.
    pub fn is_executable(&self) -> bool {
        !matches!(
            self,
            Statement::Comment(_) | Statement::Import(_) | Statement::Agent(_) | Statement::Block(_)
        )
    }

    /// The name this statement makes available to later statements.
    pub fn bound_name(&self) -> Option<&Ident> {
        match self {
            Statement::Let(b) | Statement::Const(b) => Some(&b.name),
            Statement::Reassignment(r) => Some(&r.name),
            Statement::Session(s) => s.name.as_ref(),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Comment(_) => "comment",
            Statement::Import(_) => "import",
            Statement::Agent(_) => "agent definition",
            Statement::Block(_) => "block definition",
            Statement::Session(_) => "session",
            Statement::Let(_) => "let binding",
            Statement::Const(_) => "const binding",
            Statement::Reassignment(_) => "assignment",
            Statement::Do(_) => "do block",
            Statement::Parallel(_) => "parallel block",
            Statement::Repeat(_) => "repeat block",
            Statement::ForEach(_) => "for-each block",
            Statement::Loop(_) => "loop block",
            Statement::Try(_) => "try block",
            Statement::Throw(_) => "throw",
            Statement::Pipe(_) => "pipe expression",
            Statement::Choice(_) => "choice block",
            Statement::If(_) => "if block",
            Statement::Invoke(_) => "block invocation",
        }
    }
}

// ============================================================================
// Literals
// ============================================================================

/// A string literal as it appears in the tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringLit {
    /// Decoded text; interpolations are kept as `{name}`.
    pub value: SmolStr,
    /// Source text including quotes.
    pub raw: SmolStr,
    pub triple: bool,
    /// `{name}` references in order of appearance.
    pub interpolations: Vec<Ident>,
    pub span: Span,
}

impl StringLit {
    pub fn from_literal(literal: &StringLiteral, span: Span) -> Self {
        Self {
            value: literal.value.clone(),
            raw: literal.raw.clone(),
            triple: literal.triple,
            interpolations: literal
                .interpolations()
                .map(|(name, span)| Ident::new(name.clone(), span))
                .collect(),
            span,
        }
    }

    /// A literal that does not come from source text.
    pub fn synthesized(text: &str) -> Self {
        Self::from_literal(&StringLiteral::from_text(text), Span::dummy())
    }
}

/// Natural-language text between `**` or `***` markers. Never parsed further.
#[derive(Debug, Clone, PartialEq)]
pub struct Discretion {
    pub text: SmolStr,
    pub multiline: bool,
    pub raw: SmolStr,
    pub span: Span,
}

// ============================================================================
// Definitions
// ============================================================================

/// `import "skill" from "source"`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportStatement {
    pub skill: StringLit,
    pub source: StringLit,
    pub from_kw: Span,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentDefinition {
    pub name: Ident,
    pub model: Option<Ident>,
    pub prompt: Option<StringLit>,
    pub skills: Vec<Ident>,
    pub permissions: Option<Vec<Property>>,
    /// Properties the parser did not recognise, kept for the validator.
    pub properties: Vec<Property>,
    /// Keys of the recognised properties as written.
    pub keys: Vec<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockDefinition {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// `do name(args)`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockInvocation {
    pub name: Ident,
    pub args: Vec<Expr>,
    pub span: Span,
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionStatement {
    pub name: Option<Ident>,
    pub prompt: Option<StringLit>,
    pub agent: Option<Ident>,
    pub model: Option<Ident>,
    pub skills: Option<Vec<Ident>>,
    pub context: ContextSpec,
    pub retry: Option<Spanned<u32>>,
    pub backoff: Option<Spanned<SmolStr>>,
    /// Properties the parser did not recognise, kept for the validator.
    pub properties: Vec<Property>,
    /// Keys of recognised properties and modifiers as written.
    pub keys: Vec<Ident>,
    /// Set when this session is the left side of `->`.
    pub arrow: Option<Span>,
    pub span: Span,
}

/// Which earlier results a session sees.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ContextSpec {
    /// No `context:` written; resolved by the compiler.
    #[default]
    Implicit,
    /// `context: name`
    Single(Ident),
    /// `context: [a, b]`
    List(Vec<Ident>),
    /// `context: { a, b }`
    Object(Vec<Ident>),
    /// `context: []`
    Empty,
}

impl ContextSpec {
    pub fn references(&self) -> &[Ident] {
        match self {
            ContextSpec::Single(name) => std::slice::from_ref(name),
            ContextSpec::List(names) | ContextSpec::Object(names) => names,
            ContextSpec::Implicit | ContextSpec::Empty => &[],
        }
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, ContextSpec::Implicit)
    }
}

/// `key: value` inside an agent or session body.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: Ident,
    pub value: PropertyValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Expr(Expr),
    Context(ContextSpec),
    /// An indented group of properties, e.g. `permissions:`.
    Nested(Vec<Property>),
}

// ============================================================================
// Bindings
// ============================================================================

/// `let name = value` or `const name = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

/// `name = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Reassignment {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Let,
    Const,
}

// ============================================================================
// Control Flow
// ============================================================================

/// `do:` with an indented body
#[derive(Debug, Clone, PartialEq)]
pub struct DoBlock {
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParallelBlock {
    pub join: Option<Spanned<SmolStr>>,
    pub on_fail: Option<Spanned<SmolStr>>,
    pub count: Option<Spanned<u32>>,
    /// Modifier keys as written.
    pub keys: Vec<Ident>,
    pub body: Vec<Statement>,
    pub span: Span,
}

impl ParallelBlock {
    /// Names of the branches that produce a named result, in order.
    pub fn branch_names(&self) -> Vec<Ident> {
        self.body
            .iter()
            .filter_map(|stmt| stmt.bound_name().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    All,
    First,
    Any,
    Regardless,
}

impl JoinStrategy {
    pub const ALL: [JoinStrategy; 4] = [
        JoinStrategy::All,
        JoinStrategy::First,
        JoinStrategy::Any,
        JoinStrategy::Regardless,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|j| j.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinStrategy::All => "all",
            JoinStrategy::First => "first",
            JoinStrategy::Any => "any",
            JoinStrategy::Regardless => "regardless",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    FailFast,
    Continue,
    Ignore,
}

impl FailurePolicy {
    pub const ALL: [FailurePolicy; 3] = [
        FailurePolicy::FailFast,
        FailurePolicy::Continue,
        FailurePolicy::Ignore,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::FailFast => "fail-fast",
            FailurePolicy::Continue => "continue",
            FailurePolicy::Ignore => "ignore",
        }
    }
}

/// `as name` after a loop header or `catch`.
#[derive(Debug, Clone, PartialEq)]
pub struct AsBinding {
    pub as_kw: Span,
    pub name: Ident,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepeatBlock {
    pub count: Spanned<u32>,
    pub index_var: Option<AsBinding>,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// `[parallel] for item[, index] in collection:`
#[derive(Debug, Clone, PartialEq)]
pub struct ForEachBlock {
    pub item_var: Ident,
    pub index_var: Option<Ident>,
    pub collection: Expr,
    pub parallel: bool,
    pub for_kw: Span,
    pub in_kw: Span,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopBlock {
    pub condition: Option<LoopCondition>,
    pub max_iterations: Option<Spanned<u32>>,
    pub index_var: Option<AsBinding>,
    /// Modifier keys as written.
    pub keys: Vec<Ident>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopCondition {
    pub kind: LoopConditionKind,
    pub keyword: Span,
    pub discretion: Discretion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopConditionKind {
    Until,
    While,
}

impl LoopConditionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopConditionKind::Until => "until",
            LoopConditionKind::While => "while",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryBlock {
    pub body: Vec<Statement>,
    pub catch: Option<CatchClause>,
    pub finally: Option<FinallyClause>,
    pub span: Span,
}

/// Span starts at the `catch` keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub error_var: Option<AsBinding>,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// Span starts at the `finally` keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct FinallyClause {
    pub body: Vec<Statement>,
    pub span: Span,
}

/// `throw` or `throw "message"`
#[derive(Debug, Clone, PartialEq)]
pub struct ThrowStatement {
    pub message: Option<StringLit>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceBlock {
    pub criteria: Discretion,
    pub options: Vec<ChoiceOption>,
    pub span: Span,
}

/// Span starts at the `option` keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOption {
    pub label: StringLit,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfElseBlock {
    /// The `if` branch followed by every `elif`.
    pub branches: Vec<ConditionalBranch>,
    pub else_branch: Option<ElseClause>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranch {
    /// The `if` or `elif` keyword.
    pub keyword: Span,
    pub condition: Discretion,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// Span starts at the `else` keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct ElseClause {
    pub body: Vec<Statement>,
    pub span: Span,
}

// ============================================================================
// Pipes
// ============================================================================

/// `input | op: body | op: body ...`, left-associative.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeExpression {
    pub input: Box<Expr>,
    pub operations: Vec<PipeOperation>,
    pub span: Span,
}

/// Span starts at the `|`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeOperation {
    pub operator: Spanned<PipeOperator>,
    pub item_var: Option<Ident>,
    /// Accumulator name; only for `reduce`.
    pub acc_var: Option<Ident>,
    pub body: Vec<Statement>,
    pub span: Span,
}

impl PipeOperation {
    pub fn item_name(&self) -> SmolStr {
        self.item_var
            .as_ref()
            .map(|v| v.node.clone())
            .unwrap_or_else(|| SmolStr::new_inline("item"))
    }

    pub fn acc_name(&self) -> SmolStr {
        self.acc_var
            .as_ref()
            .map(|v| v.node.clone())
            .unwrap_or_else(|| SmolStr::new_inline("acc"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeOperator {
    Map,
    Filter,
    Reduce,
    Pmap,
}

impl PipeOperator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "map" => Some(PipeOperator::Map),
            "filter" => Some(PipeOperator::Filter),
            "reduce" => Some(PipeOperator::Reduce),
            "pmap" => Some(PipeOperator::Pmap),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipeOperator::Map => "map",
            PipeOperator::Filter => "filter",
            PipeOperator::Reduce => "reduce",
            PipeOperator::Pmap => "pmap",
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Session(Box<SessionStatement>),
    Pipe(Box<PipeExpression>),
    Do(Box<DoBlock>),
    Invoke(BlockInvocation),
    String(StringLit),
    Number(Spanned<SmolStr>),
    Ident(Ident),
    Array(ArrayLiteral),
    Object(ObjectLiteral),
    Discretion(Discretion),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Session(s) => s.span,
            Expr::Pipe(p) => p.span,
            Expr::Do(d) => d.span,
            Expr::Invoke(i) => i.span,
            Expr::String(s) => s.span,
            Expr::Number(n) => n.span,
            Expr::Ident(i) => i.span,
            Expr::Array(a) => a.span,
            Expr::Object(o) => o.span,
            Expr::Discretion(d) => d.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLiteral {
    pub items: Vec<Expr>,
    pub span: Span,
}

/// `{ a, b: value }`; a bare key is shorthand for `key: key`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLiteral {
    pub entries: Vec<ObjectEntry>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub key: Ident,
    pub value: Option<Expr>,
}
