//! Sugar expansion.
//!
//! The canonicalizer rewrites a cloned tree so that nothing is left
//! implicit: sessions carry their agent's defaults and an explicit context,
//! parallel blocks carry their join strategy and failure policy, every
//! statement-level result has a name, and pipe operations name their
//! variables. Running it on its own output changes nothing.

use prose_ast::*;
use rustc_hash::{FxHashMap, FxHashSet};

const ITEM: &str = "item";
const ACC: &str = "acc";

struct AgentDefaults {
    model: Option<Ident>,
    prompt: Option<StringLit>,
    skills: Vec<Ident>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    /// Statements run in order; each sees the one before it.
    Sequence,
    /// Direct children of `parallel:`; each sees what the block sees.
    Parallel,
}

/// Every name the program binds anywhere, so synthesized names avoid them.
#[derive(Default)]
struct DeclaredNames {
    names: FxHashSet<SmolStr>,
}

impl DeclaredNames {
    fn add(&mut self, ident: &Ident) {
        self.names.insert(ident.node.clone());
    }
}

impl Visitor for DeclaredNames {
    fn visit_statement(&mut self, stmt: &Statement) {
        if let Some(name) = stmt.bound_name() {
            self.add(name);
        }
        walk_statement(self, stmt);
    }

    fn visit_agent(&mut self, agent: &AgentDefinition) {
        self.add(&agent.name);
    }

    fn visit_block_definition(&mut self, block: &BlockDefinition) {
        self.add(&block.name);
        block.params.iter().for_each(|p| self.add(p));
        self.visit_body(&block.body);
    }

    fn visit_session(&mut self, session: &SessionStatement) {
        if let Some(name) = &session.name {
            self.add(name);
        }
    }

    fn visit_repeat(&mut self, block: &RepeatBlock) {
        if let Some(index) = &block.index_var {
            self.add(&index.name);
        }
        self.visit_body(&block.body);
    }

    fn visit_for_each(&mut self, block: &ForEachBlock) {
        self.add(&block.item_var);
        if let Some(index) = &block.index_var {
            self.add(index);
        }
        self.visit_expr(&block.collection);
        self.visit_body(&block.body);
    }

    fn visit_loop(&mut self, block: &LoopBlock) {
        if let Some(index) = &block.index_var {
            self.add(&index.name);
        }
        walk_loop(self, block);
    }

    fn visit_try(&mut self, block: &TryBlock) {
        if let Some(var) = block.catch.as_ref().and_then(|c| c.error_var.as_ref()) {
            self.add(&var.name);
        }
        walk_try(self, block);
    }

    fn visit_pipe_operation(&mut self, op: &PipeOperation) {
        op.item_var.iter().chain(&op.acc_var).for_each(|v| self.add(v));
        self.visit_body(&op.body);
    }
}

pub(crate) struct Canonicalizer {
    agents: FxHashMap<SmolStr, AgentDefaults>,
    used: FxHashSet<SmolStr>,
    next_anon: usize,
}

impl Canonicalizer {
    pub(crate) fn new(program: &Program) -> Self {
        let mut declared = DeclaredNames::default();
        declared.visit_program(program);

        let mut agents = FxHashMap::default();
        for stmt in &program.statements {
            if let Statement::Agent(agent) = stmt {
                agents.entry(agent.name.node.clone()).or_insert_with(|| AgentDefaults {
                    model: agent.model.clone(),
                    prompt: agent.prompt.clone(),
                    skills: agent.skills.clone(),
                });
            }
        }

        Self {
            agents,
            used: declared.names,
            next_anon: 0,
        }
    }

    pub(crate) fn run(mut self, mut program: Program) -> Program {
        self.body(&mut program.statements, ContextSpec::Empty, BodyKind::Sequence);
        program
    }

    fn fresh_anon(&mut self) -> SmolStr {
        loop {
            let name = SmolStr::from(format!("_anon_{}", self.next_anon));
            self.next_anon += 1;
            if self.used.insert(name.clone()) {
                return name;
            }
        }
    }

    fn body(&mut self, body: &mut Vec<Statement>, inherited: ContextSpec, kind: BodyKind) {
        if kind == BodyKind::Parallel {
            let mut index = 0;
            *body = std::mem::take(body)
                .into_iter()
                .map(|stmt| {
                    if !stmt.is_executable() {
                        return stmt;
                    }
                    index += 1;
                    into_branch(stmt, index - 1)
                })
                .collect();
        }

        let mut predecessor = inherited;
        for stmt in body.iter_mut() {
            if let Statement::Block(block) = stmt {
                // a block body runs where it is invoked, not where it is written
                self.body(&mut block.body, ContextSpec::Empty, BodyKind::Sequence);
                continue;
            }
            if !stmt.is_executable() {
                continue;
            }
            if let Statement::Session(session) = stmt {
                if session.name.is_none() && kind == BodyKind::Sequence {
                    session.name = Some(Ident::dummy(self.fresh_anon()));
                }
            }
            self.statement(stmt, &predecessor);
            if kind == BodyKind::Sequence {
                predecessor = context_after(stmt);
            }
        }
    }

    fn statement(&mut self, stmt: &mut Statement, context: &ContextSpec) {
        match stmt {
            Statement::Session(session) => self.session(session, context),
            Statement::Let(binding) | Statement::Const(binding) => {
                self.expr(&mut binding.value, context)
            }
            Statement::Reassignment(assignment) => self.expr(&mut assignment.value, context),
            Statement::Do(block) => self.body(&mut block.body, context.clone(), BodyKind::Sequence),
            Statement::Parallel(block) => {
                parallel_defaults(block);
                self.body(&mut block.body, context.clone(), BodyKind::Parallel);
            }
            Statement::Repeat(block) => {
                self.body(&mut block.body, context.clone(), BodyKind::Sequence)
            }
            Statement::ForEach(block) => {
                self.expr(&mut block.collection, context);
                self.body(&mut block.body, context.clone(), BodyKind::Sequence);
            }
            Statement::Loop(block) => self.body(&mut block.body, context.clone(), BodyKind::Sequence),
            Statement::Try(block) => {
                self.body(&mut block.body, context.clone(), BodyKind::Sequence);
                if let Some(catch) = &mut block.catch {
                    self.body(&mut catch.body, context.clone(), BodyKind::Sequence);
                }
                if let Some(finally) = &mut block.finally {
                    self.body(&mut finally.body, context.clone(), BodyKind::Sequence);
                }
            }
            Statement::Pipe(pipe) => self.pipe(pipe, context),
            Statement::Choice(block) => {
                for option in &mut block.options {
                    self.body(&mut option.body, context.clone(), BodyKind::Sequence);
                }
            }
            Statement::If(block) => {
                for branch in &mut block.branches {
                    self.body(&mut branch.body, context.clone(), BodyKind::Sequence);
                }
                if let Some(else_branch) = &mut block.else_branch {
                    self.body(&mut else_branch.body, context.clone(), BodyKind::Sequence);
                }
            }
            Statement::Invoke(invocation) => {
                for arg in &mut invocation.args {
                    self.expr(arg, context);
                }
            }
            Statement::Comment(_)
            | Statement::Import(_)
            | Statement::Agent(_)
            | Statement::Block(_)
            | Statement::Throw(_) => {}
        }
    }

    fn expr(&mut self, expr: &mut Expr, context: &ContextSpec) {
        match expr {
            Expr::Session(session) => self.session(session, context),
            Expr::Pipe(pipe) => self.pipe(pipe, context),
            Expr::Do(block) => self.body(&mut block.body, context.clone(), BodyKind::Sequence),
            Expr::Invoke(invocation) => {
                for arg in &mut invocation.args {
                    self.expr(arg, context);
                }
            }
            Expr::Array(array) => {
                for item in &mut array.items {
                    self.expr(item, context);
                }
            }
            Expr::Object(object) => {
                for value in object.entries.iter_mut().filter_map(|e| e.value.as_mut()) {
                    self.expr(value, context);
                }
            }
            Expr::String(_) | Expr::Number(_) | Expr::Ident(_) | Expr::Discretion(_) => {}
        }
    }

    fn session(&mut self, session: &mut SessionStatement, context: &ContextSpec) {
        session.arrow = None;

        if let Some(defaults) = session.agent.as_ref().and_then(|a| self.agents.get(&a.node)) {
            if session.model.is_none() {
                session.model = defaults.model.clone();
            }
            if session.skills.is_none() && !defaults.skills.is_empty() {
                session.skills = Some(defaults.skills.clone());
            }
            if session.prompt.is_none() {
                session.prompt = defaults.prompt.clone();
            }
        }

        if session.context.is_implicit() {
            session.context = context.clone();
        }
        if session.retry.is_some() && session.backoff.is_none() {
            session.backoff = Some(Spanned::dummy(SmolStr::new_inline("none")));
        }
    }

    fn pipe(&mut self, pipe: &mut PipeExpression, context: &ContextSpec) {
        self.expr(&mut pipe.input, context);
        for op in &mut pipe.operations {
            let item = op
                .item_var
                .get_or_insert_with(|| Ident::dummy(SmolStr::new_inline(ITEM)))
                .node
                .clone();
            let op_context = if op.operator.node == PipeOperator::Reduce {
                let acc = op
                    .acc_var
                    .get_or_insert_with(|| Ident::dummy(SmolStr::new_inline(ACC)))
                    .node
                    .clone();
                ContextSpec::List(vec![Ident::dummy(acc), Ident::dummy(item)])
            } else {
                ContextSpec::Single(Ident::dummy(item))
            };
            self.body(&mut op.body, op_context, BodyKind::Sequence);
        }
    }
}

/// Name an anonymous parallel branch `_branch_<index>`. Statements that
/// cannot be the value of an assignment are left alone.
fn into_branch(stmt: Statement, index: usize) -> Statement {
    let span = stmt.span();
    let value = match stmt {
        Statement::Session(session) if session.name.is_none() => Expr::Session(Box::new(session)),
        Statement::Do(block) => Expr::Do(Box::new(block)),
        Statement::Invoke(invocation) => Expr::Invoke(invocation),
        Statement::Pipe(pipe) => Expr::Pipe(Box::new(pipe)),
        other => return other,
    };
    Statement::Reassignment(Reassignment {
        name: Ident::dummy(SmolStr::from(format!("_branch_{}", index))),
        value,
        span,
    })
}

fn parallel_defaults(block: &mut ParallelBlock) {
    let join = block
        .join
        .get_or_insert_with(|| Spanned::dummy(JoinStrategy::All.as_str().into()))
        .node
        .clone();
    let join = JoinStrategy::parse(&join);
    if block.on_fail.is_none() {
        let policy = if join == Some(JoinStrategy::Regardless) {
            FailurePolicy::Ignore
        } else {
            FailurePolicy::FailFast
        };
        block.on_fail = Some(Spanned::dummy(policy.as_str().into()));
    }
    if join == Some(JoinStrategy::Any) && block.count.is_none() {
        block.count = Some(Spanned::dummy(1));
    }
}

/// What the next statement receives as implicit context.
fn context_after(stmt: &Statement) -> ContextSpec {
    if let Statement::Parallel(block) = stmt {
        let names: Vec<Ident> = block
            .branch_names()
            .into_iter()
            .map(|name| Ident::dummy(name.node))
            .collect();
        return if names.is_empty() {
            ContextSpec::Empty
        } else {
            ContextSpec::Object(names)
        };
    }
    match stmt.bound_name() {
        Some(name) => ContextSpec::Single(Ident::dummy(name.node.clone())),
        None => ContextSpec::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn canonical(source: &str) -> Program {
        let output = prose_parser::parse(source);
        assert!(!output.has_errors(), "{:?} {:?}", output.errors, output.lex_errors);
        Canonicalizer::new(&output.program).run(output.program)
    }

    fn session(stmt: &Statement) -> &SessionStatement {
        match stmt {
            Statement::Session(s) => s,
            other => panic!("expected session, got {:?}", other),
        }
    }

    fn names(context: &ContextSpec) -> Vec<&str> {
        context.references().iter().map(|n| n.node.as_str()).collect()
    }

    #[test]
    fn test_anonymous_sessions_are_numbered_around_used_names() {
        let program = canonical("let _anon_0 = session \"a\"\nsession \"b\"\nsession \"c\"");
        assert_eq!(session(&program.statements[1]).name.as_ref().map(|n| n.node.as_str()), Some("_anon_1"));
        assert_eq!(session(&program.statements[2]).name.as_ref().map(|n| n.node.as_str()), Some("_anon_2"));
    }

    #[test]
    fn test_implicit_context_follows_predecessor() {
        let source = "\
agent writer:
  model: opus
let draft = session \"Draft\"
# review next
session: writer
";
        let program = canonical(source);
        let Statement::Let(binding) = &program.statements[1] else {
            panic!("expected let");
        };
        let Expr::Session(first) = &binding.value else {
            panic!("expected session value");
        };
        assert_eq!(first.context, ContextSpec::Empty);

        let second = session(&program.statements[3]);
        assert_eq!(names(&second.context), vec!["draft"]);
        assert_eq!(second.model.as_ref().map(|m| m.node.as_str()), Some("opus"));
    }

    #[test]
    fn test_nested_body_inherits_enclosing_predecessor() {
        let program = canonical("let a = session \"A\"\nrepeat 2:\n  session \"B\"\n  session \"C\"");
        let Statement::Repeat(block) = &program.statements[1] else {
            panic!("expected repeat");
        };
        assert_eq!(names(&session(&block.body[0]).context), vec!["a"]);
        assert_eq!(names(&session(&block.body[1]).context), vec!["_anon_0"]);
    }

    #[test]
    fn test_parallel_defaults_and_branch_names() {
        let source = "\
let topic = session \"Pick\"
parallel:
  session \"x\"
  named = session \"y\"
  session \"z\"
session \"Merge\"
";
        let program = canonical(source);
        let Statement::Parallel(block) = &program.statements[1] else {
            panic!("expected parallel");
        };
        assert_eq!(block.join.as_ref().map(|j| j.node.as_str()), Some("all"));
        assert_eq!(block.on_fail.as_ref().map(|p| p.node.as_str()), Some("fail-fast"));
        assert!(block.count.is_none());

        let branch_names: Vec<_> = block.branch_names().into_iter().map(|n| n.node).collect();
        assert_eq!(branch_names, vec!["_branch_0", "named", "_branch_2"]);
        for stmt in &block.body {
            let Statement::Reassignment(branch) = stmt else {
                panic!("expected named branch");
            };
            let Expr::Session(s) = &branch.value else {
                panic!("expected session");
            };
            assert_eq!(names(&s.context), vec!["topic"]);
        }

        let merge = session(&program.statements[2]);
        assert!(matches!(merge.context, ContextSpec::Object(_)));
        assert_eq!(names(&merge.context), vec!["_branch_0", "named", "_branch_2"]);
    }

    #[test]
    fn test_join_strategy_defaults() {
        let program = canonical("parallel (\"regardless\"):\n  a = session \"x\"\nparallel (\"any\"):\n  b = session \"y\"");
        let Statement::Parallel(regardless) = &program.statements[0] else {
            panic!("expected parallel");
        };
        assert_eq!(regardless.on_fail.as_ref().map(|p| p.node.as_str()), Some("ignore"));
        let Statement::Parallel(any) = &program.statements[1] else {
            panic!("expected parallel");
        };
        assert_eq!(any.count.as_ref().map(|c| c.node), Some(1));
        assert_eq!(any.on_fail.as_ref().map(|p| p.node.as_str()), Some("fail-fast"));
    }

    #[test]
    fn test_retry_gets_default_backoff() {
        let program = canonical("session \"flaky\" (retry: 3)");
        let s = session(&program.statements[0]);
        assert_eq!(s.retry.as_ref().map(|r| r.node), Some(3));
        assert_eq!(s.backoff.as_ref().map(|b| b.node.as_str()), Some("none"));
    }

    #[test]
    fn test_arrow_sequence_becomes_plain_statements() {
        let program = canonical("session \"A\" -> session \"B\"");
        assert_eq!(program.statements.len(), 2);
        let first = session(&program.statements[0]);
        assert!(first.arrow.is_none());
        assert_eq!(names(&session(&program.statements[1]).context), vec!["_anon_0"]);
    }

    #[test]
    fn test_pipe_variables_materialised() {
        let program = canonical("let xs = [\"a\"]\nlet out = xs\n  | map:\n    session \"Do {item}\"\n  | reduce(total, x):\n    session \"Fold\"");
        let Statement::Let(binding) = &program.statements[1] else {
            panic!("expected let");
        };
        let Expr::Pipe(pipe) = &binding.value else {
            panic!("expected pipe");
        };
        let map = &pipe.operations[0];
        assert_eq!(map.item_var.as_ref().map(|v| v.node.as_str()), Some("item"));
        assert_eq!(names(&session(&map.body[0]).context), vec!["item"]);
        let reduce = &pipe.operations[1];
        let context = &session(&reduce.body[0]).context;
        assert!(matches!(context, ContextSpec::List(_)));
        assert_eq!(names(context), vec!["total", "x"]);
    }
}
