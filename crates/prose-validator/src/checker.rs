use crate::scope::{Declared, Scope, ScopeStack, SymbolKind};
use crate::{ValidationError, ValidatorOptions};
use prose_ast::*;
use prose_diagnostics::codes;
use rustc_hash::FxHashMap;

const BACKOFF_STRATEGIES: [&str; 3] = ["none", "linear", "exponential"];
const PERMISSION_KINDS: [&str; 4] = ["read", "write", "bash", "network"];
const PERMISSION_POLICIES: [&str; 3] = ["allow", "deny", "prompt"];

/// Agents, blocks and imports, gathered before the main pass.
#[derive(Default)]
struct Definitions {
    agents: Vec<Ident>,
    blocks: Vec<(Ident, usize)>,
    imports: Vec<StringLit>,
}

impl Visitor for Definitions {
    fn visit_agent(&mut self, agent: &AgentDefinition) {
        self.agents.push(agent.name.clone());
    }

    fn visit_block_definition(&mut self, block: &BlockDefinition) {
        self.blocks.push((block.name.clone(), block.params.len()));
        self.visit_body(&block.body);
    }

    fn visit_import(&mut self, import: &ImportStatement) {
        self.imports.push(import.skill.clone());
    }
}

/// Finds sessions that take their context from the preceding statement.
#[derive(Default)]
struct ImplicitContext {
    found: bool,
}

impl Visitor for ImplicitContext {
    fn visit_session(&mut self, session: &SessionStatement) {
        self.found |= session.context.is_implicit();
    }
}

fn consumes_predecessor(stmt: &Statement) -> bool {
    let mut finder = ImplicitContext::default();
    finder.visit_statement(stmt);
    finder.found
}

/// Names a statement makes available as a result.
fn produced_names(stmt: &Statement) -> Vec<SmolStr> {
    match stmt {
        Statement::Parallel(block) => block.branch_names().into_iter().map(|n| n.node).collect(),
        _ => stmt.bound_name().map(|n| n.node.clone()).into_iter().collect(),
    }
}

/// A name introduced by a construct for its own body.
struct Local {
    name: SmolStr,
    span: Span,
    kind: SymbolKind,
    /// Written in the source, as opposed to a default such as `item`.
    explicit: bool,
}

impl Local {
    fn written(ident: &Ident, kind: SymbolKind) -> Self {
        Self {
            name: ident.node.clone(),
            span: ident.span,
            kind,
            explicit: true,
        }
    }

    /// The written name, or `default` placed at `span`.
    fn optional(ident: Option<&Ident>, default: SmolStr, span: Span) -> Self {
        match ident {
            Some(ident) => Self::written(ident, SymbolKind::Local),
            None => Self {
                name: default,
                span,
                kind: SymbolKind::Local,
                explicit: false,
            },
        }
    }
}

pub(crate) struct Checker<'o> {
    options: &'o ValidatorOptions,
    agents: FxHashMap<SmolStr, Span>,
    blocks: FxHashMap<SmolStr, usize>,
    skills: FxHashMap<SmolStr, Span>,
    scopes: ScopeStack,
    /// The body being visited belongs directly to a `parallel` block.
    in_parallel: bool,
    catch_depth: usize,
    depth: usize,
    past_imports: bool,
    findings: Vec<ValidationError>,
}

impl<'o> Checker<'o> {
    pub(crate) fn new(options: &'o ValidatorOptions) -> Self {
        Self {
            options,
            agents: FxHashMap::default(),
            blocks: FxHashMap::default(),
            skills: FxHashMap::default(),
            scopes: ScopeStack::new(),
            in_parallel: false,
            catch_depth: 0,
            depth: 0,
            past_imports: false,
            findings: Vec::new(),
        }
    }

    pub(crate) fn check_program(&mut self, program: &Program) {
        self.collect_definitions(program);
        self.check_comments(&program.comments);
        self.visit_body(&program.statements);
        let file = self.scopes.take_file_scope();
        self.report_unused(file);
    }

    pub(crate) fn finish(self) -> Vec<ValidationError> {
        self.findings
    }

    fn push(&mut self, finding: ValidationError) {
        self.findings.push(finding);
    }

    fn collect_definitions(&mut self, program: &Program) {
        let mut defs = Definitions::default();
        defs.visit_program(program);

        for name in defs.agents {
            if let Some(&first) = self.agents.get(&name.node) {
                self.push(
                    ValidationError::error(
                        codes::DUPLICATE_AGENT,
                        name.span,
                        format!("duplicate agent name '{}'", name.node),
                    )
                    .with_related(first, "first defined here"),
                );
            } else {
                self.agents.insert(name.node, name.span);
            }
        }

        let mut block_spans: FxHashMap<SmolStr, Span> = FxHashMap::default();
        for (name, arity) in defs.blocks {
            if let Some(&first) = block_spans.get(&name.node) {
                self.push(
                    ValidationError::error(
                        codes::DUPLICATE_BLOCK,
                        name.span,
                        format!("duplicate block name '{}'", name.node),
                    )
                    .with_related(first, "first defined here"),
                );
            } else {
                block_spans.insert(name.node.clone(), name.span);
                self.blocks.insert(name.node, arity);
            }
        }

        for skill in defs.imports {
            if let Some(&first) = self.skills.get(&skill.value) {
                self.push(
                    ValidationError::warning(
                        codes::DUPLICATE_IMPORT,
                        skill.span,
                        format!("skill '{}' is imported more than once", skill.value),
                    )
                    .with_related(first, "first imported here"),
                );
            } else {
                self.skills.insert(skill.value, skill.span);
            }
        }
    }

    fn check_comments(&mut self, comments: &[Comment]) {
        if !self.options.warn_on_todo_comments {
            return;
        }
        for comment in comments {
            if let Some(marker) = ["TODO", "FIXME"].into_iter().find(|m| comment.text.contains(m)) {
                self.push(ValidationError::warning(
                    codes::TODO_COMMENT,
                    comment.span,
                    format!("comment contains {}", marker),
                ));
            }
        }
    }

    fn report_unused(&mut self, scope: Scope) {
        if !self.options.warn_on_unused_bindings {
            return;
        }
        for (name, symbol) in scope.into_symbols() {
            if matches!(symbol.kind, SymbolKind::Let | SymbolKind::Const) && !symbol.used {
                self.push(ValidationError::warning(
                    codes::UNUSED_BINDING,
                    symbol.span,
                    format!("'{}' is never used", name),
                ));
            }
        }
    }

    fn declare(&mut self, name: &SmolStr, span: Span, kind: SymbolKind, warn_shadow: bool) {
        match self.scopes.declare(name, kind, span) {
            Declared::Fresh => {}
            Declared::Duplicate(first) => {
                let (code, message) = if kind == SymbolKind::Parameter {
                    (codes::DUPLICATE_PARAMETER, format!("duplicate parameter '{}'", name))
                } else {
                    (codes::DUPLICATE_BINDING, format!("duplicate binding '{}'", name))
                };
                self.push(
                    ValidationError::error(code, span, message)
                        .with_related(first, "first bound here"),
                );
            }
            Declared::Shadows(outer) if warn_shadow => self.push(
                ValidationError::warning(
                    codes::SHADOWED_BINDING,
                    span,
                    format!("'{}' shadows an outer binding", name),
                )
                .with_related(outer, "outer binding"),
            ),
            Declared::Shadows(_) => {}
        }
    }

    /// Visit `body` in a new scope holding `locals`.
    fn scoped_body(&mut self, locals: Vec<Local>, body: &[Statement]) {
        self.scopes.push();
        let in_parallel = std::mem::replace(&mut self.in_parallel, false);
        for local in locals {
            self.declare(&local.name, local.span, local.kind, local.explicit);
        }
        self.depth += 1;
        self.visit_body(body);
        self.depth -= 1;
        self.in_parallel = in_parallel;
        if let Some(scope) = self.scopes.pop() {
            self.report_unused(scope);
        }
    }

    fn check_model(&mut self, model: &Ident) {
        if !self.options.is_known_model(&model.node) {
            self.push(ValidationError::error(
                codes::UNKNOWN_MODEL,
                model.span,
                format!("unknown model '{}'", model.node),
            ));
        }
    }

    fn check_skills(&mut self, skills: &[Ident]) {
        for skill in skills {
            if !self.skills.contains_key(&skill.node) {
                self.push(ValidationError::error(
                    codes::UNDEFINED_SKILL,
                    skill.span,
                    format!("undefined skill '{}'", skill.node),
                ));
            }
        }
    }

    fn check_unknown_properties(&mut self, owner: &str, properties: &[Property]) {
        for property in properties {
            self.push(ValidationError::error(
                codes::UNKNOWN_PROPERTY,
                property.key.span,
                format!("unknown {} property '{}'", owner, property.key.node),
            ));
        }
    }

    fn check_permissions(&mut self, permissions: &[Property]) {
        for permission in permissions {
            let key = &permission.key;
            if !PERMISSION_KINDS.contains(&key.node.as_str()) {
                self.push(ValidationError::error(
                    codes::INVALID_PERMISSION,
                    key.span,
                    format!(
                        "unknown permission '{}'; expected one of {}",
                        key.node,
                        PERMISSION_KINDS.join(", ")
                    ),
                ));
                continue;
            }
            let valid = match &permission.value {
                PropertyValue::Expr(Expr::Ident(policy)) => {
                    PERMISSION_POLICIES.contains(&policy.node.as_str())
                }
                PropertyValue::Expr(Expr::String(policy)) => {
                    PERMISSION_POLICIES.contains(&policy.value.as_str())
                }
                PropertyValue::Expr(Expr::Array(patterns)) => patterns
                    .items
                    .iter()
                    .all(|item| matches!(item, Expr::String(_))),
                _ => false,
            };
            if !valid {
                self.push(ValidationError::error(
                    codes::INVALID_PERMISSION,
                    permission.span,
                    format!(
                        "invalid value for permission '{}'; expected allow, deny, prompt or a list of patterns",
                        key.node
                    ),
                ));
            }
        }
    }

    fn check_parallel_modifiers(&mut self, block: &ParallelBlock) {
        let join = match &block.join {
            Some(join) => match JoinStrategy::parse(&join.node) {
                Some(strategy) => Some(strategy),
                None => {
                    self.push(ValidationError::error(
                        codes::INVALID_JOIN_STRATEGY,
                        join.span,
                        format!(
                            "invalid join strategy '{}'; expected one of all, first, any, regardless",
                            join.node
                        ),
                    ));
                    None
                }
            },
            None => Some(JoinStrategy::All),
        };

        let on_fail = block.on_fail.as_ref().and_then(|policy| {
            let parsed = FailurePolicy::parse(&policy.node);
            if parsed.is_none() {
                self.push(ValidationError::error(
                    codes::INVALID_FAILURE_POLICY,
                    policy.span,
                    format!(
                        "invalid on-fail policy '{}'; expected one of fail-fast, continue, ignore",
                        policy.node
                    ),
                ));
            }
            parsed.map(|p| (p, policy.span))
        });

        if let Some(count) = &block.count {
            // an unparsable strategy is already reported
            if join.is_some() && join != Some(JoinStrategy::Any) {
                self.push(ValidationError::error(
                    codes::COUNT_WITHOUT_ANY,
                    count.span,
                    "'count' requires the \"any\" join strategy",
                ));
            }
            if count.node == 0 {
                self.push(ValidationError::error(
                    codes::INVALID_COUNT,
                    count.span,
                    "count must be at least 1",
                ));
            }
        }

        if let (Some(JoinStrategy::Regardless), Some((FailurePolicy::FailFast, span))) = (join, on_fail) {
            self.push(ValidationError::error(
                codes::CONFLICTING_FAILURE_POLICY,
                span,
                "on-fail \"fail-fast\" conflicts with the \"regardless\" join strategy",
            ));
        }
    }
}

impl Visitor for Checker<'_> {
    /// Statements in order. A binding counts as read when the next
    /// executable statement takes it as implicit context. The last
    /// statement of a nested body is the body's result; at file scope it
    /// has no reader.
    fn visit_body(&mut self, body: &[Statement]) {
        let mut predecessor: Vec<SmolStr> = Vec::new();
        for stmt in body {
            if stmt.is_executable() {
                if consumes_predecessor(stmt) {
                    for name in predecessor.drain(..) {
                        self.scopes.mark_used(&name);
                    }
                }
                predecessor.clear();
            }
            self.visit_statement(stmt);
            if stmt.is_executable() {
                predecessor = produced_names(stmt);
            }
        }
        if self.depth > 0 {
            for name in predecessor {
                self.scopes.mark_used(&name);
            }
        }
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Import(import) if self.past_imports || self.depth > 0 => {
                self.push(ValidationError::error(
                    codes::IMPORT_NOT_AT_TOP,
                    import.span,
                    "import statements must appear at the top of the file",
                ));
            }
            Statement::Import(_) | Statement::Comment(_) => {}
            _ => self.past_imports = true,
        }
        walk_statement(self, stmt);
        if let Statement::Session(session) = stmt {
            if let Some(name) = &session.name {
                self.declare(&name.node, name.span, SymbolKind::Session, true);
            }
        }
    }

    fn visit_import(&mut self, import: &ImportStatement) {
        let skill = &import.skill;
        if let Some(resolved) = &self.options.resolved_skills {
            if !resolved.contains(skill.value.as_str()) {
                self.push(ValidationError::error(
                    codes::UNRESOLVED_SKILL,
                    skill.span,
                    format!("skill '{}' could not be resolved", skill.value),
                ));
            }
        }
    }

    fn visit_agent(&mut self, agent: &AgentDefinition) {
        let name = agent.name.node.as_str();
        if !is_snake_or_kebab(name) {
            self.push(ValidationError::warning(
                codes::AGENT_NAMING,
                agent.name.span,
                format!("agent name '{}' should be snake_case or kebab-case", name),
            ));
        }
        if let Some(model) = &agent.model {
            self.check_model(model);
        }
        self.check_skills(&agent.skills);
        if let Some(permissions) = &agent.permissions {
            self.check_permissions(permissions);
        }
        self.check_unknown_properties("agent", &agent.properties);
    }

    fn visit_block_definition(&mut self, block: &BlockDefinition) {
        let params = block
            .params
            .iter()
            .map(|p| Local::written(p, SymbolKind::Parameter))
            .collect();
        self.scoped_body(params, &block.body);
    }

    fn visit_session(&mut self, session: &SessionStatement) {
        if session.prompt.is_none() && session.agent.is_none() {
            self.push(ValidationError::error(
                codes::SESSION_WITHOUT_PROMPT,
                session.span,
                "session requires a prompt or an agent",
            ));
        }
        if let Some(agent) = &session.agent {
            if !self.agents.contains_key(&agent.node) {
                self.push(ValidationError::error(
                    codes::UNDEFINED_AGENT,
                    agent.span,
                    format!("undefined agent '{}'", agent.node),
                ));
            }
        }
        if let Some(model) = &session.model {
            self.check_model(model);
        }
        if let Some(skills) = &session.skills {
            self.check_skills(skills);
        }
        if let Some(retry) = &session.retry {
            if retry.node == 0 {
                self.push(ValidationError::error(
                    codes::INVALID_RETRY,
                    retry.span,
                    "retry must be at least 1",
                ));
            }
        }
        if let Some(backoff) = &session.backoff {
            if !BACKOFF_STRATEGIES.contains(&backoff.node.as_str()) {
                self.push(ValidationError::error(
                    codes::INVALID_BACKOFF,
                    backoff.span,
                    format!(
                        "invalid backoff '{}'; expected one of none, linear, exponential",
                        backoff.node
                    ),
                ));
            }
        }
        self.check_unknown_properties("session", &session.properties);

        if let Some(prompt) = &session.prompt {
            self.visit_string(prompt);
        }
        self.visit_context(&session.context);
    }

    fn visit_binding(&mut self, binding: &Binding, kind: BindingKind) {
        self.visit_expr(&binding.value);
        let kind = match kind {
            BindingKind::Let => SymbolKind::Let,
            BindingKind::Const => SymbolKind::Const,
        };
        self.declare(&binding.name.node, binding.name.span, kind, true);
    }

    fn visit_reassignment(&mut self, assignment: &Reassignment) {
        self.visit_expr(&assignment.value);
        let name = &assignment.name;
        match self.scopes.lookup(&name.node).map(|s| (s.kind, s.span)) {
            None if self.in_parallel => {
                self.declare(&name.node, name.span, SymbolKind::Branch, true);
            }
            None => self.push(ValidationError::error(
                codes::UNDECLARED_ASSIGNMENT,
                assignment.span,
                format!("cannot assign to undeclared variable '{}'", name.node),
            )),
            Some((kind, declared)) if kind.is_read_only() => {
                let message = if kind == SymbolKind::Const {
                    format!("cannot reassign const binding '{}'", name.node)
                } else {
                    format!("cannot reassign session result '{}'", name.node)
                };
                self.push(
                    ValidationError::error(codes::CONST_REASSIGNMENT, assignment.span, message)
                        .with_related(declared, "declared here"),
                );
            }
            Some(_) => {}
        }
    }

    fn visit_do(&mut self, block: &DoBlock) {
        self.scoped_body(Vec::new(), &block.body);
    }

    fn visit_parallel(&mut self, block: &ParallelBlock) {
        self.check_parallel_modifiers(block);
        if !block.body.iter().any(Statement::is_executable) {
            self.push(ValidationError::error(
                codes::EMPTY_PARALLEL,
                block.span,
                "parallel block must not be empty",
            ));
        }
        // branch results land in the enclosing scope
        let in_parallel = std::mem::replace(&mut self.in_parallel, true);
        self.depth += 1;
        self.visit_body(&block.body);
        self.depth -= 1;
        self.in_parallel = in_parallel;
    }

    fn visit_repeat(&mut self, block: &RepeatBlock) {
        if block.count.node == 0 {
            self.push(ValidationError::warning(
                codes::ZERO_REPEAT,
                block.count.span,
                "repeat 0 never runs its body",
            ));
        }
        let locals = block
            .index_var
            .iter()
            .map(|v| Local::written(&v.name, SymbolKind::Local))
            .collect();
        self.scoped_body(locals, &block.body);
    }

    fn visit_for_each(&mut self, block: &ForEachBlock) {
        self.visit_expr(&block.collection);
        let mut locals = vec![Local::written(&block.item_var, SymbolKind::Local)];
        locals.extend(block.index_var.iter().map(|v| Local::written(v, SymbolKind::Local)));
        self.scoped_body(locals, &block.body);
    }

    fn visit_loop(&mut self, block: &LoopBlock) {
        if block.condition.is_none() && block.max_iterations.is_none() {
            self.push(ValidationError::warning(
                codes::UNBOUNDED_LOOP,
                block.span,
                "loop has no condition and no max; it only ends through an error",
            ));
        }
        let locals = block
            .index_var
            .iter()
            .map(|v| Local::written(&v.name, SymbolKind::Local))
            .collect();
        self.scoped_body(locals, &block.body);
    }

    fn visit_try(&mut self, block: &TryBlock) {
        self.scoped_body(Vec::new(), &block.body);
        if let Some(catch) = &block.catch {
            let locals = catch
                .error_var
                .iter()
                .map(|v| Local::written(&v.name, SymbolKind::Local))
                .collect();
            self.catch_depth += 1;
            self.scoped_body(locals, &catch.body);
            self.catch_depth -= 1;
        }
        if let Some(finally) = &block.finally {
            self.scoped_body(Vec::new(), &finally.body);
        }
    }

    fn visit_throw(&mut self, throw: &ThrowStatement) {
        match &throw.message {
            Some(message) => self.visit_string(message),
            None if self.catch_depth == 0 => self.push(ValidationError::error(
                codes::THROW_OUTSIDE_CATCH,
                throw.span,
                "'throw' without a message is only allowed inside a catch block",
            )),
            None => {}
        }
    }

    fn visit_pipe(&mut self, pipe: &PipeExpression) {
        self.visit_expr(&pipe.input);
        for op in &pipe.operations {
            let mut locals = Vec::new();
            if op.operator.node == PipeOperator::Reduce {
                locals.push(Local::optional(op.acc_var.as_ref(), op.acc_name(), op.operator.span));
            }
            locals.push(Local::optional(op.item_var.as_ref(), op.item_name(), op.operator.span));
            self.scoped_body(locals, &op.body);
        }
    }

    fn visit_choice(&mut self, block: &ChoiceBlock) {
        for option in &block.options {
            self.visit_string(&option.label);
            self.scoped_body(Vec::new(), &option.body);
        }
    }

    fn visit_if(&mut self, block: &IfElseBlock) {
        for branch in &block.branches {
            self.scoped_body(Vec::new(), &branch.body);
        }
        if let Some(else_branch) = &block.else_branch {
            self.scoped_body(Vec::new(), &else_branch.body);
        }
    }

    fn visit_invocation(&mut self, invocation: &BlockInvocation) {
        for arg in &invocation.args {
            self.visit_expr(arg);
        }
        let name = &invocation.name;
        match self.blocks.get(&name.node) {
            None => self.push(ValidationError::error(
                codes::UNDEFINED_BLOCK,
                name.span,
                format!("undefined block '{}'", name.node),
            )),
            Some(&arity) if arity != invocation.args.len() => self.push(ValidationError::error(
                codes::ARITY_MISMATCH,
                invocation.span,
                format!(
                    "block '{}' expects {} argument{}, got {}",
                    name.node,
                    arity,
                    if arity == 1 { "" } else { "s" },
                    invocation.args.len()
                ),
            )),
            Some(_) => {}
        }
    }

    fn visit_context(&mut self, context: &ContextSpec) {
        for name in context.references() {
            if !self.scopes.mark_used(&name.node) {
                self.push(ValidationError::error(
                    codes::UNDEFINED_VARIABLE,
                    name.span,
                    format!("undefined variable '{}' in context", name.node),
                ));
            }
        }
    }

    fn visit_string(&mut self, string: &StringLit) {
        for name in &string.interpolations {
            if !self.scopes.mark_used(&name.node) {
                self.push(ValidationError::error(
                    codes::UNDEFINED_VARIABLE,
                    name.span,
                    format!("undefined variable '{}' in string interpolation", name.node),
                ));
            }
        }
    }

    fn visit_reference(&mut self, ident: &Ident) {
        if !self.scopes.mark_used(&ident.node) {
            self.push(ValidationError::error(
                codes::UNDEFINED_VARIABLE,
                ident.span,
                format!("undefined variable '{}'", ident.node),
            ));
        }
    }
}

/// `research_agent` or `research-agent`; not both separators at once.
fn is_snake_or_kebab(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_lower = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let body_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    starts_lower && body_ok && !(name.contains('_') && name.contains('-'))
}

#[cfg(test)]
mod tests {
    use super::is_snake_or_kebab;

    #[test]
    fn test_agent_name_style() {
        assert!(is_snake_or_kebab("writer"));
        assert!(is_snake_or_kebab("research_agent2"));
        assert!(is_snake_or_kebab("code-reviewer"));
        assert!(!is_snake_or_kebab("CodeReviewer"));
        assert!(!is_snake_or_kebab("mixed_style-name"));
        assert!(!is_snake_or_kebab("_private"));
    }
}
