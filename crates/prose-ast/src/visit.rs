//! Read-only traversal.
//!
//! Each `visit_*` method defaults to the matching `walk_*` function, which
//! visits the node's children. Override a method to act on a node; call the
//! `walk_*` function from the override to keep descending.

use crate::*;

pub trait Visitor: Sized {
    fn visit_program(&mut self, program: &Program) {
        walk_program(self, program)
    }

    fn visit_body(&mut self, body: &[Statement]) {
        walk_body(self, body)
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        walk_statement(self, stmt)
    }

    fn visit_comment(&mut self, _comment: &Comment) {}

    fn visit_import(&mut self, import: &ImportStatement) {
        self.visit_string(&import.skill);
        self.visit_string(&import.source);
    }

    fn visit_agent(&mut self, agent: &AgentDefinition) {
        walk_agent(self, agent)
    }

    fn visit_block_definition(&mut self, block: &BlockDefinition) {
        self.visit_body(&block.body)
    }

    fn visit_session(&mut self, session: &SessionStatement) {
        walk_session(self, session)
    }

    fn visit_binding(&mut self, binding: &Binding, _kind: BindingKind) {
        self.visit_expr(&binding.value)
    }

    fn visit_reassignment(&mut self, assignment: &Reassignment) {
        self.visit_expr(&assignment.value)
    }

    fn visit_do(&mut self, block: &DoBlock) {
        self.visit_body(&block.body)
    }

    fn visit_parallel(&mut self, block: &ParallelBlock) {
        self.visit_body(&block.body)
    }

    fn visit_repeat(&mut self, block: &RepeatBlock) {
        self.visit_body(&block.body)
    }

    fn visit_for_each(&mut self, block: &ForEachBlock) {
        self.visit_expr(&block.collection);
        self.visit_body(&block.body)
    }

    fn visit_loop(&mut self, block: &LoopBlock) {
        walk_loop(self, block)
    }

    fn visit_try(&mut self, block: &TryBlock) {
        walk_try(self, block)
    }

    fn visit_throw(&mut self, throw: &ThrowStatement) {
        if let Some(message) = &throw.message {
            self.visit_string(message);
        }
    }

    fn visit_pipe(&mut self, pipe: &PipeExpression) {
        walk_pipe(self, pipe)
    }

    fn visit_pipe_operation(&mut self, op: &PipeOperation) {
        self.visit_body(&op.body)
    }

    fn visit_choice(&mut self, block: &ChoiceBlock) {
        walk_choice(self, block)
    }

    fn visit_if(&mut self, block: &IfElseBlock) {
        walk_if(self, block)
    }

    fn visit_invocation(&mut self, invocation: &BlockInvocation) {
        for arg in &invocation.args {
            self.visit_expr(arg);
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr)
    }

    fn visit_property(&mut self, property: &Property) {
        walk_property(self, property)
    }

    fn visit_context(&mut self, _context: &ContextSpec) {}

    fn visit_string(&mut self, _string: &StringLit) {}

    fn visit_discretion(&mut self, _discretion: &Discretion) {}

    /// An identifier used as a value.
    fn visit_reference(&mut self, _ident: &Ident) {}
}

/// Walk every statement of a program in order.
pub fn walk_program<V: Visitor>(visitor: &mut V, program: &Program) {
    visitor.visit_body(&program.statements)
}

pub fn walk_body<V: Visitor>(visitor: &mut V, body: &[Statement]) {
    for stmt in body {
        visitor.visit_statement(stmt);
    }
}

pub fn walk_statement<V: Visitor>(visitor: &mut V, stmt: &Statement) {
    match stmt {
        Statement::Comment(c) => visitor.visit_comment(c),
        Statement::Import(s) => visitor.visit_import(s),
        Statement::Agent(s) => visitor.visit_agent(s),
        Statement::Block(s) => visitor.visit_block_definition(s),
        Statement::Session(s) => visitor.visit_session(s),
        Statement::Let(b) => visitor.visit_binding(b, BindingKind::Let),
        Statement::Const(b) => visitor.visit_binding(b, BindingKind::Const),
        Statement::Reassignment(s) => visitor.visit_reassignment(s),
        Statement::Do(s) => visitor.visit_do(s),
        Statement::Parallel(s) => visitor.visit_parallel(s),
        Statement::Repeat(s) => visitor.visit_repeat(s),
        Statement::ForEach(s) => visitor.visit_for_each(s),
        Statement::Loop(s) => visitor.visit_loop(s),
        Statement::Try(s) => visitor.visit_try(s),
        Statement::Throw(s) => visitor.visit_throw(s),
        Statement::Pipe(s) => visitor.visit_pipe(s),
        Statement::Choice(s) => visitor.visit_choice(s),
        Statement::If(s) => visitor.visit_if(s),
        Statement::Invoke(s) => visitor.visit_invocation(s),
    }
}

pub fn walk_agent<V: Visitor>(visitor: &mut V, agent: &AgentDefinition) {
    if let Some(prompt) = &agent.prompt {
        visitor.visit_string(prompt);
    }
    for property in agent.permissions.iter().flatten() {
        visitor.visit_property(property);
    }
    for property in &agent.properties {
        visitor.visit_property(property);
    }
}

pub fn walk_session<V: Visitor>(visitor: &mut V, session: &SessionStatement) {
    if let Some(prompt) = &session.prompt {
        visitor.visit_string(prompt);
    }
    visitor.visit_context(&session.context);
    for property in &session.properties {
        visitor.visit_property(property);
    }
}

pub fn walk_loop<V: Visitor>(visitor: &mut V, block: &LoopBlock) {
    if let Some(condition) = &block.condition {
        visitor.visit_discretion(&condition.discretion);
    }
    visitor.visit_body(&block.body)
}

pub fn walk_try<V: Visitor>(visitor: &mut V, block: &TryBlock) {
    visitor.visit_body(&block.body);
    if let Some(catch) = &block.catch {
        visitor.visit_body(&catch.body);
    }
    if let Some(finally) = &block.finally {
        visitor.visit_body(&finally.body);
    }
}

pub fn walk_pipe<V: Visitor>(visitor: &mut V, pipe: &PipeExpression) {
    visitor.visit_expr(&pipe.input);
    for op in &pipe.operations {
        visitor.visit_pipe_operation(op);
    }
}

pub fn walk_choice<V: Visitor>(visitor: &mut V, block: &ChoiceBlock) {
    visitor.visit_discretion(&block.criteria);
    for option in &block.options {
        visitor.visit_string(&option.label);
        visitor.visit_body(&option.body);
    }
}

pub fn walk_if<V: Visitor>(visitor: &mut V, block: &IfElseBlock) {
    for branch in &block.branches {
        visitor.visit_discretion(&branch.condition);
        visitor.visit_body(&branch.body);
    }
    if let Some(else_branch) = &block.else_branch {
        visitor.visit_body(&else_branch.body);
    }
}

pub fn walk_expr<V: Visitor>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Session(s) => visitor.visit_session(s),
        Expr::Pipe(p) => visitor.visit_pipe(p),
        Expr::Do(d) => visitor.visit_do(d),
        Expr::Invoke(i) => visitor.visit_invocation(i),
        Expr::String(s) => visitor.visit_string(s),
        Expr::Number(_) => {}
        Expr::Ident(i) => visitor.visit_reference(i),
        Expr::Array(a) => {
            for item in &a.items {
                visitor.visit_expr(item);
            }
        }
        Expr::Object(o) => {
            for entry in &o.entries {
                match &entry.value {
                    Some(value) => visitor.visit_expr(value),
                    None => visitor.visit_reference(&entry.key),
                }
            }
        }
        Expr::Discretion(d) => visitor.visit_discretion(d),
    }
}

pub fn walk_property<V: Visitor>(visitor: &mut V, property: &Property) {
    match &property.value {
        PropertyValue::Expr(expr) => visitor.visit_expr(expr),
        PropertyValue::Context(context) => visitor.visit_context(context),
        PropertyValue::Nested(children) => {
            for child in children {
                visitor.visit_property(child);
            }
        }
    }
}
