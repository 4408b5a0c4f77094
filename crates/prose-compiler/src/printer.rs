//! Canonical text output.
//!
//! Prints a tree back as OpenProse source that parses to the same tree.
//! Sessions always use the inline property form; every other construct
//! keeps its block layout. The source map is filled in as nodes are written.

use crate::source_map::SourceMap;
use prose_ast::*;

/// Print `program` with `indent_width` spaces per level.
pub(crate) fn print_program(program: &Program, indent_width: usize) -> (String, SourceMap) {
    let mut printer = Printer::new(indent_width);
    for stmt in &program.statements {
        printer.statement(stmt);
    }
    (printer.out, printer.map)
}

struct Printer {
    out: String,
    line: u32,
    column: u32,
    indent: usize,
    unit: usize,
    map: SourceMap,
}

impl Printer {
    fn new(indent_width: usize) -> Self {
        Self {
            out: String::new(),
            line: 1,
            column: 0,
            indent: 0,
            unit: indent_width.max(1),
            map: SourceMap::new(),
        }
    }

    fn position(&self) -> Position {
        Position::new(self.out.len(), self.line, self.column)
    }

    fn push(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += ch.len_utf16() as u32;
            }
        }
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        self.push("\n");
    }

    fn write_indent(&mut self) {
        let width = self.indent * self.unit;
        self.push(&" ".repeat(width));
    }

    /// Record where `f` writes `original`.
    fn mapped<F: FnOnce(&mut Self)>(&mut self, original: Span, f: F) {
        let start = self.position();
        f(self);
        let end = self.position();
        self.map.push(Span::new(start, end), original);
    }

    fn ident(&mut self, ident: &Ident) {
        self.mapped(ident.span, |p| p.push(&ident.node));
    }

    fn string(&mut self, string: &StringLit) {
        self.mapped(string.span, |p| p.push(&string.raw));
    }

    fn quoted(&mut self, text: &str) {
        self.push(&StringLiteral::from_text(text).raw);
    }

    fn comma_list<T>(&mut self, items: &[T], mut each: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            each(self, item);
        }
    }

    fn body(&mut self, body: &[Statement]) {
        self.indent += 1;
        for stmt in body {
            self.statement(stmt);
        }
        self.indent -= 1;
    }

    fn statement(&mut self, stmt: &Statement) {
        self.write_indent();
        self.mapped(stmt.span(), |p| p.statement_text(stmt));
    }

    fn statement_text(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Comment(comment) => {
                self.push(&comment.text);
                self.newline();
            }
            Statement::Import(import) => {
                self.push("import ");
                self.string(&import.skill);
                self.push(" from ");
                self.string(&import.source);
                self.newline();
            }
            Statement::Agent(agent) => self.agent(agent),
            Statement::Block(block) => {
                self.push("block ");
                self.ident(&block.name);
                if !block.params.is_empty() {
                    self.push("(");
                    self.comma_list(&block.params, |p, param| p.ident(param));
                    self.push(")");
                }
                self.push(":");
                self.newline();
                self.body(&block.body);
            }
            Statement::Session(session) => {
                self.session(session);
                self.newline();
            }
            Statement::Let(binding) => self.binding("let ", binding),
            Statement::Const(binding) => self.binding("const ", binding),
            Statement::Reassignment(assignment) => {
                self.ident(&assignment.name);
                self.push(" = ");
                self.value_line(&assignment.value);
            }
            Statement::Do(block) => {
                self.push("do:");
                self.newline();
                self.body(&block.body);
            }
            Statement::Parallel(block) => self.parallel(block),
            Statement::Repeat(block) => {
                self.push("repeat ");
                self.push(&block.count.node.to_string());
                self.as_binding(block.index_var.as_ref());
                self.push(":");
                self.newline();
                self.body(&block.body);
            }
            Statement::ForEach(block) => {
                if block.parallel {
                    self.push("parallel ");
                }
                self.push("for ");
                self.ident(&block.item_var);
                if let Some(index) = &block.index_var {
                    self.push(", ");
                    self.ident(index);
                }
                self.push(" in ");
                self.expr(&block.collection);
                self.push(":");
                self.newline();
                self.body(&block.body);
            }
            Statement::Loop(block) => self.loop_block(block),
            Statement::Try(block) => self.try_block(block),
            Statement::Throw(throw) => {
                self.push("throw");
                if let Some(message) = &throw.message {
                    self.push(" ");
                    self.string(message);
                }
                self.newline();
            }
            Statement::Pipe(pipe) => self.pipe(pipe),
            Statement::Choice(block) => {
                self.push("choice ");
                self.push(&block.criteria.raw);
                self.push(":");
                self.newline();
                self.indent += 1;
                for option in &block.options {
                    self.write_indent();
                    self.mapped(option.span, |p| {
                        p.push("option ");
                        p.string(&option.label);
                        p.push(":");
                        p.newline();
                        p.body(&option.body);
                    });
                }
                self.indent -= 1;
            }
            Statement::If(block) => {
                for (i, branch) in block.branches.iter().enumerate() {
                    if i > 0 {
                        self.write_indent();
                    }
                    self.push(if i == 0 { "if " } else { "elif " });
                    self.push(&branch.condition.raw);
                    self.push(":");
                    self.newline();
                    self.body(&branch.body);
                }
                if let Some(else_branch) = &block.else_branch {
                    self.write_indent();
                    self.push("else:");
                    self.newline();
                    self.body(&else_branch.body);
                }
            }
            Statement::Invoke(invocation) => {
                self.invocation(invocation);
                self.newline();
            }
        }
    }

    fn binding(&mut self, keyword: &str, binding: &Binding) {
        self.push(keyword);
        self.ident(&binding.name);
        self.push(" = ");
        self.value_line(&binding.value);
    }

    /// A value that ends its line. Block-shaped values end their own.
    fn value_line(&mut self, value: &Expr) {
        self.expr(value);
        if !matches!(value, Expr::Do(_) | Expr::Pipe(_)) {
            self.newline();
        }
    }

    fn as_binding(&mut self, binding: Option<&AsBinding>) {
        if let Some(binding) = binding {
            self.push(" as ");
            self.ident(&binding.name);
        }
    }

    fn agent(&mut self, agent: &AgentDefinition) {
        self.push("agent ");
        self.ident(&agent.name);
        self.push(":");
        self.newline();
        self.indent += 1;
        if let Some(model) = &agent.model {
            self.write_indent();
            self.push("model: ");
            self.model(model);
            self.newline();
        }
        if let Some(prompt) = &agent.prompt {
            self.write_indent();
            self.push("prompt: ");
            self.string(prompt);
            self.newline();
        }
        if !agent.skills.is_empty() {
            self.write_indent();
            self.push("skills: ");
            self.skill_list(&agent.skills);
            self.newline();
        }
        if let Some(permissions) = &agent.permissions {
            self.write_indent();
            self.push("permissions:");
            self.newline();
            self.indent += 1;
            for permission in permissions {
                self.property_line(permission);
            }
            self.indent -= 1;
        }
        for property in &agent.properties {
            self.property_line(property);
        }
        self.indent -= 1;
    }

    fn property_line(&mut self, property: &Property) {
        self.write_indent();
        self.mapped(property.span, |p| {
            p.ident(&property.key);
            match &property.value {
                PropertyValue::Expr(value) => {
                    p.push(": ");
                    p.value_line(value);
                }
                PropertyValue::Context(context) => {
                    p.push(": ");
                    p.context(context);
                    p.newline();
                }
                PropertyValue::Nested(children) => {
                    p.push(":");
                    p.newline();
                    p.indent += 1;
                    for child in children {
                        p.property_line(child);
                    }
                    p.indent -= 1;
                }
            }
        });
    }

    /// `key: value` inside braces, where nested groups become objects.
    fn inline_property(&mut self, property: &Property) {
        self.ident(&property.key);
        self.push(": ");
        match &property.value {
            PropertyValue::Expr(value) => self.expr(value),
            PropertyValue::Context(context) => self.context(context),
            PropertyValue::Nested(children) => {
                self.push("{ ");
                self.comma_list(children, |p, child| p.inline_property(child));
                self.push(" }");
            }
        }
    }

    /// Bare when the name is a plain identifier, quoted otherwise.
    fn model(&mut self, model: &Ident) {
        if is_plain_identifier(&model.node) {
            self.ident(model);
        } else {
            self.mapped(model.span, |p| p.quoted(&model.node));
        }
    }

    fn skill_list(&mut self, skills: &[Ident]) {
        self.push("[");
        self.comma_list(skills, |p, skill| {
            p.mapped(skill.span, |p| p.quoted(&skill.node));
        });
        self.push("]");
    }

    /// `session [name]: { agent, model, prompt, skills, context, retry, backoff }`
    fn session(&mut self, session: &SessionStatement) {
        self.mapped(session.span, |p| {
            p.push("session");
            if let Some(name) = &session.name {
                p.push(" ");
                p.ident(name);
            }
            p.push(": {");
            let mut fields = Fields::default();
            if let Some(agent) = &session.agent {
                fields.key(p, "agent");
                p.ident(agent);
            }
            if let Some(model) = &session.model {
                fields.key(p, "model");
                p.model(model);
            }
            if let Some(prompt) = &session.prompt {
                fields.key(p, "prompt");
                p.string(prompt);
            }
            if let Some(skills) = &session.skills {
                fields.key(p, "skills");
                p.skill_list(skills);
            }
            if !session.context.is_implicit() {
                fields.key(p, "context");
                p.context(&session.context);
            }
            if let Some(retry) = &session.retry {
                fields.key(p, "retry");
                p.mapped(retry.span, |p| p.push(&retry.node.to_string()));
            }
            if let Some(backoff) = &session.backoff {
                fields.key(p, "backoff");
                p.mapped(backoff.span, |p| p.quoted(&backoff.node));
            }
            for property in &session.properties {
                fields.separator(p);
                p.inline_property(property);
            }
            p.push(if fields.any { " }" } else { "}" });
        });
    }

    fn context(&mut self, context: &ContextSpec) {
        match context {
            ContextSpec::Implicit => {}
            ContextSpec::Empty => self.push("[]"),
            ContextSpec::Single(name) => self.ident(name),
            ContextSpec::List(names) => {
                self.push("[");
                self.comma_list(names, |p, name| p.ident(name));
                self.push("]");
            }
            ContextSpec::Object(names) => {
                self.push("{ ");
                self.comma_list(names, |p, name| p.ident(name));
                self.push(" }");
            }
        }
    }

    fn parallel(&mut self, block: &ParallelBlock) {
        self.push("parallel");
        let mut modifiers = Modifiers::default();
        if let Some(join) = &block.join {
            modifiers.next(self);
            self.mapped(join.span, |p| p.quoted(&join.node));
        }
        if let Some(on_fail) = &block.on_fail {
            modifiers.next(self);
            self.push("on-fail: ");
            self.mapped(on_fail.span, |p| p.quoted(&on_fail.node));
        }
        if let Some(count) = &block.count {
            modifiers.next(self);
            self.push("count: ");
            self.mapped(count.span, |p| p.push(&count.node.to_string()));
        }
        modifiers.close(self);
        self.push(":");
        self.newline();
        self.body(&block.body);
    }

    fn loop_block(&mut self, block: &LoopBlock) {
        self.push("loop");
        if let Some(condition) = &block.condition {
            self.push(" ");
            self.push(condition.kind.as_str());
            self.push(" ");
            self.push(&condition.discretion.raw);
        }
        self.as_binding(block.index_var.as_ref());
        if let Some(max) = &block.max_iterations {
            self.push(" (max: ");
            self.mapped(max.span, |p| p.push(&max.node.to_string()));
            self.push(")");
        }
        self.push(":");
        self.newline();
        self.body(&block.body);
    }

    fn try_block(&mut self, block: &TryBlock) {
        self.push("try:");
        self.newline();
        self.body(&block.body);
        if let Some(catch) = &block.catch {
            self.write_indent();
            self.mapped(catch.span, |p| {
                p.push("catch");
                p.as_binding(catch.error_var.as_ref());
                p.push(":");
                p.newline();
                p.body(&catch.body);
            });
        }
        if let Some(finally) = &block.finally {
            self.write_indent();
            self.mapped(finally.span, |p| {
                p.push("finally:");
                p.newline();
                p.body(&finally.body);
            });
        }
    }

    /// The input on the current line, then one continuation line per
    /// operation with its body indented below.
    fn pipe(&mut self, pipe: &PipeExpression) {
        self.value_line(&pipe.input);
        self.indent += 1;
        for op in &pipe.operations {
            self.write_indent();
            self.mapped(op.span, |p| {
                p.push("| ");
                p.push(op.operator.node.as_str());
                match (&op.acc_var, &op.item_var) {
                    (Some(acc), Some(item)) => {
                        p.push("(");
                        p.ident(acc);
                        p.push(", ");
                        p.ident(item);
                        p.push(")");
                    }
                    (None, Some(item)) => {
                        p.push("(");
                        p.ident(item);
                        p.push(")");
                    }
                    _ => {}
                }
                p.push(":");
                p.newline();
                p.body(&op.body);
            });
        }
        self.indent -= 1;
    }

    fn invocation(&mut self, invocation: &BlockInvocation) {
        self.push("do ");
        self.ident(&invocation.name);
        if !invocation.args.is_empty() {
            self.push("(");
            self.comma_list(&invocation.args, |p, arg| p.expr(arg));
            self.push(")");
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Session(session) => self.session(session),
            Expr::Pipe(pipe) => self.mapped(pipe.span, |p| p.pipe(pipe)),
            Expr::Do(block) => self.mapped(block.span, |p| {
                p.push("do:");
                p.newline();
                p.body(&block.body);
            }),
            Expr::Invoke(invocation) => self.mapped(invocation.span, |p| p.invocation(invocation)),
            Expr::String(string) => self.string(string),
            Expr::Number(number) => self.mapped(number.span, |p| p.push(&number.node)),
            Expr::Ident(ident) => self.ident(ident),
            Expr::Array(array) => self.mapped(array.span, |p| {
                p.push("[");
                p.comma_list(&array.items, |p, item| p.expr(item));
                p.push("]");
            }),
            Expr::Object(object) => self.mapped(object.span, |p| {
                if object.entries.is_empty() {
                    p.push("{}");
                    return;
                }
                p.push("{ ");
                p.comma_list(&object.entries, |p, entry| {
                    p.ident(&entry.key);
                    if let Some(value) = &entry.value {
                        p.push(": ");
                        p.expr(value);
                    }
                });
                p.push(" }");
            }),
            Expr::Discretion(discretion) => {
                self.mapped(discretion.span, |p| p.push(&discretion.raw))
            }
        }
    }
}

/// Separators for a parenthesised modifier list.
#[derive(Default)]
struct Modifiers {
    any: bool,
}

impl Modifiers {
    fn next(&mut self, printer: &mut Printer) {
        printer.push(if self.any { ", " } else { " (" });
        self.any = true;
    }

    fn close(&self, printer: &mut Printer) {
        if self.any {
            printer.push(")");
        }
    }
}

/// Separators for a braced property list.
#[derive(Default)]
struct Fields {
    any: bool,
}

impl Fields {
    fn separator(&mut self, printer: &mut Printer) {
        printer.push(if self.any { ", " } else { " " });
        self.any = true;
    }

    fn key(&mut self, printer: &mut Printer, key: &str) {
        self.separator(printer);
        printer.push(key);
        printer.push(": ");
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut segments = name.split('-');
    let head = segments.next().unwrap_or_default();
    let head_ok = head
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && head.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    head_ok
        && segments.all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        && !prose_lexer::is_keyword(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reprint(source: &str) -> String {
        let output = prose_parser::parse(source);
        assert!(!output.has_errors(), "{:?}", output.errors);
        print_program(&output.program, 2).0
    }

    #[test]
    fn test_print_keeps_written_forms() {
        let source = "\
import \"web-search\" from \"github:example/skills\"
agent researcher:
  model: sonnet
  skills: [\"web-search\"]
  permissions:
    read: [\"*.md\"]
    bash: deny
";
        assert_eq!(reprint(source), source);
    }

    #[test]
    fn test_print_blocks() {
        let source = "\
repeat 2 as i:
  try:
    do review(i)
  catch as err:
    throw
loop until **done** (max: 3):
  do:
    x = [1, \"two\", { a, b: 3 }]
";
        assert_eq!(reprint(source), source);
    }
}
