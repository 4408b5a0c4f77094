//! Comment removal, on source text and on the tree.

use prose_ast::*;
use prose_lexer::TokenKind;

/// A comment removed from a program, kept so callers can still show it.
#[derive(Debug, Clone, PartialEq)]
pub struct StrippedComment {
    pub span: Span,
    /// Comment text including the leading `#`.
    pub text: SmolStr,
}

impl From<&Comment> for StrippedComment {
    fn from(comment: &Comment) -> Self {
        Self {
            span: comment.span,
            text: comment.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrippedSource {
    pub text: String,
    /// In source order; spans refer to the input text.
    pub comments: Vec<StrippedComment>,
}

/// Remove every comment from `source`. A line holding nothing but a comment
/// is removed whole; a trailing comment takes the whitespace before it.
/// `#` inside strings and discretions is untouched.
pub fn strip_comments(source: &str) -> StrippedSource {
    let (tokens, _) = prose_lexer::Lexer::new(source).tokenize();
    let mut comments: Vec<StrippedComment> = tokens
        .into_iter()
        .filter_map(|token| match token.kind {
            TokenKind::Comment(text) => Some(StrippedComment {
                span: token.span,
                text,
            }),
            _ => None,
        })
        .collect();
    // the layout pass holds comment-only lines back, so restore source order
    comments.sort_by_key(|c| c.span.start.offset);

    let mut text = String::with_capacity(source.len());
    let mut copied = 0;
    for comment in &comments {
        let start = comment.span.start.offset;
        let end = comment.span.end.offset;
        let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
        let before = &source[line_start..start];

        let (cut_start, cut_end) = if before.trim().is_empty() {
            let line_end = source[end..]
                .find('\n')
                .map_or(source.len(), |i| end + i + 1);
            (line_start, line_end)
        } else {
            (start - (before.len() - before.trim_end().len()), end)
        };
        if cut_start >= copied {
            text.push_str(&source[copied..cut_start]);
            copied = cut_end;
        }
    }
    text.push_str(&source[copied.min(source.len())..]);

    StrippedSource { text, comments }
}

/// A copy of `program` without comment statements or recorded comments.
/// Returns the removed comments in source order.
pub fn strip_program_comments(program: &Program) -> (Program, Vec<StrippedComment>) {
    let mut stripped = program.clone();
    retain_statements(&mut stripped.statements, &|stmt| !matches!(stmt, Statement::Comment(_)));
    let comments = stripped.comments.iter().map(StrippedComment::from).collect();
    stripped.comments.clear();
    (stripped, comments)
}

/// Apply `keep` to every statement list in the tree, nested ones included.
pub(crate) fn retain_statements<F>(body: &mut Vec<Statement>, keep: &F)
where
    F: Fn(&Statement) -> bool,
{
    body.retain(|stmt| keep(stmt));
    for stmt in body.iter_mut() {
        match stmt {
            Statement::Block(block) => retain_statements(&mut block.body, keep),
            Statement::Session(_)
            | Statement::Comment(_)
            | Statement::Import(_)
            | Statement::Agent(_)
            | Statement::Throw(_) => {}
            Statement::Let(binding) | Statement::Const(binding) => {
                retain_in_expr(&mut binding.value, keep)
            }
            Statement::Reassignment(assignment) => retain_in_expr(&mut assignment.value, keep),
            Statement::Do(block) => retain_statements(&mut block.body, keep),
            Statement::Parallel(block) => retain_statements(&mut block.body, keep),
            Statement::Repeat(block) => retain_statements(&mut block.body, keep),
            Statement::ForEach(block) => retain_statements(&mut block.body, keep),
            Statement::Loop(block) => retain_statements(&mut block.body, keep),
            Statement::Try(block) => {
                retain_statements(&mut block.body, keep);
                if let Some(catch) = &mut block.catch {
                    retain_statements(&mut catch.body, keep);
                }
                if let Some(finally) = &mut block.finally {
                    retain_statements(&mut finally.body, keep);
                }
            }
            Statement::Pipe(pipe) => retain_in_pipe(pipe, keep),
            Statement::Choice(block) => {
                for option in &mut block.options {
                    retain_statements(&mut option.body, keep);
                }
            }
            Statement::If(block) => {
                for branch in &mut block.branches {
                    retain_statements(&mut branch.body, keep);
                }
                if let Some(else_branch) = &mut block.else_branch {
                    retain_statements(&mut else_branch.body, keep);
                }
            }
            Statement::Invoke(invocation) => {
                for arg in &mut invocation.args {
                    retain_in_expr(arg, keep);
                }
            }
        }
    }
}

fn retain_in_pipe<F>(pipe: &mut PipeExpression, keep: &F)
where
    F: Fn(&Statement) -> bool,
{
    retain_in_expr(&mut pipe.input, keep);
    for op in &mut pipe.operations {
        retain_statements(&mut op.body, keep);
    }
}

fn retain_in_expr<F>(expr: &mut Expr, keep: &F)
where
    F: Fn(&Statement) -> bool,
{
    match expr {
        Expr::Pipe(pipe) => retain_in_pipe(pipe, keep),
        Expr::Do(block) => retain_statements(&mut block.body, keep),
        Expr::Invoke(invocation) => {
            for arg in &mut invocation.args {
                retain_in_expr(arg, keep);
            }
        }
        Expr::Array(array) => {
            for item in &mut array.items {
                retain_in_expr(item, keep);
            }
        }
        Expr::Object(object) => {
            for value in object.entries.iter_mut().filter_map(|e| e.value.as_mut()) {
                retain_in_expr(value, keep);
            }
        }
        Expr::Session(_)
        | Expr::String(_)
        | Expr::Number(_)
        | Expr::Ident(_)
        | Expr::Discretion(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_source_comments() {
        let source = "# heading\nsession \"a\"  # trailing\n  # indented note\nsession \"b # not a comment\"\n";
        let stripped = strip_comments(source);
        assert_eq!(
            stripped.text,
            "session \"a\"\nsession \"b # not a comment\"\n"
        );
        let texts: Vec<_> = stripped.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["# heading", "# trailing", "# indented note"]);
        assert_eq!(stripped.comments[1].span.start.line, 2);
    }

    #[test]
    fn test_strip_comment_on_last_line_without_newline() {
        let stripped = strip_comments("session \"a\"\n# done");
        assert_eq!(stripped.text, "session \"a\"\n");
        assert_eq!(stripped.comments.len(), 1);
    }

    #[test]
    fn test_strip_without_comments_is_identity() {
        let source = "do:\n  session \"a\"\n";
        let stripped = strip_comments(source);
        assert_eq!(stripped.text, source);
        assert!(stripped.comments.is_empty());
    }
}
