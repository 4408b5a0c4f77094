use pretty_assertions::assert_eq;
use prose::ast::{ContextSpec, Expr, LoopConditionKind, PipeOperator, Statement};
use prose::{codes, CompileOptions, TokenKind};

#[test]
fn test_hello_world_end_to_end() {
    let report = prose::check("hello.prose", "session \"Hello world\"");
    assert!(report.is_valid());

    let Statement::Session(session) = &report.program.statements[0] else {
        panic!("expected a session");
    };
    assert_eq!(session.prompt.as_ref().map(|p| p.value.as_str()), Some("Hello world"));
    assert!(session.agent.is_none());

    let output = prose::compile(&report.program, &CompileOptions::default()).unwrap();
    assert_eq!(
        output.text,
        "session _anon_0: { prompt: \"Hello world\", context: [] }\n"
    );
    let Statement::Session(canonical) = &output.program.statements[0] else {
        panic!("expected a session");
    };
    assert_eq!(canonical.context, ContextSpec::Empty);
}

#[test]
fn test_duplicate_agent_cites_both_definitions() {
    let source = "agent a:\n  model: sonnet\nagent a:\n  model: opus";
    let report = prose::check("agents.prose", source);
    let errors: Vec<_> = report.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "duplicate agent name 'a'");
    assert_eq!(
        report.render_short(source)[0],
        "agents.prose:3:7: error: duplicate agent name 'a'"
    );
}

#[test]
fn test_const_reassignment() {
    let report = prose::check("const.prose", "const x = session \"A\"\nx = session \"B\"");
    let errors: Vec<_> = report.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "cannot reassign const binding 'x'");
    assert_eq!(errors[0].code.as_deref(), Some(codes::CONST_REASSIGNMENT));
    assert_eq!(errors[0].primary_span().map(|s| s.start), Some(22));
}

#[test]
fn test_empty_parallel() {
    let report = prose::check("parallel.prose", "parallel:\n");
    let messages: Vec<_> = report.errors().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["parallel block must not be empty"]);
}

#[test]
fn test_pipe_chain_keeps_source_order() {
    let output = prose::parse("session \"A\" | map: session \"B\" | filter: session \"C\"");
    assert!(!output.has_errors());
    let pipe = match &output.program.statements[0] {
        Statement::Pipe(pipe) => pipe,
        other => panic!("expected a pipe, got {:?}", other),
    };
    let operators: Vec<_> = pipe.operations.iter().map(|op| op.operator.node).collect();
    assert_eq!(operators, vec![PipeOperator::Map, PipeOperator::Filter]);
    assert!(matches!(*pipe.input, Expr::Session(_)));
}

#[test]
fn test_discretion_is_one_token() {
    let source = "loop until **the user approves**:\n  session \"Ask\"";
    let lexed = prose::tokenize(source);
    assert!(lexed.errors.is_empty());
    let discretions: Vec<_> = lexed
        .tokens
        .iter()
        .filter_map(|t| match &t.kind {
            TokenKind::Discretion(d) => Some(d),
            _ => None,
        })
        .collect();
    assert_eq!(discretions.len(), 1);
    assert_eq!(discretions[0].text, "the user approves");
    assert!(!discretions[0].multiline);

    let output = prose::parse(source);
    let Statement::Loop(block) = &output.program.statements[0] else {
        panic!("expected a loop");
    };
    let condition = block.condition.as_ref().unwrap();
    assert_eq!(condition.kind, LoopConditionKind::Until);
    assert_eq!(condition.discretion.text, "the user approves");
}

#[test]
fn test_semantic_tokens_through_facade() {
    let report = prose::check("tokens.prose", "session \"Hello world\"");
    let tokens = prose::get_semantic_tokens(&report.program);
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].token_type, prose::TokenType::Keyword);
    let legend = prose::get_semantic_tokens_legend();
    assert_eq!(legend.token_types.len(), 12);
}

#[test]
fn test_unused_binding_is_only_a_warning() {
    let report = prose::check("warn.prose", "let x = session \"A\"");
    assert!(report.is_valid());
    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code.as_deref(), Some(codes::UNUSED_BINDING));
}

#[test]
fn test_short_rendering_of_mixed_findings() {
    let source = "session: ghost\nlet x = session \"A\"\n";
    let report = prose::check("mixed.prose", source);
    assert!(!report.is_valid());
    insta::assert_snapshot!(report.render_short(source).join("\n"), @r"
    mixed.prose:1:10: error: undefined agent 'ghost'
    mixed.prose:2:5: warning: 'x' is never used
    ");
}
