use pretty_assertions::assert_eq;
use prose_diagnostics::codes;
use prose_validator::{validate, validate_with, ValidationError, ValidationResult, ValidatorOptions};

fn check_with(source: &str, options: &ValidatorOptions) -> ValidationResult {
    let output = prose_parser::parse(source);
    assert!(output.lex_errors.is_empty(), "lex errors: {:?}", output.lex_errors);
    assert!(output.errors.is_empty(), "parse errors: {:?}", output.errors);
    validate_with(&output.program, options)
}

fn check(source: &str) -> ValidationResult {
    check_with(source, &ValidatorOptions::default())
}

fn messages(findings: &[ValidationError]) -> Vec<&str> {
    findings.iter().map(|f| f.message.as_str()).collect()
}

#[test]
fn test_hello_world_is_valid() {
    let result = check("session \"Hello world\"");
    assert!(result.valid);
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_duplicate_agent_cites_both_definitions() {
    let result = check("agent a:\n  model: sonnet\nagent a:\n  model: opus");
    assert!(!result.valid);
    assert_eq!(messages(&result.errors), vec!["duplicate agent name 'a'"]);
    let error = &result.errors[0];
    assert_eq!(error.code, codes::DUPLICATE_AGENT);
    assert_eq!(error.span.start.offset, 31);
    assert_eq!(error.related.len(), 1);
    assert_eq!(error.related[0].0.start.offset, 6);
}

#[test]
fn test_const_reassignment() {
    let result = check("const x = session \"A\"\nx = session \"B\"");
    assert_eq!(messages(&result.errors), vec!["cannot reassign const binding 'x'"]);
    let error = &result.errors[0];
    assert_eq!(error.span.start.offset, 22);
    assert_eq!(error.span.start.line, 2);
    assert_eq!(error.related[0].0.start.offset, 6);
}

#[test]
fn test_let_reassignment_is_allowed() {
    let result = check("let x = session \"A\"\nx = session \"B\"");
    assert!(result.valid, "{:?}", result.errors);
}

#[test]
fn test_empty_parallel() {
    let result = check("parallel:\n");
    assert_eq!(messages(&result.errors), vec!["parallel block must not be empty"]);
    assert_eq!(result.errors[0].code, codes::EMPTY_PARALLEL);
}

#[test]
fn test_parallel_of_comments_is_empty() {
    let result = check("parallel:\n  # nothing yet\n");
    assert_eq!(messages(&result.errors), vec!["parallel block must not be empty"]);
}

#[test]
fn test_undeclared_assignment() {
    let result = check("y = session \"B\"");
    assert_eq!(messages(&result.errors), vec!["cannot assign to undeclared variable 'y'"]);
}

#[test]
fn test_parallel_branch_results_are_visible_after_the_block() {
    let source = "\
parallel:
  security = session \"Check security\"
  perf = session \"Check performance\"
session \"Summarize\":
  context: { security, perf }
";
    let result = check(source);
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn test_context_reference_before_binding() {
    let source = "\
session \"Early\":
  context: research
let research = session \"Research\"
";
    let result = check(source);
    assert_eq!(
        messages(&result.errors),
        vec!["undefined variable 'research' in context"]
    );
}

#[test]
fn test_string_interpolation_references() {
    let source = "\
let topic = session \"Pick a topic\"
session \"Write about {topic} and {missing}\"
";
    let result = check(source);
    assert_eq!(
        messages(&result.errors),
        vec!["undefined variable 'missing' in string interpolation"]
    );
}

#[test]
fn test_agent_and_skill_references() {
    let source = "\
import \"web-search\" from \"github:example/web-search\"
agent researcher:
  model: sonnet
  skills: [\"web-search\"]
session: researcher
session: writer
session \"Draft\":
  skills: [\"pdf\"]
";
    let result = check(source);
    assert_eq!(
        messages(&result.errors),
        vec!["undefined agent 'writer'", "undefined skill 'pdf'"]
    );
}

#[test]
fn test_agents_may_be_referenced_before_definition() {
    let result = check("session: helper\nagent helper:\n  model: haiku\n");
    assert!(result.valid, "{:?}", result.errors);
}

#[test]
fn test_unknown_model() {
    let result = check("agent a:\n  model: gpt\nsession \"x\":\n  model: \"opus\"\n");
    assert_eq!(messages(&result.errors), vec!["unknown model 'gpt'"]);

    let options = ValidatorOptions {
        models: vec!["gpt".into()],
        ..ValidatorOptions::default()
    };
    let result = check_with("agent a:\n  model: gpt\n", &options);
    assert!(result.valid);
}

#[test]
fn test_unresolved_skill_import() {
    let options = ValidatorOptions::default().with_resolved_skills(["web-search"]);
    let source = "import \"web-search\" from \"a\"\nimport \"pdf\" from \"b\"\nsession \"x\"";
    let result = check_with(source, &options);
    assert_eq!(messages(&result.errors), vec!["skill 'pdf' could not be resolved"]);
}

#[test]
fn test_import_after_statement() {
    let source = "# header\nsession \"x\"\nimport \"web-search\" from \"a\"\n";
    let result = check(source);
    assert_eq!(
        messages(&result.errors),
        vec!["import statements must appear at the top of the file"]
    );
}

#[test]
fn test_session_needs_prompt_or_agent() {
    let result = check("session review:\n  retry: 2\n");
    assert_eq!(messages(&result.errors), vec!["session requires a prompt or an agent"]);
}

#[test]
fn test_session_property_values() {
    let source = "session \"x\" (retry: 0, backoff: \"sometimes\")\n";
    let result = check(source);
    assert_eq!(
        messages(&result.errors),
        vec![
            "retry must be at least 1",
            "invalid backoff 'sometimes'; expected one of none, linear, exponential"
        ]
    );
}

#[test]
fn test_unknown_properties() {
    let source = "agent a:\n  model: opus\n  colour: \"blue\"\nsession \"x\":\n  temperature: 3\n";
    let result = check(source);
    assert_eq!(
        messages(&result.errors),
        vec!["unknown agent property 'colour'", "unknown session property 'temperature'"]
    );
}

#[test]
fn test_permissions() {
    let source = "\
agent a:
  permissions:
    read: [\"*.md\"]
    bash: deny
    teleport: allow
    write: 42
";
    let result = check(source);
    assert_eq!(result.errors.len(), 2, "{:?}", result.errors);
    assert!(result.errors[0].message.starts_with("unknown permission 'teleport'"));
    assert!(result.errors[1].message.starts_with("invalid value for permission 'write'"));
}

#[test]
fn test_parallel_modifiers() {
    let result = check("parallel (\"sometimes\"):\n  a = session \"x\"\n");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, codes::INVALID_JOIN_STRATEGY);

    let result = check("parallel (\"first\", count: 2):\n  a = session \"x\"\n");
    assert_eq!(messages(&result.errors), vec!["'count' requires the \"any\" join strategy"]);

    let result = check("parallel (\"any\", count: 0):\n  a = session \"x\"\n");
    assert_eq!(messages(&result.errors), vec!["count must be at least 1"]);

    let result = check("parallel (\"any\"):\n  a = session \"x\"\n  b = session \"y\"\n");
    assert!(result.valid);

    let result = check("parallel (\"regardless\", on-fail: \"fail-fast\"):\n  a = session \"x\"\n");
    assert_eq!(result.errors[0].code, codes::CONFLICTING_FAILURE_POLICY);

    let result = check("parallel (on-fail: \"explode\"):\n  a = session \"x\"\n");
    assert_eq!(result.errors[0].code, codes::INVALID_FAILURE_POLICY);
}

#[test]
fn test_block_invocation() {
    let source = "\
block review(topic):
  session \"Review {topic}\"
do review(\"code\")
do review()
do missing()
";
    let result = check(source);
    assert_eq!(
        messages(&result.errors),
        vec!["block 'review' expects 1 argument, got 0", "undefined block 'missing'"]
    );
}

#[test]
fn test_duplicate_block() {
    let source = "block a:\n  session \"x\"\nblock a:\n  session \"y\"\n";
    let result = check(source);
    assert_eq!(messages(&result.errors), vec!["duplicate block name 'a'"]);
}

#[test]
fn test_loop_variables_do_not_leak() {
    let source = "\
repeat 3 as i:
  session \"Attempt {i}\"
session \"After {i}\"
";
    let result = check(source);
    assert_eq!(
        messages(&result.errors),
        vec!["undefined variable 'i' in string interpolation"]
    );
}

#[test]
fn test_duplicate_binding_and_shadowing() {
    let source = "\
let x = session \"A\"
let x = session \"B\"
do:
  let x = session \"C\"
  session \"D\"
";
    let result = check(source);
    assert_eq!(messages(&result.errors), vec!["duplicate binding 'x'"]);
    assert_eq!(messages(&result.warnings), vec!["'x' shadows an outer binding"]);
}

#[test]
fn test_pipe_item_and_accumulator_are_bound() {
    let source = "\
let topics = [\"a\", \"b\"]
let merged = topics
  | map:
    session \"Research {item}\"
  | reduce(summary, next):
    session \"Merge {summary} with {next}\"
session \"Publish\"
";
    let result = check(source);
    assert!(result.valid, "{:?}", result.errors);
}

#[test]
fn test_throw_outside_catch() {
    let source = "\
try:
  session \"Risky\"
catch as err:
  session \"Log {err}\"
  throw
throw
";
    let result = check(source);
    assert_eq!(
        messages(&result.errors),
        vec!["'throw' without a message is only allowed inside a catch block"]
    );
    assert_eq!(result.errors[0].span.start.line, 6);
}

#[test]
fn test_warnings_do_not_invalidate() {
    let source = "\
# TODO: tighten the prompt
agent CodeReviewer:
  model: opus
repeat 0:
  session \"never\"
loop:
  session \"forever\"
";
    let result = check(source);
    assert!(result.valid, "{:?}", result.errors);
    let codes: Vec<_> = result.warnings.iter().map(|w| w.code).collect();
    assert_eq!(
        codes,
        vec![
            codes::TODO_COMMENT,
            codes::AGENT_NAMING,
            codes::ZERO_REPEAT,
            codes::UNBOUNDED_LOOP
        ]
    );
}

#[test]
fn test_unused_binding_warning() {
    let source = "\
let draft = session \"Draft\"
session \"Unrelated\":
  context: []
session \"Final\"
";
    let result = check(source);
    assert!(result.valid);
    assert_eq!(messages(&result.warnings), vec!["'draft' is never used"]);

    let options = ValidatorOptions {
        warn_on_unused_bindings: false,
        ..ValidatorOptions::default()
    };
    assert!(check_with(source, &options).warnings.is_empty());
}

#[test]
fn test_trailing_binding_at_file_scope_is_unused() {
    let result = check("let y = \"x\"");
    assert!(result.valid);
    assert_eq!(messages(&result.warnings), vec!["'y' is never used"]);
    assert_eq!(result.warnings[0].code, codes::UNUSED_BINDING);

    // inside a block the last binding is the block's result
    let result = check("do:\n  let y = session \"A\"\nsession \"B\"");
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn test_validation_does_not_stop_at_first_error() {
    let source = "session: a\nsession: b\nx = session \"c\"\n";
    let result = check(source);
    assert_eq!(result.errors.len(), 3);
    let lines: Vec<_> = result.errors.iter().map(|e| e.span.start.line).collect();
    assert_eq!(lines, vec![1, 2, 3]);
}

#[test]
fn test_validate_is_pure() {
    let output = prose_parser::parse("let a = session \"x\"\nsession \"y\"");
    let before = output.program.clone();
    let first = validate(&output.program);
    let second = validate(&output.program);
    assert_eq!(first, second);
    assert_eq!(before, output.program);
}
