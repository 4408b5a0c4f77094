use pretty_assertions::assert_eq;
use prose_lsp::semantic_tokens::modifiers::{DECLARATION, DEFINITION, READONLY};
use prose_lsp::{get_encoded_semantic_tokens, get_semantic_tokens, SemanticToken, TokenType};

fn tokens_of(source: &str) -> Vec<SemanticToken> {
    let output = prose_parser::parse(source);
    assert!(!output.has_errors(), "{:?} {:?}", output.lex_errors, output.errors);
    get_semantic_tokens(&output.program)
}

fn tokens(source: &str) -> Vec<(u32, u32, u32, TokenType, u32)> {
    tokens_of(source)
        .into_iter()
        .map(|t| (t.line, t.start_char, t.length, t.token_type, t.token_modifiers))
        .collect()
}

#[test]
fn test_hello_world_encoding() {
    let program = prose_parser::parse("session \"Hello world\"").program;
    assert_eq!(
        get_encoded_semantic_tokens(&program),
        vec![0, 0, 7, 0, 0, 0, 8, 13, 2, 0]
    );
}

#[test]
fn test_agent_definition_and_reference() {
    let source = "\
agent researcher:
  model: sonnet
  skills: [\"web-search\"]
session: researcher
";
    assert_eq!(
        tokens(source),
        vec![
            (0, 0, 5, TokenType::Keyword, 0),
            (0, 6, 10, TokenType::Agent, DECLARATION | DEFINITION),
            (1, 2, 5, TokenType::Property, 0),
            (2, 2, 6, TokenType::Property, 0),
            (2, 11, 12, TokenType::Skill, 0),
            (3, 0, 7, TokenType::Keyword, 0),
            (3, 9, 10, TokenType::Agent, 0),
        ]
    );
}

#[test]
fn test_pipe_operation_tokens() {
    let source = "\
let xs = [\"a\"]
  | map(x):
    session \"Use {x}\"
";
    assert_eq!(
        tokens(source),
        vec![
            (0, 0, 3, TokenType::Keyword, 0),
            (0, 4, 2, TokenType::Variable, DECLARATION),
            (0, 10, 3, TokenType::String, 0),
            (1, 2, 1, TokenType::Operator, 0),
            (1, 4, 3, TokenType::Function, 0),
            (1, 8, 1, TokenType::Parameter, DECLARATION),
            (2, 4, 7, TokenType::Keyword, 0),
            (2, 12, 6, TokenType::String, 0),
            (2, 18, 1, TokenType::Variable, 0),
            (2, 19, 2, TokenType::String, 0),
        ]
    );
}

#[test]
fn test_comments_are_tokens() {
    assert_eq!(
        tokens("# hi\nsession \"a\" # trailing"),
        vec![
            (0, 0, 4, TokenType::Comment, 0),
            (1, 0, 7, TokenType::Keyword, 0),
            (1, 8, 3, TokenType::String, 0),
            (1, 12, 10, TokenType::Comment, 0),
        ]
    );
}

#[test]
fn test_const_is_readonly() {
    let found = tokens("const x = session \"A\"");
    assert_eq!(found[0], (0, 0, 5, TokenType::Keyword, 0));
    assert_eq!(found[1], (0, 6, 1, TokenType::Variable, DECLARATION | READONLY));
}

#[test]
fn test_tokens_are_ordered_and_disjoint() {
    let source = "\
import \"web-search\" from \"github:example/web-search\"
agent writer:
  model: opus
  prompt: \"You write\"
block review(draft):
  session \"Review {draft}\"
let draft = session: writer
  prompt: \"Draft\"
parallel (\"any\", count: 1):
  a = session \"x\"
  b = session \"y\"
repeat 3 as i:
  do review(draft)
loop until **done** (max: 5):
  session \"Again\"
try:
  session \"Risky\"
catch as err:
  throw \"failed\"
choice **best**:
  option \"One\":
    session \"1\"
session \"Outline\" -> session \"Expand\"
";
    let found = tokens_of(source);
    assert!(found.len() > 40);
    for pair in found.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            (a.line, a.start_char) < (b.line, b.start_char),
            "out of order: {:?} {:?}",
            a,
            b
        );
        if a.line == b.line {
            assert!(a.start_char + a.length <= b.start_char, "overlap: {:?} {:?}", a, b);
        }
    }
    assert!(found
        .iter()
        .any(|t| t.token_type == TokenType::Function && t.line == 4 && t.start_char == 6));
    assert!(found
        .iter()
        .any(|t| t.token_type == TokenType::Discretion && t.line == 13));
}
