//! Error code registry.
//!
//! | Range | Category |
//! |-------|----------|
//! | P1xxx | lexical |
//! | P2xxx | syntax |
//! | P3xxx | names and references |
//! | P4xxx | program structure |
//! | P5xxx | property values |
//! | P6xxx | style warnings |

// P1xxx: lexical
pub const UNEXPECTED_CHARACTER: &str = "P1001";
pub const UNTERMINATED_STRING: &str = "P1002";
pub const UNTERMINATED_DISCRETION: &str = "P1003";
pub const INVALID_ESCAPE: &str = "P1004";
pub const TAB_INDENTATION: &str = "P1005";
pub const INCONSISTENT_DEDENT: &str = "P1006";

// P2xxx: syntax
pub const UNEXPECTED_TOKEN: &str = "P2001";
pub const EXPECTED_INDENTED_BLOCK: &str = "P2002";
pub const UNEXPECTED_INDENT: &str = "P2003";
pub const STRAY_PROPERTY: &str = "P2004";
pub const BARE_MODIFIER_VALUE: &str = "P2005";
pub const UNKNOWN_MODIFIER: &str = "P2006";
pub const INVALID_PROPERTY_VALUE: &str = "P2007";
pub const DUPLICATE_PROPERTY: &str = "P2008";
pub const INVALID_NUMBER: &str = "P2009";
pub const MISSING_HANDLER: &str = "P2010";

// P3xxx: names and references
pub const UNDEFINED_VARIABLE: &str = "P3001";
pub const UNDEFINED_AGENT: &str = "P3002";
pub const UNDEFINED_SKILL: &str = "P3003";
pub const UNDEFINED_BLOCK: &str = "P3004";
pub const DUPLICATE_AGENT: &str = "P3005";
pub const DUPLICATE_BLOCK: &str = "P3006";
pub const DUPLICATE_BINDING: &str = "P3007";
pub const UNDECLARED_ASSIGNMENT: &str = "P3008";
pub const CONST_REASSIGNMENT: &str = "P3009";
pub const UNRESOLVED_SKILL: &str = "P3010";
pub const DUPLICATE_PARAMETER: &str = "P3011";

// P4xxx: structure
pub const EMPTY_PARALLEL: &str = "P4001";
pub const IMPORT_NOT_AT_TOP: &str = "P4002";
pub const SESSION_WITHOUT_PROMPT: &str = "P4003";
pub const ARITY_MISMATCH: &str = "P4004";
pub const THROW_OUTSIDE_CATCH: &str = "P4005";
pub const CONFLICTING_FAILURE_POLICY: &str = "P4006";
pub const COUNT_WITHOUT_ANY: &str = "P4007";

// P5xxx: property values
pub const UNKNOWN_MODEL: &str = "P5001";
pub const INVALID_RETRY: &str = "P5002";
pub const INVALID_BACKOFF: &str = "P5003";
pub const UNKNOWN_PROPERTY: &str = "P5004";
pub const INVALID_PERMISSION: &str = "P5005";
pub const INVALID_JOIN_STRATEGY: &str = "P5006";
pub const INVALID_FAILURE_POLICY: &str = "P5007";
pub const INVALID_COUNT: &str = "P5008";

// P6xxx: style
pub const SHADOWED_BINDING: &str = "P6001";
pub const UNUSED_BINDING: &str = "P6002";
pub const TODO_COMMENT: &str = "P6003";
pub const AGENT_NAMING: &str = "P6004";
pub const DUPLICATE_IMPORT: &str = "P6005";
pub const ZERO_REPEAT: &str = "P6006";
pub const UNBOUNDED_LOOP: &str = "P6007";

/// Every code with a one-line description.
pub const ALL: &[(&str, &str)] = &[
    (UNEXPECTED_CHARACTER, "unexpected character"),
    (UNTERMINATED_STRING, "unterminated string literal"),
    (UNTERMINATED_DISCRETION, "unterminated discretion marker"),
    (INVALID_ESCAPE, "invalid escape sequence"),
    (TAB_INDENTATION, "tab used for indentation"),
    (INCONSISTENT_DEDENT, "dedent does not match any outer indentation level"),
    (UNEXPECTED_TOKEN, "unexpected token"),
    (EXPECTED_INDENTED_BLOCK, "expected an indented block"),
    (UNEXPECTED_INDENT, "unexpected indentation"),
    (STRAY_PROPERTY, "property outside of an agent or session"),
    (BARE_MODIFIER_VALUE, "modifier value must be quoted"),
    (UNKNOWN_MODIFIER, "unknown modifier"),
    (INVALID_PROPERTY_VALUE, "property value has the wrong shape"),
    (DUPLICATE_PROPERTY, "property given more than once"),
    (INVALID_NUMBER, "number out of range"),
    (MISSING_HANDLER, "try without catch or finally"),
    (UNDEFINED_VARIABLE, "undefined variable"),
    (UNDEFINED_AGENT, "undefined agent"),
    (UNDEFINED_SKILL, "undefined skill"),
    (UNDEFINED_BLOCK, "undefined block"),
    (DUPLICATE_AGENT, "duplicate agent definition"),
    (DUPLICATE_BLOCK, "duplicate block definition"),
    (DUPLICATE_BINDING, "duplicate binding in one scope"),
    (UNDECLARED_ASSIGNMENT, "assignment to an undeclared variable"),
    (CONST_REASSIGNMENT, "reassignment of a const binding"),
    (UNRESOLVED_SKILL, "imported skill could not be resolved"),
    (DUPLICATE_PARAMETER, "duplicate block parameter"),
    (EMPTY_PARALLEL, "parallel block without branches"),
    (IMPORT_NOT_AT_TOP, "import after other statements"),
    (SESSION_WITHOUT_PROMPT, "session without prompt or agent"),
    (ARITY_MISMATCH, "wrong number of block arguments"),
    (THROW_OUTSIDE_CATCH, "rethrow outside of a catch block"),
    (CONFLICTING_FAILURE_POLICY, "failure policy conflicts with join strategy"),
    (COUNT_WITHOUT_ANY, "count modifier without the 'any' strategy"),
    (UNKNOWN_MODEL, "unknown model"),
    (INVALID_RETRY, "invalid retry count"),
    (INVALID_BACKOFF, "invalid backoff strategy"),
    (UNKNOWN_PROPERTY, "unknown property"),
    (INVALID_PERMISSION, "invalid permission entry"),
    (INVALID_JOIN_STRATEGY, "invalid join strategy"),
    (INVALID_FAILURE_POLICY, "invalid failure policy"),
    (INVALID_COUNT, "invalid count"),
    (SHADOWED_BINDING, "binding shadows an outer binding"),
    (UNUSED_BINDING, "binding is never used"),
    (TODO_COMMENT, "TODO or FIXME comment"),
    (AGENT_NAMING, "agent name is not snake_case or kebab-case"),
    (DUPLICATE_IMPORT, "skill imported more than once"),
    (ZERO_REPEAT, "repeat block never runs"),
    (UNBOUNDED_LOOP, "loop without condition or max"),
];
