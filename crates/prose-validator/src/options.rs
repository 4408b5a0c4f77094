use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Validator configuration. Hosts usually load it from a TOML table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorOptions {
    /// Model tiers a `model:` property may name.
    pub models: Vec<String>,
    /// Skills the installer resolved. `None` skips the check.
    pub resolved_skills: Option<BTreeSet<String>>,
    pub warn_on_todo_comments: bool,
    pub warn_on_unused_bindings: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            models: vec!["sonnet".into(), "opus".into(), "haiku".into()],
            resolved_skills: None,
            warn_on_todo_comments: true,
            warn_on_unused_bindings: true,
        }
    }
}

impl ValidatorOptions {
    pub fn is_known_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    pub fn with_resolved_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolved_skills = Some(skills.into_iter().map(Into::into).collect());
        self
    }
}
