//! Limits and policies applied while building a parse table.

use serde::Deserialize;

/// What the table compiler does when a cell receives two actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Fail construction and report every conflicting cell.
    #[default]
    Reject,
    /// Shift beats reduce; among reduces the lowest rule number wins.
    PreferShift,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub max_rules: usize,
    pub max_states: usize,
    pub conflict_policy: ConflictPolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_rules: 1024,
            max_states: 4096,
            conflict_policy: ConflictPolicy::Reject,
        }
    }
}
