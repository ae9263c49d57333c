use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::ledger::Candidate;
use crate::path::FieldPath;

/// Segment naming the public rating-agency block of the memo.
pub const PUBLIC_RATINGS_SEGMENT: &str = "publicRatings";

/// How a multi-candidate field is settled after a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Leave the conflict for a human.
    #[default]
    Manual,
    /// Pick the candidate with the longest stringified value and resolve.
    PreferLongest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMatcher {
    Exact(FieldPath),
    /// Segment-wise prefix.
    Prefix(FieldPath),
    /// Any path containing this exact segment.
    Segment(String),
}

impl PathMatcher {
    pub fn matches(&self, path: &FieldPath) -> bool {
        match self {
            Self::Exact(p) => p == path,
            Self::Prefix(p) => path.starts_with(p),
            Self::Segment(name) => path.contains_segment(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    #[serde(rename = "match")]
    pub matcher: PathMatcher,
    pub policy: ConflictPolicy,
}

/// Ordered field-path → policy table. First matching rule wins.
///
/// ```toml
/// default = "manual"
///
/// [[rule]]
/// match = { segment = "publicRatings" }
/// policy = "prefer_longest"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTable {
    #[serde(default)]
    pub default: ConflictPolicy,
    #[serde(default, rename = "rule")]
    pub rules: Vec<PolicyRule>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            default: ConflictPolicy::Manual,
            rules: vec![PolicyRule {
                matcher: PathMatcher::Segment(PUBLIC_RATINGS_SEGMENT.to_string()),
                policy: ConflictPolicy::PreferLongest,
            }],
        }
    }
}

impl PolicyTable {
    /// A table with no rules: every conflict is left to the user.
    pub fn manual_only() -> Self {
        Self {
            default: ConflictPolicy::Manual,
            rules: Vec::new(),
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        toml::from_str(input).map_err(|e| ReconError::PolicyParse(e.to_string()))
    }

    pub fn policy_for(&self, path: &FieldPath) -> ConflictPolicy {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(path))
            .map(|rule| rule.policy)
            .unwrap_or(self.default)
    }
}

/// Index of the candidate with the longest stringified value, counted in
/// characters. Ties go to the earliest index.
pub fn select_longest(candidates: &[Candidate]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let len = candidate.value.stringify().chars().count();
        if best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((index, len));
        }
    }
    best.map(|(index, _)| index)
}
