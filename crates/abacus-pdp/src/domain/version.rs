//! Policy versions and version-constraint patterns.
//!
//! A policy version is a dotted sequence of non-negative integers with a
//! total order. Reference constraints use patterns where `*` matches any
//! single number and `+` matches any non-empty sequence of numbers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised parsing versions and version patterns.
#[derive(Debug, Clone, Error)]
pub enum VersionError {
    #[error("empty version literal")]
    Empty,

    #[error("invalid version component {component:?} in {literal:?}")]
    InvalidComponent { literal: String, component: String },
}

/// A policy version: one or more dot-separated non-negative integers.
///
/// Ordering is componentwise, with a shorter version ranking before any
/// longer version it is a prefix of (`1.2` < `1.2.0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PolicyVersion {
    components: Vec<u64>,
}

impl PolicyVersion {
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

impl FromStr for PolicyVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(VersionError::Empty);
        }
        let mut components = Vec::new();
        for part in s.split('.') {
            let n: u64 = part
                .parse()
                .map_err(|_| VersionError::InvalidComponent {
                    literal: s.to_string(),
                    component: part.to_string(),
                })?;
            components.push(n);
        }
        Ok(Self { components })
    }
}

impl TryFrom<String> for PolicyVersion {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PolicyVersion> for String {
    fn from(v: PolicyVersion) -> Self {
        v.to_string()
    }
}

impl fmt::Display for PolicyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for c in &self.components {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{c}")?;
            first = false;
        }
        Ok(())
    }
}

impl Ord for PolicyVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

impl PartialOrd for PolicyVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One component of a version pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PatternItem {
    Literal(u64),
    /// `*` — any single number.
    AnySingle,
    /// `+` — any non-empty sequence of numbers.
    AnySequence,
}

/// A version pattern as used in reference constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionPattern {
    items: Vec<PatternItem>,
}

impl VersionPattern {
    /// True iff `version` matches this pattern exactly.
    pub fn matches(&self, version: &PolicyVersion) -> bool {
        Self::matches_rec(&self.items, version.components())
    }

    fn matches_rec(items: &[PatternItem], components: &[u64]) -> bool {
        match (items.first(), components.first()) {
            (None, None) => true,
            (None, Some(_)) | (Some(_), None) => {
                // A trailing `+` still needs at least one number, so an
                // exhausted version never matches remaining items.
                false
            }
            (Some(PatternItem::Literal(n)), Some(c)) => {
                n == c && Self::matches_rec(&items[1..], &components[1..])
            }
            (Some(PatternItem::AnySingle), Some(_)) => {
                Self::matches_rec(&items[1..], &components[1..])
            }
            (Some(PatternItem::AnySequence), Some(_)) => {
                // Absorb one or more components.
                (1..=components.len())
                    .any(|k| Self::matches_rec(&items[1..], &components[k..]))
            }
        }
    }

    /// EarliestVersion semantics: true iff some version matching this
    /// pattern is earlier than or equal to `version` — i.e. `version` is
    /// not below everything the pattern can denote.
    pub fn is_later_or_matches(&self, version: &PolicyVersion) -> bool {
        // The pattern grammar is monotone: the smallest matching version is
        // obtained by substituting 0 for `*` and a single 0 for `+`.
        let min = PolicyVersion {
            components: self
                .items
                .iter()
                .map(|item| match item {
                    PatternItem::Literal(n) => *n,
                    PatternItem::AnySingle | PatternItem::AnySequence => 0,
                })
                .collect(),
        };
        *version >= min
    }

    /// LatestVersion semantics: true iff some version matching this pattern
    /// is later than or equal to `version`.
    pub fn is_earlier_or_matches(&self, version: &PolicyVersion) -> bool {
        let components = version.components();
        for (i, item) in self.items.iter().enumerate() {
            let Some(c) = components.get(i) else {
                // Version exhausted; remaining pattern items can only make
                // matching versions longer, hence later.
                return true;
            };
            match item {
                // Wildcards can be made arbitrarily large here.
                PatternItem::AnySingle | PatternItem::AnySequence => return true,
                PatternItem::Literal(n) => match c.cmp(n) {
                    Ordering::Less => return true,
                    Ordering::Greater => return false,
                    Ordering::Equal => {}
                },
            }
        }
        // Pattern exhausted: extra version components outrank every match.
        components.len() <= self.items.len()
    }
}

impl FromStr for VersionPattern {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(VersionError::Empty);
        }
        let mut items = Vec::new();
        for part in s.split('.') {
            let item = match part {
                "*" => PatternItem::AnySingle,
                "+" => PatternItem::AnySequence,
                n => PatternItem::Literal(n.parse().map_err(|_| {
                    VersionError::InvalidComponent {
                        literal: s.to_string(),
                        component: part.to_string(),
                    }
                })?),
            };
            items.push(item);
        }
        Ok(Self { items })
    }
}

impl TryFrom<String> for VersionPattern {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VersionPattern> for String {
    fn from(p: VersionPattern) -> Self {
        p.to_string()
    }
}

impl fmt::Display for VersionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for item in &self.items {
            if !first {
                f.write_str(".")?;
            }
            match item {
                PatternItem::Literal(n) => write!(f, "{n}")?,
                PatternItem::AnySingle => f.write_str("*")?,
                PatternItem::AnySequence => f.write_str("+")?,
            }
            first = false;
        }
        Ok(())
    }
}

/// The version constraints a policy reference may carry.
///
/// All present constraints must hold for a candidate version to satisfy
/// the reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyVersionPatterns {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_version: Option<VersionPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<VersionPattern>,
}

impl PolicyVersionPatterns {
    /// Unconstrained: matches every version.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn matches(&self, version: &PolicyVersion) -> bool {
        self.version.as_ref().is_none_or(|p| p.matches(version))
            && self
                .earliest_version
                .as_ref()
                .is_none_or(|p| p.is_later_or_matches(version))
            && self
                .latest_version
                .as_ref()
                .is_none_or(|p| p.is_earlier_or_matches(version))
    }
}

impl fmt::Display for PolicyVersionPatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt(p: &Option<VersionPattern>) -> String {
            p.as_ref().map_or_else(|| "-".to_string(), |p| p.to_string())
        }
        write!(
            f,
            "[{},{},{}]",
            opt(&self.version),
            opt(&self.earliest_version),
            opt(&self.latest_version)
        )
    }
}
