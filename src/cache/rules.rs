//! Invalidation Rules Module
//!
//! Maps entity types to the key patterns that must be invalidated together,
//! and compiles wildcard patterns into anchored matchers.
//!
//! Wildcard syntax: `*` matches any run of characters (including empty),
//! `?` matches exactly one character, everything else matches literally.

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::Result;

// == Entity Type ==
/// Entity categories recognized by the cascade policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Collection,
    Dot,
    Snapshot,
}

impl EntityType {
    /// The key-segment name used for entity-scoped keys of this type.
    pub fn category(&self) -> &'static str {
        match self {
            EntityType::Collection => "collection",
            EntityType::Dot => "dot",
            EntityType::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "collection" => Ok(EntityType::Collection),
            "dot" => Ok(EntityType::Dot),
            "snapshot" => Ok(EntityType::Snapshot),
            other => Err(format!("unknown entity type: {}", other)),
        }
    }
}

// == Invalidation Rule Manager ==
/// Table-driven cascade policy: entity type in, wildcard patterns out.
///
/// The policy is a pure function of the entity type. New entity types are
/// added by extending the match arms, not by branching at call sites.
#[derive(Debug, Default)]
pub struct InvalidationRuleManager;

impl InvalidationRuleManager {
    pub fn new() -> Self {
        Self
    }

    // == Cascade Patterns ==
    /// Returns the wildcard patterns to invalidate when an entity of
    /// `entity_type` owned by `user_id` changes.
    ///
    /// - `collection`: the aggregate collections list and every key scoped
    ///   to that collection.
    /// - `dot`: the owning user's aggregate collections list (a dot's state
    ///   feeds its parent collection's aggregate view); unrelated
    ///   collections stay untouched.
    /// - `snapshot`: nothing. Snapshots are immutable historical records.
    pub fn cascade_patterns(
        &self,
        entity_type: EntityType,
        user_id: &str,
        entity_id: &str,
    ) -> Vec<String> {
        match entity_type {
            EntityType::Collection => vec![
                format!("user:{}:collections*", user_id),
                format!("user:{}:collection:{}*", user_id, entity_id),
            ],
            EntityType::Dot => vec![format!("user:{}:collections*", user_id)],
            EntityType::Snapshot => Vec::new(),
        }
    }
}

// == Pattern Compilation ==
/// Compiles a wildcard pattern into an anchored full-string matcher.
///
/// Every non-wildcard character is escaped before substitution, so keys
/// containing regex metacharacters match only literally.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            other => {
                let mut buf = [0u8; 4];
                translated.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }
    translated.push('$');
    Ok(Regex::new(&translated)?)
}
