//! Fact store: the per-session working memory.
//!
//! Each fact identifier has at most one active value. Re-asserting a fact
//! supersedes the old value and updates its provenance, unless the existing
//! value came from a higher-precedence source (user > derived > default), in
//! which case the store refuses the change with [`FactError::Conflict`] and
//! stays untouched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{FactError, FactResult};

const NUMBER_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// The value of a fact: boolean, enumerated text, or numeric (graded symptoms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FactValue {
    /// Parse a raw answer as typed by a user: `true`/`false` become booleans,
    /// numbers become numbers, anything else stays text.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_ascii_lowercase().as_str() {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Number(n),
            _ => Self::Text(raw.to_string()),
        }
    }

    /// Boolean reading of the value, accepting yes/no style answers.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Number(n) if (*n - 1.0).abs() < NUMBER_EPSILON => Some(true),
            Self::Number(n) if n.abs() < NUMBER_EPSILON => Some(false),
            Self::Number(_) => None,
            Self::Text(t) => match t.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" | "y" | "1" => Some(true),
                "no" | "false" | "n" | "0" => Some(false),
                _ => None,
            },
        }
    }

    /// Numeric reading of the value, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(t) => t.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Self::Bool(_) => None,
        }
    }

    /// Type-flexible equality used when matching conditions: text compares
    /// case-insensitively and yes/no answers compare equal to booleans.
    pub fn matches(&self, other: &FactValue) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => (a - b).abs() < NUMBER_EPSILON,
            (Self::Text(a), Self::Text(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
            (Self::Bool(b), other) | (other, Self::Bool(b)) => other.as_bool() == Some(*b),
            (Self::Number(n), Self::Text(_)) | (Self::Text(_), Self::Number(n)) => {
                let text = if let Self::Text(_) = self { self } else { other };
                text.as_number()
                    .is_some_and(|t| (t - n).abs() < NUMBER_EPSILON)
            }
        }
    }
}

impl std::fmt::Display for FactValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

impl From<bool> for FactValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for FactValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for FactValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FactValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Where a fact came from. The derived ordering is the precedence order:
/// `Default < Derived < User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactSource {
    /// Assumed value supplied without evidence.
    Default,
    /// Concluded by a rule during forward chaining.
    Derived,
    /// Directly observed and reported by the user.
    User,
}

impl std::fmt::Display for FactSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Derived => write!(f, "derived"),
            Self::User => write!(f, "user"),
        }
    }
}

/// A single fact in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub value: FactValue,
    pub source: FactSource,
    /// Logical assertion time; strictly increasing within a store.
    pub seq: u64,
    /// The rule that derived this fact, for `Derived` facts.
    pub rule: Option<String>,
}

/// Ternary truth value. Unknown is never treated as false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    /// Kleene conjunction: any false makes the whole false, otherwise any
    /// unknown makes it unknown.
    pub fn all(values: impl IntoIterator<Item = Truth>) -> Truth {
        let mut result = Truth::True;
        for v in values {
            match v {
                Truth::False => return Truth::False,
                Truth::Unknown => result = Truth::Unknown,
                Truth::True => {}
            }
        }
        result
    }

    pub fn from_bool(b: bool) -> Truth {
        if b { Truth::True } else { Truth::False }
    }
}

/// What an accepted assertion did to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum AssertOutcome {
    /// The fact was not known before.
    Inserted,
    /// The fact existed with a different value, which was replaced.
    Superseded { previous: FactValue, previous_source: FactSource },
    /// Same value re-asserted from a higher-precedence source.
    Promoted { previous_source: FactSource },
    /// Same value, no change.
    Unchanged,
}

impl AssertOutcome {
    /// Whether the fact's value changed.
    pub fn changed_value(&self) -> bool {
        matches!(self, Self::Inserted | Self::Superseded { .. })
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Session-owned mapping from fact identifiers to their current value.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    facts: Vec<Fact>,
    index: HashMap<String, usize>,
    clock: u64,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or overwrite a fact.
    ///
    /// Fails with [`FactError::Conflict`] when a lower-precedence source tries
    /// to change the value of a higher-precedence fact; the store is left
    /// unchanged in that case.
    pub fn assert(
        &mut self,
        id: &str,
        value: FactValue,
        source: FactSource,
    ) -> FactResult<AssertOutcome> {
        self.assert_with_rule(id, value, source, None)
    }

    /// Record a fact concluded by `rule_id`.
    pub fn assert_derived(
        &mut self,
        id: &str,
        value: FactValue,
        rule_id: &str,
    ) -> FactResult<AssertOutcome> {
        self.assert_with_rule(id, value, FactSource::Derived, Some(rule_id.to_string()))
    }

    fn assert_with_rule(
        &mut self,
        id: &str,
        value: FactValue,
        source: FactSource,
        rule: Option<String>,
    ) -> FactResult<AssertOutcome> {
        let id = id.trim();
        if id.is_empty() {
            return Err(FactError::EmptyId);
        }
        self.clock += 1;
        let seq = self.clock;

        let Some(&pos) = self.index.get(id) else {
            self.index.insert(id.to_string(), self.facts.len());
            self.facts.push(Fact {
                id: id.to_string(),
                value,
                source,
                seq,
                rule,
            });
            return Ok(AssertOutcome::Inserted);
        };

        let existing = &mut self.facts[pos];
        if existing.value.matches(&value) {
            if source > existing.source {
                let previous_source = existing.source;
                existing.source = source;
                existing.rule = rule;
                existing.seq = seq;
                return Ok(AssertOutcome::Promoted { previous_source });
            }
            return Ok(AssertOutcome::Unchanged);
        }

        if source < existing.source {
            return Err(FactError::Conflict {
                fact: id.to_string(),
                existing: existing.source.to_string(),
                attempted: source.to_string(),
            });
        }

        let previous = std::mem::replace(&mut existing.value, value);
        let previous_source = existing.source;
        existing.source = source;
        existing.rule = rule;
        existing.seq = seq;
        Ok(AssertOutcome::Superseded {
            previous,
            previous_source,
        })
    }

    /// Current fact for `id`, if known.
    pub fn get(&self, id: &str) -> Option<&Fact> {
        self.index.get(id).map(|&pos| &self.facts[pos])
    }

    /// Current value for `id`, or `None` when unknown.
    pub fn value(&self, id: &str) -> Option<&FactValue> {
        self.get(id).map(|f| &f.value)
    }

    /// Boolean truth of `id`: unknown when absent or not readable as a boolean.
    pub fn truth(&self, id: &str) -> Truth {
        match self.value(id).and_then(FactValue::as_bool) {
            Some(b) => Truth::from_bool(b),
            None => Truth::Unknown,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All currently asserted facts in first-assertion order. Each call starts
    /// a fresh iteration.
    pub fn known_facts(&self) -> impl Iterator<Item = &Fact> + '_ {
        self.facts.iter()
    }

    /// Remove a fact, returning it if it was present.
    pub fn retract(&mut self, id: &str) -> Option<Fact> {
        let pos = self.index.remove(id)?;
        let fact = self.facts.remove(pos);
        self.reindex();
        Some(fact)
    }

    /// Drop every `Derived` fact, keeping user and default facts.
    pub fn clear_derived(&mut self) -> usize {
        let before = self.facts.len();
        self.facts.retain(|f| f.source != FactSource::Derived);
        self.reindex();
        before - self.facts.len()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    fn reindex(&mut self) {
        self.index = self
            .facts
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id.clone(), i))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_supersede_updates_provenance() {
        let mut store = FactStore::new();
        assert_eq!(
            store.assert("fan_noise", "quiet".into(), FactSource::Default).unwrap(),
            AssertOutcome::Inserted
        );
        let outcome = store
            .assert("fan_noise", "loud".into(), FactSource::User)
            .unwrap();
        assert!(matches!(outcome, AssertOutcome::Superseded { .. }));
        let fact = store.get("fan_noise").unwrap();
        assert_eq!(fact.value, FactValue::Text("loud".into()));
        assert_eq!(fact.source, FactSource::User);
    }

    #[test]
    fn user_fact_cannot_be_overwritten_by_derived_or_default() {
        let mut store = FactStore::new();
        store.assert("device_hot", true.into(), FactSource::User).unwrap();

        let err = store.assert_derived("device_hot", false.into(), "R9");
        assert!(matches!(err, Err(FactError::Conflict { .. })));
        let err = store.assert("device_hot", false.into(), FactSource::Default);
        assert!(matches!(err, Err(FactError::Conflict { .. })));

        let fact = store.get("device_hot").unwrap();
        assert_eq!(fact.value, FactValue::Bool(true));
        assert_eq!(fact.source, FactSource::User);
    }

    #[test]
    fn same_value_from_lower_source_is_unchanged() {
        let mut store = FactStore::new();
        store.assert("device_hot", true.into(), FactSource::User).unwrap();
        let outcome = store.assert_derived("device_hot", true.into(), "R1").unwrap();
        assert_eq!(outcome, AssertOutcome::Unchanged);
        assert_eq!(store.get("device_hot").unwrap().source, FactSource::User);
    }

    #[test]
    fn user_confirmation_promotes_derived_fact() {
        let mut store = FactStore::new();
        store.assert_derived("thermal_load", true.into(), "R2").unwrap();
        let outcome = store
            .assert("thermal_load", true.into(), FactSource::User)
            .unwrap();
        assert_eq!(
            outcome,
            AssertOutcome::Promoted {
                previous_source: FactSource::Derived
            }
        );
        assert_eq!(store.get("thermal_load").unwrap().rule, None);
    }

    #[test]
    fn unknown_is_not_false() {
        let mut store = FactStore::new();
        assert_eq!(store.truth("wifi_on"), Truth::Unknown);
        store.assert("wifi_on", "no".into(), FactSource::User).unwrap();
        assert_eq!(store.truth("wifi_on"), Truth::False);
        store.assert("mode", "airplane".into(), FactSource::User).unwrap();
        assert_eq!(store.truth("mode"), Truth::Unknown);
    }

    #[test]
    fn known_facts_is_restartable_and_ordered() {
        let mut store = FactStore::new();
        store.assert("a", true.into(), FactSource::User).unwrap();
        store.assert("b", 3.0.into(), FactSource::Default).unwrap();
        let first: Vec<_> = store.known_facts().map(|f| f.id.clone()).collect();
        let second: Vec<_> = store.known_facts().map(|f| f.id.clone()).collect();
        assert_eq!(first, vec!["a", "b"]);
        assert_eq!(first, second);
    }

    #[test]
    fn retract_and_clear_derived_keep_index_consistent() {
        let mut store = FactStore::new();
        store.assert("a", true.into(), FactSource::User).unwrap();
        store.assert_derived("b", true.into(), "R1").unwrap();
        store.assert("c", true.into(), FactSource::User).unwrap();

        assert_eq!(store.clear_derived(), 1);
        assert!(store.get("b").is_none());
        assert_eq!(store.get("c").unwrap().id, "c");

        assert!(store.retract("a").is_some());
        assert_eq!(store.get("c").unwrap().id, "c");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn empty_id_is_rejected() {
        let mut store = FactStore::new();
        assert!(matches!(
            store.assert("  ", true.into(), FactSource::User),
            Err(FactError::EmptyId)
        ));
    }

    #[test]
    fn flexible_matching() {
        assert!(FactValue::Text("Yes".into()).matches(&FactValue::Bool(true)));
        assert!(FactValue::Bool(false).matches(&FactValue::Text("no".into())));
        assert!(FactValue::Text("LOUD".into()).matches(&FactValue::Text("loud".into())));
        assert!(FactValue::Number(3.0).matches(&FactValue::Text("3".into())));
        assert!(!FactValue::Number(2.0).matches(&FactValue::Bool(true)));
        assert_eq!(FactValue::parse("true"), FactValue::Bool(true));
        assert_eq!(FactValue::parse("42"), FactValue::Number(42.0));
        assert_eq!(FactValue::parse("loud"), FactValue::Text("loud".into()));
    }
}
