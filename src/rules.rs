//! Rule base: the validated, immutable set of diagnostic rules.
//!
//! A [`RuleBase`] is built once at startup and shared read-only across
//! sessions. Construction validates everything that could otherwise fail at
//! inference time: duplicate ids, confidence ranges, references to unknown
//! facts, self-referencing rules and cycles in the fact dependency graph.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::{RuleError, RuleResult};
use crate::fact::{FactStore, FactValue, Truth};

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// Comparison applied by a condition clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    Eq(FactValue),
    Ne(FactValue),
    Gt(f64),
    Ge(f64),
    Lt(f64),
    Le(f64),
    In(Vec<FactValue>),
}

impl Predicate {
    /// Whether a concrete value satisfies this predicate.
    pub fn accepts(&self, value: &FactValue) -> bool {
        match self {
            Self::Eq(expected) => value.matches(expected),
            Self::Ne(expected) => !value.matches(expected),
            Self::Gt(n) => value.as_number().is_some_and(|v| v > *n),
            Self::Ge(n) => value.as_number().is_some_and(|v| v >= *n),
            Self::Lt(n) => value.as_number().is_some_and(|v| v < *n),
            Self::Le(n) => value.as_number().is_some_and(|v| v <= *n),
            Self::In(options) => options.iter().any(|o| value.matches(o)),
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq(v) => write!(f, "= {v}"),
            Self::Ne(v) => write!(f, "!= {v}"),
            Self::Gt(n) => write!(f, "> {n}"),
            Self::Ge(n) => write!(f, ">= {n}"),
            Self::Lt(n) => write!(f, "< {n}"),
            Self::Le(n) => write!(f, "<= {n}"),
            Self::In(options) => {
                let list: Vec<String> = options.iter().map(ToString::to_string).collect();
                write!(f, "in [{}]", list.join(", "))
            }
        }
    }
}

/// A single condition clause: a fact identifier and the predicate its value
/// must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub fact: String,
    pub predicate: Predicate,
}

impl Condition {
    pub fn new(fact: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            fact: fact.into(),
            predicate,
        }
    }

    /// Shorthand for an equality condition.
    pub fn is(fact: impl Into<String>, value: impl Into<FactValue>) -> Self {
        Self::new(fact, Predicate::Eq(value.into()))
    }

    /// Evaluate against the store. An unknown fact yields `Truth::Unknown`.
    pub fn evaluate(&self, facts: &FactStore) -> Truth {
        match facts.value(&self.fact) {
            Some(value) => Truth::from_bool(self.predicate.accepts(value)),
            None => Truth::Unknown,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.fact, self.predicate)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// What a rule concludes when all its conditions hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conclusion {
    /// Assert a derived fact.
    Fact { target: String, value: FactValue },
    /// Vote for a diagnosis category.
    Category { category: Category },
}

impl Conclusion {
    /// The fact this conclusion asserts, if it is a fact conclusion.
    pub fn fact_target(&self) -> Option<&str> {
        match self {
            Self::Fact { target, .. } => Some(target),
            Self::Category { .. } => None,
        }
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            Self::Category { category } => Some(*category),
            Self::Fact { .. } => None,
        }
    }
}

impl std::fmt::Display for Conclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fact { target, value } => write!(f, "{target} = {value}"),
            Self::Category { category } => write!(f, "category {category}"),
        }
    }
}

/// A diagnostic rule: condition set → conclusion, with a confidence weight
/// in [0, 1] and an integer priority (higher wins conflicts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub conditions: Vec<Condition>,
    pub conclusion: Conclusion,
    pub confidence: f64,
    pub priority: i32,
    /// Explanation template; `{conditions}`, `{confidence}`, `{cause}`,
    /// `{conclusion}` and `{<fact id>}` placeholders are filled in on firing.
    pub explanation: Option<String>,
    /// Root cause named by this rule, shown alongside the category.
    pub cause: Option<String>,
    /// Suggested remedies for the cause.
    pub solutions: Vec<String>,
}

impl Rule {
    /// Create a rule with confidence 1.0, priority 0 and no explanation.
    pub fn new(id: impl Into<String>, conclusion: Conclusion) -> Self {
        Self {
            id: id.into(),
            conditions: Vec::new(),
            conclusion,
            confidence: 1.0,
            priority: 0,
            explanation: None,
            cause: None,
            solutions: Vec::new(),
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_explanation(mut self, template: impl Into<String>) -> Self {
        self.explanation = Some(template.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>, solutions: &[&str]) -> Self {
        self.cause = Some(cause.into());
        self.solutions = solutions.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Conjunction of all condition clauses under ternary logic.
    pub fn evaluate(&self, facts: &FactStore) -> Truth {
        Truth::all(self.conditions.iter().map(|c| c.evaluate(facts)))
    }
}

/// Fact naming the kind of device under diagnosis.
pub const DEVICE_FACT: &str = "device";

/// An askable fact: something the dialogue layer can put to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Device scope (`computer` / `mobile`); `None` applies to both.
    #[serde(default)]
    pub device: Option<String>,
}

impl Symptom {
    pub fn new(id: impl Into<String>, question: impl Into<String>, options: &[&str]) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            device: None,
        }
    }

    /// Whether the question makes sense for the device described by
    /// `facts`. Unscoped symptoms, and any symptom while the device is
    /// still unknown, always apply.
    pub fn applies_to(&self, facts: &FactStore) -> bool {
        match (&self.device, facts.value(DEVICE_FACT)) {
            (Some(scope), Some(device)) => device.matches(&FactValue::Text(scope.clone())),
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule base
// ---------------------------------------------------------------------------

/// Ordered, validated, immutable collection of rules and symptom declarations.
#[derive(Debug, Clone)]
pub struct RuleBase {
    rules: Vec<Rule>,
    symptoms: Vec<Symptom>,
    symptom_index: HashMap<String, usize>,
    /// fact id → indices of rules concluding it, in rule order.
    derivers: HashMap<String, Vec<usize>>,
    /// category → indices of rules voting for it, in rule order.
    voters: HashMap<Category, Vec<usize>>,
}

impl RuleBase {
    /// Validate and index a rule base. Rule order is significant: it is the
    /// final tie-break in conflict resolution.
    pub fn new(symptoms: Vec<Symptom>, rules: Vec<Rule>) -> RuleResult<Self> {
        let mut symptom_index = HashMap::new();
        for (i, s) in symptoms.iter().enumerate() {
            if symptom_index.insert(s.id.clone(), i).is_some() {
                return Err(RuleError::DuplicateSymptom { fact: s.id.clone() });
            }
        }

        let mut seen_ids = HashSet::new();
        let mut derivers: HashMap<String, Vec<usize>> = HashMap::new();
        let mut voters: HashMap<Category, Vec<usize>> = HashMap::new();
        for (i, rule) in rules.iter().enumerate() {
            if !seen_ids.insert(rule.id.clone()) {
                return Err(RuleError::DuplicateRuleId {
                    rule_id: rule.id.clone(),
                });
            }
            if !rule.confidence.is_finite() || !(0.0..=1.0).contains(&rule.confidence) {
                return Err(RuleError::ConfidenceOutOfRange {
                    rule_id: rule.id.clone(),
                    confidence: rule.confidence,
                });
            }
            if rule.conditions.is_empty() {
                return Err(RuleError::EmptyConditions {
                    rule_id: rule.id.clone(),
                });
            }
            match &rule.conclusion {
                Conclusion::Fact { target, .. } => {
                    if rule.conditions.iter().any(|c| &c.fact == target) {
                        return Err(RuleError::SelfReference {
                            rule_id: rule.id.clone(),
                            fact: target.clone(),
                        });
                    }
                    derivers.entry(target.clone()).or_default().push(i);
                }
                Conclusion::Category { category } => {
                    voters.entry(*category).or_default().push(i);
                }
            }
        }

        for rule in &rules {
            for cond in &rule.conditions {
                if !symptom_index.contains_key(&cond.fact) && !derivers.contains_key(&cond.fact) {
                    return Err(RuleError::UnknownFact {
                        rule_id: rule.id.clone(),
                        fact: cond.fact.clone(),
                    });
                }
            }
        }

        check_acyclic(&rules)?;

        tracing::debug!(
            rules = rules.len(),
            symptoms = symptoms.len(),
            "rule base validated"
        );

        Ok(Self {
            rules,
            symptoms,
            symptom_index,
            derivers,
            voters,
        })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn symptoms(&self) -> &[Symptom] {
        &self.symptoms
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look up a rule by id.
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Rule-order index of the rule with this id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.id == id)
    }

    pub fn symptom(&self, fact: &str) -> Option<&Symptom> {
        self.symptom_index.get(fact).map(|&i| &self.symptoms[i])
    }

    /// Whether the dialogue layer can ask the user for this fact.
    pub fn is_askable(&self, fact: &str) -> bool {
        self.symptom_index.contains_key(fact)
    }

    /// Rules concluding `fact`, as (rule-order index, rule).
    pub fn rules_deriving(&self, fact: &str) -> impl Iterator<Item = (usize, &Rule)> + '_ {
        self.derivers
            .get(fact)
            .into_iter()
            .flatten()
            .map(|&i| (i, &self.rules[i]))
    }

    /// Rules voting for `category`, as (rule-order index, rule).
    pub fn rules_voting(&self, category: Category) -> impl Iterator<Item = (usize, &Rule)> + '_ {
        self.voters
            .get(&category)
            .into_iter()
            .flatten()
            .map(|&i| (i, &self.rules[i]))
    }

    /// Categories that at least one rule votes for, in declaration order.
    pub fn voted_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.voters.contains_key(c))
            .collect()
    }
}

/// Reject rule sets whose fact dependency graph contains a cycle.
///
/// Nodes are fact ids; each fact-concluding rule adds an edge from every
/// condition fact to its conclusion.
fn check_acyclic(rules: &[Rule]) -> RuleResult<()> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for rule in rules {
        let Some(target) = rule.conclusion.fact_target() else {
            continue;
        };
        let to = *nodes.entry(target).or_insert_with(|| graph.add_node(target));
        for cond in &rule.conditions {
            let from = *nodes
                .entry(cond.fact.as_str())
                .or_insert_with(|| graph.add_node(cond.fact.as_str()));
            graph.update_edge(from, to, ());
        }
    }

    petgraph::algo::toposort(&graph, None)
        .map(|_| ())
        .map_err(|cycle| RuleError::Cycle {
            fact: graph[cycle.node_id()].to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::FactSource;

    fn symptoms() -> Vec<Symptom> {
        vec![
            Symptom::new("a", "A?", &["yes", "no"]),
            Symptom::new("b", "B?", &["yes", "no"]),
            Symptom::new("level", "Level?", &[]),
        ]
    }

    fn fact_rule(id: &str, from: &str, to: &str) -> Rule {
        Rule::new(
            id,
            Conclusion::Fact {
                target: to.into(),
                value: true.into(),
            },
        )
        .when(Condition::is(from, true))
    }

    #[test]
    fn valid_rule_base_indexes_derivers_and_voters() {
        let rules = vec![
            fact_rule("R1", "a", "x"),
            Rule::new(
                "R2",
                Conclusion::Category {
                    category: Category::Overheating,
                },
            )
            .when(Condition::is("x", true)),
        ];
        let rb = RuleBase::new(symptoms(), rules).unwrap();
        assert_eq!(rb.rules_deriving("x").count(), 1);
        assert_eq!(rb.rules_voting(Category::Overheating).count(), 1);
        assert_eq!(rb.voted_categories(), vec![Category::Overheating]);
        assert!(rb.is_askable("a"));
        assert!(!rb.is_askable("x"));
    }

    #[test]
    fn duplicate_rule_id_fails() {
        let rules = vec![fact_rule("R1", "a", "x"), fact_rule("R1", "b", "y")];
        assert!(matches!(
            RuleBase::new(symptoms(), rules),
            Err(RuleError::DuplicateRuleId { .. })
        ));
    }

    #[test]
    fn unknown_fact_fails_at_load() {
        let rules = vec![fact_rule("R1", "nope", "x")];
        match RuleBase::new(symptoms(), rules) {
            Err(RuleError::UnknownFact { rule_id, fact }) => {
                assert_eq!(rule_id, "R1");
                assert_eq!(fact, "nope");
            }
            other => panic!("expected UnknownFact, got {other:?}"),
        }
    }

    #[test]
    fn self_reference_fails() {
        let rules = vec![fact_rule("R1", "a", "a")];
        assert!(matches!(
            RuleBase::new(symptoms(), rules),
            Err(RuleError::SelfReference { .. })
        ));
    }

    #[test]
    fn transitive_cycle_fails() {
        let rules = vec![
            fact_rule("R1", "x", "y"),
            fact_rule("R2", "y", "z"),
            fact_rule("R3", "z", "x"),
        ];
        assert!(matches!(
            RuleBase::new(symptoms(), rules),
            Err(RuleError::Cycle { .. })
        ));
    }

    #[test]
    fn confidence_out_of_range_fails() {
        let rules = vec![fact_rule("R1", "a", "x").with_confidence(1.5)];
        assert!(matches!(
            RuleBase::new(symptoms(), rules),
            Err(RuleError::ConfidenceOutOfRange { .. })
        ));
        let rules = vec![fact_rule("R1", "a", "x").with_confidence(f64::NAN)];
        assert!(RuleBase::new(symptoms(), rules).is_err());
    }

    #[test]
    fn empty_conditions_fail() {
        let rules = vec![Rule::new(
            "R1",
            Conclusion::Category {
                category: Category::AppCrashes,
            },
        )];
        assert!(matches!(
            RuleBase::new(symptoms(), rules),
            Err(RuleError::EmptyConditions { .. })
        ));
    }

    #[test]
    fn duplicate_symptom_fails() {
        let mut s = symptoms();
        s.push(Symptom::new("a", "again?", &[]));
        assert!(matches!(
            RuleBase::new(s, Vec::new()),
            Err(RuleError::DuplicateSymptom { .. })
        ));
    }

    #[test]
    fn conditions_evaluate_ternary() {
        let mut facts = FactStore::new();
        facts.assert("level", 7.0.into(), FactSource::User).unwrap();
        let gt = Condition::new("level", Predicate::Gt(5.0));
        let lt = Condition::new("level", Predicate::Lt(5.0));
        let unknown = Condition::is("a", true);
        let within = Condition::new("level", Predicate::In(vec![6.0.into(), 7.0.into()]));
        assert_eq!(gt.evaluate(&facts), Truth::True);
        assert_eq!(lt.evaluate(&facts), Truth::False);
        assert_eq!(unknown.evaluate(&facts), Truth::Unknown);
        assert_eq!(within.evaluate(&facts), Truth::True);

        let rule = fact_rule("R1", "a", "x").when(gt);
        assert_eq!(rule.evaluate(&facts), Truth::Unknown);
        facts.assert("a", "yes".into(), FactSource::User).unwrap();
        assert_eq!(rule.evaluate(&facts), Truth::True);
    }
}
