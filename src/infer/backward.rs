//! Backward chaining: reason from a target category back to the facts that
//! would let one of its rules fire.
//!
//! The search never asserts anything. For each pending category rule it
//! walks the unknown conditions, recursing through rules that could derive
//! them, and collects the askable facts at the leaves. A rule contributes
//! only when every one of its unknown conditions can still be met, so each
//! returned fact belongs to a live path towards the target.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::category::Category;
use crate::fact::{FactStore, Truth};
use crate::rules::{Conclusion, RuleBase};

use super::Agenda;

/// Configuration for backward chaining.
#[derive(Debug, Clone)]
pub struct BackwardConfig {
    /// Maximum recursion depth through fact-deriving rules (default: 8).
    pub max_depth: usize,
}

impl Default for BackwardConfig {
    fn default() -> Self {
        Self { max_depth: 8 }
    }
}

/// An unknown fact that would help decide a category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeededFact {
    pub fact: String,
    /// Number of pending category rules this fact participates in.
    pub unlocks: usize,
    /// Question to put to the user, from the symptom catalog.
    pub question: Option<String>,
    pub options: Vec<String>,
    /// Ids of the pending category rules, in rule order.
    pub rules: Vec<String>,
}

/// Backward-chaining search over a shared rule base.
pub struct BackwardChainer<'a> {
    rules: &'a RuleBase,
    config: BackwardConfig,
    agenda: Option<&'a Agenda>,
}

impl<'a> BackwardChainer<'a> {
    pub fn new(rules: &'a RuleBase, config: BackwardConfig) -> Self {
        Self {
            rules,
            config,
            agenda: None,
        }
    }

    /// Skip rules the session has already fired or overruled.
    pub fn with_agenda(mut self, agenda: &'a Agenda) -> Self {
        self.agenda = Some(agenda);
        self
    }

    /// Facts needed to decide `category`, most constraining first.
    pub fn needed_for(&self, category: Category, facts: &FactStore) -> Vec<NeededFact> {
        self.needed_for_categories(&[category], facts)
    }

    /// Facts needed across every category some rule votes for.
    pub fn needed_for_all(&self, facts: &FactStore) -> Vec<NeededFact> {
        self.needed_for_categories(&self.rules.voted_categories(), facts)
    }

    /// Facts needed across `categories`, ranked by how many pending rules
    /// they participate in, then by discovery order.
    pub fn needed_for_categories(
        &self,
        categories: &[Category],
        facts: &FactStore,
    ) -> Vec<NeededFact> {
        let mut search = Search {
            rules: self.rules,
            facts,
            agenda: self.agenda,
            max_depth: self.config.max_depth,
            memo: HashMap::new(),
            in_progress: HashSet::new(),
        };

        // fact -> pending top-level rules, in discovery order.
        let mut order: Vec<String> = Vec::new();
        let mut unlocked: HashMap<String, Vec<usize>> = HashMap::new();

        let mut pending: Vec<usize> = categories
            .iter()
            .flat_map(|c| self.rules.rules_voting(*c).map(|(i, _)| i))
            .collect();
        pending.sort_unstable();
        pending.dedup();

        for rule_index in pending {
            if search.is_retired(rule_index) {
                continue;
            }
            if self.rules.rules()[rule_index].evaluate(facts) != Truth::Unknown {
                continue;
            }
            let Some(leaves) = search.explore(rule_index, 0) else {
                continue;
            };
            for fact in leaves {
                let rules = unlocked.entry(fact.clone()).or_insert_with(|| {
                    order.push(fact.clone());
                    Vec::new()
                });
                if !rules.contains(&rule_index) {
                    rules.push(rule_index);
                }
            }
        }

        let mut needed: Vec<NeededFact> = order
            .into_iter()
            .filter(|fact| self.rules.symptom(fact).is_none_or(|s| s.applies_to(facts)))
            .map(|fact| {
                let rule_indices = unlocked.remove(&fact).unwrap_or_default();
                let symptom = self.rules.symptom(&fact);
                NeededFact {
                    unlocks: rule_indices.len(),
                    question: symptom.map(|s| s.question.clone()),
                    options: symptom.map(|s| s.options.clone()).unwrap_or_default(),
                    rules: rule_indices
                        .iter()
                        .map(|&i| self.rules.rules()[i].id.clone())
                        .collect(),
                    fact,
                }
            })
            .collect();
        // Stable sort keeps discovery order among equals.
        needed.sort_by(|a, b| b.unlocks.cmp(&a.unlocks));

        tracing::debug!(
            categories = categories.len(),
            needed = needed.len(),
            "backward chaining complete"
        );
        needed
    }
}

// ---------------------------------------------------------------------------
// Search state
// ---------------------------------------------------------------------------

struct Search<'a> {
    rules: &'a RuleBase,
    facts: &'a FactStore,
    agenda: Option<&'a Agenda>,
    max_depth: usize,
    /// (rule index, depth) -> askable facts it needs, or `None` when it
    /// cannot fire within the remaining depth. Keyed by depth as well, since
    /// the same rule reached deeper has less room left.
    memo: HashMap<(usize, usize), Option<Vec<String>>>,
    in_progress: HashSet<usize>,
}

impl Search<'_> {
    fn is_retired(&self, rule_index: usize) -> bool {
        self.agenda.is_some_and(|a| a.is_retired(rule_index))
    }

    /// Askable facts that, once known, could let `rule_index` fire.
    fn explore(&mut self, rule_index: usize, depth: usize) -> Option<Vec<String>> {
        if let Some(cached) = self.memo.get(&(rule_index, depth)) {
            return cached.clone();
        }
        if depth > self.max_depth || !self.in_progress.insert(rule_index) {
            return None;
        }

        let result = self.explore_conditions(rule_index, depth);

        self.in_progress.remove(&rule_index);
        self.memo.insert((rule_index, depth), result.clone());
        result
    }

    fn explore_conditions(&mut self, rule_index: usize, depth: usize) -> Option<Vec<String>> {
        let rules = self.rules;
        let rule = &rules.rules()[rule_index];
        let mut leaves: Vec<String> = Vec::new();

        for cond in &rule.conditions {
            match cond.evaluate(self.facts) {
                Truth::True => continue,
                Truth::False => return None,
                Truth::Unknown => {}
            }

            let mut satisfiable = false;
            if rules.is_askable(&cond.fact) {
                push_unique(&mut leaves, &cond.fact);
                satisfiable = true;
            }

            for (deriver_index, deriver) in rules.rules_deriving(&cond.fact) {
                if self.is_retired(deriver_index) {
                    continue;
                }
                let Conclusion::Fact { value, .. } = &deriver.conclusion else {
                    continue;
                };
                if !cond.predicate.accepts(value) {
                    continue;
                }
                match deriver.evaluate(self.facts) {
                    Truth::False => {}
                    Truth::True => satisfiable = true,
                    Truth::Unknown => {
                        if let Some(sub) = self.explore(deriver_index, depth + 1) {
                            for fact in &sub {
                                push_unique(&mut leaves, fact);
                            }
                            satisfiable = true;
                        }
                    }
                }
            }

            if !satisfiable {
                return None;
            }
        }
        Some(leaves)
    }
}

fn push_unique(list: &mut Vec<String>, fact: &str) {
    if !list.iter().any(|f| f == fact) {
        list.push(fact.to_string());
    }
}
