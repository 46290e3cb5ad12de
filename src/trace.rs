//! Explanation trace: the ordered record of rule firings in a session.
//!
//! The trace is owned exclusively by the session that produced it. The
//! presentation layer consumes it read-only (it is `Serialize`).

use serde::Serialize;

use crate::category::Category;
use crate::classify::CategoryScore;
use crate::fact::{FactSource, FactValue};
use crate::rules::{Conclusion, Rule};

const DEFAULT_TEMPLATE: &str = "{conclusion} because {conditions}";

/// A condition that held when its rule fired, with the value it matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatisfiedCondition {
    pub fact: String,
    /// The clause as written, e.g. `fan_noise = loud`.
    pub clause: String,
    pub value: FactValue,
    pub source: FactSource,
}

/// One rule firing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    /// Position in firing order, starting at 1.
    pub step: usize,
    /// Forward-chaining pass in which the rule fired, starting at 1.
    pub pass: usize,
    pub rule_id: String,
    pub satisfied: Vec<SatisfiedCondition>,
    pub conclusion: Conclusion,
    pub confidence: f64,
    /// Rendered explanation template.
    pub explanation: String,
}

impl TraceEntry {
    /// Whether every satisfied condition was asserted directly by the user.
    pub fn fully_observed(&self) -> bool {
        self.satisfied.iter().all(|c| c.source == FactSource::User)
    }
}

/// Whether the classifier was consulted and what came of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassifierStatus {
    NotRequested,
    Available { scores: Vec<CategoryScore> },
    Unavailable { reason: String },
}

/// Ordered sequence of firings plus the classifier contribution.
#[derive(Debug, Clone, Serialize)]
pub struct ExplanationTrace {
    entries: Vec<TraceEntry>,
    classifier: ClassifierStatus,
}

impl Default for ExplanationTrace {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            classifier: ClassifierStatus::NotRequested,
        }
    }
}

impl ExplanationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a firing, assigning its step number.
    pub fn record(&mut self, mut entry: TraceEntry) -> &TraceEntry {
        entry.step = self.entries.len() + 1;
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Firings that voted for `category`, in firing order.
    pub fn votes_for(&self, category: Category) -> impl Iterator<Item = &TraceEntry> + '_ {
        self.entries
            .iter()
            .filter(move |e| e.conclusion.category() == Some(category))
    }

    /// The entry that most recently asserted `fact` with `value`.
    pub fn derivation_of(&self, fact: &str, value: &FactValue) -> Option<&TraceEntry> {
        self.derivation_before(self.entries.len() + 1, fact, value)
    }

    fn derivation_before(
        &self,
        step: usize,
        fact: &str,
        value: &FactValue,
    ) -> Option<&TraceEntry> {
        self.entries.iter().rev().find(|e| {
            e.step < step
                && matches!(&e.conclusion, Conclusion::Fact { target, value: v }
                    if target == fact && v.matches(value))
        })
    }

    /// The firings that derived the facts `entry` relied on, transitively,
    /// in firing order.
    pub fn support_of<'a>(&'a self, entry: &'a TraceEntry) -> Vec<&'a TraceEntry> {
        let mut support: Vec<&TraceEntry> = Vec::new();
        let derived = |e: &'a TraceEntry| {
            e.satisfied
                .iter()
                .filter(|c| c.source == FactSource::Derived)
                .map(move |c| (e.step, c))
        };
        let mut pending: Vec<(usize, &SatisfiedCondition)> = derived(entry).collect();
        while let Some((step, cond)) = pending.pop() {
            let Some(found) = self.derivation_before(step, &cond.fact, &cond.value) else {
                continue;
            };
            if support.iter().any(|s| s.step == found.step) {
                continue;
            }
            pending.extend(derived(found));
            support.push(found);
        }
        support.sort_by_key(|e| e.step);
        support
    }

    pub fn classifier(&self) -> &ClassifierStatus {
        &self.classifier
    }

    pub fn set_classifier(&mut self, status: ClassifierStatus) {
        self.classifier = status;
    }

    /// Drop all firings; used when user facts change and derivations must
    /// be recomputed.
    pub fn clear_firings(&mut self) {
        self.entries.clear();
    }

    /// Drop every firing after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}

/// Fill in a rule's explanation template.
///
/// Recognised placeholders: `{conditions}`, `{confidence}`, `{cause}`,
/// `{conclusion}`, `{rule}` and `{<fact id>}` for any satisfied condition.
/// Unknown placeholders are left as written.
pub fn render_explanation(rule: &Rule, satisfied: &[SatisfiedCondition]) -> String {
    let template = rule.explanation.as_deref().unwrap_or(DEFAULT_TEMPLATE);
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = after[..close].trim();
        match key {
            "conditions" => {
                let clauses: Vec<String> = satisfied
                    .iter()
                    .map(|c| format!("{} = {}", c.fact, c.value))
                    .collect();
                out.push_str(&clauses.join(" and "));
            }
            "confidence" => out.push_str(&format!("{:.2}", rule.confidence)),
            "cause" => match &rule.cause {
                Some(cause) => out.push_str(cause),
                None => out.push_str(&rule.conclusion.to_string()),
            },
            "conclusion" => out.push_str(&rule.conclusion.to_string()),
            "rule" => out.push_str(&rule.id),
            fact => match satisfied.iter().find(|c| c.fact == fact) {
                Some(c) => out.push_str(&c.value.to_string()),
                None => {
                    out.push('{');
                    out.push_str(&after[..close]);
                    out.push('}');
                }
            },
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Condition;

    fn satisfied(fact: &str, value: FactValue, source: FactSource) -> SatisfiedCondition {
        SatisfiedCondition {
            fact: fact.into(),
            clause: format!("{fact} = {value}"),
            value,
            source,
        }
    }

    fn entry(rule_id: &str, conclusion: Conclusion, sat: Vec<SatisfiedCondition>) -> TraceEntry {
        TraceEntry {
            step: 0,
            pass: 1,
            rule_id: rule_id.into(),
            satisfied: sat,
            conclusion,
            confidence: 0.9,
            explanation: String::new(),
        }
    }

    #[test]
    fn default_template_cites_conditions() {
        let rule = Rule::new(
            "R1",
            Conclusion::Category {
                category: Category::Overheating,
            },
        )
        .when(Condition::is("device_hot", true));
        let text = render_explanation(&rule, &[satisfied("device_hot", true.into(), FactSource::User)]);
        assert_eq!(text, "category Overheating because device_hot = true");
    }

    #[test]
    fn template_placeholders_are_filled() {
        let rule = Rule::new(
            "R7",
            Conclusion::Category {
                category: Category::NetworkIssues,
            },
        )
        .with_confidence(0.85)
        .with_cause("VPN connection issue", &[])
        .with_explanation("{cause}: vpn is {vpn_connected} ({confidence}, {rule}) {unknown}");
        let text = render_explanation(
            &rule,
            &[satisfied("vpn_connected", true.into(), FactSource::User)],
        );
        assert_eq!(text, "VPN connection issue: vpn is true (0.85, R7) {unknown}");
    }

    #[test]
    fn unterminated_placeholder_is_kept_verbatim() {
        let rule = Rule::new(
            "R1",
            Conclusion::Category {
                category: Category::AppCrashes,
            },
        )
        .with_explanation("broken {template");
        assert_eq!(render_explanation(&rule, &[]), "broken {template");
    }

    #[test]
    fn record_numbers_steps_and_support_is_transitive() {
        let mut trace = ExplanationTrace::new();
        trace.record(entry(
            "R1",
            Conclusion::Fact {
                target: "x".into(),
                value: true.into(),
            },
            vec![satisfied("a", true.into(), FactSource::User)],
        ));
        trace.record(entry(
            "R2",
            Conclusion::Fact {
                target: "y".into(),
                value: true.into(),
            },
            vec![satisfied("x", true.into(), FactSource::Derived)],
        ));
        let vote = trace
            .record(entry(
                "R3",
                Conclusion::Category {
                    category: Category::Overheating,
                },
                vec![
                    satisfied("y", true.into(), FactSource::Derived),
                    satisfied("b", true.into(), FactSource::User),
                ],
            ))
            .clone();

        assert_eq!(vote.step, 3);
        assert!(!vote.fully_observed());
        let support: Vec<_> = trace.support_of(&vote).iter().map(|e| e.rule_id.clone()).collect();
        assert_eq!(support, vec!["R1", "R2"]);
        assert_eq!(trace.votes_for(Category::Overheating).count(), 1);
    }

    #[test]
    fn support_follows_the_value_that_was_matched() {
        let mut trace = ExplanationTrace::new();
        let fact = |value: bool| Conclusion::Fact {
            target: "x".into(),
            value: value.into(),
        };
        trace.record(entry("SAYS_NO", fact(false), vec![]));
        trace.record(entry("SAYS_YES", fact(true), vec![]));
        trace.record(entry("SAYS_NO_AGAIN", fact(false), vec![]));
        let vote = trace
            .record(entry(
                "VOTE",
                Conclusion::Category {
                    category: Category::AppCrashes,
                },
                vec![satisfied("x", true.into(), FactSource::Derived)],
            ))
            .clone();

        let support: Vec<_> = trace.support_of(&vote).iter().map(|e| e.rule_id.clone()).collect();
        assert_eq!(support, vec!["SAYS_YES"]);
        assert_eq!(
            trace.derivation_of("x", &false.into()).map(|e| e.rule_id.as_str()),
            Some("SAYS_NO_AGAIN")
        );
    }
}
