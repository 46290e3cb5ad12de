//! Forward-chaining rule engine.
//!
//! Runs the rule base against the session's facts to a fixed point or the
//! configured pass cap, asserting derived facts with full provenance and
//! recording every firing in the explanation trace.
//!
//! Each pass evaluates all pending rules against the facts as they stood at
//! the start of the pass. When several satisfied rules would assert different
//! values for the same fact, the one with the highest [`precedence`] fires and
//! the others are overruled. A stronger rule that only becomes satisfied in a
//! later pass overrules the earlier derivation and the run is replayed
//! without it, so no firing is left resting on a value that was replaced.

use std::collections::HashMap;

use crate::error::{FactError, InferError, InferResult};
use crate::fact::{FactSource, FactStore, FactValue, Truth};
use crate::rules::{Conclusion, Rule, RuleBase};
use crate::trace::{ExplanationTrace, SatisfiedCondition, TraceEntry, render_explanation};

use super::{Agenda, precedence};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for forward chaining.
#[derive(Debug, Clone)]
pub struct ForwardConfig {
    /// Maximum passes, including the final pass that confirms the fixed
    /// point (default: 64).
    pub max_iterations: usize,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self { max_iterations: 64 }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A fact asserted by a rule firing.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFact {
    pub fact: String,
    pub value: FactValue,
    pub rule_id: String,
    pub pass: usize,
}

/// Why a satisfied rule did not fire.
#[derive(Debug, Clone, PartialEq)]
pub enum SuppressionReason {
    /// A higher-precedence rule concluded a different value for the fact.
    Overruled { by: String },
    /// The user asserted a different value for the fact.
    UserFact,
}

/// A satisfied rule that was retired without firing.
#[derive(Debug, Clone, PartialEq)]
pub struct Suppression {
    pub rule_id: String,
    pub fact: String,
    pub reason: SuppressionReason,
}

/// Result of one forward-chaining run.
#[derive(Debug, Clone, Default)]
pub struct ForwardResult {
    pub derived: Vec<DerivedFact>,
    /// Ids of rules fired in this run, in firing order.
    pub fired: Vec<String>,
    pub suppressed: Vec<Suppression>,
    /// Passes in the final attempt.
    pub iterations: usize,
    /// Times the run started over after replacing one of its own derivations.
    pub restarts: usize,
    pub reached_fixpoint: bool,
}

/// How an attempt ended.
enum Pass {
    Fixpoint,
    Exhausted,
    /// Rule `by` outranks rule `holder`, which derived `fact` earlier in the run.
    Superseded {
        holder: usize,
        by: usize,
        fact: String,
    },
}

// ---------------------------------------------------------------------------
// Forward chainer
// ---------------------------------------------------------------------------

/// Forward-chaining engine over a shared rule base.
pub struct ForwardChainer<'a> {
    rules: &'a RuleBase,
    config: ForwardConfig,
}

impl<'a> ForwardChainer<'a> {
    pub fn new(rules: &'a RuleBase, config: ForwardConfig) -> Self {
        Self { rules, config }
    }

    /// Run to a fixed point.
    ///
    /// Rules already retired in `agenda` are skipped, so calling `run` again
    /// without new facts derives nothing. Fails with
    /// [`InferError::CycleGuardExceeded`] when the pass cap is reached
    /// before a pass finds nothing left to fire.
    ///
    /// When a later pass replaces a value derived earlier in the run, every
    /// firing of the run may have matched the old value. The rule that held
    /// it is overruled and the run starts again from the facts, firings and
    /// trace it began with. Each restart retires one more rule, so restarts
    /// are bounded by the size of the rule base.
    pub fn run(
        &self,
        facts: &mut FactStore,
        agenda: &mut Agenda,
        trace: &mut ExplanationTrace,
    ) -> InferResult<ForwardResult> {
        let start_facts = facts.clone();
        let start_fired = agenda.fired.clone();
        let start_steps = trace.len();
        let mut result = ForwardResult::default();

        loop {
            match self.attempt(facts, agenda, trace, &mut result) {
                Pass::Fixpoint => {
                    result.reached_fixpoint = true;
                    break;
                }
                Pass::Exhausted => break,
                Pass::Superseded { holder, by, fact } => {
                    let rules = self.rules.rules();
                    tracing::debug!(
                        holder = %rules[holder].id,
                        by = %rules[by].id,
                        fact = %fact,
                        "derived value replaced; restarting run"
                    );
                    *facts = start_facts.clone();
                    agenda.rewind(start_fired.clone());
                    trace.truncate(start_steps);
                    result.derived.clear();
                    result.fired.clear();
                    result.restarts += 1;
                    self.overrule(agenda, &mut result, holder, &fact, &rules[by].id);
                }
            }
        }

        tracing::info!(
            passes = result.iterations,
            restarts = result.restarts,
            fired = result.fired.len(),
            derived = result.derived.len(),
            suppressed = result.suppressed.len(),
            fixpoint = result.reached_fixpoint,
            "forward chaining complete"
        );

        if !result.reached_fixpoint {
            return Err(InferError::CycleGuardExceeded {
                max_iterations: self.config.max_iterations,
            });
        }
        Ok(result)
    }

    /// Passes from the current state until nothing is left to fire, the pass
    /// cap is hit, or a derivation of this run is replaced.
    fn attempt(
        &self,
        facts: &mut FactStore,
        agenda: &mut Agenda,
        trace: &mut ExplanationTrace,
        result: &mut ForwardResult,
    ) -> Pass {
        let rules = self.rules.rules();

        for pass in 1..=self.config.max_iterations {
            result.iterations = pass;

            let candidates = self.candidates(facts, agenda);
            if candidates.is_empty() {
                return Pass::Fixpoint;
            }

            // Winner per fact target among this pass's candidates.
            let mut winners: HashMap<&str, usize> = HashMap::new();
            for &i in &candidates {
                if let Some(target) = rules[i].conclusion.fact_target() {
                    winners
                        .entry(target)
                        .and_modify(|w| {
                            if precedence((i, &rules[i]), (*w, &rules[*w])).is_gt() {
                                *w = i;
                            }
                        })
                        .or_insert(i);
                }
            }

            // Snapshot what each candidate matched before anything changes.
            let snapshots: Vec<(usize, Vec<SatisfiedCondition>)> = candidates
                .iter()
                .map(|&i| (i, satisfied_conditions(&rules[i], facts)))
                .collect();

            for (i, satisfied) in snapshots {
                let rule = &rules[i];
                match &rule.conclusion {
                    Conclusion::Category { .. } => {
                        agenda.mark_fired(i);
                        record_firing(trace, result, rule, satisfied, pass);
                    }
                    Conclusion::Fact { target, value } => {
                        let winner = winners.get(target.as_str()).copied().unwrap_or(i);
                        if winner != i {
                            if concluded_value(&rules[winner]).is_some_and(|w| w.matches(value)) {
                                // Same value as the winner; nothing to add.
                                continue;
                            }
                            self.overrule(agenda, result, i, target, &rules[winner].id);
                            continue;
                        }

                        if let Some(holder) = self.deriving_rule(facts, target) {
                            if precedence((holder, &rules[holder]), (i, rule)).is_gt() {
                                self.overrule(agenda, result, i, target, &rules[holder].id);
                                continue;
                            }
                            if result.fired.contains(&rules[holder].id) {
                                return Pass::Superseded {
                                    holder,
                                    by: i,
                                    fact: target.clone(),
                                };
                            }
                        }

                        match facts.assert_derived(target, value.clone(), &rule.id) {
                            Ok(_) => {
                                agenda.mark_fired(i);
                                result.derived.push(DerivedFact {
                                    fact: target.clone(),
                                    value: value.clone(),
                                    rule_id: rule.id.clone(),
                                    pass,
                                });
                                record_firing(trace, result, rule, satisfied, pass);
                            }
                            Err(FactError::Conflict { .. }) => {
                                tracing::debug!(
                                    rule = %rule.id,
                                    fact = %target,
                                    "conclusion blocked by user fact"
                                );
                                agenda.mark_suppressed(i);
                                result.suppressed.push(Suppression {
                                    rule_id: rule.id.clone(),
                                    fact: target.clone(),
                                    reason: SuppressionReason::UserFact,
                                });
                            }
                            Err(FactError::EmptyId) => {
                                agenda.mark_suppressed(i);
                            }
                        }
                    }
                }
            }
        }
        Pass::Exhausted
    }

    /// Pending rules whose conditions all hold and whose conclusion would
    /// change something, in rule order.
    fn candidates(&self, facts: &FactStore, agenda: &Agenda) -> Vec<usize> {
        self.rules
            .rules()
            .iter()
            .enumerate()
            .filter(|(i, _)| !agenda.is_retired(*i))
            .filter(|(_, rule)| rule.evaluate(facts) == Truth::True)
            .filter(|(_, rule)| match &rule.conclusion {
                Conclusion::Fact { target, value } => {
                    !facts.value(target).is_some_and(|v| v.matches(value))
                }
                Conclusion::Category { .. } => true,
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Rule-order index of the rule currently holding a derived value for `fact`.
    fn deriving_rule(&self, facts: &FactStore, fact: &str) -> Option<usize> {
        let existing = facts.get(fact)?;
        if existing.source != FactSource::Derived {
            return None;
        }
        existing
            .rule
            .as_deref()
            .and_then(|id| self.rules.position(id))
    }

    fn overrule(
        &self,
        agenda: &mut Agenda,
        result: &mut ForwardResult,
        rule_index: usize,
        fact: &str,
        by: &str,
    ) {
        let rule_id = &self.rules.rules()[rule_index].id;
        tracing::debug!(rule = %rule_id, fact, by, "conclusion overruled");
        agenda.mark_suppressed(rule_index);
        result.suppressed.push(Suppression {
            rule_id: rule_id.clone(),
            fact: fact.to_string(),
            reason: SuppressionReason::Overruled { by: by.to_string() },
        });
    }
}

fn concluded_value(rule: &Rule) -> Option<&FactValue> {
    match &rule.conclusion {
        Conclusion::Fact { value, .. } => Some(value),
        Conclusion::Category { .. } => None,
    }
}

fn satisfied_conditions(rule: &Rule, facts: &FactStore) -> Vec<SatisfiedCondition> {
    rule.conditions
        .iter()
        .filter_map(|cond| {
            let fact = facts.get(&cond.fact)?;
            Some(SatisfiedCondition {
                fact: cond.fact.clone(),
                clause: cond.to_string(),
                value: fact.value.clone(),
                source: fact.source,
            })
        })
        .collect()
}

fn record_firing(
    trace: &mut ExplanationTrace,
    result: &mut ForwardResult,
    rule: &Rule,
    satisfied: Vec<SatisfiedCondition>,
    pass: usize,
) {
    tracing::debug!(rule = %rule.id, pass, conclusion = %rule.conclusion, "rule fired");
    let explanation = render_explanation(rule, &satisfied);
    trace.record(TraceEntry {
        step: 0,
        pass,
        rule_id: rule.id.clone(),
        satisfied,
        conclusion: rule.conclusion.clone(),
        confidence: rule.confidence,
        explanation,
    });
    result.fired.push(rule.id.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::rules::{Condition, Symptom};

    fn symptoms() -> Vec<Symptom> {
        ["a", "b", "c", "device_hot", "battery_drains_fast"]
            .iter()
            .map(|id| Symptom::new(*id, format!("{id}?"), &["yes", "no"]))
            .collect()
    }

    fn derive(id: &str, from: &str, to: &str, value: bool) -> Rule {
        Rule::new(
            id,
            Conclusion::Fact {
                target: to.into(),
                value: value.into(),
            },
        )
        .when(Condition::is(from, true))
    }

    fn vote(id: &str, from: &str, category: Category) -> Rule {
        Rule::new(id, Conclusion::Category { category }).when(Condition::is(from, true))
    }

    fn user(facts: &mut FactStore, id: &str) {
        facts.assert(id, true.into(), FactSource::User).unwrap();
    }

    fn run(rb: &RuleBase, facts: &mut FactStore) -> (ForwardResult, ExplanationTrace) {
        let mut agenda = Agenda::new();
        let mut trace = ExplanationTrace::new();
        let result = ForwardChainer::new(rb, ForwardConfig::default())
            .run(facts, &mut agenda, &mut trace)
            .unwrap();
        (result, trace)
    }

    #[test]
    fn chains_through_derived_facts() {
        let rb = RuleBase::new(
            symptoms(),
            vec![
                derive("R1", "a", "x", true),
                derive("R2", "x", "y", true),
                vote("R3", "y", Category::Overheating),
            ],
        )
        .unwrap();
        let mut facts = FactStore::new();
        user(&mut facts, "a");

        let (result, trace) = run(&rb, &mut facts);
        assert!(result.reached_fixpoint);
        assert_eq!(result.fired, vec!["R1", "R2", "R3"]);
        assert_eq!(facts.get("y").unwrap().source, FactSource::Derived);
        assert_eq!(facts.get("y").unwrap().rule.as_deref(), Some("R2"));
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.entries()[2].pass, 3);
    }

    #[test]
    fn unknown_conditions_do_not_fire() {
        let rb = RuleBase::new(symptoms(), vec![vote("R1", "a", Category::AppCrashes)]).unwrap();
        let mut facts = FactStore::new();
        let (result, trace) = run(&rb, &mut facts);
        assert!(result.fired.is_empty());
        assert!(trace.is_empty());
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn conflict_resolved_by_priority() {
        let rb = RuleBase::new(
            symptoms(),
            vec![
                derive("LOW", "a", "x", true).with_priority(1),
                derive("HIGH", "b", "x", false).with_priority(5),
            ],
        )
        .unwrap();
        let mut facts = FactStore::new();
        user(&mut facts, "a");
        user(&mut facts, "b");

        let (result, _) = run(&rb, &mut facts);
        assert_eq!(facts.value("x"), Some(&FactValue::Bool(false)));
        assert_eq!(result.fired, vec!["HIGH"]);
        assert_eq!(
            result.suppressed[0].reason,
            SuppressionReason::Overruled { by: "HIGH".into() }
        );
    }

    #[test]
    fn conflict_tie_broken_by_confidence_then_order() {
        let rb = RuleBase::new(
            symptoms(),
            vec![
                derive("FIRST", "a", "x", true).with_confidence(0.5),
                derive("SURE", "b", "x", false).with_confidence(0.9),
                derive("LATE", "c", "x", true).with_confidence(0.9),
            ],
        )
        .unwrap();
        let mut facts = FactStore::new();
        user(&mut facts, "a");
        user(&mut facts, "b");
        user(&mut facts, "c");

        let (result, _) = run(&rb, &mut facts);
        assert_eq!(facts.value("x"), Some(&FactValue::Bool(false)));
        assert_eq!(result.fired, vec!["SURE"]);
        assert_eq!(result.suppressed.len(), 2);
    }

    #[test]
    fn later_pass_cannot_override_stronger_earlier_derivation() {
        let rb = RuleBase::new(
            symptoms(),
            vec![
                derive("STRONG", "a", "x", true).with_priority(9),
                derive("BRIDGE", "b", "z", true),
                derive("WEAK", "z", "x", false),
            ],
        )
        .unwrap();
        let mut facts = FactStore::new();
        user(&mut facts, "a");
        user(&mut facts, "b");

        let (result, _) = run(&rb, &mut facts);
        assert_eq!(facts.value("x"), Some(&FactValue::Bool(true)));
        assert!(result.suppressed.iter().any(|s| s.rule_id == "WEAK"));
    }

    #[test]
    fn replaced_derivation_withdraws_votes_that_matched_it() {
        let rb = RuleBase::new(
            symptoms(),
            vec![
                derive("WEAK", "a", "x", false),
                derive("BRIDGE", "b", "z", true),
                Rule::new(
                    "VOTE_FALSE",
                    Conclusion::Category {
                        category: Category::AppCrashes,
                    },
                )
                .when(Condition::is("x", false)),
                derive("STRONG", "z", "x", true).with_priority(9),
            ],
        )
        .unwrap();
        let mut facts = FactStore::new();
        user(&mut facts, "a");
        user(&mut facts, "b");

        let (result, trace) = run(&rb, &mut facts);
        assert_eq!(facts.value("x"), Some(&FactValue::Bool(true)));
        assert_eq!(facts.get("x").unwrap().rule.as_deref(), Some("STRONG"));
        assert_eq!(result.fired, vec!["BRIDGE", "STRONG"]);
        assert_eq!(result.restarts, 1);
        assert_eq!(
            result.suppressed,
            vec![Suppression {
                rule_id: "WEAK".into(),
                fact: "x".into(),
                reason: SuppressionReason::Overruled {
                    by: "STRONG".into()
                },
            }]
        );
        assert_eq!(trace.votes_for(Category::AppCrashes).count(), 0);
        assert!(trace.entries().iter().all(|e| e.rule_id != "WEAK"));
        assert_eq!(
            trace.entries().iter().map(|e| e.step).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn replay_keeps_firings_from_earlier_runs() {
        let rb = RuleBase::new(
            symptoms(),
            vec![
                vote("EARLY", "c", Category::Overheating),
                derive("WEAK", "a", "x", false),
                derive("BRIDGE", "b", "z", true),
                derive("STRONG", "z", "x", true).with_priority(9),
            ],
        )
        .unwrap();
        let mut facts = FactStore::new();
        user(&mut facts, "c");
        let mut agenda = Agenda::new();
        let mut trace = ExplanationTrace::new();
        let chainer = ForwardChainer::new(&rb, ForwardConfig::default());
        chainer.run(&mut facts, &mut agenda, &mut trace).unwrap();

        user(&mut facts, "a");
        user(&mut facts, "b");
        let result = chainer.run(&mut facts, &mut agenda, &mut trace).unwrap();
        assert_eq!(result.restarts, 1);
        assert_eq!(result.fired, vec!["BRIDGE", "STRONG"]);
        assert!(agenda.has_fired(0));
        assert_eq!(trace.entries()[0].rule_id, "EARLY");
        assert_eq!(trace.len(), 3);
    }

    #[test]
    fn user_fact_blocks_derivation() {
        let rb = RuleBase::new(symptoms(), vec![derive("R1", "a", "b", false)]).unwrap();
        let mut facts = FactStore::new();
        user(&mut facts, "a");
        user(&mut facts, "b");

        let (result, trace) = run(&rb, &mut facts);
        assert_eq!(facts.value("b"), Some(&FactValue::Bool(true)));
        assert_eq!(result.suppressed[0].reason, SuppressionReason::UserFact);
        assert!(trace.is_empty());
    }

    #[test]
    fn second_run_is_idempotent() {
        let rb = RuleBase::new(
            symptoms(),
            vec![derive("R1", "a", "x", true), vote("R2", "x", Category::Overheating)],
        )
        .unwrap();
        let mut facts = FactStore::new();
        user(&mut facts, "a");
        let mut agenda = Agenda::new();
        let mut trace = ExplanationTrace::new();
        let chainer = ForwardChainer::new(&rb, ForwardConfig::default());

        let first = chainer.run(&mut facts, &mut agenda, &mut trace).unwrap();
        let second = chainer.run(&mut facts, &mut agenda, &mut trace).unwrap();
        assert_eq!(first.fired.len(), 2);
        assert!(second.derived.is_empty());
        assert!(second.fired.is_empty());
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn deterministic_from_scratch() {
        let rules = vec![
            derive("R1", "a", "x", true),
            derive("R2", "b", "y", true),
            vote("R3", "x", Category::Overheating),
            vote("R4", "y", Category::BatteryIssues),
        ];
        let rb = RuleBase::new(symptoms(), rules).unwrap();
        let runs: Vec<Vec<String>> = (0..3)
            .map(|_| {
                let mut facts = FactStore::new();
                user(&mut facts, "b");
                user(&mut facts, "a");
                run(&rb, &mut facts).0.fired
            })
            .collect();
        assert_eq!(runs[0], vec!["R1", "R2", "R3", "R4"]);
        assert!(runs.iter().all(|r| r == &runs[0]));
    }

    #[test]
    fn iteration_cap_is_reported() {
        let rb = RuleBase::new(
            symptoms(),
            vec![derive("R1", "a", "x", true), derive("R2", "x", "y", true)],
        )
        .unwrap();
        let mut facts = FactStore::new();
        user(&mut facts, "a");
        let mut agenda = Agenda::new();
        let mut trace = ExplanationTrace::new();
        let err = ForwardChainer::new(&rb, ForwardConfig { max_iterations: 1 })
            .run(&mut facts, &mut agenda, &mut trace)
            .unwrap_err();
        assert!(matches!(
            err,
            InferError::CycleGuardExceeded { max_iterations: 1 }
        ));
    }

    #[test]
    fn trace_cites_satisfied_conditions() {
        let rb = RuleBase::new(
            symptoms(),
            vec![
                Rule::new(
                    "R1",
                    Conclusion::Category {
                        category: Category::Overheating,
                    },
                )
                .when(Condition::is("battery_drains_fast", true))
                .when(Condition::is("device_hot", true))
                .with_confidence(0.8),
            ],
        )
        .unwrap();
        let mut facts = FactStore::new();
        user(&mut facts, "battery_drains_fast");
        user(&mut facts, "device_hot");

        let (_, trace) = run(&rb, &mut facts);
        let entry = &trace.entries()[0];
        assert_eq!(entry.rule_id, "R1");
        assert_eq!(entry.satisfied.len(), 2);
        assert!(entry.fully_observed());
        assert!(entry.explanation.contains("device_hot = true"));
    }
}
