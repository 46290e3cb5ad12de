//! Diagnosis aggregator: blend symbolic scores with the classifier
//! distribution into one ranked, explained diagnosis.
//!
//! `final_score(c) = alpha * symbolic(c) + (1 - alpha) * classifier(c)`.
//! Ranking is descending by final score, then by the number of corroborating
//! rules, then by category name.

use serde::Serialize;

use crate::category::Category;
use crate::classify::Distribution;
use crate::infer::{NeededFact, ScoreNormalization, SymbolicScores, Vote};
use crate::rules::RuleBase;
use crate::trace::{ClassifierStatus, ExplanationTrace};

/// Configuration for score blending.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Weight of the symbolic score (default: 0.7).
    pub alpha: f64,
    /// Classifier probability at which the text signal is mentioned in the
    /// explanation (default: 0.15).
    pub material_signal: f64,
    pub normalization: ScoreNormalization,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            material_signal: 0.15,
            normalization: ScoreNormalization::NoisyOr,
        }
    }
}

/// One ranked category with its justification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCategory {
    pub category: Category,
    pub final_score: f64,
    pub symbolic_score: f64,
    pub classifier_score: f64,
    /// Human-readable lines: supporting derivations, each vote, then the
    /// classifier note when the text signal was material.
    pub explanation: Vec<String>,
    /// Ids of the category rules that voted, in firing order.
    pub contributing_rules: Vec<String>,
    pub cause: Option<String>,
    pub solutions: Vec<String>,
}

/// Outcome of a diagnosis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Diagnosis {
    /// At least one category has evidence.
    Ranked {
        ranked: Vec<RankedCategory>,
        /// Follow-up questions when the top score is below the confidence
        /// threshold; empty otherwise.
        needed_facts: Vec<NeededFact>,
    },
    /// No rule voted and the classifier produced no distribution.
    InsufficientInformation {
        needed_facts: Vec<NeededFact>,
        classifier: ClassifierStatus,
    },
}

impl Diagnosis {
    pub fn ranked(&self) -> &[RankedCategory] {
        match self {
            Self::Ranked { ranked, .. } => ranked,
            Self::InsufficientInformation { .. } => &[],
        }
    }

    pub fn top(&self) -> Option<&RankedCategory> {
        self.ranked().first()
    }

    pub fn needed_facts(&self) -> &[NeededFact] {
        match self {
            Self::Ranked { needed_facts, .. } | Self::InsufficientInformation { needed_facts, .. } => {
                needed_facts
            }
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::InsufficientInformation { .. })
    }
}

/// Blends the two evidence sources. Pure: identical inputs give identical
/// rankings.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Rank every category that received a vote or a classifier entry,
    /// including those whose blended score comes out at zero.
    pub fn rank(
        &self,
        rules: &RuleBase,
        scores: &SymbolicScores,
        classifier: Option<&Distribution>,
        trace: &ExplanationTrace,
    ) -> Vec<RankedCategory> {
        let alpha = self.config.alpha;
        let mut ranked: Vec<RankedCategory> = Category::ALL
            .into_iter()
            .filter_map(|category| {
                let symbolic = scores.normalized(category, self.config.normalization);
                let ml = classifier.map_or(0.0, |d| d.get(category));
                let final_score = alpha * symbolic + (1.0 - alpha) * ml;
                let rated = classifier
                    .is_some_and(|d| d.scores().iter().any(|s| s.category == category));
                if scores.rule_count(category) == 0 && !rated {
                    return None;
                }
                Some(self.explain(
                    rules,
                    Scored {
                        category,
                        final_score,
                        symbolic,
                        ml,
                    },
                    scores,
                    trace,
                ))
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then_with(|| b.contributing_rules.len().cmp(&a.contributing_rules.len()))
                .then_with(|| a.category.name().cmp(b.category.name()))
        });

        tracing::debug!(
            ranked = ranked.len(),
            top = ?ranked.first().map(|r| r.category),
            "categories ranked"
        );
        ranked
    }

    fn explain(
        &self,
        rules: &RuleBase,
        scored: Scored,
        scores: &SymbolicScores,
        trace: &ExplanationTrace,
    ) -> RankedCategory {
        let Scored {
            category,
            final_score,
            symbolic,
            ml,
        } = scored;
        let votes = scores.votes(category);
        let mut explanation: Vec<String> = Vec::new();
        let mut cited: Vec<usize> = Vec::new();

        for vote in votes {
            let Some(entry) = trace.entries().iter().find(|e| e.step == vote.step) else {
                continue;
            };
            for support in trace.support_of(entry) {
                if !cited.contains(&support.step) {
                    cited.push(support.step);
                    explanation.push(format!("[{}] {}", support.rule_id, support.explanation));
                }
            }
            explanation.push(vote_line(vote, &entry.explanation, entry.fully_observed()));
        }

        if ml >= self.config.material_signal {
            if votes.is_empty() {
                explanation.push(format!(
                    "Text classifier rates {} at {:.2}; no rule fired for this category, \
                     so this ranking rests on the text signal only",
                    category.name(),
                    ml
                ));
            } else {
                explanation.push(format!(
                    "Text classifier also rates {} at {:.2}",
                    category.name(),
                    ml
                ));
            }
        }

        let strongest = scores
            .strongest(category)
            .and_then(|v| rules.rule(&v.rule_id));
        let cause = strongest.and_then(|r| r.cause.clone());
        let solutions = match strongest {
            Some(rule) if !rule.solutions.is_empty() => rule.solutions.clone(),
            _ => general_solutions(category),
        };

        RankedCategory {
            category,
            final_score,
            symbolic_score: symbolic,
            classifier_score: ml,
            explanation,
            contributing_rules: votes.iter().map(|v| v.rule_id.clone()).collect(),
            cause,
            solutions,
        }
    }
}

fn general_solutions(category: Category) -> Vec<String> {
    category
        .general_solutions()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

struct Scored {
    category: Category,
    final_score: f64,
    symbolic: f64,
    ml: f64,
}

fn vote_line(vote: &Vote, explanation: &str, observed: bool) -> String {
    if observed || vote.damping >= 1.0 {
        format!("[{}] {}", vote.rule_id, explanation)
    } else {
        format!(
            "[{}] {} (weight {:.2}, damped x{:.2}: relies on inferred facts)",
            vote.rule_id, explanation, vote.weight, vote.damping
        )
    }
}
