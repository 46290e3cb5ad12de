//! Category voting: tally fired category rules into the symbolic score.
//!
//! Each category firing in the trace votes its rule confidence, damped when
//! the rule leaned on facts that were derived or defaulted rather than
//! reported by the user. Votes for a category are then normalized into
//! [0, 1] so they can be blended with the classifier distribution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::fact::FactSource;
use crate::trace::{ExplanationTrace, TraceEntry};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How a category's votes are folded into one score in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalization {
    /// `1 - (1-w1)(1-w2)...(1-wN)`: independent corroborating evidence.
    #[default]
    NoisyOr,
    /// Summed weight relative to the strongest category's sum.
    Max,
}

/// Configuration for vote tallying.
#[derive(Debug, Clone)]
pub struct VotingConfig {
    /// Damping when a rule relied on a derived fact (default: 0.8).
    pub derived_damping: f64,
    /// Damping when a rule relied on a default fact (default: 0.5).
    pub default_damping: f64,
    /// Firings with confidence below this do not vote (default: 0.0).
    pub min_vote_confidence: f64,
    pub normalization: ScoreNormalization,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            derived_damping: 0.8,
            default_damping: 0.5,
            min_vote_confidence: 0.0,
            normalization: ScoreNormalization::NoisyOr,
        }
    }
}

impl VotingConfig {
    /// Evidence factor for a fact's provenance.
    pub fn damping_for(&self, source: FactSource) -> f64 {
        match source {
            FactSource::User => 1.0,
            FactSource::Derived => self.derived_damping,
            FactSource::Default => self.default_damping,
        }
    }

    /// The weakest provenance among the entry's satisfied conditions decides.
    fn damping_of(&self, entry: &TraceEntry) -> f64 {
        entry
            .satisfied
            .iter()
            .map(|c| self.damping_for(c.source))
            .fold(1.0, f64::min)
    }
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// One category rule's contribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vote {
    pub rule_id: String,
    /// Trace step of the firing.
    pub step: usize,
    /// Confidence times damping.
    pub weight: f64,
    pub damping: f64,
}

/// Accumulated votes per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SymbolicScores {
    votes: BTreeMap<Category, Vec<Vote>>,
}

impl SymbolicScores {
    /// Tally every category firing in `trace`.
    pub fn tally(trace: &ExplanationTrace, config: &VotingConfig) -> Self {
        let mut votes: BTreeMap<Category, Vec<Vote>> = BTreeMap::new();
        for entry in trace.entries() {
            let Some(category) = entry.conclusion.category() else {
                continue;
            };
            if entry.confidence < config.min_vote_confidence {
                tracing::debug!(rule = %entry.rule_id, "vote below minimum confidence");
                continue;
            }
            let damping = config.damping_of(entry);
            votes.entry(category).or_default().push(Vote {
                rule_id: entry.rule_id.clone(),
                step: entry.step,
                weight: entry.confidence * damping,
                damping,
            });
        }
        Self { votes }
    }

    pub fn votes(&self, category: Category) -> &[Vote] {
        self.votes.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Categories with at least one vote, in category order.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.votes.keys().copied()
    }

    /// Raw sum of vote weights.
    pub fn total(&self, category: Category) -> f64 {
        self.votes(category).iter().map(|v| v.weight).sum()
    }

    pub fn rule_count(&self, category: Category) -> usize {
        self.votes(category).len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Score for `category` in [0, 1].
    pub fn normalized(&self, category: Category, normalization: ScoreNormalization) -> f64 {
        match normalization {
            ScoreNormalization::NoisyOr => {
                let weights: Vec<f64> = self.votes(category).iter().map(|v| v.weight).collect();
                noisy_or(&weights)
            }
            ScoreNormalization::Max => {
                let best = self
                    .categories()
                    .map(|c| self.total(c))
                    .fold(0.0_f64, f64::max);
                if best <= 0.0 {
                    0.0
                } else {
                    self.total(category) / best
                }
            }
        }
    }

    /// The vote with the highest weight; the earlier firing wins ties.
    pub fn strongest(&self, category: Category) -> Option<&Vote> {
        self.votes(category)
            .iter()
            .reduce(|best, v| if v.weight > best.weight { v } else { best })
    }
}

/// Noisy-OR combination of independent weights, each clamped to [0, 1].
pub fn noisy_or(weights: &[f64]) -> f64 {
    if weights.is_empty() {
        return 0.0;
    }
    let product: f64 = weights
        .iter()
        .map(|w| 1.0 - w.clamp(0.0, 1.0))
        .product();
    1.0 - product
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::FactValue;
    use crate::rules::Conclusion;
    use crate::trace::SatisfiedCondition;

    fn firing(rule_id: &str, category: Category, confidence: f64, sources: &[FactSource]) -> TraceEntry {
        TraceEntry {
            step: 0,
            pass: 1,
            rule_id: rule_id.into(),
            satisfied: sources
                .iter()
                .enumerate()
                .map(|(i, source)| SatisfiedCondition {
                    fact: format!("f{i}"),
                    clause: format!("f{i} = true"),
                    value: FactValue::Bool(true),
                    source: *source,
                })
                .collect(),
            conclusion: Conclusion::Category { category },
            confidence,
            explanation: String::new(),
        }
    }

    #[test]
    fn noisy_or_combines_independent_evidence() {
        assert_eq!(noisy_or(&[]), 0.0);
        assert!((noisy_or(&[0.8]) - 0.8).abs() < 1e-12);
        assert!((noisy_or(&[0.5, 0.5]) - 0.75).abs() < 1e-12);
        assert!((noisy_or(&[1.5]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn derived_evidence_is_damped() {
        let mut trace = ExplanationTrace::new();
        trace.record(firing("R1", Category::Overheating, 0.8, &[FactSource::User]));
        trace.record(firing(
            "R2",
            Category::Overheating,
            0.5,
            &[FactSource::User, FactSource::Derived],
        ));
        let scores = SymbolicScores::tally(&trace, &VotingConfig::default());

        let votes = scores.votes(Category::Overheating);
        assert_eq!(votes.len(), 2);
        assert_eq!(votes[0].damping, 1.0);
        assert!((votes[1].weight - 0.4).abs() < 1e-12);
        assert!((scores.total(Category::Overheating) - 1.2).abs() < 1e-12);
        assert_eq!(scores.strongest(Category::Overheating).unwrap().rule_id, "R1");
    }

    #[test]
    fn weakest_provenance_decides_damping() {
        let mut trace = ExplanationTrace::new();
        trace.record(firing(
            "R1",
            Category::AppCrashes,
            1.0,
            &[FactSource::Derived, FactSource::Default],
        ));
        let scores = SymbolicScores::tally(&trace, &VotingConfig::default());
        assert_eq!(scores.votes(Category::AppCrashes)[0].damping, 0.5);
    }

    #[test]
    fn low_confidence_votes_are_skipped() {
        let mut trace = ExplanationTrace::new();
        trace.record(firing("R1", Category::AudioProblems, 0.1, &[FactSource::User]));
        let config = VotingConfig {
            min_vote_confidence: 0.2,
            ..VotingConfig::default()
        };
        assert!(SymbolicScores::tally(&trace, &config).is_empty());
    }

    #[test]
    fn max_normalization_is_relative_to_strongest_category() {
        let mut trace = ExplanationTrace::new();
        trace.record(firing("R1", Category::NetworkIssues, 0.8, &[FactSource::User]));
        trace.record(firing("R2", Category::SlowPerformance, 0.4, &[FactSource::User]));
        let scores = SymbolicScores::tally(&trace, &VotingConfig::default());
        assert_eq!(scores.normalized(Category::NetworkIssues, ScoreNormalization::Max), 1.0);
        assert!((scores.normalized(Category::SlowPerformance, ScoreNormalization::Max) - 0.5).abs() < 1e-12);
        assert_eq!(scores.normalized(Category::AudioProblems, ScoreNormalization::Max), 0.0);
    }
}
