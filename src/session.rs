//! Diagnostic session: one conversation's facts, trace and classifier result.
//!
//! A session owns its [`FactStore`] and [`ExplanationTrace`] exclusively.
//! The rule base and classifier are shared read-only behind `Arc`s, so any
//! number of sessions can run side by side on different threads.
//!
//! Derived facts are a pure function of the user and default facts. When
//! one of those changes, the next chaining run discards every derivation and
//! recomputes from scratch, which keeps results independent of the order in
//! which answers arrived.

use std::sync::Arc;

use serde::Serialize;

use crate::aggregate::{Aggregator, Diagnosis};
use crate::category::Category;
use crate::classify::{ClassifierAdapter, Distribution};
use crate::config::EngineConfig;
use crate::error::{FactResult, FixwiseResult, InferResult};
use crate::fact::{AssertOutcome, Fact, FactSource, FactStore, FactValue};
use crate::infer::{Agenda, BackwardChainer, ForwardChainer, ForwardResult, NeededFact, SymbolicScores};
use crate::rules::RuleBase;
use crate::trace::{ClassifierStatus, ExplanationTrace};

/// Categories searched for follow-up questions when a ranking is too weak.
const FOLLOW_UP_CATEGORIES: usize = 3;

/// Serializable snapshot of a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionArchive {
    pub facts: Vec<Fact>,
    pub trace: ExplanationTrace,
}

/// One diagnostic conversation.
#[derive(Debug)]
pub struct Session {
    rules: Arc<RuleBase>,
    classifier: Option<Arc<ClassifierAdapter>>,
    config: EngineConfig,
    facts: FactStore,
    agenda: Agenda,
    trace: ExplanationTrace,
    distribution: Option<Distribution>,
    /// User or default facts changed since the last chaining run.
    stale: bool,
}

impl Session {
    pub fn new(
        rules: Arc<RuleBase>,
        classifier: Option<Arc<ClassifierAdapter>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            rules,
            classifier,
            config,
            facts: FactStore::new(),
            agenda: Agenda::new(),
            trace: ExplanationTrace::new(),
            distribution: None,
            stale: false,
        }
    }

    // -----------------------------------------------------------------------
    // Facts
    // -----------------------------------------------------------------------

    /// Record a fact reported by the user.
    pub fn assert_fact(&mut self, id: &str, value: impl Into<FactValue>) -> FactResult<AssertOutcome> {
        self.assert_with_source(id, value.into(), FactSource::User)
    }

    /// Record an assumed value. It never overrides a user answer.
    pub fn assert_default(
        &mut self,
        id: &str,
        value: impl Into<FactValue>,
    ) -> FactResult<AssertOutcome> {
        self.assert_with_source(id, value.into(), FactSource::Default)
    }

    /// Record several user facts, stopping at the first rejection. Returns
    /// how many changed the store.
    pub fn assert_facts<I, K, V>(&mut self, facts: I) -> FactResult<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FactValue>,
    {
        let mut changed = 0;
        for (id, value) in facts {
            if self.assert_fact(id.as_ref(), value)? != AssertOutcome::Unchanged {
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn assert_with_source(
        &mut self,
        id: &str,
        value: FactValue,
        source: FactSource,
    ) -> FactResult<AssertOutcome> {
        let outcome = self.facts.assert(id, value, source)?;
        if outcome != AssertOutcome::Unchanged {
            tracing::debug!(fact = id, %source, ?outcome, "fact asserted");
            self.stale = true;
        }
        Ok(outcome)
    }

    /// Withdraw a user or default fact. Derived facts cannot be retracted
    /// directly; they disappear when their support does.
    pub fn retract_fact(&mut self, id: &str) -> Option<Fact> {
        if self.facts.get(id)?.source == FactSource::Derived {
            return None;
        }
        let fact = self.facts.retract(id)?;
        self.stale = true;
        Some(fact)
    }

    // -----------------------------------------------------------------------
    // Inference
    // -----------------------------------------------------------------------

    /// Forward-chain to a fixed point.
    pub fn forward_chain(&mut self) -> InferResult<ForwardResult> {
        if self.stale {
            let dropped = self.facts.clear_derived();
            self.trace.clear_firings();
            self.agenda.reset();
            self.stale = false;
            tracing::debug!(dropped, "facts changed, recomputing derivations");
        }
        ForwardChainer::new(&self.rules, self.config.forward()).run(
            &mut self.facts,
            &mut self.agenda,
            &mut self.trace,
        )
    }

    /// Questions that could decide `category`, most constraining first.
    pub fn needed_facts(&mut self, category: Category) -> InferResult<Vec<NeededFact>> {
        self.forward_chain()?;
        Ok(self.backward().needed_for(category, &self.facts))
    }

    /// Questions that could decide any category.
    pub fn needed_facts_all(&mut self) -> InferResult<Vec<NeededFact>> {
        self.forward_chain()?;
        Ok(self.backward().needed_for_all(&self.facts))
    }

    fn backward(&self) -> BackwardChainer<'_> {
        BackwardChainer::new(&self.rules, self.config.backward()).with_agenda(&self.agenda)
    }

    // -----------------------------------------------------------------------
    // Classifier
    // -----------------------------------------------------------------------

    /// Run the classifier on `text`. Failures and timeouts are recorded as
    /// unavailable and never abort the session.
    pub fn classify(&mut self, text: &str) -> &ClassifierStatus {
        let status = match &self.classifier {
            None => {
                self.distribution = None;
                ClassifierStatus::Unavailable {
                    reason: "no classifier configured".into(),
                }
            }
            Some(adapter) => match adapter.classify(text) {
                Ok(distribution) => {
                    let scores = distribution.scores().to_vec();
                    self.distribution = Some(distribution);
                    ClassifierStatus::Available { scores }
                }
                Err(e) => {
                    tracing::warn!(
                        classifier = adapter.name(),
                        error = %e,
                        "classifier unavailable, continuing with rule evidence only"
                    );
                    self.distribution = None;
                    ClassifierStatus::Unavailable {
                        reason: e.to_string(),
                    }
                }
            },
        };
        self.trace.set_classifier(status);
        self.trace.classifier()
    }

    // -----------------------------------------------------------------------
    // Diagnosis
    // -----------------------------------------------------------------------

    /// Chain, optionally classify `text`, and aggregate.
    ///
    /// Without `text`, the most recent classification (if any) is reused.
    /// Fails only when forward chaining hits its pass cap.
    pub fn diagnose(&mut self, text: Option<&str>) -> FixwiseResult<Diagnosis> {
        self.forward_chain()?;
        if let Some(text) = text {
            self.classify(text);
        }

        let scores = SymbolicScores::tally(&self.trace, &self.config.voting());
        let ranked = Aggregator::new(self.config.aggregator()).rank(
            &self.rules,
            &scores,
            self.distribution.as_ref(),
            &self.trace,
        );

        // Insufficiency is about missing evidence, not low scores: a vote or a
        // classifier entry ranks its category even at zero.
        let classified = self
            .distribution
            .as_ref()
            .is_some_and(|d| !d.scores().is_empty());
        let diagnosis = if scores.is_empty() && !classified {
            let mut needed = self.backward().needed_for_all(&self.facts);
            needed.truncate(self.config.max_needed_facts);
            Diagnosis::InsufficientInformation {
                needed_facts: needed,
                classifier: self.trace.classifier().clone(),
            }
        } else {
            let top_score = ranked.first().map_or(0.0, |r| r.final_score);
            let needed_facts = if top_score < self.config.confidence_threshold {
                let leading: Vec<Category> = ranked
                    .iter()
                    .take(FOLLOW_UP_CATEGORIES)
                    .map(|r| r.category)
                    .collect();
                let mut needed = self.backward().needed_for_categories(&leading, &self.facts);
                needed.truncate(self.config.max_needed_facts);
                needed
            } else {
                Vec::new()
            };
            Diagnosis::Ranked {
                ranked,
                needed_facts,
            }
        };

        tracing::info!(
            top = ?diagnosis.top().map(|r| r.category),
            score = diagnosis.top().map(|r| r.final_score),
            needed = diagnosis.needed_facts().len(),
            insufficient = diagnosis.is_insufficient(),
            "diagnosis complete"
        );
        Ok(diagnosis)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn trace(&self) -> &ExplanationTrace {
        &self.trace
    }

    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    pub fn rules(&self) -> &RuleBase {
        &self.rules
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Forget everything learned in this conversation.
    pub fn reset(&mut self) {
        self.facts = FactStore::new();
        self.agenda.reset();
        self.trace = ExplanationTrace::new();
        self.distribution = None;
        self.stale = false;
    }

    /// Snapshot facts and trace for the end of the conversation.
    pub fn archive(&self) -> SessionArchive {
        SessionArchive {
            facts: self.facts.known_facts().cloned().collect(),
            trace: self.trace.clone(),
        }
    }
}
