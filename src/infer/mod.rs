//! Inference over the rule base.
//!
//! - **Forward chaining** (`forward`): derive every reachable fact and category
//!   vote from the known facts, resolving conflicting conclusions.
//! - **Backward chaining** (`backward`): from a target category, work out which
//!   unknown facts would let a voting rule fire.
//! - **Voting** (`voting`): turn category firings into the symbolic score vector.

pub mod backward;
pub mod forward;
pub mod voting;

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::rules::Rule;

pub use backward::{BackwardChainer, BackwardConfig, NeededFact};
pub use forward::{
    DerivedFact, ForwardChainer, ForwardConfig, ForwardResult, Suppression, SuppressionReason,
};
pub use voting::{ScoreNormalization, SymbolicScores, Vote, VotingConfig};

/// Per-session chaining state: which rules have fired and which were
/// overruled. A rule leaves the agenda once it has fired or been overruled,
/// so each rule fires at most once per derivation run.
#[derive(Debug, Clone, Default)]
pub struct Agenda {
    fired: HashSet<usize>,
    suppressed: HashSet<usize>,
}

impl Agenda {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_fired(&self, rule_index: usize) -> bool {
        self.fired.contains(&rule_index)
    }

    /// Fired or overruled.
    pub fn is_retired(&self, rule_index: usize) -> bool {
        self.fired.contains(&rule_index) || self.suppressed.contains(&rule_index)
    }

    pub fn fired_count(&self) -> usize {
        self.fired.len()
    }

    pub fn reset(&mut self) {
        self.fired.clear();
        self.suppressed.clear();
    }

    fn mark_fired(&mut self, rule_index: usize) {
        self.fired.insert(rule_index);
    }

    fn mark_suppressed(&mut self, rule_index: usize) {
        self.suppressed.insert(rule_index);
    }

    /// Put back a set of fired rules taken earlier; suppressions are kept.
    fn rewind(&mut self, fired: HashSet<usize>) {
        self.fired = fired;
    }
}

/// Conflict-resolution order between two rules: higher priority, then higher
/// confidence, then earlier position in the rule base.
pub fn precedence(a: (usize, &Rule), b: (usize, &Rule)) -> Ordering {
    let (ia, ra) = a;
    let (ib, rb) = b;
    ra.priority
        .cmp(&rb.priority)
        .then_with(|| ra.confidence.total_cmp(&rb.confidence))
        .then_with(|| ib.cmp(&ia))
}
