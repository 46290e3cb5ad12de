//! Classifier adapter: the boundary to the external text classifier.
//!
//! The model itself is a black box behind the [`Classifier`] trait. The
//! [`ClassifierAdapter`] calibrates its output into a [`Distribution`] and
//! bounds each call with a timeout, so a slow or failing model degrades the
//! session to rule-only evidence instead of stalling it.
//!
//! A timed-out call leaves its worker thread running until the model
//! returns. The adapter caps how many workers may be outstanding at once;
//! past the cap, calls fail fast as unavailable instead of spawning more.

/// Default cap on classifier workers running at the same time.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

pub mod keyword;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::{ClassifyError, ClassifyResult};

pub use keyword::KeywordClassifier;

/// Probability assigned to one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    pub probability: f64,
}

/// A text classifier producing a category distribution from free text.
///
/// Entries need not sum to 1 and may cover only the top categories, but a
/// higher value must mean a higher relative likelihood.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> ClassifyResult<Vec<CategoryScore>>;

    /// Display name for logs.
    fn name(&self) -> &str;
}

/// Calibrated classifier output: one entry per category, each in [0, 1],
/// sorted by descending probability.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    scores: Vec<CategoryScore>,
}

impl Distribution {
    /// Calibrate raw scores: drop non-finite entries, clamp to [0, 1], merge
    /// duplicate categories by maximum, sort descending (ties by category
    /// name) and keep the `top_k` best.
    pub fn calibrate(raw: Vec<CategoryScore>, top_k: usize) -> Self {
        let mut scores: Vec<CategoryScore> = Vec::with_capacity(raw.len());
        for s in raw.into_iter().filter(|s| s.probability.is_finite()) {
            let p = s.probability.clamp(0.0, 1.0);
            match scores.iter_mut().find(|e| e.category == s.category) {
                Some(existing) => existing.probability = existing.probability.max(p),
                None => scores.push(CategoryScore {
                    category: s.category,
                    probability: p,
                }),
            }
        }
        scores.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then_with(|| a.category.name().cmp(b.category.name()))
        });
        scores.truncate(top_k);
        Self { scores }
    }

    /// Probability for `category`; categories outside the distribution score 0.
    pub fn get(&self, category: Category) -> f64 {
        self.scores
            .iter()
            .find(|s| s.category == category)
            .map_or(0.0, |s| s.probability)
    }

    pub fn top(&self) -> Option<&CategoryScore> {
        self.scores.first()
    }

    pub fn scores(&self) -> &[CategoryScore] {
        &self.scores
    }

    /// Whether any category carries a non-zero probability.
    pub fn has_signal(&self) -> bool {
        self.scores.iter().any(|s| s.probability > 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Wraps a shared classifier with calibration and a call timeout.
///
/// Immutable after construction; share it across sessions behind an `Arc`.
/// Clones share the in-flight worker count.
#[derive(Clone)]
pub struct ClassifierAdapter {
    inner: Arc<dyn Classifier>,
    timeout: Option<Duration>,
    top_k: usize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
}

impl std::fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierAdapter")
            .field("classifier", &self.inner.name())
            .field("timeout", &self.timeout)
            .field("top_k", &self.top_k)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

impl ClassifierAdapter {
    /// Adapter with no timeout that keeps every category.
    pub fn new(inner: Arc<dyn Classifier>) -> Self {
        Self {
            inner,
            timeout: None,
            top_k: Category::ALL.len(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Bound each call; a call exceeding `timeout` fails with
    /// [`ClassifyError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cap on bounded calls whose worker has not finished yet, counting
    /// workers abandoned by a timeout.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Workers currently running a bounded call.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Classify `text` into a calibrated distribution.
    ///
    /// Empty input and distributions without any signal fail with
    /// [`ClassifyError::Unavailable`].
    pub fn classify(&self, text: &str) -> ClassifyResult<Distribution> {
        if text.trim().is_empty() {
            return Err(ClassifyError::Unavailable {
                reason: "empty symptom description".into(),
            });
        }

        let raw = match self.timeout {
            None => self.inner.classify(text)?,
            Some(timeout) => self.classify_bounded(text, timeout)?,
        };

        let distribution = Distribution::calibrate(raw, self.top_k);
        if !distribution.has_signal() {
            return Err(ClassifyError::Unavailable {
                reason: format!("{} produced no usable scores", self.inner.name()),
            });
        }
        tracing::debug!(
            classifier = self.inner.name(),
            top = ?distribution.top().map(|s| s.category),
            "text classified"
        );
        Ok(distribution)
    }

    /// Run the classifier on a worker thread and wait at most `timeout`.
    ///
    /// A late result is discarded: the worker's send fails once the receiver
    /// is gone and the thread exits on its own. Fails with
    /// [`ClassifyError::Unavailable`] without spawning when
    /// `max_in_flight` workers are still running.
    fn classify_bounded(
        &self,
        text: &str,
        timeout: Duration,
    ) -> ClassifyResult<Vec<CategoryScore>> {
        let Some(slot) = self.reserve_worker() else {
            tracing::warn!(
                classifier = self.inner.name(),
                max_in_flight = self.max_in_flight,
                "classifier saturated by unfinished calls"
            );
            return Err(ClassifyError::Unavailable {
                reason: format!(
                    "classifier busy: {} earlier calls still running",
                    self.max_in_flight
                ),
            });
        };

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();
        std::thread::Builder::new()
            .name("fixwise-classify".into())
            .spawn(move || {
                // Locals drop in reverse, so a panic frees the slot before
                // the channel closes.
                let tx = tx;
                let slot = slot;
                let result = inner.classify(&text);
                drop(slot);
                let _ = tx.send(result);
            })
            .map_err(|e| ClassifyError::Unavailable {
                reason: format!("failed to spawn classifier worker: {e}"),
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ClassifyError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ClassifyError::Unavailable {
                reason: "classifier worker exited without a result".into(),
            }),
        }
    }

    fn reserve_worker(&self) -> Option<WorkerSlot> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_in_flight).then_some(n + 1)
            })
            .ok()?;
        Some(WorkerSlot(Arc::clone(&self.in_flight)))
    }
}

/// One reserved worker; released on drop, including when the model panics.
struct WorkerSlot(Arc<AtomicUsize>);

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
