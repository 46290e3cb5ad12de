//! Engine facade: top-level API for fixwise.
//!
//! The `Engine` holds the process-wide, read-only resources (the rule base and
//! the classifier adapter) and hands out independent [`Session`]s that share
//! them.

use std::sync::Arc;

use crate::classify::{Classifier, ClassifierAdapter};
use crate::config::EngineConfig;
use crate::error::FixwiseResult;
use crate::knowledge::KnowledgePack;
use crate::rules::RuleBase;
use crate::session::Session;

/// The fixwise diagnostic engine.
///
/// Built once at startup; cloning is cheap and every clone shares the same
/// rule base and classifier.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    rules: Arc<RuleBase>,
    classifier: Option<Arc<ClassifierAdapter>>,
}

impl Engine {
    /// Create an engine over a validated rule base.
    pub fn new(rules: RuleBase, config: EngineConfig) -> FixwiseResult<Self> {
        config.validate()?;
        tracing::info!(
            rules = rules.len(),
            symptoms = rules.symptoms().len(),
            alpha = config.alpha,
            "initializing fixwise engine"
        );
        Ok(Self {
            config,
            rules: Arc::new(rules),
            classifier: None,
        })
    }

    /// Create an engine from a knowledge pack.
    pub fn from_pack(pack: KnowledgePack, config: EngineConfig) -> FixwiseResult<Self> {
        let rules = pack.into_rule_base()?;
        Self::new(rules, config)
    }

    /// Attach a text classifier, bounded by the configured timeout, top-k and
    /// worker cap.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        let adapter = ClassifierAdapter::new(classifier)
            .with_timeout(self.config.classifier_timeout)
            .with_top_k(self.config.classifier_top_k)
            .with_max_in_flight(self.config.classifier_max_in_flight);
        tracing::info!(classifier = adapter.name(), "classifier attached");
        self.classifier = Some(Arc::new(adapter));
        self
    }

    /// Start a new diagnostic conversation.
    pub fn session(&self) -> Session {
        Session::new(
            Arc::clone(&self.rules),
            self.classifier.clone(),
            self.config.clone(),
        )
    }

    pub fn rules(&self) -> &RuleBase {
        &self.rules
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn classifier(&self) -> Option<&ClassifierAdapter> {
        self.classifier.as_deref()
    }
}
