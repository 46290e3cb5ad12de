// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # fixwise
//!
//! A hybrid diagnostic reasoning engine for computer and mobile device
//! problems. A rule-based expert system and a text classifier each rate the
//! ten diagnosis categories; the engine blends both into one ranked,
//! explained diagnosis.
//!
//! ## Architecture
//!
//! - **Fact store** (`fact`): per-session working memory with provenance
//!   (`user` > `derived` > `default`) and ternary truth
//! - **Rule base** (`rules`, `knowledge`): validated, acyclic, immutable rule
//!   set loaded from JSON knowledge packs
//! - **Inference** (`infer`): forward chaining with conflict resolution,
//!   backward chaining for follow-up questions, category voting
//! - **Classifier adapter** (`classify`): calibrated, time-bounded boundary to
//!   an external text classifier
//! - **Aggregation** (`aggregate`, `trace`): blended ranking with an
//!   explanation trace
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fixwise::classify::KeywordClassifier;
//! use fixwise::config::EngineConfig;
//! use fixwise::engine::Engine;
//! use fixwise::knowledge::KnowledgePack;
//!
//! let engine = Engine::from_pack(KnowledgePack::builtin(), EngineConfig::default())
//!     .unwrap()
//!     .with_classifier(Arc::new(KeywordClassifier::new()));
//! let mut session = engine.session();
//! session.assert_fact("wifi_drops", true).unwrap();
//! let diagnosis = session.diagnose(Some("my wifi keeps dropping")).unwrap();
//! println!("{:?}", diagnosis.top());
//! ```

pub mod aggregate;
pub mod category;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod fact;
pub mod infer;
pub mod knowledge;
pub mod rules;
pub mod session;
pub mod trace;
