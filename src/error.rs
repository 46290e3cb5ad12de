//! Rich diagnostic error types for the fixwise engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so operators know exactly what went
//! wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the fixwise engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum FixwiseError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fact(#[from] FactError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Infer(#[from] InferError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Fact store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum FactError {
    #[error("fact \"{fact}\" is held by a {existing} assertion; a {attempted} assertion cannot replace it")]
    #[diagnostic(
        code(fixwise::fact::conflict),
        help(
            "Facts asserted by the user always win over derived or default values. \
             Retract the user fact first if it really should change."
        )
    )]
    Conflict {
        fact: String,
        existing: String,
        attempted: String,
    },

    #[error("fact identifier must not be empty")]
    #[diagnostic(
        code(fixwise::fact::empty_id),
        help("Every fact needs a non-empty identifier such as `device_hot`.")
    )]
    EmptyId,
}

// ---------------------------------------------------------------------------
// Rule base errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RuleError {
    #[error("duplicate rule id \"{rule_id}\"")]
    #[diagnostic(
        code(fixwise::rule::duplicate_id),
        help("Rule ids must be unique within a knowledge pack. Rename one of the rules.")
    )]
    DuplicateRuleId { rule_id: String },

    #[error("symptom \"{fact}\" is declared more than once")]
    #[diagnostic(
        code(fixwise::rule::duplicate_symptom),
        help("Merge the duplicate symptom declarations into one entry.")
    )]
    DuplicateSymptom { fact: String },

    #[error("rule \"{rule_id}\" references unknown fact \"{fact}\"")]
    #[diagnostic(
        code(fixwise::rule::unknown_fact),
        help(
            "A condition may only reference a declared symptom or a fact concluded \
             by another rule. Declare the symptom or fix the typo."
        )
    )]
    UnknownFact { rule_id: String, fact: String },

    #[error("rule \"{rule_id}\" votes for unknown category \"{category}\"")]
    #[diagnostic(
        code(fixwise::rule::unknown_category),
        help(
            "Valid categories are: overheating, slow_performance, battery_issues, \
             network_issues, startup_failure, screen_problems, storage_issues, \
             audio_problems, app_crashes, hardware_failure."
        )
    )]
    UnknownCategory { rule_id: String, category: String },

    #[error("rule \"{rule_id}\" has confidence {confidence}, expected a value in [0, 1]")]
    #[diagnostic(
        code(fixwise::rule::confidence_range),
        help("Confidence weights are probabilities. Use a value between 0.0 and 1.0.")
    )]
    ConfidenceOutOfRange { rule_id: String, confidence: f64 },

    #[error("rule \"{rule_id}\" has no conditions")]
    #[diagnostic(
        code(fixwise::rule::empty_conditions),
        help("A rule must test at least one fact before it can conclude anything.")
    )]
    EmptyConditions { rule_id: String },

    #[error("rule \"{rule_id}\" conditions on its own conclusion \"{fact}\"")]
    #[diagnostic(
        code(fixwise::rule::self_reference),
        help("A rule may not test the fact it concludes. Split it into two rules over distinct facts.")
    )]
    SelfReference { rule_id: String, fact: String },

    #[error("rule graph contains a cycle through fact \"{fact}\"")]
    #[diagnostic(
        code(fixwise::rule::cycle),
        help(
            "Forward chaining requires an acyclic rule graph. Find the rules that \
             derive \"{fact}\" from facts that are themselves derived from it and break the loop."
        )
    )]
    Cycle { fact: String },

    #[error("rule \"{rule_id}\": operator `{operator}` cannot be applied to {operand}")]
    #[diagnostic(
        code(fixwise::rule::invalid_operand),
        help(
            "`gt`, `ge`, `lt` and `le` need a number, `in` needs a list, \
             `eq` and `ne` need a single value."
        )
    )]
    InvalidOperand {
        rule_id: String,
        operator: String,
        operand: String,
    },

    #[error("failed to parse knowledge pack: {message}")]
    #[diagnostic(
        code(fixwise::rule::parse),
        help("Check the JSON syntax and the field names of the rule and symptom records.")
    )]
    Parse { message: String },

    #[error("failed to read knowledge pack: {path}")]
    #[diagnostic(
        code(fixwise::rule::read),
        help("Ensure the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Inference errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum InferError {
    #[error("forward chaining did not reach a fixed point within {max_iterations} passes")]
    #[diagnostic(
        code(fixwise::infer::cycle_guard),
        help(
            "The rule base should be acyclic, so this signals corrupt rule data. \
             Re-validate the knowledge pack, or raise `max_iterations` if the rule \
             chains are genuinely that deep."
        )
    )]
    CycleGuardExceeded { max_iterations: usize },
}

// ---------------------------------------------------------------------------
// Classifier errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ClassifyError {
    #[error("classification unavailable: {reason}")]
    #[diagnostic(
        code(fixwise::classify::unavailable),
        help(
            "The text classifier could not produce a result. Diagnosis continues \
             with rule evidence only; describe the symptoms in more detail to get a text signal."
        )
    )]
    Unavailable { reason: String },

    #[error("classification timed out after {timeout_ms} ms")]
    #[diagnostic(
        code(fixwise::classify::timeout),
        help("Diagnosis continues with rule evidence only. Raise `classifier_timeout_ms` if the model is slow.")
    )]
    Timeout { timeout_ms: u64 },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(fixwise::config::invalid),
        help("Weights and damping factors must lie in [0, 1] and `max_iterations` must be at least 1.")
    )]
    Invalid { message: String },

    #[error("failed to read configuration: {path}")]
    #[diagnostic(
        code(fixwise::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {path}: {message}")]
    #[diagnostic(
        code(fixwise::config::parse),
        help("Check the TOML syntax and the key names in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write configuration: {path}")]
    #[diagnostic(
        code(fixwise::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type for fact store operations.
pub type FactResult<T> = std::result::Result<T, FactError>;

/// Convenience result type for rule base operations.
pub type RuleResult<T> = std::result::Result<T, RuleError>;

/// Convenience result type for inference operations.
pub type InferResult<T> = std::result::Result<T, InferError>;

/// Convenience result type for classifier operations.
pub type ClassifyResult<T> = std::result::Result<T, ClassifyError>;

/// Convenience result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience result type for top-level operations.
pub type FixwiseResult<T> = std::result::Result<T, FixwiseError>;
