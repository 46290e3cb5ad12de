//! Deterministic keyword classifier.
//!
//! A small stand-in for a trained text model: it normalizes the text, counts
//! weighted keyword and phrase hits per category and reports each category's
//! share of the total hit weight.

use crate::category::Category;
use crate::error::{ClassifyError, ClassifyResult};

use super::{CategoryScore, Classifier};

/// (phrase, weight) pairs per category. Phrases match on word boundaries.
const KEYWORDS: &[(Category, &[(&str, f64)])] = &[
    (
        Category::Overheating,
        &[
            ("hot", 1.0),
            ("overheat", 2.0),
            ("overheating", 2.0),
            ("burning", 1.5),
            ("fan", 0.5),
            ("fan noise", 1.0),
            ("thermal", 1.5),
            ("temperature", 1.0),
        ],
    ),
    (
        Category::SlowPerformance,
        &[
            ("slow", 1.5),
            ("lag", 1.5),
            ("lagging", 1.5),
            ("sluggish", 1.5),
            ("freezes", 0.5),
            ("takes forever", 1.5),
            ("ram", 0.5),
        ],
    ),
    (
        Category::BatteryIssues,
        &[
            ("battery", 2.0),
            ("drain", 1.0),
            ("drains", 1.0),
            ("charge", 1.0),
            ("charging", 1.0),
            ("charger", 1.0),
            ("dies", 0.5),
        ],
    ),
    (
        Category::NetworkIssues,
        &[
            ("wifi", 2.0),
            ("wi fi", 2.0),
            ("internet", 1.5),
            ("network", 1.5),
            ("connection", 1.0),
            ("disconnect", 1.0),
            ("disconnects", 1.0),
            ("router", 1.0),
            ("dns", 1.5),
            ("signal", 0.5),
            ("vpn", 1.0),
        ],
    ),
    (
        Category::StartupFailure,
        &[
            ("boot", 2.0),
            ("won t turn on", 2.0),
            ("turn on", 1.0),
            ("startup", 1.5),
            ("start up", 1.5),
            ("power button", 1.0),
            ("boot loop", 2.0),
        ],
    ),
    (
        Category::ScreenProblems,
        &[
            ("screen", 2.0),
            ("display", 1.5),
            ("flicker", 1.5),
            ("flickering", 1.5),
            ("pixels", 1.0),
            ("dim", 0.5),
            ("black screen", 1.0),
            ("touch", 0.5),
        ],
    ),
    (
        Category::StorageIssues,
        &[
            ("storage", 2.0),
            ("disk", 1.5),
            ("space", 1.0),
            ("full", 0.5),
            ("drive", 1.0),
            ("memory full", 1.5),
        ],
    ),
    (
        Category::AudioProblems,
        &[
            ("sound", 2.0),
            ("audio", 2.0),
            ("speaker", 1.5),
            ("speakers", 1.5),
            ("microphone", 1.5),
            ("mic", 1.0),
            ("headphones", 1.0),
            ("volume", 1.0),
        ],
    ),
    (
        Category::AppCrashes,
        &[
            ("crash", 2.0),
            ("crashes", 2.0),
            ("crashing", 2.0),
            ("app", 0.5),
            ("application", 0.5),
            ("not responding", 1.5),
            ("closes", 1.0),
        ],
    ),
    (
        Category::HardwareFailure,
        &[
            ("broken", 1.5),
            ("hardware", 2.0),
            ("keyboard", 1.0),
            ("port", 1.0),
            ("physical", 1.0),
            ("dropped", 1.0),
            ("water damage", 2.0),
            ("clicking", 1.0),
        ],
    ),
];

/// Keyword-table classifier over the ten categories.
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }
}

/// Lower-case the text, turn every non-alphanumeric run into one space and
/// pad with spaces so phrases can be matched on word boundaries.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    let mut last_space = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if !last_space {
        out.push(' ');
    }
    out
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> ClassifyResult<Vec<CategoryScore>> {
        let normalized = normalize(text);
        let raw: Vec<(Category, f64)> = KEYWORDS
            .iter()
            .map(|(category, words)| {
                let hits: f64 = words
                    .iter()
                    .filter(|(phrase, _)| normalized.contains(&format!(" {phrase} ")))
                    .map(|(_, weight)| weight)
                    .sum();
                (*category, hits)
            })
            .filter(|(_, hits)| *hits > 0.0)
            .collect();

        let total: f64 = raw.iter().map(|(_, hits)| hits).sum();
        if total <= 0.0 {
            return Err(ClassifyError::Unavailable {
                reason: "no recognisable symptom keywords in the description".into(),
            });
        }

        Ok(raw
            .into_iter()
            .map(|(category, hits)| CategoryScore {
                category,
                probability: hits / total,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_pads_and_collapses() {
        assert_eq!(normalize("Wi-Fi   keeps DROPPING!"), " wi fi keeps dropping ");
        assert_eq!(normalize(""), " ");
    }

    #[test]
    fn network_text_scores_network_highest() {
        let scores = KeywordClassifier::new()
            .classify("My wifi keeps disconnecting and the internet is down")
            .unwrap();
        let best = scores
            .iter()
            .max_by(|a, b| a.probability.total_cmp(&b.probability))
            .unwrap();
        assert_eq!(best.category, Category::NetworkIssues);
        let total: f64 = scores.iter().map(|s| s.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn phrases_respect_word_boundaries() {
        // "hot" must not match inside "photo".
        let result = KeywordClassifier::new().classify("my photo gallery");
        assert!(matches!(result, Err(ClassifyError::Unavailable { .. })));
    }

    #[test]
    fn garbage_input_is_unavailable() {
        assert!(KeywordClassifier::new().classify("asdf qwerty").is_err());
    }
}
