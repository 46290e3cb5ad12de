//! Knowledge packs: the external JSON form of symptoms and rules.
//!
//! A pack is a document `{ "symptoms": [...], "rules": [...] }`. Each rule is
//! `{ id, conditions: [{fact, operator, value}], conclusion, confidence,
//! priority }` where `conclusion` is either
//! `{"type": "fact", "target": ..., "value": ...}` or
//! `{"type": "category", "category": ...}`. Conversion into a [`RuleBase`]
//! checks operators, operands and category names before the rule base runs
//! its own structural validation.

pub mod builtin;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category::Category;
use crate::error::{RuleError, RuleResult};
use crate::fact::FactValue;
use crate::rules::{Conclusion, Condition, Predicate, Rule, RuleBase, Symptom};

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Comparison operator as written in a pack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    #[serde(alias = "==", alias = "=")]
    Eq,
    #[serde(alias = "!=")]
    Ne,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Ge,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Le,
    In,
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::In => "in",
        };
        f.write_str(name)
    }
}

/// One condition clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDef {
    pub fact: String,
    #[serde(default)]
    pub operator: Operator,
    pub value: Value,
}

/// A rule's conclusion as written in a pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConclusionDef {
    Fact { target: String, value: FactValue },
    Category {
        #[serde(alias = "category_name")]
        category: String,
    },
}

/// A rule as written in a pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDef {
    pub id: String,
    pub conditions: Vec<ConditionDef>,
    pub conclusion: ConclusionDef,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub solutions: Vec<String>,
}

fn default_confidence() -> f64 {
    1.0
}

/// Symptoms and rules as loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePack {
    #[serde(default)]
    pub symptoms: Vec<Symptom>,
    pub rules: Vec<RuleDef>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl KnowledgePack {
    pub fn from_json(json: &str) -> RuleResult<Self> {
        serde_json::from_str(json).map_err(|e| RuleError::Parse {
            message: e.to_string(),
        })
    }

    pub fn to_json(&self) -> RuleResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RuleError::Parse {
            message: e.to_string(),
        })
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> RuleResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RuleError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Convert and validate. Rule order in the pack is kept.
    pub fn into_rule_base(self) -> RuleResult<RuleBase> {
        let rules = self
            .rules
            .into_iter()
            .map(RuleDef::into_rule)
            .collect::<RuleResult<Vec<_>>>()?;
        RuleBase::new(self.symptoms, rules)
    }
}

impl RuleDef {
    fn into_rule(self) -> RuleResult<Rule> {
        let conclusion = match self.conclusion {
            ConclusionDef::Fact { target, value } => Conclusion::Fact { target, value },
            ConclusionDef::Category { category } => Conclusion::Category {
                category: Category::parse(&category).ok_or_else(|| RuleError::UnknownCategory {
                    rule_id: self.id.clone(),
                    category,
                })?,
            },
        };
        let conditions = self
            .conditions
            .into_iter()
            .map(|c| {
                let predicate = predicate(&self.id, c.operator, &c.value)?;
                Ok(Condition::new(c.fact, predicate))
            })
            .collect::<RuleResult<Vec<_>>>()?;

        Ok(Rule {
            id: self.id,
            conditions,
            conclusion,
            confidence: self.confidence,
            priority: self.priority,
            explanation: self.explanation,
            cause: self.cause,
            solutions: self.solutions,
        })
    }
}

fn predicate(rule_id: &str, operator: Operator, operand: &Value) -> RuleResult<Predicate> {
    let invalid = || RuleError::InvalidOperand {
        rule_id: rule_id.to_string(),
        operator: operator.to_string(),
        operand: operand.to_string(),
    };
    let number = || operand.as_f64().filter(|n| n.is_finite()).ok_or_else(invalid);

    Ok(match operator {
        Operator::Eq => Predicate::Eq(scalar(operand).ok_or_else(invalid)?),
        Operator::Ne => Predicate::Ne(scalar(operand).ok_or_else(invalid)?),
        Operator::Gt => Predicate::Gt(number()?),
        Operator::Ge => Predicate::Ge(number()?),
        Operator::Lt => Predicate::Lt(number()?),
        Operator::Le => Predicate::Le(number()?),
        Operator::In => {
            let items = operand.as_array().filter(|a| !a.is_empty()).ok_or_else(invalid)?;
            Predicate::In(
                items
                    .iter()
                    .map(scalar)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(invalid)?,
            )
        }
    })
}

/// A JSON scalar as a fact value; arrays, objects and null have no meaning
/// as a single operand.
fn scalar(value: &Value) -> Option<FactValue> {
    match value {
        Value::Bool(b) => Some(FactValue::Bool(*b)),
        Value::Number(n) => n.as_f64().map(FactValue::Number),
        Value::String(s) => Some(FactValue::Text(s.clone())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACK: &str = r#"{
        "symptoms": [
            {"id": "device_hot", "question": "Is the device hot?", "options": ["yes", "no"]},
            {"id": "ram_percent", "question": "RAM usage in percent?"},
            {"id": "device", "question": "Computer or phone?", "options": ["computer", "mobile"]}
        ],
        "rules": [
            {
                "id": "MEM",
                "conditions": [{"fact": "ram_percent", "operator": ">=", "value": 85}],
                "conclusion": {"type": "fact", "target": "memory_pressure", "value": true}
            },
            {
                "id": "SLOW",
                "conditions": [
                    {"fact": "memory_pressure", "value": true},
                    {"fact": "device", "operator": "in", "value": ["computer", "mobile"]}
                ],
                "conclusion": {"type": "category", "category_name": "Slow Performance"},
                "confidence": 0.75,
                "priority": 2,
                "cause": "Not enough free memory",
                "solutions": ["Close unused programs"]
            }
        ]
    }"#;

    #[test]
    fn parses_and_converts() {
        let pack = KnowledgePack::from_json(PACK).unwrap();
        assert_eq!(pack.rules.len(), 2);
        assert_eq!(pack.rules[0].confidence, 1.0);
        assert_eq!(pack.rules[0].conditions[0].operator, Operator::Ge);
        assert_eq!(pack.rules[1].conditions[0].operator, Operator::Eq);

        let rb = pack.into_rule_base().unwrap();
        let slow = rb.rule("SLOW").unwrap();
        assert_eq!(slow.conclusion.category(), Some(Category::SlowPerformance));
        assert_eq!(slow.priority, 2);
        assert_eq!(slow.conditions[0].predicate, Predicate::Eq(FactValue::Bool(true)));
        assert_eq!(rb.rule("MEM").unwrap().conditions[0].predicate, Predicate::Ge(85.0));
    }

    #[test]
    fn unknown_category_fails_at_load() {
        let json = PACK.replace("Slow Performance", "Bad Vibes");
        let err = KnowledgePack::from_json(&json)
            .unwrap()
            .into_rule_base()
            .unwrap_err();
        assert!(matches!(
            err,
            RuleError::UnknownCategory { rule_id, category } if rule_id == "SLOW" && category == "Bad Vibes"
        ));
    }

    #[test]
    fn numeric_operator_needs_number() {
        let json = PACK.replace("\"value\": 85", "\"value\": \"lots\"");
        let err = KnowledgePack::from_json(&json)
            .unwrap()
            .into_rule_base()
            .unwrap_err();
        assert!(matches!(err, RuleError::InvalidOperand { operator, .. } if operator == "ge"));
    }

    #[test]
    fn unknown_fact_reference_fails() {
        let json = PACK.replace("\"fact\": \"device\"", "\"fact\": \"devise\"");
        let err = KnowledgePack::from_json(&json)
            .unwrap()
            .into_rule_base()
            .unwrap_err();
        assert!(matches!(err, RuleError::UnknownFact { fact, .. } if fact == "devise"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            KnowledgePack::from_json("{\"rules\": [}"),
            Err(RuleError::Parse { .. })
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.json");
        std::fs::write(&path, PACK).unwrap();
        let pack = KnowledgePack::load(&path).unwrap();
        assert_eq!(pack.symptoms.len(), 3);
        assert!(matches!(
            KnowledgePack::load(&dir.path().join("missing.json")),
            Err(RuleError::Read { .. })
        ));
    }

    #[test]
    fn json_round_trip_keeps_rules() {
        let pack = KnowledgePack::from_json(PACK).unwrap();
        let again = KnowledgePack::from_json(&pack.to_json().unwrap()).unwrap();
        assert_eq!(again, pack);
    }
}
