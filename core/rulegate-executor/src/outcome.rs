//! Execution results as returned to callers.

use rulegate_artifact_host::FlowFactResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of one decision execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub conclusion: Value,
    pub messages: Vec<Value>,
}

/// Drops flow results that carry no value: `null`, `""` and `[]`.
/// `0`, `false` and non-empty lists are kept.
pub fn retain_meaningful(
    mut results: BTreeMap<String, FlowFactResult>,
) -> BTreeMap<String, FlowFactResult> {
    results.retain(|_, result| !is_empty_value(&result.value));
    results
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn result(value: Value) -> FlowFactResult {
        FlowFactResult {
            value,
            row_hits: BTreeMap::new(),
        }
    }

    #[test]
    fn empty_values_are_dropped() {
        let results = BTreeMap::from([
            ("Null".to_string(), result(Value::Null)),
            ("Blank".to_string(), result(json!(""))),
            ("None".to_string(), result(json!([]))),
            ("Zero".to_string(), result(json!(0))),
            ("No".to_string(), result(json!(false))),
            ("Some".to_string(), result(json!(["a"]))),
            ("Object".to_string(), result(json!({}))),
        ]);

        let kept: Vec<String> = retain_meaningful(results).into_keys().collect();
        assert_eq!(kept, vec!["No", "Object", "Some", "Zero"]);
    }
}
