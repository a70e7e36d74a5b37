// crates/toolgate-aggregator/src/merge.rs
// ============================================================================
// Module: Result Merging
// Description: Capability unions and tool-name namespacing.
// Purpose: Combine backend results into one client-facing response.
// Dependencies: serde_json, toolgate-core
// ============================================================================

//! ## Overview
//! `initialize` results union by shallow merge of top-level objects; scalar
//! members are overwritten by later backends. `tools/list` results
//! concatenate after prefixing each tool name with `service.`, which makes
//! names unique without de-duplication.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use toolgate_core::ServiceName;

// ============================================================================
// SECTION: Capability Merge
// ============================================================================

/// Shallow-merges one backend `initialize` result into the accumulator.
///
/// Top-level object members merge key-wise (one level deep); any other
/// member overwrites.
pub fn merge_initialize_result(accumulator: &mut Map<String, Value>, result: &Value) {
    let Value::Object(members) = result else {
        return;
    };
    for (key, value) in members {
        match (accumulator.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                for (inner_key, inner_value) in incoming {
                    existing.insert(inner_key.clone(), inner_value.clone());
                }
            }
            (_, value) => {
                accumulator.insert(key.clone(), value.clone());
            }
        }
    }
}

// ============================================================================
// SECTION: Tool Namespacing
// ============================================================================

/// Prefixes every tool name in a `tools/list` result with `service.`.
///
/// Tools without a string `name` member are dropped rather than forwarded
/// un-namespaced.
#[must_use]
pub fn prefix_tools(service: &ServiceName, result: &Value) -> Vec<Value> {
    let Some(Value::Array(tools)) = result.get("tools") else {
        return Vec::new();
    };
    let mut prefixed = Vec::with_capacity(tools.len());
    for tool in tools {
        let Some(name) = tool.get("name").and_then(Value::as_str) else {
            continue;
        };
        let mut tool = tool.clone();
        if let Value::Object(members) = &mut tool {
            members.insert(
                "name".to_string(),
                Value::String(format!("{service}.{name}")),
            );
            prefixed.push(tool);
        }
    }
    prefixed
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::Map;
    use serde_json::json;
    use toolgate_core::ServiceName;

    use super::merge_initialize_result;
    use super::prefix_tools;

    #[test]
    fn capabilities_union_shallowly() {
        let mut accumulator = Map::new();
        merge_initialize_result(
            &mut accumulator,
            &json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {"tools": {"listChanged": true}},
            }),
        );
        merge_initialize_result(
            &mut accumulator,
            &json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {"resources": {}},
            }),
        );
        let merged = serde_json::Value::Object(accumulator);
        assert_eq!(merged["capabilities"]["tools"]["listChanged"], json!(true));
        assert_eq!(merged["capabilities"]["resources"], json!({}));
    }

    #[test]
    fn scalar_members_overwrite() {
        let mut accumulator = Map::new();
        merge_initialize_result(&mut accumulator, &json!({"protocolVersion": "old"}));
        merge_initialize_result(&mut accumulator, &json!({"protocolVersion": "new"}));
        assert_eq!(accumulator["protocolVersion"], json!("new"));
    }

    #[test]
    fn tools_are_prefixed_by_service() {
        let result = json!({
            "tools": [
                {"name": "list_events", "description": "List events"},
                {"name": "create_event"},
            ]
        });
        let prefixed = prefix_tools(&ServiceName::new("mock-calendar"), &result);
        assert_eq!(prefixed.len(), 2);
        assert_eq!(prefixed[0]["name"], json!("mock-calendar.list_events"));
        assert_eq!(prefixed[0]["description"], json!("List events"));
        assert_eq!(prefixed[1]["name"], json!("mock-calendar.create_event"));
    }

    #[test]
    fn unnamed_tools_are_dropped() {
        let result = json!({"tools": [{"description": "anonymous"}]});
        assert!(prefix_tools(&ServiceName::new("svc"), &result).is_empty());
    }
}
