use schemars::{schema_for, JsonSchema};
use serde_json::{json, Map, Value};

const MAX_DEPTH: usize = 16;

/// Keywords that only add noise when a schema is pasted into an instruction block.
const NOISE_KEYS: [&str; 7] = [
    "$schema",
    "$id",
    "title",
    "definitions",
    "$defs",
    "default",
    "additionalProperties",
];

/// Renders the JSON Schema of `T` as compact, self-contained text suitable for
/// embedding in a model instruction: references inlined, metadata stripped.
pub fn describe_shape<T: JsonSchema>() -> serde_json::Result<String> {
    let mut root = serde_json::to_value(schema_for!(T))?;

    let definitions = root
        .get("definitions")
        .or_else(|| root.get("$defs"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    simplify(&mut root, &definitions, 0);
    serde_json::to_string_pretty(&root)
}

fn simplify(node: &mut Value, definitions: &Map<String, Value>, depth: usize) {
    if depth > MAX_DEPTH {
        *node = json!({ "type": "object" });
        return;
    }

    if let Some(target) = node.get("$ref").and_then(Value::as_str).map(str::to_string) {
        let name = target.rsplit('/').next().unwrap_or_default();
        *node = definitions
            .get(name)
            .cloned()
            .unwrap_or_else(|| json!({ "type": "object" }));
        simplify(node, definitions, depth + 1);
        return;
    }

    let Value::Object(map) = node else {
        return;
    };

    for key in NOISE_KEYS {
        map.remove(key);
    }

    // Option<T> shows up as ["T", "null"]; the instruction only needs T.
    if let Some(Value::Array(types)) = map.get("type") {
        if let Some(first) = types.iter().find(|t| t.as_str() != Some("null")).cloned() {
            map.insert("type".into(), first);
        }
    }

    // Single-member allOf is how schemars wraps a described $ref.
    if let Some(Value::Array(all_of)) = map.remove("allOf") {
        if let [only] = all_of.as_slice() {
            let mut inner = only.clone();
            simplify(&mut inner, definitions, depth + 1);
            if let Value::Object(inner_map) = inner {
                for (k, v) in inner_map {
                    map.entry(k).or_insert(v);
                }
            }
        } else {
            map.insert("allOf".into(), Value::Array(all_of));
        }
    }

    if let Some(Value::Object(props)) = map.get_mut("properties") {
        for prop in props.values_mut() {
            simplify(prop, definitions, depth + 1);
        }
    }
    if let Some(items) = map.get_mut("items") {
        simplify(items, definitions, depth + 1);
    }
    for key in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(variants)) = map.get_mut(key) {
            for v in variants.iter_mut() {
                simplify(v, definitions, depth + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Inner {
        relevance: f64,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Outer {
        response: String,
        notes: Option<Vec<String>>,
        metrics: Inner,
    }

    #[test]
    fn inlines_references_and_strips_metadata() {
        let text = describe_shape::<Outer>().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert!(value.get("$schema").is_none());
        assert!(value.get("title").is_none());
        assert!(value.get("definitions").is_none());
        assert!(!text.contains("$ref"));
        assert_eq!(
            value["properties"]["metrics"]["properties"]["relevance"]["type"],
            "number"
        );
        assert_eq!(value["properties"]["notes"]["type"], "array");
    }
}
