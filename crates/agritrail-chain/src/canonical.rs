//! Canonical JSON serialization for hashing.
//!
//! Two structurally equal payloads that were serialized with different key
//! order must hash identically, or the chain looks falsely "broken".  The
//! canonical form therefore sorts object keys recursively (byte order) and
//! renders scalars through `serde_json`'s deterministic formatter.  Arrays
//! keep their order — element order is semantically meaningful.

use serde_json::Value;

use agritrail_contracts::error::{TrailError, TrailResult};

/// Render `value` as canonical JSON: recursively sorted object keys, no
/// whitespace, `serde_json` scalar formatting.
pub fn canonicalize(value: &Value) -> TrailResult<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> TrailResult<()> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&render_scalar(&Value::String((*key).clone()))?);
                out.push(':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&render_scalar(scalar)?),
    }
    Ok(())
}

/// Scalars (strings, numbers, booleans, null) delegate to `serde_json`,
/// which formats a given `Value` identically on every call.
fn render_scalar(value: &Value) -> TrailResult<String> {
    serde_json::to_string(value).map_err(|e| TrailError::Canonicalization {
        reason: e.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::canonicalize;

    /// Key order in the source document must not affect the output.
    #[test]
    fn key_order_is_irrelevant() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"value":1,"field":"x"}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"field":"x","value":1}"#).unwrap();

        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn keys_sorted_recursively() {
        let value = json!({
            "z": { "b": 2, "a": 1 },
            "a": [ { "y": true, "x": false } ],
        });

        let canonical = canonicalize(&value).unwrap();
        assert_eq!(
            canonical,
            r#"{"a":[{"x":false,"y":true}],"z":{"a":1,"b":2}}"#
        );
    }

    /// Array element order is meaningful and must be preserved.
    #[test]
    fn array_order_preserved() {
        let value = json!([3, 1, 2]);
        assert_eq!(canonicalize(&value).unwrap(), "[3,1,2]");
    }

    #[test]
    fn string_escapes_survive() {
        let value = json!({ "note": "line1\nline2 \"quoted\"" });
        let canonical = canonicalize(&value).unwrap();
        assert_eq!(canonical, r#"{"note":"line1\nline2 \"quoted\""}"#);
    }

    #[test]
    fn scalars_and_null() {
        assert_eq!(canonicalize(&json!(null)).unwrap(), "null");
        assert_eq!(canonicalize(&json!(true)).unwrap(), "true");
        assert_eq!(canonicalize(&json!(412)).unwrap(), "412");
        assert_eq!(canonicalize(&json!("plain")).unwrap(), "\"plain\"");
    }
}
