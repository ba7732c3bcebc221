//! Lenient field access for server JSON.
//!
//! Mastodon, Pleroma, Akkoma and glitch-soc disagree on which fields exist and
//! occasionally on their types. Every accessor here degrades to the type's
//! default instead of failing.

use serde_json::Value;

static NULL: Value = Value::Null;

pub(crate) trait JsonExt {
    /// Field as a string; empty when absent or not a string
    fn str_at(&self, key: &str) -> String;
    /// Field as a non-empty string
    fn opt_str_at(&self, key: &str) -> Option<String>;
    /// Field as a bool; false when absent
    fn bool_at(&self, key: &str) -> bool;
    /// Field as an unsigned integer; accepts numeric strings
    fn u64_at(&self, key: &str) -> Option<u64>;
    /// Sub-value; `null` when absent
    fn at(&self, key: &str) -> &Value;
    /// Array field; empty when absent or not an array
    fn array_at(&self, key: &str) -> &[Value];
    /// Whether the key is present at all (even as `null`)
    fn has(&self, key: &str) -> bool;
    /// True for `null`, `{}` and non-objects
    fn is_empty_object(&self) -> bool;
}

impl JsonExt for Value {
    fn str_at(&self, key: &str) -> String {
        self.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn opt_str_at(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn bool_at(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    fn u64_at(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn at(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }

    fn array_at(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    fn has(&self, key: &str) -> bool {
        self.as_object().is_some_and(|o| o.contains_key(key))
    }

    fn is_empty_object(&self) -> bool {
        self.as_object().is_none_or(serde_json::Map::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_degrade() {
        let v = json!({"a": 1, "b": "x", "c": null});
        assert_eq!(v.str_at("a"), "");
        assert_eq!(v.str_at("b"), "x");
        assert!(!v.bool_at("c"));
        assert_eq!(v.u64_at("a"), Some(1));
        assert_eq!(v.u64_at("missing"), None);
        assert!(v.at("missing").is_null());
        assert!(v.array_at("b").is_empty());
        assert!(v.has("c"));
    }

    #[test]
    fn test_numeric_strings() {
        let v = json!({"max_toot_chars": "5000"});
        assert_eq!(v.u64_at("max_toot_chars"), Some(5000));
    }

    #[test]
    fn test_empty_object() {
        assert!(json!({}).is_empty_object());
        assert!(Value::Null.is_empty_object());
        assert!(!json!({"id": "1"}).is_empty_object());
    }
}
