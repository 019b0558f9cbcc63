//! Response envelope normalization
//!
//! The backend wraps payloads as `{responseBody: {data, message, totalCount}}`,
//! but some endpoints answer `{data, message}` or a bare value. Everything that
//! reads a response body goes through here.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use crate::storage::MIN_TOKEN_LEN;

/// A decoded response with the envelope peeled off.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reply {
    pub data: Value,
    pub message: Option<String>,
    pub total_count: Option<u64>,
}

impl Reply {
    pub fn from_body(body: Value) -> Self {
        Self {
            message: message(&body),
            total_count: total_count(&body),
            data: data(&body).clone(),
        }
    }

    pub fn message_or(&self, fallback: &str) -> String {
        self.message.clone().unwrap_or_else(|| fallback.to_string())
    }
}

/// One page of a listing plus the server's total count.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self, page_size: u32) -> u64 {
        if page_size == 0 { return 0; }
        self.total_count.div_ceil(u64::from(page_size))
    }
}

pub fn data(body: &Value) -> &Value {
    if let Some(inner) = body.get("responseBody").and_then(|r| r.get("data")) {
        return inner;
    }
    match body.get("data") {
        Some(inner) if !inner.is_null() => inner,
        _ => body,
    }
}

pub fn message(body: &Value) -> Option<String> {
    body.get("responseBody")
        .and_then(|r| r.get("message"))
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

pub fn total_count(body: &Value) -> Option<u64> {
    body.get("responseBody")
        .and_then(|r| r.get("totalCount"))
        .or_else(|| body.get("totalCount"))
        .and_then(Value::as_u64)
}

/// List payload as an array: the data itself, its `items`, or nothing.
pub fn items(data: &Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Access token from a refresh response, in any of the shapes the backend uses.
pub fn access_token(body: &Value) -> Option<String> {
    const PATHS: &[&[&str]] = &[
        &["token"],
        &["accessToken"],
        &["data", "token"],
        &["data", "accessToken"],
        &["responseBody", "data", "token"],
        &["responseBody", "data", "accessToken"],
    ];

    let token = PATHS
        .iter()
        .find_map(|path| path.iter().try_fold(body, |v, key| v.get(key)).and_then(Value::as_str))
        .or_else(|| body.as_str())?;
    let token = token.trim();
    (token.len() > MIN_TOKEN_LEN).then(|| token.to_string())
}

/// First present field among `keys`, following dotted paths like `product.id`.
pub fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| key.split('.').try_fold(value, |v, part| v.get(part)))
        .find(|v| !v.is_null())
}

pub fn field_str(value: &Value, keys: &[&str]) -> Option<String> {
    field(value, keys).and_then(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub fn field_i64(value: &Value, keys: &[&str]) -> Option<i64> {
    field(value, keys).and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accepts a string or a number and yields it as a string.
pub fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_envelope_shapes() {
        let wrapped = json!({"responseBody": {"data": [1, 2], "message": "ok", "totalCount": 7}});
        let reply = Reply::from_body(wrapped);
        assert_eq!(reply.data, json!([1, 2]));
        assert_eq!(reply.message.as_deref(), Some("ok"));
        assert_eq!(reply.total_count, Some(7));

        let flat = Reply::from_body(json!({"data": {"items": []}, "message": "flat"}));
        assert_eq!(flat.data, json!({"items": []}));
        assert_eq!(flat.message.as_deref(), Some("flat"));

        let raw = Reply::from_body(json!([{"id": 1}]));
        assert_eq!(raw.data, json!([{"id": 1}]));
        assert_eq!(raw.message, None);
    }

    #[test]
    fn test_items_unwraps_both_shapes() {
        assert_eq!(items(&json!([1])).len(), 1);
        assert_eq!(items(&json!({"items": [1, 2]})).len(), 2);
        assert!(items(&json!({"id": 3})).is_empty());
        assert!(items(&Value::Null).is_empty());
    }

    #[test]
    fn test_access_token_shapes() {
        let token = "a".repeat(40);
        assert_eq!(access_token(&json!({"token": token})), Some(token.clone()));
        assert_eq!(access_token(&json!({"data": {"accessToken": token}})), Some(token.clone()));
        assert_eq!(access_token(&json!({"responseBody": {"data": {"token": token}}})), Some(token.clone()));
        assert_eq!(access_token(&json!(token)), Some(token.clone()));
        assert_eq!(access_token(&json!({"token": "too-short"})), None);
        assert_eq!(access_token(&json!({"message": "nope"})), None);
    }

    #[test]
    fn test_field_paths() {
        let item = json!({"product": {"id": 12}, "productVariant": {"size": "M"}});
        assert_eq!(field_i64(&item, &["productId", "product.id"]), Some(12));
        assert_eq!(field_str(&item, &["productVariant.size", "size"]).as_deref(), Some("M"));
        assert_eq!(field_str(&item, &["productVariant.color", "color"]), None);
    }
}
