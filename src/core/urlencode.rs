//! # Query-String Serialization
//!
//! Serializes flat structs to `application/x-www-form-urlencoded` query
//! strings for redirect-mode responses (authorization redirects, token
//! hand-off to client callbacks, error returns).

use anyhow::{Result, anyhow};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Serialize;
use serde_json::Value;

/// Characters escaped in query component values, per the WHATWG URL
/// query-percent-encode set extended to cover form separators.
const QUERY: &AsciiSet =
    &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'<').add(b'>').add(b'&').add(b'=').add(b'+').add(b'%');

/// Serialize a value to a query string. Keys are emitted in lexical order;
/// `None` fields are skipped; nested objects and arrays are serialized as
/// JSON before encoding.
///
/// # Errors
///
/// Returns an error if the value does not serialize to a JSON object.
pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)?;
    let Value::Object(map) = json else {
        return Err(anyhow!("can only serialize objects to query strings"));
    };

    let mut pairs = vec![];
    for (key, value) in map {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            nested => serde_json::to_string(&nested)?,
        };
        pairs.push(format!("{key}={}", utf8_percent_encode(&text, QUERY)));
    }

    Ok(pairs.join("&"))
}
