//! Canonical JSON encoding.
//!
//! Rules:
//! - object keys sorted by byte order
//! - no insignificant whitespace
//! - strings escaped by `serde_json`
//! - numbers rendered by `serde_json::Number`'s display form
//!
//! The output is the hashing input for policy content hashes, so these rules
//! must remain stable across versions.

use itertools::Itertools;
use serde_json::Value;

use crate::errors::{PolicyError, PolicyResult};

/// Encode a JSON value canonically.
pub fn to_canonical_bytes(value: &Value) -> PolicyResult<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> PolicyResult<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(out, s)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            out.push(b'{');
            let entries = map
                .iter()
                .sorted_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            for (i, (k, v)) in entries.enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, k)?;
                out.push(b':');
                write_value(out, v)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(out: &mut Vec<u8>, s: &str) -> PolicyResult<()> {
    serde_json::to_writer(&mut *out, s)
        .map_err(|e| PolicyError::serialization(format!("failed to encode string: {e}")))
}
