//! Checksums over serialized item state.
//!
//! Instances compare checksums to detect drift without exchanging whole
//! payloads, so the same logical payload must hash identically everywhere,
//! whatever key order the host app produced it in.

use serde_json::Value;
use sha2::{Digest, Sha256};
use sync_types::Payload;

/// Compute the checksum of a serialized payload.
///
/// SHA-256 over the canonical JSON encoding (object keys sorted, no
/// whitespace), hex encoded.
pub fn checksum(payload: &Payload) -> String {
    let mut canonical = String::new();
    write_object(payload, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn write_object(map: &Payload, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_value(&map[key], out);
    }
    out.push('}');
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
