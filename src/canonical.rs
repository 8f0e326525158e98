//! Canonical JSON and SHA-256 hex helpers shared by the object model and the
//! invocation dispatcher.
//!
//! Every content-addressable ID in the engine (blob/tree/commit/stage-run/
//! stage-file) is `hex(sha256(some_deterministic_byte_string))`. Canonical
//! JSON is the deterministic byte string for anything shaped like a JSON
//! value: object keys sorted recursively, no inserted whitespace. This
//! module exposes the stringified form directly since several IDs are
//! hashed over a literal `"a|b|c"`-joined string rather than a single JSON
//! value.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serialize `value` to JSON with object keys sorted recursively and no
/// extraneous whitespace.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut v = serde_json::to_value(value)?;
    sort_keys(&mut v);
    serde_json::to_string(&v)
}

fn sort_keys(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(sort_keys),
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut sorted = serde_json::Map::with_capacity(entries.len());
            for (k, mut v) in entries {
                sort_keys(&mut v);
                sorted.insert(k, v);
            }
            *map = sorted;
        }
        _ => {}
    }
}

/// Hex-encoded SHA-256 of raw bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hex-encoded SHA-256 of `parts` joined with `|`, matching the StageRun ID
/// formula and related `"a|b"`-style content addressing in §3.
pub fn sha256_hex_joined(parts: &[&str]) -> String {
    sha256_hex(parts.join("|").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_and_drops_whitespace() {
        let a = json!({"b": 2, "a": 1});
        let b = json!({"a": 1, "b": 2});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
        assert_eq!(canonical_json(&a).unwrap(), "{\"a\":1,\"b\":2}");
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn stage_run_dedup_example_from_spec() {
        // id = SHA256("|C|w.py|main|{}")
        let id = sha256_hex_joined(&["", "C", "w.py", "main", "{}"]);
        assert_eq!(sha256_hex(b"|C|w.py|main|{}"), id);
    }
}
