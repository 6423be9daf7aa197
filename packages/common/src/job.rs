use std::fmt;

use serde_json::Value;

use crate::photo_type::PhotoType;

/// Accepted aliases for the storage key, in lookup order. Producers have
/// drifted over time; the first non-empty match wins.
pub const STORAGE_KEY_ALIASES: &[&str] = &[
    "storageKey",
    "storage_key",
    "photoKey",
    "photo_key",
    "key",
    "photoUrl",
    "photo_url",
];

/// A single embedding request, decoded from a queue payload.
///
/// Immutable once decoded; the queue message is the durable record, so this
/// is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingJob {
    pub contest_id: i64,
    pub photo_id: i64,
    pub photo_type: PhotoType,
    pub storage_key: String,
    pub model_version: String,
    /// Optional: the store adapter already knows its bucket, so this is
    /// carried only for older payloads that still include it.
    pub bucket: String,
}

/// All problems found in a payload, reported at once.
///
/// Decoding is not fail-fast: every missing/blank required field and every
/// present-but-invalid value is collected before failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Required fields that were absent or blank (e.g. `storageKey/key`).
    pub missing: Vec<String>,
    /// Fields that were present but unusable (e.g. `invalid photoType: CAT`).
    pub invalid: Vec<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid job payload")?;
        if !self.missing.is_empty() {
            write!(f, ": missing required fields {:?}", self.missing)?;
        }
        if !self.invalid.is_empty() {
            let sep = if self.missing.is_empty() { ":" } else { ";" };
            write!(f, "{sep} {}", self.invalid.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl EmbeddingJob {
    /// Decode a canonical job from an untyped JSON payload.
    ///
    /// Accepts camelCase or snake_case field names, plus the storage key
    /// aliases in [`STORAGE_KEY_ALIASES`]. `photoType` is matched
    /// case-insensitively and normalized to uppercase. `bucket` (or `Bucket`)
    /// defaults to the empty string.
    pub fn from_payload(payload: &Value) -> Result<Self, ValidationError> {
        if !payload.is_object() {
            return Err(ValidationError {
                missing: Vec::new(),
                invalid: vec!["payload must be a JSON object".to_string()],
            });
        }

        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        let contest_id = int_field(
            payload,
            &["contestId", "contest_id"],
            "contestId",
            &mut missing,
            &mut invalid,
        );
        let photo_id = int_field(
            payload,
            &["photoId", "photo_id"],
            "photoId",
            &mut missing,
            &mut invalid,
        );
        let photo_type = string_field(
            payload,
            &["photoType", "photo_type"],
            "photoType",
            &mut missing,
            &mut invalid,
        )
        .and_then(|s| match s.parse::<PhotoType>() {
            Ok(t) => Some(t),
            Err(_) => {
                invalid.push(format!("invalid photoType: {s}"));
                None
            }
        });
        let storage_key = string_field(
            payload,
            STORAGE_KEY_ALIASES,
            "storageKey/key",
            &mut missing,
            &mut invalid,
        );
        let model_version = string_field(
            payload,
            &["modelVersion", "model_version"],
            "modelVersion",
            &mut missing,
            &mut invalid,
        );
        let bucket = match find_field(payload, &["bucket", "Bucket"]) {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };

        if !missing.is_empty() || !invalid.is_empty() {
            return Err(ValidationError { missing, invalid });
        }

        // All Options are Some here: a None would have pushed an entry above.
        match (contest_id, photo_id, photo_type, storage_key, model_version) {
            (
                Some(contest_id),
                Some(photo_id),
                Some(photo_type),
                Some(storage_key),
                Some(model_version),
            ) => Ok(Self {
                contest_id,
                photo_id,
                photo_type,
                storage_key,
                model_version,
                bucket,
            }),
            _ => Err(ValidationError { missing, invalid }),
        }
    }
}

/// First value under `keys` that is neither null nor a blank string.
///
/// Blank strings fall through to later aliases, so `{"storageKey": "",
/// "key": "a.jpg"}` resolves to `a.jpg`.
fn find_field<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    for key in keys {
        match payload.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) if s.trim().is_empty() => continue,
            Some(v) => return Some(v),
        }
    }
    None
}

fn string_field(
    payload: &Value,
    keys: &[&str],
    label: &str,
    missing: &mut Vec<String>,
    invalid: &mut Vec<String>,
) -> Option<String> {
    match find_field(payload, keys) {
        None => {
            missing.push(label.to_string());
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            invalid.push(format!("{label}: expected a string, got {other}"));
            None
        }
    }
}

fn int_field(
    payload: &Value,
    keys: &[&str],
    label: &str,
    missing: &mut Vec<String>,
    invalid: &mut Vec<String>,
) -> Option<i64> {
    match find_field(payload, keys) {
        None => {
            missing.push(label.to_string());
            None
        }
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Some(i),
            None => {
                invalid.push(format!("{label}: expected an integer, got {n}"));
                None
            }
        },
        Some(Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) => Some(i),
            Err(_) => {
                invalid.push(format!("{label}: expected an integer, got {s:?}"));
                None
            }
        },
        Some(other) => {
            invalid.push(format!("{label}: expected an integer, got {other}"));
            None
        }
    }
}
