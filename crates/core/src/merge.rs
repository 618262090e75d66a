//! Folding per-chunk fragments into one record.
//!
//! Merging is additive: empty values never enter the record, nested objects
//! merge recursively, lists concatenate, and two different scalars under the
//! same key are kept side by side in a list.

use crate::models::{ParsedValue, StructuredRecord};
use serde_json::Value;
use tracing::warn;

/// True for null, `""`, and containers whose every member is empty.
pub fn is_empty_or_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.iter().all(is_empty_or_null),
        Value::Object(fields) => fields.values().all(is_empty_or_null),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Removes empty members at every depth. `None` if nothing survives.
pub fn prune_empty(value: Value) -> Option<Value> {
    match value {
        Value::Array(items) => {
            let kept: Vec<Value> = items.into_iter().filter_map(prune_empty).collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        Value::Object(fields) => {
            let kept: StructuredRecord = fields
                .into_iter()
                .filter_map(|(key, value)| prune_empty(value).map(|value| (key, value)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        other if is_empty_or_null(&other) => None,
        other => Some(other),
    }
}

/// Folds one chunk's parsed reply into `accumulator`. Raw-text fallbacks
/// carry no structure and leave the accumulator untouched.
pub fn merge_fragment(accumulator: &mut StructuredRecord, fragment: ParsedValue) {
    match fragment {
        ParsedValue::Record(record) => merge_records(accumulator, record),
        ParsedValue::Raw { text, issue } => {
            warn!(
                issue = %issue,
                fragment_len = text.len(),
                "skipping non-mergeable fragment"
            );
        }
    }
}

pub fn merge_records(accumulator: &mut StructuredRecord, fragment: StructuredRecord) {
    for (key, incoming) in fragment {
        let Some(incoming) = prune_empty(incoming) else {
            continue;
        };

        match accumulator.get_mut(&key) {
            Some(existing) => merge_value(existing, incoming),
            None => {
                accumulator.insert(key, incoming);
            }
        }
    }
}

/// Left fold over fragments in chunk order, starting from an empty record.
pub fn fold_fragments<I>(fragments: I) -> StructuredRecord
where
    I: IntoIterator<Item = ParsedValue>,
{
    let mut accumulator = StructuredRecord::new();
    for fragment in fragments {
        merge_fragment(&mut accumulator, fragment);
    }
    accumulator
}

// `incoming` is already pruned.
fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Array(current), Value::Array(items)) => current.extend(items),
        (Value::Object(current), Value::Object(fields)) => merge_records(current, fields),
        (existing, incoming) => {
            if *existing == incoming {
                return;
            }

            match existing {
                Value::Array(current) => current.push(incoming),
                scalar => {
                    let previous = scalar.take();
                    *scalar = Value::Array(vec![previous, incoming]);
                }
            }
        }
    }
}
