//! Raw store records and field accessors.
//!
//! Store documents are flat field maps. Accessors here are lenient: a field
//! with the wrong JSON type is treated the same as an absent field.

use serde_json::{Map, Value};

/// Store-assigned record key.
pub type RecordId = String;

/// Flat field map as persisted in the board store.
pub type Record = Map<String, Value>;

/// One `{id, record}` pair delivered by a collection subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntry {
    pub id: RecordId,
    pub record: Record,
}

impl StoreEntry {
    pub fn new(id: impl Into<RecordId>, record: Record) -> Self {
        Self {
            id: id.into(),
            record,
        }
    }
}

/// Returns a string field, or `None` when absent or not a string.
pub fn str_field(record: &Record, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Returns an integer field, or `None` when absent or not a whole number.
///
/// Whole-number floats (`2.0`) are accepted; some store clients only write
/// doubles.
pub fn int_field(record: &Record, key: &str) -> Option<i64> {
    let value = record.get(key)?;
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|number| number.fract() == 0.0 && number.abs() <= MAX_EXACT_FLOAT_INT)
            .map(|number| number as i64)
    })
}

/// Largest magnitude at which every integer is exactly representable as f64.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Builds a record from `(field, value)` pairs.
pub fn record_from<I, K>(fields: I) -> Record
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    fields
        .into_iter()
        .map(|(key, value)| (key.into(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{int_field, record_from, str_field};
    use serde_json::json;

    #[test]
    fn accessors_ignore_mistyped_fields() {
        let record = record_from([("name", json!(42)), ("ordinal", json!("two"))]);
        assert_eq!(str_field(&record, "name"), None);
        assert_eq!(int_field(&record, "ordinal"), None);
        assert_eq!(str_field(&record, "missing"), None);
    }

    #[test]
    fn int_field_accepts_whole_floats_only() {
        let record = record_from([
            ("totalVotes", json!(2.0)),
            ("negative", json!(-3.0)),
            ("fraction", json!(1.5)),
        ]);
        assert_eq!(int_field(&record, "totalVotes"), Some(2));
        assert_eq!(int_field(&record, "negative"), Some(-3));
        assert_eq!(int_field(&record, "fraction"), None);
    }

    #[test]
    fn accessors_read_typed_fields() {
        let record = record_from([("name", json!("Well")), ("ordinal", json!(2))]);
        assert_eq!(str_field(&record, "name").as_deref(), Some("Well"));
        assert_eq!(int_field(&record, "ordinal"), Some(2));
    }
}
