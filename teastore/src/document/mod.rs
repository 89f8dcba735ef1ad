// Documents and the value semantics used by matching and sorting

use chrono::DateTime;
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

/// A stored document: an ordered map from field name to JSON value.
/// The synthesized `_id` is never part of the stored body.
pub type Document = serde_json::Map<String, Value>;

/// Name of the synthesized identifier field merged into every returned copy.
pub const ID_FIELD: &str = "_id";

/// Return an independent copy of `doc` with its identifier merged in as `_id`.
pub fn with_id(id: &str, doc: &Document) -> Document {
    let mut copy = doc.clone();
    copy.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    copy
}

/// Strip a caller-supplied `_id` so the stored body only holds real fields.
pub(crate) fn without_id(mut doc: Document) -> Document {
    doc.remove(ID_FIELD);
    doc
}

/// Equality used by filters: JSON equality, except numbers compare
/// numerically so `1` and `1.0` are equal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// The value a sort key reads from a document. Missing and null fields
/// sort as `0`.
pub fn sort_value<'a>(doc: &'a Document, field: &str) -> Cow<'a, Value> {
    match doc.get(field) {
        Some(Value::Null) | None => Cow::Owned(Value::from(0)),
        Some(v) => Cow::Borrowed(v),
    }
}

pub(crate) fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values used by `find` sorting.
///
/// Numbers compare numerically. Strings that parse as RFC 3339 timestamps
/// sort before all other strings and compare chronologically among
/// themselves; any other strings compare lexicographically.
/// Values of different kinds order by kind:
/// `null < number < string < boolean < array < object`.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => compare_strings(x, y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(xs), Value::Array(ys)) => {
            for (x, y) in xs.iter().zip(ys) {
                let ord = compare_values(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xs.len().cmp(&ys.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

// Equal instants written with different offsets fall back to the raw text,
// so the order stays total.
fn compare_strings(a: &str, b: &str) -> Ordering {
    match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// String form of a value, used for regex matching, `_id` comparison and
/// aggregation keys. Null renders as the empty string.
pub fn string_form(v: &Value) -> Cow<'_, str> {
    match v {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_with_id_leaves_source_untouched() {
        let source = doc(json!({ "title": "hi" }));
        let copy = with_id("teas_1", &source);
        assert_eq!(copy["_id"], "teas_1");
        assert!(!source.contains_key("_id"));
    }

    #[test]
    fn test_numbers_equal_across_representations() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!("1")));
        assert!(values_equal(&json!({ "a": [1, 2] }), &json!({ "a": [1.0, 2] })));
    }

    #[test]
    fn test_missing_field_sorts_as_zero() {
        let d = doc(json!({ "score": null }));
        assert_eq!(*sort_value(&d, "score"), json!(0));
        assert_eq!(*sort_value(&d, "absent"), json!(0));
        assert_eq!(
            compare_values(&sort_value(&d, "absent"), &json!(-3)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_timestamps_compare_chronologically() {
        // Same instant order differs lexicographically once offsets are involved
        let earlier = json!("2026-01-01T10:00:00+02:00");
        let later = json!("2026-01-01T09:30:00Z");
        assert_eq!(compare_values(&earlier, &later), Ordering::Less);
        assert_eq!(compare_values(&json!("apple"), &json!("banana")), Ordering::Less);
    }

    #[test]
    fn test_timestamps_sort_before_plain_strings() {
        let offset = json!("2026-01-01T10:00:00+02:00");
        let utc = json!("2026-01-01T09:30:00Z");
        let plain = json!("2026-01-01T09:50");
        assert_eq!(compare_values(&offset, &utc), Ordering::Less);
        assert_eq!(compare_values(&utc, &plain), Ordering::Less);
        assert_eq!(compare_values(&offset, &plain), Ordering::Less);
        assert_eq!(compare_values(&plain, &offset), Ordering::Greater);
    }

    #[test]
    fn test_same_instant_breaks_ties_on_text() {
        let utc = json!("2026-01-01T08:00:00Z");
        let offset = json!("2026-01-01T10:00:00+02:00");
        assert_eq!(compare_values(&offset, &utc), Ordering::Greater);
        assert_eq!(compare_values(&utc, &offset), Ordering::Less);
        assert_eq!(compare_values(&utc, &utc), Ordering::Equal);
    }

    #[test]
    fn test_mixed_kinds_order_by_rank() {
        assert_eq!(compare_values(&json!(5), &json!("a")), Ordering::Less);
        assert_eq!(compare_values(&json!(true), &json!("z")), Ordering::Greater);
    }

    #[test]
    fn test_string_form() {
        assert_eq!(string_form(&json!("x")), "x");
        assert_eq!(string_form(&json!(null)), "");
        assert_eq!(string_form(&json!(26)), "26");
    }
}
