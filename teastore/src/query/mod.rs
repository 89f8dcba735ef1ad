// Query filters - parsing from driver-style JSON and matching against documents

pub mod options;

use crate::document::{self, Document, ID_FIELD};
use crate::error::{Result, StoreError};
use regex::{Regex, RegexBuilder};
use serde_json::Value;

/// A single clause of a filter. All clauses of a `Filter` must hold.
#[derive(Debug, Clone)]
pub enum Condition {
    /// `field: value`
    Equals { field: String, value: Value },
    /// `field: { "$ne": value }`
    NotEquals { field: String, value: Value },
    /// `field: { "$regex": pattern, "$options": flags }`
    Matches { field: String, regex: Regex },
    /// `_id: value`, compared against the synthesized identifier
    Id(String),
    /// `"$or": [filter, ...]`
    Or(Vec<Filter>),
}

/// A query predicate. An empty filter matches every document.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// A filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn equals(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Equals {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn not_equals(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::NotEquals {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    /// Match `field` against a regular expression. `options` uses the
    /// driver's flag letters: `i`, `m`, `s` and `x` are honoured, anything
    /// else is ignored.
    pub fn regex(mut self, field: &str, pattern: &str, options: &str) -> Result<Self> {
        let regex = build_regex(pattern, options)?;
        self.conditions.push(Condition::Matches {
            field: field.to_string(),
            regex,
        });
        Ok(self)
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.conditions.push(Condition::Id(id.into()));
        self
    }

    /// Add a disjunction. An empty branch list matches nothing.
    pub fn or(mut self, branches: Vec<Filter>) -> Self {
        self.conditions.push(Condition::Or(branches));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parse a driver-style query object such as
    /// `{"tea_id": "teas_1", "$or": [{"title": {"$regex": "x", "$options": "i"}}]}`.
    ///
    /// `null` is accepted as the empty query.
    pub fn from_json(query: &Value) -> Result<Self> {
        let map = match query {
            Value::Null => return Ok(Self::all()),
            Value::Object(map) => map,
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "query must be an object, got {other}"
                )))
            }
        };

        let mut filter = Self::all();
        for (key, value) in map {
            if key == ID_FIELD {
                filter = filter.id(document::string_form(value).into_owned());
            } else if key == "$or" {
                let branches = value.as_array().ok_or_else(|| {
                    StoreError::InvalidQuery("$or expects an array of queries".into())
                })?;
                let branches = branches
                    .iter()
                    .map(Filter::from_json)
                    .collect::<Result<Vec<_>>>()?;
                filter = filter.or(branches);
            } else if let Some(pattern) = value.get("$regex") {
                let pattern = pattern.as_str().ok_or_else(|| {
                    StoreError::InvalidQuery(format!("$regex on '{key}' must be a string"))
                })?;
                let options = value.get("$options").and_then(Value::as_str).unwrap_or("");
                filter = filter.regex(key, pattern, options)?;
            } else if let Some(excluded) = value.get("$ne") {
                filter = filter.not_equals(key, excluded.clone());
            } else {
                filter = filter.equals(key, value.clone());
            }
        }
        Ok(filter)
    }

    /// Evaluate the filter against a stored document and its identifier.
    pub fn matches(&self, id: &str, doc: &Document) -> bool {
        self.conditions.iter().all(|c| c.matches(id, doc))
    }
}

impl Condition {
    fn matches(&self, id: &str, doc: &Document) -> bool {
        match self {
            Condition::Equals { field, value } => doc
                .get(field)
                .is_some_and(|actual| document::values_equal(actual, value)),
            // A missing field is unequal to everything
            Condition::NotEquals { field, value } => !doc
                .get(field)
                .is_some_and(|actual| document::values_equal(actual, value)),
            Condition::Matches { field, regex } => {
                let text = doc.get(field).map(document::string_form).unwrap_or_default();
                regex.is_match(&text)
            }
            Condition::Id(expected) => id == expected,
            Condition::Or(branches) => branches.iter().any(|b| b.matches(id, doc)),
        }
    }
}

fn build_regex(pattern: &str, options: &str) -> Result<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            _ => &mut builder,
        };
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let filter = Filter::from_json(&json!({})).unwrap();
        assert!(filter.is_empty());
        assert!(filter.matches("teas_1", &doc(json!({ "a": 1 }))));

        let filter = Filter::from_json(&Value::Null).unwrap();
        assert!(filter.matches("teas_1", &Document::new()));
    }

    #[test]
    fn test_equality_requires_every_clause() {
        let filter = Filter::from_json(&json!({ "a": 1, "b": "x" })).unwrap();
        assert!(filter.matches("c_1", &doc(json!({ "a": 1, "b": "x", "c": true }))));
        assert!(!filter.matches("c_1", &doc(json!({ "a": 1, "b": "y" }))));
        assert!(!filter.matches("c_1", &doc(json!({ "b": "x" }))));
    }

    #[test]
    fn test_missing_field_never_equals_null() {
        let filter = Filter::all().equals("batch", Value::Null);
        assert!(!filter.matches("users_1", &Document::new()));
        assert!(filter.matches("users_1", &doc(json!({ "batch": null }))));
    }

    #[test]
    fn test_not_equals() {
        let filter = Filter::from_json(&json!({ "author": { "$ne": "bob" } })).unwrap();
        assert!(filter.matches("teas_1", &doc(json!({ "author": "alice" }))));
        assert!(!filter.matches("teas_1", &doc(json!({ "author": "bob" }))));
        assert!(filter.matches("teas_1", &Document::new()));
    }

    #[test]
    fn test_regex_with_options() {
        let filter =
            Filter::from_json(&json!({ "title": { "$regex": "spill", "$options": "i" } }))
                .unwrap();
        assert!(filter.matches("teas_1", &doc(json!({ "title": "Who SPILLED it" }))));
        assert!(!filter.matches("teas_1", &doc(json!({ "title": "quiet day" }))));
        assert!(!filter.matches("teas_1", &Document::new()));
    }

    #[test]
    fn test_regex_matches_string_form_of_numbers() {
        let filter = Filter::all().regex("batch", "^2[67]$", "").unwrap();
        assert!(filter.matches("users_1", &doc(json!({ "batch": 26 }))));
    }

    #[test]
    fn test_invalid_regex_is_rejected_at_parse_time() {
        let result = Filter::from_json(&json!({ "title": { "$regex": "(" } }));
        assert!(matches!(result, Err(StoreError::Regex(_))));
    }

    #[test]
    fn test_or_short_circuits_across_branches() {
        let filter = Filter::from_json(&json!({ "$or": [{ "a": 1 }, { "b": "y" }] })).unwrap();
        assert!(filter.matches("c_1", &doc(json!({ "a": 1, "b": "x" }))));
        assert!(filter.matches("c_2", &doc(json!({ "a": 2, "b": "y" }))));
        assert!(!filter.matches("c_3", &doc(json!({ "a": 3, "b": "z" }))));
    }

    #[test]
    fn test_empty_or_matches_nothing() {
        let filter = Filter::all().or(vec![]);
        assert!(!filter.matches("c_1", &doc(json!({ "a": 1 }))));
    }

    #[test]
    fn test_or_must_be_array() {
        let result = Filter::from_json(&json!({ "$or": { "a": 1 } }));
        assert!(matches!(result, Err(StoreError::InvalidQuery(_))));
    }

    #[test]
    fn test_id_matches_identifier_not_field() {
        let filter = Filter::from_json(&json!({ "_id": "teas_2" })).unwrap();
        assert!(filter.matches("teas_2", &Document::new()));
        assert!(!filter.matches("teas_1", &doc(json!({ "_id": "teas_2" }))));
    }

    #[test]
    fn test_non_object_query_is_rejected() {
        assert!(Filter::from_json(&json!([1, 2])).is_err());
    }
}
