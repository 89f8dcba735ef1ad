use crate::document::{self, Document, ID_FIELD};
use crate::error::{Result, StoreError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Direction of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Driver convention: `1` sorts ascending, every other direction value
    /// sorts descending.
    pub fn from_json(direction: &Value) -> Self {
        if document::values_equal(direction, &Value::from(1)) {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// Ordered list of sort keys. Earlier keys take precedence; later keys only
/// break ties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    keys: Vec<(String, SortOrder)>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, field: &str, order: SortOrder) -> Self {
        self.keys.push((field.to_string(), order));
        self
    }

    pub fn keys(&self) -> &[(String, SortOrder)] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Parse `{"score": -1, "created_at": -1}`, keeping key order.
    pub fn from_json(spec: &Value) -> Result<Self> {
        match spec {
            Value::Null => Ok(Self::new()),
            Value::Object(map) => Ok(map.iter().fold(Self::new(), |spec, (field, dir)| {
                spec.then(field, SortOrder::from_json(dir))
            })),
            other => Err(StoreError::InvalidQuery(format!(
                "sort specification must be an object, got {other}"
            ))),
        }
    }

    /// Multi-key comparator. Stops at the first key that differs.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, order) in &self.keys {
            let ordering = document::compare_values(
                &document::sort_value(a, field),
                &document::sort_value(b, field),
            );
            if ordering != Ordering::Equal {
                return order.apply(ordering);
            }
        }
        Ordering::Equal
    }
}

/// Options for `find`: filter results are sorted, then `skip` and `limit`
/// are applied, always in that order.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<SortSpec>,
    pub skip: usize,
    /// `None` and `Some(0)` both mean "everything after `skip`".
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sort = Some(spec);
        self
    }

    pub fn sort_by(self, field: &str, order: SortOrder) -> Self {
        self.sort(SortSpec::new().then(field, order))
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sort in place with a stable sort, preserving insertion order among
    /// equal keys.
    pub(crate) fn sort_results(&self, results: &mut [Document]) {
        if let Some(spec) = self.sort.as_ref().filter(|s| !s.is_empty()) {
            results.sort_by(|a, b| spec.compare(a, b));
        }
    }

    /// `results[skip .. skip + limit]`, clamped to the available range.
    pub(crate) fn paginate(&self, results: Vec<Document>) -> Vec<Document> {
        let len = results.len();
        let start = self.skip.min(len);
        let end = match self.limit {
            Some(limit) if limit > 0 => start.saturating_add(limit).min(len),
            _ => len,
        };
        results.into_iter().skip(start).take(end - start).collect()
    }
}

/// A `$set` update: fields shallow-merged into the first matching document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
}

impl Update {
    pub fn set(fields: Document) -> Self {
        Update { set: fields }
    }

    pub fn set_field(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set.insert(field.to_string(), value.into());
        self
    }

    pub fn fields(&self) -> &Document {
        &self.set
    }

    /// Parse `{"$set": {...}}`. Other update operators are not supported.
    pub fn from_json(update: &Value) -> Result<Self> {
        let map = update
            .as_object()
            .ok_or_else(|| StoreError::InvalidUpdate("update must be an object".into()))?;

        if let Some(op) = map.keys().find(|k| k.as_str() != "$set") {
            return Err(StoreError::InvalidUpdate(format!(
                "unsupported update key '{op}', only $set is available"
            )));
        }

        match map.get("$set") {
            Some(Value::Object(fields)) => Ok(Update::set(fields.clone())),
            Some(_) => Err(StoreError::InvalidUpdate("$set expects an object".into())),
            None => Err(StoreError::InvalidUpdate("missing $set".into())),
        }
    }

    pub(crate) fn apply(&self, target: &mut Document) {
        for (field, value) in &self.set {
            if field == ID_FIELD {
                log::warn!("Ignoring attempt to $set the identifier field");
                continue;
            }
            target.insert(field.clone(), value.clone());
        }
    }
}

/// An index request. The in-memory store acknowledges these without
/// building anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: IndexMap<String, i32>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    pub fn on(field: &str, order: SortOrder) -> Self {
        IndexSpec {
            keys: IndexMap::new(),
            unique: false,
        }
        .and(field, order)
    }

    pub fn and(mut self, field: &str, order: SortOrder) -> Self {
        let direction = match order {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        };
        self.keys.insert(field.to_string(), direction);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Driver-style index name, e.g. `user_id_1_tea_id_1`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, dir)| format!("{field}_{dir}"))
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn docs(values: Vec<Value>) -> Vec<Document> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_sort_spec_keeps_key_order() {
        let spec = SortSpec::from_json(&json!({ "score": -1, "created_at": 1 })).unwrap();
        assert_eq!(
            spec.keys(),
            &[
                ("score".to_string(), SortOrder::Descending),
                ("created_at".to_string(), SortOrder::Ascending),
            ]
        );
    }

    #[test]
    fn test_secondary_key_breaks_tie() {
        let spec = SortSpec::new()
            .then("score", SortOrder::Descending)
            .then("created_at", SortOrder::Descending);
        let mut results = docs(vec![
            json!({ "score": 5, "created_at": 1 }),
            json!({ "score": 5, "created_at": 2 }),
        ]);
        FindOptions::new().sort(spec).sort_results(&mut results);
        assert_eq!(results[0]["created_at"], 2);
        assert_eq!(results[1]["created_at"], 1);
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let mut results = docs(vec![
            json!({ "n": "first", "score": 1 }),
            json!({ "n": "second" }),
            json!({ "n": "third", "score": 1 }),
        ]);
        FindOptions::new()
            .sort_by("score", SortOrder::Descending)
            .sort_results(&mut results);
        let order: Vec<_> = results.iter().map(|d| d["n"].clone()).collect();
        assert_eq!(order, vec![json!("first"), json!("third"), json!("second")]);
    }

    #[test]
    fn test_non_one_direction_is_descending() {
        assert_eq!(SortOrder::from_json(&json!(1)), SortOrder::Ascending);
        assert_eq!(SortOrder::from_json(&json!(-1)), SortOrder::Descending);
        assert_eq!(SortOrder::from_json(&json!("asc")), SortOrder::Descending);
    }

    #[test]
    fn test_paginate_boundaries() {
        let all = docs((0..10).map(|i| json!({ "i": i })).collect());

        let page = FindOptions::new().skip(5).limit(10).paginate(all.clone());
        assert_eq!(page.len(), 5);
        assert_eq!(page[0]["i"], 5);

        assert!(FindOptions::new().skip(10).paginate(all.clone()).is_empty());
        assert!(FindOptions::new().skip(50).limit(3).paginate(all.clone()).is_empty());
        assert_eq!(FindOptions::new().limit(0).paginate(all.clone()).len(), 10);
        assert_eq!(FindOptions::new().skip(2).limit(3).paginate(all).len(), 3);
    }

    #[test]
    fn test_update_from_json() {
        let update = Update::from_json(&json!({ "$set": { "score": 3 } })).unwrap();
        assert_eq!(update, Update::default().set_field("score", 3));

        assert!(Update::from_json(&json!({ "$inc": { "score": 1 } })).is_err());
        assert!(Update::from_json(&json!({ "score": 1 })).is_err());
        assert!(Update::from_json(&json!({ "$set": 1 })).is_err());
    }

    #[test]
    fn test_update_never_touches_identifier() {
        let mut target = docs(vec![json!({ "score": 1 })]).remove(0);
        Update::default()
            .set_field("_id", "other")
            .set_field("score", 2)
            .apply(&mut target);
        assert_eq!(Value::Object(target), json!({ "score": 2 }));
    }

    #[test]
    fn test_index_name() {
        let index = IndexSpec::on("user_id", SortOrder::Ascending)
            .and("tea_id", SortOrder::Ascending)
            .unique();
        assert_eq!(index.name(), "user_id_1_tea_id_1");
        assert!(index.unique);
        assert_eq!(IndexSpec::on("score", SortOrder::Descending).name(), "score_-1");
    }
}
