// Narrow aggregation: the single match/group/sort pipeline shape the forum uses
// to count posts per batch year

use crate::document::{self, Document};
use crate::query::Filter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One output row of a group-and-count pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCount {
    #[serde(rename = "_id")]
    pub id: Value,
    pub count: u64,
}

/// A parsed aggregation pipeline.
#[derive(Debug, Clone)]
pub enum Pipeline {
    /// `[{$match: ...}, {$group: {_id: "$field", count: {$sum: 1}}}, {$sort: {_id: 1}}]`
    GroupCount { filter: Filter, field: String },
    /// Any other shape. Evaluates to no rows.
    Unsupported,
}

impl Pipeline {
    /// Count documents per distinct value of `field`, skipping documents
    /// where it is null or absent.
    pub fn group_count(field: &str) -> Self {
        Pipeline::GroupCount {
            filter: Filter::all(),
            field: field.to_string(),
        }
    }

    /// Recognize the supported pipeline shape. Never fails: anything that
    /// does not fit becomes `Pipeline::Unsupported`.
    pub fn from_json(stages: &Value) -> Self {
        match parse_group_count(stages) {
            Some((filter, field)) => Pipeline::GroupCount { filter, field },
            None => {
                log::debug!("Unsupported aggregation pipeline: {stages}");
                Pipeline::Unsupported
            }
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Pipeline::Unsupported)
    }

    /// Evaluate against `(id, document)` pairs. Rows come back sorted by the
    /// string form of the group key, ascending.
    pub(crate) fn run<'a>(
        &self,
        docs: impl Iterator<Item = (&'a str, &'a Document)>,
    ) -> Vec<GroupCount> {
        let (filter, field) = match self {
            Pipeline::GroupCount { filter, field } => (filter, field),
            Pipeline::Unsupported => return Vec::new(),
        };

        // Keyed on string form first, then kind, so `26` and `"26"` stay apart.
        let mut groups: BTreeMap<(String, u8), GroupCount> = BTreeMap::new();
        for (id, doc) in docs {
            let key = match doc.get(field) {
                Some(Value::Null) | None => continue,
                Some(key) => key,
            };
            if !filter.matches(id, doc) {
                continue;
            }
            groups
                .entry((
                    document::string_form(key).into_owned(),
                    document::kind_rank(key),
                ))
                .or_insert_with(|| GroupCount {
                    id: key.clone(),
                    count: 0,
                })
                .count += 1;
        }
        groups.into_values().collect()
    }
}

fn stage<'a>(stages: &'a [Value], index: usize, operator: &str) -> Option<&'a Value> {
    let stage = stages.get(index)?.as_object()?;
    if stage.len() != 1 {
        return None;
    }
    stage.get(operator)
}

fn parse_group_count(stages: &Value) -> Option<(Filter, String)> {
    let stages = stages.as_array()?;
    if stages.len() != 3 {
        return None;
    }

    let filter = Filter::from_json(stage(stages, 0, "$match")?).ok()?;

    let group = stage(stages, 1, "$group")?;
    let field = group.get("_id")?.as_str()?.strip_prefix('$')?;
    if field.is_empty() {
        return None;
    }

    // Only an ascending sort on the group key is emulated
    let sort = stage(stages, 2, "$sort")?.as_object()?;
    if sort.len() != 1 || !document::values_equal(sort.get("_id")?, &Value::from(1)) {
        return None;
    }

    Some((filter, field.to_string()))
}
