// Store configuration - collections to create up front and the indexes the
// backend requests at startup

use crate::backend::{Database, DocumentCollection};
use crate::error::{Result, StoreError};
use crate::query::options::{IndexSpec, SortOrder};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration parsed from a YAML file such as:
///
/// ```yaml
/// collections: [users, teas]
/// indexes:
///   users:
///     - keys: { username: 1 }
///       unique: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub indexes: IndexMap<String, Vec<IndexSpec>>,
}

impl Default for StoreConfig {
    /// The forum's collections and the index set its backend asks for.
    fn default() -> Self {
        use SortOrder::{Ascending, Descending};

        let mut indexes = IndexMap::new();
        indexes.insert(
            "users".to_string(),
            vec![IndexSpec::on("username", Ascending).unique()],
        );
        indexes.insert(
            "teas".to_string(),
            vec![
                IndexSpec::on("created_at", Descending),
                IndexSpec::on("score", Descending),
                IndexSpec::on("tag", Ascending),
                IndexSpec::on("author", Ascending),
            ],
        );
        indexes.insert(
            "votes".to_string(),
            vec![
                IndexSpec::on("user_id", Ascending)
                    .and("tea_id", Ascending)
                    .unique(),
                IndexSpec::on("tea_id", Ascending),
            ],
        );
        indexes.insert(
            "comments".to_string(),
            vec![
                IndexSpec::on("tea_id", Ascending),
                IndexSpec::on("created_at", Descending),
                IndexSpec::on("author", Ascending),
            ],
        );
        indexes.insert(
            "comment_votes".to_string(),
            vec![IndexSpec::on("user_id", Ascending)
                .and("comment_id", Ascending)
                .unique()],
        );

        StoreConfig {
            collections: indexes.keys().cloned().collect(),
            indexes,
        }
    }
}

impl StoreConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: StoreConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(name) = self.collections.iter().find(|n| n.is_empty()) {
            return Err(StoreError::Config(format!(
                "collection names must not be empty, got {name:?}"
            )));
        }
        for (collection, specs) in &self.indexes {
            if specs.iter().any(|s| s.keys.is_empty()) {
                return Err(StoreError::Config(format!(
                    "index on '{collection}' has no keys"
                )));
            }
        }
        Ok(())
    }

    pub fn index_count(&self) -> usize {
        self.indexes.values().map(Vec::len).sum()
    }
}

/// Issue every configured `create_index` call against `db`.
/// Returns the number of indexes acknowledged.
pub async fn ensure_indexes<D: Database>(db: &D, config: &StoreConfig) -> usize {
    let mut created = 0;
    for (name, specs) in &config.indexes {
        let collection = db.collection(name);
        for spec in specs {
            let ack = collection.create_index(spec).await;
            if ack.ok == 1 {
                created += 1;
            } else {
                log::warn!("Index {} on '{name}' was not acknowledged", spec.name());
            }
        }
    }
    log::info!("Database indexes created: {created}/{}", config.index_count());
    created
}
