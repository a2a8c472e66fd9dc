//! In-memory source for tests and offline replays.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value as Json;

use super::DataSource;
use crate::error::{Error, Result};
use crate::model::{EntityKind, EntityRecord};

/// A [`DataSource`] serving fixed records.
///
/// Counts detail fetches so callers can check each player is fetched once.
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    collections: HashMap<EntityKind, Vec<EntityRecord>>,
    details: BTreeMap<i64, EntityRecord>,
    failing: HashSet<EntityKind>,
    detail_fetches: usize,
}

impl StaticSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a `bootstrap-static` shaped payload plus
    /// `element-summary` payloads keyed by player id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a payload is not a JSON object.
    pub fn from_payloads(
        bootstrap: Json,
        details: impl IntoIterator<Item = (i64, Json)>,
    ) -> Result<Self> {
        let Json::Object(bootstrap) = bootstrap else {
            return Err(Error::InvalidArgument("bootstrap payload must be an object".into()));
        };

        let mut source = Self::new();
        for kind in EntityKind::ALL.into_iter().filter(|k| !k.is_fact()) {
            if let Some(Json::Array(items)) = bootstrap.get(kind.source_key()) {
                let records = items
                    .iter()
                    .filter_map(|item| item.as_object().cloned())
                    .collect();
                source.collections.insert(kind, records);
            }
        }
        for (id, detail) in details {
            let Json::Object(mut detail) = detail else {
                return Err(Error::InvalidArgument(format!(
                    "detail payload for player {id} must be an object"
                )));
            };
            detail.insert("id".to_string(), Json::from(id));
            source.details.insert(id, detail);
        }
        Ok(source)
    }

    /// Serve `records` for `kind`.
    #[must_use]
    pub fn with_collection(mut self, kind: EntityKind, records: Vec<EntityRecord>) -> Self {
        self.collections.insert(kind, records);
        self
    }

    /// Serve `detail` for player `id`. The `id` field is filled in.
    #[must_use]
    pub fn with_detail(mut self, id: i64, mut detail: EntityRecord) -> Self {
        detail.insert("id".to_string(), Json::from(id));
        self.details.insert(id, detail);
        self
    }

    /// Make fetching `kind` fail.
    #[must_use]
    pub fn with_failure(mut self, kind: EntityKind) -> Self {
        self.failing.insert(kind);
        self
    }

    /// Replace the records served for `kind`.
    pub fn set_collection(&mut self, kind: EntityKind, records: Vec<EntityRecord>) {
        self.collections.insert(kind, records);
    }

    /// Mutable access to a served collection.
    pub fn collection_mut(&mut self, kind: EntityKind) -> Option<&mut Vec<EntityRecord>> {
        self.collections.get_mut(&kind)
    }

    /// Number of `fetch_detail` calls so far.
    #[must_use]
    pub fn detail_fetches(&self) -> usize {
        self.detail_fetches
    }
}

impl DataSource for StaticSource {
    fn fetch_collection(&mut self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        if kind.is_fact() {
            return Err(Error::InvalidArgument(format!(
                "{kind} is fetched per player, not as a collection"
            )));
        }
        if self.failing.contains(&kind) {
            return Err(Error::Fetch {
                what: kind.source_key().to_string(),
                message: "source configured to fail".into(),
            });
        }
        match self.collections.get(&kind) {
            Some(records) if !records.is_empty() => Ok(records.clone()),
            _ => Err(Error::Fetch {
                what: kind.source_key().to_string(),
                message: "collection is empty".into(),
            }),
        }
    }

    fn fetch_detail(&mut self, id: i64) -> Result<Option<EntityRecord>> {
        self.detail_fetches += 1;
        Ok(self.details.get(&id).cloned())
    }
}
