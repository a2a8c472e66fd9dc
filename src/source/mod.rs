//! Data sources: where entity records come from.
//!
//! The pipeline only sees the [`DataSource`] trait. [`HttpSource`] talks to
//! the public FPL API; [`StaticSource`] serves fixed records for tests and
//! offline replays.

mod http;
mod memory;

pub use http::{HttpSource, DEFAULT_API_BASE};
pub use memory::StaticSource;

use tracing::warn;

use crate::error::Result;
use crate::model::{EntityKind, EntityRecord};

/// Supplier of decoded entity records.
pub trait DataSource {
    /// All records of a reference kind, in source order.
    ///
    /// # Errors
    ///
    /// Returns `Fetch` if the source cannot deliver the collection, or
    /// `InvalidArgument` for a fact kind (those come from detail records).
    fn fetch_collection(&mut self, kind: EntityKind) -> Result<Vec<EntityRecord>>;

    /// The detail record for one player, carrying `id` and the
    /// `fixtures`, `history` and `history_past` sub-collections.
    ///
    /// Returns `None` when the source has no detail for `id`.
    ///
    /// # Errors
    ///
    /// Returns `Fetch` on a transport or decoding failure.
    fn fetch_detail(&mut self, id: i64) -> Result<Option<EntityRecord>>;

    /// Detail records for several players, in ascending id order.
    ///
    /// Players without a detail are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Fails on the first fetch error.
    fn fetch_details(&mut self, ids: &[i64]) -> Result<Vec<(i64, EntityRecord)>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut details = Vec::with_capacity(ids.len());
        for id in ids {
            match self.fetch_detail(id)? {
                Some(detail) => details.push((id, detail)),
                None => warn!(player_id = id, "No detail record, skipping player"),
            }
        }
        Ok(details)
    }
}
