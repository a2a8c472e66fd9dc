//! End-to-end synchronization run: fetch, materialize, reconcile.
//!
//! The stages run strictly in sequence. Every designated kind is fetched
//! and materialized before the first write, so a bad payload or a failed
//! request aborts the run with the database untouched.
//!
//! Tables are then reconciled in [`EntityKind::ALL`] order. By default each
//! table gets its own IMMEDIATE transaction; a table-level failure rolls back
//! that table and aborts the run, leaving earlier tables committed. With
//! [`RunOptions::all_or_nothing`] the whole run shares one transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::upsert::{reconcile, ReconcileReport};
use crate::error::{Error, Result};
use crate::materialize::{materialize, materialize_collection};
use crate::model::{EntityKind, EntityRecord, RunMode, TableRow, TableSpec};
use crate::source::DataSource;
use crate::storage::schema::provision;
use crate::storage::{CreateMode, RunTotals, SqliteStorage};

/// Knobs for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunOptions {
    /// One transaction for the whole run instead of one per table.
    pub all_or_nothing: bool,
    /// Roll back a table and fail the run if any of its rows failed.
    pub strict: bool,
    /// Reconcile everything, then roll back.
    pub dry_run: bool,
    /// Table provisioning before reconciling.
    pub create_mode: CreateMode,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub mode: RunMode,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Players whose detail record was absent.
    pub players_skipped: usize,
    pub tables: Vec<ReconcileReport>,
}

impl PipelineReport {
    #[must_use]
    pub fn totals(&self) -> RunTotals {
        totals(&self.tables)
    }

    /// True when no table recorded a row error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.tables.iter().all(ReconcileReport::is_clean)
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&ReconcileReport> {
        self.tables.iter().find(|t| t.table == name)
    }
}

fn totals(tables: &[ReconcileReport]) -> RunTotals {
    tables.iter().fold(RunTotals::default(), |mut acc, t| {
        acc.inserted += t.inserted;
        acc.updated += t.updated;
        acc.unchanged += t.unchanged;
        acc.row_errors += t.errors.len();
        acc
    })
}

/// Drives one source into one store.
pub struct SyncPipeline<'a, S: DataSource> {
    source: S,
    store: &'a mut SqliteStorage,
    specs: Vec<TableSpec>,
    options: RunOptions,
}

impl<'a, S: DataSource> SyncPipeline<'a, S> {
    /// Pipeline over the built-in table specs.
    pub fn new(source: S, store: &'a mut SqliteStorage, options: RunOptions) -> Self {
        Self {
            source,
            store,
            specs: TableSpec::all(),
            options,
        }
    }

    /// Replace the table specs (e.g. with configured change columns).
    #[must_use]
    pub fn with_specs(mut self, specs: Vec<TableSpec>) -> Self {
        self.specs = specs;
        self
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Run the pipeline for `kinds` (all kinds when empty) under `mode`.
    ///
    /// The run is recorded in the `sync_runs` ledger whether it succeeds
    /// or fails.
    ///
    /// # Errors
    ///
    /// Fetch and materialize failures abort before any write. Table-level
    /// failures abort at that table. In strict mode a table with row errors
    /// fails with `RowErrors`.
    pub fn run(&mut self, kinds: &[EntityKind], mode: RunMode) -> Result<PipelineReport> {
        let designated: Vec<EntityKind> = EntityKind::ALL
            .into_iter()
            .filter(|k| kinds.is_empty() || kinds.contains(k))
            .filter(|k| mode.includes(*k))
            .collect();

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let kind_list = designated
            .iter()
            .map(EntityKind::as_str)
            .collect::<Vec<_>>()
            .join(",");

        info!(
            run_id = %run_id,
            mode = mode.as_str(),
            kinds = %kind_list,
            dry_run = self.options.dry_run,
            atomic = self.options.all_or_nothing,
            "Starting sync run"
        );
        self.store.begin_run(
            &run_id,
            mode.as_str(),
            &kind_list,
            self.options.dry_run,
            started_at.timestamp_millis(),
        )?;

        let mut tables = Vec::new();
        let outcome = self.execute(&designated, &mut tables);
        let finished_at = Utc::now();

        // Only committed writes count towards the ledger totals.
        let rolled_back =
            self.options.dry_run || (self.options.all_or_nothing && outcome.is_err());
        let recorded = if rolled_back {
            RunTotals::default()
        } else {
            totals(&tables)
        };
        let ledger = self.store.finish_run(
            &run_id,
            recorded,
            outcome.as_ref().err(),
            finished_at.timestamp_millis(),
        );

        let players_skipped = match outcome {
            Ok(skipped) => skipped,
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Sync run failed");
                if let Err(ledger_err) = ledger {
                    warn!(error = %ledger_err, "Could not record failed run");
                }
                return Err(e);
            }
        };
        ledger?;

        let report = PipelineReport {
            run_id,
            mode,
            dry_run: self.options.dry_run,
            started_at,
            finished_at,
            players_skipped,
            tables,
        };
        let t = report.totals();
        info!(
            run_id = %report.run_id,
            inserted = t.inserted,
            updated = t.updated,
            unchanged = t.unchanged,
            row_errors = t.row_errors,
            "Sync run finished"
        );
        Ok(report)
    }

    /// Returns the number of players skipped for lack of a detail record.
    fn execute(&mut self, designated: &[EntityKind], tables: &mut Vec<ReconcileReport>) -> Result<usize> {
        let fetched = fetch_stage(&mut self.source, designated)?;
        let skipped = fetched.players_skipped;
        let rows = materialize_stage(&fetched, designated)?;

        let work = designated
            .iter()
            .map(|kind| {
                let spec = self
                    .specs
                    .iter()
                    .find(|s| s.kind == *kind)
                    .ok_or_else(|| Error::InvalidArgument(format!("no table spec for {kind}")))?;
                let rows = rows.get(kind).map_or(&[][..], Vec::as_slice);
                Ok((spec, rows))
            })
            .collect::<Result<Vec<_>>>()?;

        let options = self.options;
        if options.all_or_nothing {
            let tx = self.store.transaction()?;
            for (spec, rows) in &work {
                tables.push(apply_table(&tx, spec, rows, options)?);
            }
            finish_transaction(tx, "*", options.dry_run)?;
        } else {
            for (spec, rows) in &work {
                let tx = self.store.transaction()?;
                let report = apply_table(&tx, spec, rows, options)?;
                finish_transaction(tx, &spec.name, options.dry_run)?;
                tables.push(report);
            }
        }

        Ok(skipped)
    }
}

struct Fetched {
    collections: BTreeMap<EntityKind, Vec<EntityRecord>>,
    details: Vec<(i64, EntityRecord)>,
    players_skipped: usize,
}

fn fetch_stage<S: DataSource>(source: &mut S, designated: &[EntityKind]) -> Result<Fetched> {
    let mut collections = BTreeMap::new();
    for kind in designated.iter().filter(|k| !k.is_fact()) {
        let records = source.fetch_collection(*kind)?;
        info!(kind = %kind, records = records.len(), "Fetched");
        collections.insert(*kind, records);
    }

    let mut details = Vec::new();
    let mut players_skipped = 0;
    if designated.iter().any(EntityKind::is_fact) {
        if !collections.contains_key(&EntityKind::Players) {
            let players = source.fetch_collection(EntityKind::Players)?;
            debug!(players = players.len(), "Fetched players for detail lookups");
            collections.insert(EntityKind::Players, players);
        }
        let ids = player_ids(collections.get(&EntityKind::Players).map_or(&[][..], Vec::as_slice))?;
        details = source.fetch_details(&ids)?;
        players_skipped = ids.len() - details.len().min(ids.len());
        info!(players = ids.len(), details = details.len(), "Fetched player details");
    }

    Ok(Fetched {
        collections,
        details,
        players_skipped,
    })
}

fn player_ids(players: &[EntityRecord]) -> Result<Vec<i64>> {
    let mut ids = players
        .iter()
        .map(|p| {
            p.get("id")
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| Error::malformed("players", "id", "is missing or not an integer"))
        })
        .collect::<Result<Vec<_>>>()?;
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

fn materialize_stage(
    fetched: &Fetched,
    designated: &[EntityKind],
) -> Result<BTreeMap<EntityKind, Vec<TableRow>>> {
    let mut out = BTreeMap::new();
    for kind in designated {
        let rows = if kind.is_fact() {
            let mut rows = Vec::new();
            for (_, detail) in &fetched.details {
                rows.extend(materialize(detail, *kind)?);
            }
            rows
        } else {
            let records = fetched.collections.get(kind).map_or(&[][..], Vec::as_slice);
            materialize_collection(records, *kind)?
        };
        debug!(kind = %kind, rows = rows.len(), "Materialized");
        out.insert(*kind, rows);
    }
    Ok(out)
}

/// Provision, verify and reconcile one table inside the caller's transaction.
fn apply_table(
    conn: &Connection,
    spec: &TableSpec,
    rows: &[TableRow],
    options: RunOptions,
) -> Result<ReconcileReport> {
    provision(conn, std::slice::from_ref(spec), options.create_mode)?;
    let report = reconcile(conn, spec, rows)?;

    info!(
        table = %spec.name,
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        duplicates = report.duplicates,
        errors = report.errors.len(),
        "Table reconciled"
    );

    if options.strict && !report.is_clean() {
        return Err(Error::RowErrors {
            table: spec.name.clone(),
            count: report.errors.len(),
        });
    }
    Ok(report)
}

fn finish_transaction(tx: rusqlite::Transaction<'_>, table: &str, dry_run: bool) -> Result<()> {
    let result = if dry_run { tx.rollback() } else { tx.commit() };
    result.map_err(|source| Error::Transaction {
        table: table.to_string(),
        source,
    })
}
