//! Row samples of stored tables.
//!
//! Only the binary-model variant stores rows; for template files every fetch
//! fails with [`SampleError::DataUnavailable`]. Samples are cached per
//! (table, tier) for as long as the accessor lives, and the accessor lives as
//! long as the loaded file.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use thiserror::Error;

use crate::config::LensConfig;
use crate::data_model::{CellValue, DataModelBlob, DataModelError, StoredColumn};
use crate::error_codes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleTier {
    Small,
    Large,
}

impl SampleTier {
    fn index(self) -> usize {
        match self {
            SampleTier::Small => 0,
            SampleTier::Large => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSample {
    pub table: String,
    pub tier: SampleTier,
    pub columns: Vec<StoredColumn>,
    pub rows: Vec<Vec<CellValue>>,
    /// Row count of the stored table, not of the sample.
    pub total_rows: usize,
}

impl TableSample {
    /// Renders the sample as a pipe table. Cells longer than `max_cell_chars`
    /// are cut; pipes and newlines inside cells are escaped.
    pub fn to_pipe_table(&self, max_cell_chars: usize) -> String {
        let mut out = String::new();
        let header: Vec<String> = self
            .columns
            .iter()
            .map(|c| cell_text(&c.name, max_cell_chars))
            .collect();
        let _ = writeln!(out, "| {} |", header.join(" | "));
        let _ = writeln!(
            out,
            "|{}|",
            vec!["---"; self.columns.len().max(1)].join("|")
        );
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|v| cell_text(&v.to_string(), max_cell_chars))
                .collect();
            let _ = writeln!(out, "| {} |", cells.join(" | "));
        }
        out
    }
}

fn cell_text(raw: &str, max_chars: usize) -> String {
    let escaped = raw.replace('|', "\\|").replace(['\r', '\n'], " ");
    if escaped.chars().count() <= max_chars {
        return escaped;
    }
    let mut cut: String = escaped.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SampleError {
    #[error("no row data is available for '{table}': the file stores only the model description")]
    DataUnavailable { table: String },
    #[error("unknown table '{name}' (stored tables: {})", .available.join(", "))]
    UnknownTable { name: String, available: Vec<String> },
    #[error("failed to decode rows of '{table}': {source}")]
    Decode {
        table: String,
        #[source]
        source: DataModelError,
    },
    #[error("sample worker for '{table}' failed: {reason}")]
    Worker { table: String, reason: String },
}

impl SampleError {
    pub fn code(&self) -> &'static str {
        match self {
            SampleError::DataUnavailable { .. } => error_codes::SAMPLE_DATA_UNAVAILABLE,
            SampleError::UnknownTable { .. } => error_codes::SAMPLE_UNKNOWN_TABLE,
            SampleError::Decode { .. } => error_codes::SAMPLE_DECODE,
            SampleError::Worker { .. } => error_codes::SAMPLE_WORKER,
        }
    }
}

/// Fetch and decode counts per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SampleStats {
    pub small_fetches: usize,
    pub large_fetches: usize,
    pub small_decodes: usize,
    pub large_decodes: usize,
}

/// Shared with blocking workers; the decode counters are bumped from there.
#[derive(Debug)]
struct TableStore {
    blob: Option<Arc<DataModelBlob>>,
    decodes: [AtomicUsize; 2],
}

impl TableStore {
    fn decode(&self, table: &str, tier: SampleTier, rows: usize) -> Result<TableSample, SampleError> {
        let Some(blob) = &self.blob else {
            return Err(SampleError::DataUnavailable {
                table: table.to_string(),
            });
        };
        self.decodes[tier.index()].fetch_add(1, Ordering::Relaxed);

        let stored = blob
            .read_table(table, rows)
            .map_err(|source| SampleError::Decode {
                table: table.to_string(),
                source,
            })?
            .ok_or_else(|| unknown_table(blob, table))?;

        Ok(TableSample {
            table: stored.table,
            tier,
            columns: stored.columns,
            rows: stored.rows,
            total_rows: stored.total_rows,
        })
    }
}

fn unknown_table(blob: &DataModelBlob, name: &str) -> SampleError {
    SampleError::UnknownTable {
        name: name.to_string(),
        available: blob.table_names().map(str::to_string).collect(),
    }
}

#[derive(Debug)]
pub struct TabularDataAccessor {
    store: Arc<TableStore>,
    cache: HashMap<(String, SampleTier), Arc<TableSample>>,
    small_rows: usize,
    large_rows: usize,
    fetches: [usize; 2],
}

impl TabularDataAccessor {
    pub fn new(blob: Option<Arc<DataModelBlob>>, config: &LensConfig) -> TabularDataAccessor {
        TabularDataAccessor {
            store: Arc::new(TableStore {
                blob,
                decodes: [AtomicUsize::new(0), AtomicUsize::new(0)],
            }),
            cache: HashMap::new(),
            small_rows: config.small_sample_rows,
            large_rows: config.large_sample_rows,
            fetches: [0, 0],
        }
    }

    pub fn has_row_data(&self) -> bool {
        self.store.blob.is_some()
    }

    pub fn rows_for(&self, tier: SampleTier) -> usize {
        match tier {
            SampleTier::Small => self.small_rows,
            SampleTier::Large => self.large_rows,
        }
    }

    pub fn fetch_sample(
        &mut self,
        table: &str,
        tier: SampleTier,
    ) -> Result<Arc<TableSample>, SampleError> {
        self.fetches[tier.index()] += 1;
        let name = self.resolve(table)?;

        if let Some(hit) = self.cache.get(&(name.clone(), tier)) {
            log::debug!("sample cache hit for '{}' ({:?})", name, tier);
            return Ok(Arc::clone(hit));
        }

        let sample = Arc::new(self.store.decode(&name, tier, self.rows_for(tier))?);
        self.cache.insert((name, tier), Arc::clone(&sample));
        Ok(sample)
    }

    /// Large-tier fetch of several tables. Uncached tables are decoded on the
    /// blocking pool concurrently and all are awaited before returning.
    /// Duplicate names (ignoring case) are fetched once.
    pub async fn fetch_large_many(
        &mut self,
        tables: &[String],
    ) -> Vec<(String, Result<Arc<TableSample>, SampleError>)> {
        let tier = SampleTier::Large;
        let rows = self.large_rows;

        let mut seen: Vec<String> = Vec::new();
        let mut results: Vec<(String, Result<Arc<TableSample>, SampleError>)> = Vec::new();
        let mut pending = Vec::new();

        for requested in tables {
            if seen.iter().any(|s| s.eq_ignore_ascii_case(requested)) {
                continue;
            }
            seen.push(requested.clone());
            self.fetches[tier.index()] += 1;

            let name = match self.resolve(requested) {
                Ok(name) => name,
                Err(err) => {
                    results.push((requested.clone(), Err(err)));
                    continue;
                }
            };
            if let Some(hit) = self.cache.get(&(name.clone(), tier)) {
                results.push((requested.clone(), Ok(Arc::clone(hit))));
                continue;
            }

            let store = Arc::clone(&self.store);
            let worker_name = name.clone();
            let handle =
                tokio::task::spawn_blocking(move || store.decode(&worker_name, tier, rows));
            pending.push((requested.clone(), name, handle));
        }

        for (requested, name, handle) in pending {
            let outcome = match handle.await {
                Ok(Ok(sample)) => {
                    let sample = Arc::new(sample);
                    self.cache.insert((name, tier), Arc::clone(&sample));
                    Ok(sample)
                }
                Ok(Err(err)) => Err(err),
                Err(join) => Err(SampleError::Worker {
                    table: name,
                    reason: join.to_string(),
                }),
            };
            results.push((requested, outcome));
        }

        results
    }

    pub fn stats(&self) -> SampleStats {
        SampleStats {
            small_fetches: self.fetches[0],
            large_fetches: self.fetches[1],
            small_decodes: self.store.decodes[0].load(Ordering::Relaxed),
            large_decodes: self.store.decodes[1].load(Ordering::Relaxed),
        }
    }

    fn resolve(&self, table: &str) -> Result<String, SampleError> {
        let Some(blob) = &self.store.blob else {
            return Err(SampleError::DataUnavailable {
                table: table.to_string(),
            });
        };
        blob.table_name(table)
            .map(str::to_string)
            .ok_or_else(|| unknown_table(blob, table))
    }
}
