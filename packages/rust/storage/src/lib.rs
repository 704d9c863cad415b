//! Flat-file dataset storage, one JSON document per source.
//!
//! The [`DatasetStore`] holds a source's [`CanonicalRecord`]s in first-seen
//! order, indexed by [`RowId`]. Incoming lots are merged with a
//! fill-in-the-gaps upsert:
//! - an unseen `row_id` is appended as a new record
//! - for a known `row_id`, only fields missing from the stored record are
//!   written, except `sold_date`, which is also backfilled when the stored
//!   value is `null`, empty, or the string `"null"`
//!
//! Stored values are never corrected once set. Records are never removed.
//!
//! Loading is lenient about legacy files. Rows whose `row_id` is missing,
//! `null` or otherwise unusable are kept in the file but not indexed. When a
//! file repeats a `row_id`, the last copy is indexed and receives merges; the
//! earlier copies are left as they are.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use lotharvest_shared::{CanonicalRecord, HarvestError, Listing, Result, RowId, Slot, Source};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What a single upsert did to the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new record was appended.
    Added,
    /// An existing record gained at least one field.
    Updated,
    /// An existing record was left as it was.
    Unchanged,
    /// The candidate had no usable `row_id`.
    Skipped,
}

/// Counts from merging one batch of listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Listings dropped for lacking a usable `row_id`.
    pub skipped: usize,
    /// Records in the dataset after the merge.
    pub total: usize,
}

// ---------------------------------------------------------------------------
// DatasetStore
// ---------------------------------------------------------------------------

/// In-memory view of one source's dataset file.
#[derive(Debug)]
pub struct DatasetStore {
    path: PathBuf,
    records: Vec<CanonicalRecord>,
    index: HashMap<RowId, usize>,
}

impl DatasetStore {
    /// Load the dataset at `path`. A missing file is an empty dataset; a file
    /// that is not a JSON array of records is an error.
    pub fn open(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;
            serde_json::from_str::<Vec<CanonicalRecord>>(&content).map_err(|e| {
                HarvestError::Storage(format!("{}: invalid dataset: {e}", path.display()))
            })?
        } else {
            debug!(path = %path.display(), "dataset not found, starting empty");
            Vec::new()
        };

        let mut index = HashMap::with_capacity(records.len());
        let mut unkeyed = 0usize;
        for (position, record) in records.iter().enumerate() {
            let Some(key) = record.key() else {
                unkeyed += 1;
                continue;
            };
            if index.insert(key.clone(), position).is_some() {
                warn!(row_id = %key, path = %path.display(), "duplicate row_id in dataset, indexing last");
            }
        }
        if unkeyed > 0 {
            warn!(unkeyed, path = %path.display(), "dataset rows without usable row_id");
        }

        debug!(path = %path.display(), records = records.len(), "dataset loaded");

        Ok(Self {
            path: path.to_path_buf(),
            records,
            index,
        })
    }

    /// Location of the dataset file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by id.
    pub fn get(&self, row_id: &RowId) -> Option<&CanonicalRecord> {
        self.index.get(row_id).map(|&i| &self.records[i])
    }

    /// Insert `candidate` or fill the gaps of the record sharing its id.
    pub fn upsert(&mut self, candidate: CanonicalRecord) -> UpsertOutcome {
        let Some(key) = candidate.key() else {
            return UpsertOutcome::Skipped;
        };
        let Some(&position) = self.index.get(&key) else {
            self.index.insert(key, self.records.len());
            self.records.push(candidate);
            return UpsertOutcome::Added;
        };

        let stored = &mut self.records[position];
        let mut changed = false;
        changed |= fill(&mut stored.title, &candidate.title);
        changed |= fill(&mut stored.status, &candidate.status);
        changed |= fill(&mut stored.sold_price, &candidate.sold_price);
        changed |= fill(&mut stored.url, &candidate.url);
        changed |= backfill_sold_date(stored, &candidate.sold_date);
        changed |= fill(&mut stored.auction_title, &candidate.auction_title);

        if changed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Unchanged
        }
    }

    /// Merge a batch of sold listings from `source`.
    #[instrument(skip_all, fields(source = %source, incoming = listings.len()))]
    pub fn merge(&mut self, listings: &[Listing], source: &Source) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for listing in listings {
            let Some(candidate) = CanonicalRecord::from_listing(listing, source) else {
                summary.skipped += 1;
                continue;
            };

            match self.upsert(candidate) {
                UpsertOutcome::Added => summary.added += 1,
                UpsertOutcome::Updated => summary.updated += 1,
                UpsertOutcome::Unchanged => summary.unchanged += 1,
                UpsertOutcome::Skipped => summary.skipped += 1,
            }
        }

        summary.total = self.records.len();

        if summary.skipped > 0 {
            debug!(skipped = summary.skipped, "listings without row_id skipped");
        }
        info!(
            added = summary.added,
            updated = summary.updated,
            total = summary.total,
            "merge complete"
        );

        summary
    }

    /// Rewrite the whole dataset file.
    ///
    /// Pretty-printed UTF-8 with non-ASCII left unescaped. The document is
    /// written beside the target and renamed over it.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(&self.records)
            .map_err(|e| HarvestError::Storage(format!("dataset serialization failed: {e}")))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset.json".into());
        let temp = self.path.with_file_name(format!(".{file_name}.tmp"));

        std::fs::write(&temp, json).map_err(|e| HarvestError::io(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| HarvestError::io(&self.path, e))?;

        debug!(path = %self.path.display(), records = self.records.len(), "dataset written");
        Ok(())
    }
}

/// Write `candidate` into `slot` only if the stored document lacks the field.
fn fill<T: Clone>(slot: &mut Slot<T>, candidate: &Slot<T>) -> bool {
    if slot.is_none() && candidate.is_some() {
        slot.clone_from(candidate);
        return true;
    }
    false
}

/// `sold_date` may also replace a blank stored value with a real date.
fn backfill_sold_date(stored: &mut CanonicalRecord, candidate: &Slot<String>) -> bool {
    if fill(&mut stored.sold_date, candidate) {
        return true;
    }

    let has_date = matches!(candidate, Some(Some(date)) if !date.is_empty());
    if stored.sold_date_is_blank() && has_date {
        stored.sold_date.clone_from(candidate);
        return true;
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
