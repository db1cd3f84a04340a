use crate::error::{FloodError, Result};
use crate::types::{FileMetadata, PeerId, Validity};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// A replica of a file mastered elsewhere.
#[derive(Debug, Clone)]
pub struct CachedFileRecord {
    pub filename: String,
    pub version: u64,
    pub validity: Validity,
    /// `None` for replicas found on disk at startup whose origin is unknown.
    pub master_id: Option<PeerId>,
    remaining_ttr: Duration,
    anchored_at: Instant,
    pub fetched_at: DateTime<Utc>,
}

impl CachedFileRecord {
    /// A copy handed over with no TTR left starts out expired.
    fn fetched(filename: &str, metadata: &FileMetadata) -> Self {
        let validity = if metadata.ttr_ms == 0 {
            Validity::TtrExpired
        } else {
            Validity::Valid
        };

        Self {
            filename: filename.to_string(),
            version: metadata.version,
            validity,
            master_id: Some(metadata.master_id),
            remaining_ttr: Duration::from_millis(metadata.ttr_ms),
            anchored_at: Instant::now(),
            fetched_at: Utc::now(),
        }
    }

    fn orphaned(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            version: 0,
            validity: Validity::Invalid,
            master_id: None,
            remaining_ttr: Duration::ZERO,
            anchored_at: Instant::now(),
            fetched_at: Utc::now(),
        }
    }

    /// Time left before the copy must be refreshed, as of `now`. Never negative.
    pub fn remaining_ttr_at(&self, now: Instant) -> Duration {
        self.remaining_ttr
            .saturating_sub(now.saturating_duration_since(self.anchored_at))
    }

    pub fn remaining_ttr(&self) -> Duration {
        self.remaining_ttr_at(Instant::now())
    }

    fn decay_to(&mut self, now: Instant) -> bool {
        self.remaining_ttr = self.remaining_ttr_at(now);
        self.anchored_at = now;

        if self.remaining_ttr.is_zero() && self.validity == Validity::Valid {
            self.validity = Validity::TtrExpired;
            return true;
        }
        false
    }
}

#[derive(Debug, Default)]
struct Tables {
    masters: HashMap<String, u64>,
    cached: HashMap<String, CachedFileRecord>,
}

/// In-memory tables of master and cached files.
///
/// A filename is never held as both master and cache in the same store.
pub struct EntryStore {
    local_id: PeerId,
    master_ttr: Duration,
    tables: RwLock<Tables>,
}

impl EntryStore {
    pub fn new(local_id: PeerId, master_ttr: Duration) -> Self {
        Self {
            local_id,
            master_ttr,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Registers a master copy at version 0, displacing any cached copy of the same name.
    pub async fn register_master(&self, filename: &str) -> bool {
        let mut tables = self.tables.write().await;
        let displaced = tables.cached.remove(filename).is_some();
        tables.masters.entry(filename.to_string()).or_insert(0);
        displaced
    }

    /// Registers a replica found on disk whose freshness cannot be known.
    pub async fn register_orphan(&self, filename: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.masters.contains_key(filename) {
            return Err(FloodError::InvalidOperation(format!(
                "{} is mastered locally",
                filename
            )));
        }
        tables
            .cached
            .insert(filename.to_string(), CachedFileRecord::orphaned(filename));
        Ok(())
    }

    /// Masters are always valid. Unknown names report `Invalid`.
    pub async fn has_file(&self, filename: &str) -> Validity {
        let tables = self.tables.read().await;
        if tables.masters.contains_key(filename) {
            return Validity::Valid;
        }

        tables
            .cached
            .get(filename)
            .map(|record| record.validity)
            .unwrap_or(Validity::Invalid)
    }

    pub async fn is_master(&self, filename: &str) -> bool {
        self.tables.read().await.masters.contains_key(filename)
    }

    pub async fn is_cached(&self, filename: &str) -> bool {
        self.tables.read().await.cached.contains_key(filename)
    }

    pub async fn metadata(&self, filename: &str) -> Option<FileMetadata> {
        let tables = self.tables.read().await;
        if let Some(version) = tables.masters.get(filename) {
            return Some(FileMetadata {
                version: *version,
                master_id: self.local_id,
                ttr_ms: self.master_ttr.as_millis() as u64,
            });
        }

        let record = tables.cached.get(filename)?;
        Some(FileMetadata {
            version: record.version,
            master_id: record.master_id?,
            ttr_ms: record.remaining_ttr().as_millis() as u64,
        })
    }

    pub async fn master_version(&self, filename: &str) -> Option<u64> {
        self.tables.read().await.masters.get(filename).copied()
    }

    pub async fn cached_record(&self, filename: &str) -> Option<CachedFileRecord> {
        self.tables.read().await.cached.get(filename).cloned()
    }

    pub async fn master_files(&self) -> Vec<String> {
        let tables = self.tables.read().await;
        let mut names: Vec<String> = tables.masters.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn increment_version(&self, filename: &str) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let version = tables.masters.get_mut(filename).ok_or_else(|| {
            FloodError::InvalidOperation(format!("{} is not a master file", filename))
        })?;
        *version += 1;
        Ok(*version)
    }

    /// Writes a fresh record for a fetched or revalidated copy.
    ///
    /// Returns when the replaced copy, if any, had been fetched.
    pub async fn record_fetch(
        &self,
        filename: &str,
        metadata: &FileMetadata,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut tables = self.tables.write().await;
        if tables.masters.contains_key(filename) {
            return Err(FloodError::InvalidOperation(format!(
                "cannot cache {}: it is mastered locally",
                filename
            )));
        }

        let previous = tables.cached.insert(
            filename.to_string(),
            CachedFileRecord::fetched(filename, metadata),
        );
        Ok(previous.map(|record| record.fetched_at))
    }

    /// Marks a cached copy INVALID. Returns false when there was nothing to invalidate.
    pub async fn invalidate(&self, filename: &str) -> bool {
        let mut tables = self.tables.write().await;
        match tables.cached.get_mut(filename) {
            Some(record) if record.validity != Validity::Invalid => {
                record.validity = Validity::Invalid;
                true
            }
            _ => false,
        }
    }

    /// Invalidates every cached copy whose master is in `masters`.
    pub async fn invalidate_mastered_by(&self, masters: &BTreeSet<PeerId>) -> Vec<String> {
        let mut tables = self.tables.write().await;
        let mut invalidated = Vec::new();

        for record in tables.cached.values_mut() {
            let Some(master_id) = record.master_id else {
                continue;
            };
            if masters.contains(&master_id) && record.validity != Validity::Invalid {
                record.validity = Validity::Invalid;
                invalidated.push(record.filename.clone());
            }
        }

        invalidated.sort();
        invalidated
    }

    /// Drops whatever record exists for the name.
    pub async fn remove(&self, filename: &str) -> bool {
        let mut tables = self.tables.write().await;
        let master = tables.masters.remove(filename).is_some();
        let cached = tables.cached.remove(filename).is_some();
        master || cached
    }

    /// Smallest strictly positive remaining TTR across cached copies.
    pub async fn min_positive_ttr(&self) -> Option<Duration> {
        let now = Instant::now();
        let tables = self.tables.read().await;
        tables
            .cached
            .values()
            .map(|record| record.remaining_ttr_at(now))
            .filter(|ttr| !ttr.is_zero())
            .min()
    }

    /// Brings every remaining TTR up to date and expires the ones that ran out.
    pub async fn decay(&self) -> Vec<String> {
        let now = Instant::now();
        let mut tables = self.tables.write().await;
        let mut expired = Vec::new();

        for record in tables.cached.values_mut() {
            if record.decay_to(now) {
                expired.push(record.filename.clone());
            }
        }

        expired.sort();
        expired
    }
}
