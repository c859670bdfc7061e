//! Classification audit store
//!
//! Records are kept in memory, keyed by ticket id, and appended to a
//! JSON-lines log on every upsert. The log is replayed on open; when a ticket
//! was reclassified the last line for its id wins. [`ClassificationStore::compact`]
//! rewrites the log with one line per ticket.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use triage_core::{ClassificationHistory, Error, PriorityStats, Result, StoredClassification};

/// Store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON-lines log file
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Rewrite the log on open once it holds this many superseded lines
    #[serde(default = "default_compact_threshold")]
    pub compact_threshold: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            compact_threshold: default_compact_threshold(),
        }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from("./data/classifications.jsonl")
}

fn default_compact_threshold() -> usize {
    10_000
}

struct StoreInner {
    records: HashMap<String, StoredClassification>,
    writer: BufWriter<File>,
    /// Lines in the log, including superseded ones
    log_lines: usize,
}

/// File-backed classification store
pub struct ClassificationStore {
    path: PathBuf,
    inner: RwLock<StoreInner>,
}

impl ClassificationStore {
    /// Open a store with the given settings, compacting if the log is bloated
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let store = Self::open(&config.path)?;
        if store.superseded_lines() >= config.compact_threshold {
            store.compact()?;
        }
        Ok(store)
    }

    /// Open (or create) the store at `path` and replay its log
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::store(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let (records, log_lines, unterminated) = replay(&path)?;
        let mut writer = open_append(&path)?;
        if unterminated {
            // Keep the next append off the truncated last line
            writer.write_all(b"\n").and_then(|_| writer.flush())?;
        }

        info!(
            "Opened classification store at {:?} ({} tickets, {} log lines)",
            path,
            records.len(),
            log_lines
        );

        Ok(Self {
            path,
            inner: RwLock::new(StoreInner {
                records,
                writer,
                log_lines,
            }),
        })
    }

    /// Log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of distinct tickets
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record for a ticket id
    pub fn get(&self, id: &str) -> Option<StoredClassification> {
        self.inner.read().records.get(id).cloned()
    }

    /// Log lines that a compaction would drop
    pub fn superseded_lines(&self) -> usize {
        let inner = self.inner.read();
        inner.log_lines.saturating_sub(inner.records.len())
    }

    /// Rewrite the log with one line per ticket, oldest first.
    ///
    /// Returns the number of records written.
    pub fn compact(&self) -> Result<usize> {
        let mut inner = self.inner.write();
        inner
            .writer
            .flush()
            .map_err(|e| Error::store(format!("flush failed: {}", e)))?;

        let mut records: Vec<_> = inner.records.values().collect();
        records.sort_by(|a, b| {
            a.processed_at
                .cmp(&b.processed_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let file = File::create(&tmp_path).map_err(|e| {
                Error::store(format!("failed to create {}: {}", tmp_path.display(), e))
            })?;
            let mut writer = BufWriter::new(file);
            for record in &records {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            Error::store(format!("failed to replace {}: {}", self.path.display(), e))
        })?;

        let written = records.len();
        inner.writer = open_append(&self.path)?;
        let dropped = inner.log_lines.saturating_sub(written);
        inner.log_lines = written;

        info!(
            "Compacted classification store: {} records kept, {} lines dropped",
            written, dropped
        );
        Ok(written)
    }

    fn append(&self, record: StoredClassification) -> Result<()> {
        let line = serde_json::to_string(&record)?;

        let mut inner = self.inner.write();
        let writer = &mut inner.writer;
        writeln!(writer, "{}", line)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::store(format!("append to {} failed: {}", self.path.display(), e)))?;

        inner.log_lines += 1;
        debug!(ticket_id = %record.id, band = %record.band, "Stored classification");
        inner.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Vec<StoredClassification> {
        let inner = self.inner.read();
        let mut records: Vec<_> = inner.records.values().collect();
        records.sort_by(|a, b| {
            b.processed_at
                .cmp(&a.processed_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        records.into_iter().take(limit).cloned().collect()
    }

    fn stats(&self, window_days: u32) -> PriorityStats {
        let cutoff = Utc::now() - Duration::days(i64::from(window_days));
        let inner = self.inner.read();

        let mut stats = PriorityStats {
            window_days,
            ..Default::default()
        };
        let mut score_sum: u64 = 0;

        for record in inner.records.values().filter(|r| r.processed_at >= cutoff) {
            stats.total += 1;
            *stats.by_band.entry(record.band).or_insert(0) += 1;
            score_sum += u64::from(record.score);
        }

        if stats.total > 0 {
            stats.average_score = Some(score_sum as f64 / stats.total as f64);
        }
        stats
    }
}

#[async_trait]
impl ClassificationHistory for ClassificationStore {
    async fn recent_tickets(&self, limit: usize) -> Result<Vec<StoredClassification>> {
        Ok(self.recent(limit))
    }

    async fn priority_stats(&self, window_days: u32) -> Result<PriorityStats> {
        Ok(self.stats(window_days))
    }

    async fn upsert(&self, record: StoredClassification) -> Result<()> {
        self.append(record)
    }
}

fn open_append(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::store(format!("failed to open {}: {}", path.display(), e)))?;
    Ok(BufWriter::new(file))
}

/// Replay the log: records by id, parsed line count, and whether the file
/// ends without a newline
fn replay(path: &Path) -> Result<(HashMap<String, StoredClassification>, usize, bool)> {
    let mut records = HashMap::new();
    let mut log_lines = 0;
    let mut unterminated = false;

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((records, 0, false)),
        Err(e) => {
            return Err(Error::store(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        unterminated = buf.last() != Some(&b'\n');

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                warn!("Skipping undecodable line {} in {:?}: {}", line_no, path, e);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StoredClassification>(line) {
            Ok(record) => {
                log_lines += 1;
                records.insert(record.id.clone(), record);
            }
            Err(e) => warn!("Skipping malformed line {} in {:?}: {}", line_no, path, e),
        }
    }

    Ok((records, log_lines, unterminated))
}
