//! Append-only journal of entity mutations
//!
//! Every mutation the store performs is one `StoreRecord`, framed on disk as:
//!
//! ```text
//! [total_len: u32]
//! [sequence:  u64]
//! [timestamp: i64]
//! [payload_len: u32][payload: bincode(StoreRecord)]
//! [checksum: u32]  // CRC32C over sequence + timestamp + payload
//! ```
//!
//! Batches share a single fsync. Files rotate by size; the file name carries
//! the first sequence it contains so readers can order them lexically.

use crc32c::crc32c;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use types::ids::{OrderId, TraderId};
use types::liquidation::Liquidation;
use types::market::MarketStats;
use types::order::Order;
use types::position::Position;
use types::trade::Trade;
use types::trader::Trader;

/// Default rotation threshold per journal file (64 MiB).
const DEFAULT_ROTATE_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt entry at sequence {0}: checksum mismatch")]
    Corrupt(u64),
}

/// One entity mutation. The only replay vocabulary the store has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreRecord {
    TraderUpserted(Trader),
    PositionUpserted(Position),
    PositionDeleted { trader_id: TraderId, instrument: String },
    OrderUpserted(Order),
    OrderDeleted { order_id: OrderId },
    TradeAppended(Trade),
    LiquidationAppended(Liquidation),
    MarketStatsUpserted(MarketStats),
}

/// A framed journal entry.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub sequence: u64,
    pub timestamp: i64,
    pub record: StoreRecord,
}

fn compute_checksum(sequence: u64, timestamp: i64, payload: &[u8]) -> u32 {
    let mut buf = Vec::with_capacity(16 + payload.len());
    buf.extend_from_slice(&sequence.to_le_bytes());
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(payload);
    crc32c(&buf)
}

fn journal_file_name(first_sequence: u64) -> String {
    format!("journal-{:020}.log", first_sequence)
}

/// List journal files in a directory, ordered by first sequence.
pub fn journal_files(dir: &Path) -> Result<Vec<PathBuf>, JournalError> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with("journal-") && name.ends_with(".log") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ── Writer ──────────────────────────────────────────────────────────

/// Appends framed entries, fsyncing once per batch.
pub struct JournalWriter {
    dir: PathBuf,
    file: BufWriter<File>,
    current_size: u64,
    rotate_bytes: u64,
    next_sequence: u64,
}

impl JournalWriter {
    /// Open a writer that appends after `next_sequence - 1`. A fresh file is
    /// started so recovery never has to splice into an old one.
    pub fn open(dir: impl AsRef<Path>, next_sequence: u64) -> Result<Self, JournalError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let path = dir.join(journal_file_name(next_sequence));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let current_size = file.metadata()?.len();
        Ok(Self {
            dir,
            file: BufWriter::new(file),
            current_size,
            rotate_bytes: DEFAULT_ROTATE_BYTES,
            next_sequence,
        })
    }

    /// Sequence the next appended record will get.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Append a batch of records under one fsync. Returns the sequence of
    /// the first record in the batch.
    pub fn append_batch(
        &mut self,
        records: &[StoreRecord],
        timestamp: i64,
    ) -> Result<u64, JournalError> {
        let first = self.next_sequence;
        for record in records {
            self.append_unsynced(record, timestamp)?;
        }
        self.file.flush()?;
        self.file.get_ref().sync_data()?;

        if self.current_size >= self.rotate_bytes {
            self.rotate()?;
        }
        Ok(first)
    }

    fn append_unsynced(&mut self, record: &StoreRecord, timestamp: i64) -> Result<(), JournalError> {
        let payload =
            bincode::serialize(record).map_err(|e| JournalError::Serialization(e.to_string()))?;
        let sequence = self.next_sequence;
        let checksum = compute_checksum(sequence, timestamp, &payload);

        // total_len counts everything after the length word
        let total_len = (8 + 8 + 4 + payload.len() + 4) as u32;
        self.file.write_all(&total_len.to_le_bytes())?;
        self.file.write_all(&sequence.to_le_bytes())?;
        self.file.write_all(&timestamp.to_le_bytes())?;
        self.file.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.file.write_all(&payload)?;
        self.file.write_all(&checksum.to_le_bytes())?;

        self.current_size += 4 + total_len as u64;
        self.next_sequence += 1;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        let path = self.dir.join(journal_file_name(self.next_sequence));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.file = BufWriter::new(file);
        self.current_size = 0;
        Ok(())
    }
}

// ── Reader ──────────────────────────────────────────────────────────

/// Read every entry with sequence > `after_sequence` from the journal
/// directory, in order.
///
/// A torn final entry (crash mid-append) is tolerated: reading stops there
/// with a warning. Corruption anywhere else is an error.
pub fn read_entries(dir: &Path, after_sequence: u64) -> Result<Vec<JournalEntry>, JournalError> {
    let files = journal_files(dir)?;
    let mut entries = Vec::new();

    for (file_idx, path) in files.iter().enumerate() {
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        let is_last_file = file_idx == files.len() - 1;
        let mut offset = 0usize;

        while offset < data.len() {
            match decode_entry(&data[offset..]) {
                Ok(Some((entry, consumed))) => {
                    if entry.sequence > after_sequence {
                        entries.push(entry);
                    }
                    offset += consumed;
                }
                Ok(None) => {
                    // Truncated frame: acceptable only at the very tail
                    if is_last_file {
                        warn!(path = %path.display(), offset, "torn journal tail, stopping replay");
                        return Ok(entries);
                    }
                    return Err(JournalError::Corrupt(
                        entries.last().map(|e| e.sequence + 1).unwrap_or(0),
                    ));
                }
                Err(e) => {
                    if is_last_file {
                        warn!(path = %path.display(), offset, "corrupt journal tail, stopping replay");
                        return Ok(entries);
                    }
                    return Err(e);
                }
            }
        }
    }
    Ok(entries)
}

/// Decode one frame. Returns Ok(None) if the buffer ends mid-frame.
fn decode_entry(buf: &[u8]) -> Result<Option<(JournalEntry, usize)>, JournalError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let total_len = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    if buf.len() < 4 + total_len || total_len < 8 + 8 + 4 + 4 {
        return Ok(None);
    }

    let body = &buf[4..4 + total_len];
    let sequence = u64::from_le_bytes(body[0..8].try_into().unwrap());
    let timestamp = i64::from_le_bytes(body[8..16].try_into().unwrap());
    let payload_len = u32::from_le_bytes(body[16..20].try_into().unwrap()) as usize;
    if 20 + payload_len + 4 != total_len {
        return Err(JournalError::Corrupt(sequence));
    }
    let payload = &body[20..20 + payload_len];
    let stored_checksum = u32::from_le_bytes(body[20 + payload_len..].try_into().unwrap());

    if compute_checksum(sequence, timestamp, payload) != stored_checksum {
        return Err(JournalError::Corrupt(sequence));
    }

    let record: StoreRecord =
        bincode::deserialize(payload).map_err(|e| JournalError::Serialization(e.to_string()))?;

    Ok(Some((
        JournalEntry {
            sequence,
            timestamp,
            record,
        },
        4 + total_len,
    )))
}
