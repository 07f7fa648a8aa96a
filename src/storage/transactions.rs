//! Transaction record storage

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::TransactionRecord;

pub const TRANSACTIONS_DIR: &str = "output/transactions";

pub fn save_transaction(record: &TransactionRecord) -> Result<()> {
    save_transaction_in(Path::new(TRANSACTIONS_DIR), record).map(|_| ())
}

/// Appends one JSON line to the day's file under `dir`.
pub fn save_transaction_in(dir: &Path, record: &TransactionRecord) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let filename = dir.join(format!("transactions_{}.jsonl", Utc::now().format("%Y-%m-%d")));

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&filename)
        .with_context(|| format!("opening {}", filename.display()))?;

    writeln!(file, "{}", serde_json::to_string(record)?)?;

    info!(
        record_id = %record.id,
        status = ?record.status(),
        direction = %record.direction,
        tx_hash = ?record.tx_hash,
        "Saved transaction record"
    );

    Ok(filename)
}
