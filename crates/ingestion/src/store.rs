//! Decoded table persistence.
//!
//! One named table per file behind a `write(path, table)` / `read(path)`
//! contract. The JSON store is the only implementation shipped here.

use crate::feed::FeedTable;
use drift_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Persistence boundary for decoded tables.
pub trait TableStore {
    /// Write a table, replacing any existing file.
    fn write(&self, path: &Path, table: &FeedTable) -> Result<()>;

    /// Read back a table written by [`TableStore::write`].
    fn read(&self, path: &Path) -> Result<FeedTable>;
}

/// On-disk envelope: the table name plus its rows.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTable {
    name: String,
    table: FeedTable,
}

/// Stores each table as a single JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTableStore {
    pretty: bool,
}

impl JsonTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent output for human inspection.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl TableStore for JsonTableStore {
    fn write(&self, path: &Path, table: &FeedTable) -> Result<()> {
        let stored = StoredTable {
            name: table.layout().name().to_string(),
            table: table.clone(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, &stored)?;
        } else {
            serde_json::to_writer(&mut writer, &stored)?;
        }
        writer.flush()?;
        debug!(path = %path.display(), name = %stored.name, rows = table.len(), "wrote table");
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<FeedTable> {
        let reader = BufReader::new(File::open(path)?);
        let stored: StoredTable = serde_json::from_reader(reader)?;
        if stored.name != stored.table.layout().name() {
            return Err(Error::data(format!(
                "table '{}' in {} holds {} rows",
                stored.name,
                path.display(),
                stored.table.layout().name()
            )));
        }
        debug!(path = %path.display(), name = %stored.name, rows = stored.table.len(), "read table");
        Ok(stored.table)
    }
}
