use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use index_capping_core::io::TableSink;
use index_capping_core::{IndexCappingError, IndexCappingResult};

/// Writes each table as `<dir>/<table>.json`.
pub struct DirectorySink {
    pub dir: PathBuf,
}

impl TableSink for DirectorySink {
    fn write_table(&mut self, table: &str, payload: &Value) -> IndexCappingResult<()> {
        let dir = self.dir.display().to_string();
        let io_err = |e: std::io::Error| IndexCappingError::InvalidInput {
            field: "out_dir".into(),
            reason: format!("cannot write to {dir}: {e}"),
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let path = self.dir.join(format!("{table}.json"));
        let body = serde_json::to_string_pretty(payload)?;
        fs::write(&path, body).map_err(io_err)?;
        info!(table, path = %path.display(), "table written");
        Ok(())
    }
}
