pub mod file;
pub mod stdin;

use chrono::NaiveDate;
use index_capping_core::io::ConstituentSource;
use index_capping_core::{IndexCappingError, IndexCappingResult, RawTable};

/// Snapshot from `--input <file>` or piped stdin.
pub struct SnapshotSource {
    pub path: Option<String>,
}

impl SnapshotSource {
    pub fn load(&self) -> Result<RawTable, Box<dyn std::error::Error>> {
        if let Some(ref path) = self.path {
            file::read_table(path)
        } else if let Some(table) = stdin::read_stdin_table()? {
            Ok(table)
        } else {
            Err("--input <snapshot.json|snapshot.csv> or stdin required".into())
        }
    }
}

impl ConstituentSource for SnapshotSource {
    fn fetch(&self, _index_id: &str, _as_of: NaiveDate) -> IndexCappingResult<RawTable> {
        self.load()
            .map_err(|e| IndexCappingError::InsufficientData(e.to_string()))
    }
}
