use std::io::{self, Read};

use index_capping_core::RawTable;

use super::file::parse_csv_table;

/// Read a piped snapshot from stdin: a JSON array of rows, or CSV with a header line.
/// Returns None if stdin is a TTY (interactive) or empty.
pub fn read_stdin_table() -> Result<Option<RawTable>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let table = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        parse_csv_table(csv::Reader::from_reader(trimmed.as_bytes()))?
    };
    Ok(Some(table))
}
