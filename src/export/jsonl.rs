//! JSON and JSONL writers.
//!
//! `Json` writes one pretty-printed array, `Jsonl` writes one compact object per
//! line, which suits piping into `jq`.

use std::io::Write;

use super::types::ExportRecord;

/// Writes all records as a single JSON array followed by a newline.
pub(crate) fn write_json<W: Write>(
    writer: &mut W,
    records: &[ExportRecord<'_>],
) -> Result<(), serde_json::Error> {
    serde_json::to_writer_pretty(&mut *writer, records)?;
    writeln!(writer).map_err(serde_json::Error::io)
}

/// Writes one JSON object per line.
pub(crate) fn write_jsonl<W: Write>(
    writer: &mut W,
    records: &[ExportRecord<'_>],
) -> Result<(), serde_json::Error> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writeln!(writer).map_err(serde_json::Error::io)?;
    }
    Ok(())
}
