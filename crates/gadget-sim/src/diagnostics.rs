// crates/gadget-sim/src/diagnostics.rs
//
// Per-cycle diagnostics stream: one JSON object per line.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use gadget_core::GadgetError;
use gadget_engine::CycleReport;

/// Appends cycle reports to a JSON Lines file.
pub struct DiagnosticsWriter {
    out: BufWriter<File>,
    written: u64,
}

impl DiagnosticsWriter {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path) -> Result<Self, GadgetError> {
        let file = File::create(path)
            .map_err(|e| GadgetError::Io(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), "Writing cycle diagnostics");
        Ok(Self {
            out: BufWriter::new(file),
            written: 0,
        })
    }

    /// Write one record.
    pub fn record(&mut self, report: &CycleReport) -> Result<(), GadgetError> {
        serde_json::to_writer(&mut self.out, report)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Flush buffered records. Returns how many were written in total.
    pub fn finish(mut self) -> Result<u64, GadgetError> {
        self.out.flush()?;
        Ok(self.written)
    }
}
