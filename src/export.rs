use std::fs;
use std::path::{Path, PathBuf};

use csv::Writer;
use tracing::info;

use crate::catalog::ProductEntry;
use crate::utils::error::Result;

/// Deterministic, path-safe file stem for a search term. Alphanumerics pass
/// through, spaces become underscores, everything else becomes a dash.
pub fn sanitize_term(term: &str) -> String {
    let mut stem: String = term
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c == ' ' {
                '_'
            } else {
                '-'
            }
        })
        .collect();
    if stem.is_empty() {
        stem.push('_');
    }
    stem
}

/// Writes one tabular file per term under a per-term directory. A term that
/// scanned zero entries still produces a header-only file; the absence of
/// rows is itself a result worth keeping.
pub struct ProductExporter {
    output_dir: PathBuf,
}

impl ProductExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output_dir>/<stem>/`, created if absent.
    pub fn term_dir(&self, stem: &str) -> Result<PathBuf> {
        let dir = self.output_dir.join(stem);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Write `<stem>.csv` into the term directory and return its path.
    pub fn write_catalog(&self, stem: &str, entries: &[ProductEntry]) -> Result<PathBuf> {
        let path = self.term_dir(stem)?.join(format!("{stem}.csv"));
        let mut writer = Writer::from_path(&path)?;
        writer.write_record(["name", "price", "label", "format"])?;
        for entry in entries {
            writer.write_record([
                entry.name.as_str(),
                entry.price.as_str(),
                entry.label.as_str(),
                entry.format.as_str(),
            ])?;
        }
        writer.flush()?;
        info!(path = %path.display(), rows = entries.len(), "catalog exported");
        Ok(path)
    }

    pub fn screenshot_path(&self, stem: &str) -> Result<PathBuf> {
        Ok(self.term_dir(stem)?.join(format!("{stem}_screenshot.png")))
    }
}
