// Ingest command: read extraction batches from disk and reconcile them.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use creditmemo_recon::{ExtractionBatch, ExtractionError, Extractor, MemoSession, ReconcileReport, SourceFile};

use crate::CliError;

/// Extractor whose "model output" is a batch file already on disk.
pub struct BatchFileExtractor {
    path: PathBuf,
}

impl BatchFileExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Extractor for BatchFileExtractor {
    fn extract(&self, _files: &[SourceFile]) -> Result<ExtractionBatch, ExtractionError> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| ExtractionError::Failed(format!("cannot read {}: {}", self.path.display(), e)))?;
        let batch: ExtractionBatch = serde_json::from_str(&raw)
            .map_err(|e| ExtractionError::Malformed(format!("{}: {}", self.path.display(), e)))?;
        Ok(batch)
    }
}

pub fn read_source_file(path: &Path) -> Result<SourceFile, CliError> {
    let bytes = fs::read(path).map_err(|e| CliError::usage(format!("cannot read {}: {}", path.display(), e)))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime = SourceFile::mime_for(&name);
    Ok(SourceFile::new(name, mime, bytes))
}

pub fn cmd_ingest(session: &mut MemoSession, batches: &[PathBuf], files: &[PathBuf], json: bool) -> Result<(), CliError> {
    let sources = files
        .iter()
        .map(|p| read_source_file(p))
        .collect::<Result<Vec<_>, _>>()?;

    let mut reports = Vec::with_capacity(batches.len());
    for (i, path) in batches.iter().enumerate() {
        let attached: &[SourceFile] = if i == 0 { &sources } else { &[] };
        let report = session
            .ingest(&BatchFileExtractor::new(path), attached)
            .map_err(|e| CliError::from(e).with_hint(format!("batch {} was not applied", path.display())))?;
        info!(batch = report.batch, file = %path.display(), "applied batch");
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (path, report) in batches.iter().zip(&reports) {
            print_report(path, report);
        }
        let conflicts = session.conflicts().len();
        if conflicts > 0 {
            println!("{} field(s) have conflicting candidates; run `cmemo conflicts`", conflicts);
        }
        // Unresolved fields with a single candidate are flagged only in `show`.
        let reconfirmed = session.active_conflict_count().saturating_sub(conflicts);
        if reconfirmed > 0 {
            println!("{} field(s) saw new evidence; run `cmemo show` (marked `!`)", reconfirmed);
        }
    }
    Ok(())
}

fn print_report(path: &Path, report: &ReconcileReport) {
    println!(
        "batch {} ({}): {} field(s), {} new candidate(s), {} extracted in total",
        report.batch,
        path.display(),
        report.fields_touched,
        report.candidates_added,
        report.extracted_field_count,
    );
    for field in &report.conflicts_opened {
        println!("  conflict  {}", field);
    }
    for field in &report.auto_resolved {
        println!("  settled   {}", field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creditmemo_recon::ExtractionError;
    use tempfile::TempDir;

    #[test]
    fn missing_batch_is_an_extraction_failure() {
        let extractor = BatchFileExtractor::new("/nonexistent/teaser.batch.json");
        assert!(matches!(extractor.extract(&[]), Err(ExtractionError::Failed(_))));
    }

    #[test]
    fn unparseable_batch_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ \"data\": [1, 2").unwrap();
        let extractor = BatchFileExtractor::new(&path);
        assert!(matches!(extractor.extract(&[]), Err(ExtractionError::Malformed(_))));
    }

    #[test]
    fn source_file_takes_its_name_and_mime_from_the_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Teaser.PDF");
        fs::write(&path, b"%PDF-1.7").unwrap();
        let file = read_source_file(&path).ok().unwrap();
        assert_eq!(file.name, "Teaser.PDF");
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.bytes, b"%PDF-1.7");
    }
}
