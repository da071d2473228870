use crate::error::ReportError;
use crate::models::QaResult;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const CSV_HEADER: [&str; 2] = ["Question", "Answer"];

pub fn write_qa_rows<W: Write>(writer: W, results: &[QaResult]) -> Result<(), ReportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER)?;
    for result in results {
        csv.write_record([result.question.as_str(), result.answer_text().as_str()])?;
    }
    csv.flush()?;
    Ok(())
}

/// Replaces `path` with a fresh report; rows land in a sibling temp file first.
pub fn write_qa_csv(path: &Path, results: &[QaResult]) -> Result<PathBuf, ReportError> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&directory)?;

    let mut staging = NamedTempFile::new_in(&directory)?;
    write_qa_rows(staging.as_file_mut(), results)?;
    staging.as_file().sync_all()?;
    staging.persist(path)?;

    Ok(path.to_path_buf())
}
