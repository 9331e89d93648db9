//! On-disk release format

use super::{tokenize_line, Example};
use crate::config::DataConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One source-file record as stored in a release file.
///
/// Releases are JSON lines: one record per line. `line_labels` marks the
/// lines known to cause the defect; it may be omitted entirely when no
/// line-level annotation exists for the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Source file name
    pub name: String,
    /// Whether the file is defective
    pub defective: bool,
    /// The file's source lines
    pub lines: Vec<String>,
    /// Per-line defect labels (0/1), same length as `lines`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_labels: Option<Vec<u8>>,
}

/// Load a release file and prepare its records for training.
///
/// Files are truncated to `max_file_lines`; each kept line is tokenized into
/// a fixed `token_budget`-length id sequence.
pub fn load_release(path: impl AsRef<Path>, config: &DataConfig) -> Result<Vec<Example>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Data(format!("failed to read release {}: {e}", path.display())))?;

    let mut examples = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: FileRecord = serde_json::from_str(line).map_err(|e| {
            Error::Data(format!(
                "bad record at {}:{}: {e}",
                path.display(),
                line_no + 1
            ))
        })?;
        examples.push(prepare(record, config)?);
    }

    if examples.is_empty() {
        return Err(Error::Data(format!("release {} is empty", path.display())));
    }
    Ok(examples)
}

fn prepare(record: FileRecord, config: &DataConfig) -> Result<Example> {
    if record.lines.is_empty() {
        return Err(Error::Data(format!("{}: file has no lines", record.name)));
    }
    let keep = record.lines.len().min(config.max_file_lines);

    let mut line_labels: Vec<f32> = match record.line_labels {
        Some(labels) => {
            if labels.len() != record.lines.len() {
                return Err(Error::Data(format!(
                    "{}: {} line labels for {} lines",
                    record.name,
                    labels.len(),
                    record.lines.len()
                )));
            }
            labels.iter().map(|&l| f32::from(l.min(1))).collect()
        }
        None => vec![0.0; record.lines.len()],
    };
    line_labels.truncate(keep);

    let token_ids = record.lines[..keep]
        .iter()
        .map(|line| tokenize_line(line, config.token_budget, config.vocab_size))
        .collect();

    Ok(Example {
        name: record.name,
        token_ids,
        label: if record.defective { 1.0 } else { 0.0 },
        line_labels,
    })
}
