//! Export classification results.
//!
//! - verdicts as CSV, one row per (run, track)
//! - issued directives as JSON, grouped by execution context

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::engine::Directive;
use crate::error::AppError;

use crate::app::pipeline::Verdict;

/// Write per-track verdicts to a CSV file.
pub fn write_verdicts_csv(path: &Path, verdicts: &[Verdict]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create verdict CSV '{}': {e}", path.display())))?;

    writeln!(file, "run,track,context,species,creator_process,region,classification")
        .map_err(|e| AppError::input(format!("Failed to write verdict CSV header: {e}")))?;

    for v in verdicts {
        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            v.run,
            v.track,
            v.context,
            v.species,
            v.creator_process.as_deref().unwrap_or(""),
            v.region.as_deref().unwrap_or(""),
            v.classification.label(),
        )
        .map_err(|e| AppError::input(format!("Failed to write verdict CSV row: {e}")))?;
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct DirectiveExport<'a> {
    context: usize,
    directives: &'a [Directive],
}

/// Write the directives each context issued to a JSON file.
pub fn write_directives_json(path: &Path, per_context: &[(usize, Vec<Directive>)]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create directive JSON '{}': {e}", path.display())))?;
    let export: Vec<DirectiveExport<'_>> = per_context
        .iter()
        .map(|(context, directives)| DirectiveExport {
            context: *context,
            directives,
        })
        .collect();
    serde_json::to_writer_pretty(file, &export)
        .map_err(|e| AppError::input(format!("Failed to write directive JSON: {e}")))?;
    Ok(())
}
