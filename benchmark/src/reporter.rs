// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! JSON report files.
//!
//! Files are named `<category>_<timestamp>.json`; a report holding more than
//! one category is named `all_<timestamp>.json`.

use crate::metrics::RunReport;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Report file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Writes benchmark reports into one directory.
pub struct JsonReporter {
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Create the reporter, creating `output_dir` if needed.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, ReporterError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// Save the whole report to one file and return its path.
    pub fn save(&self, report: &RunReport) -> Result<PathBuf, ReporterError> {
        let mut categories = report.results.iter().map(|r| r.category());
        let prefix = match categories.next() {
            Some(first) if categories.all(|c| c == first) => first.to_string(),
            _ => "all".to_string(),
        };
        self.write(&prefix, report)
    }

    /// Save one file per category, sharing the report's timestamp.
    pub fn save_by_category(
        &self,
        report: &RunReport,
    ) -> Result<Vec<PathBuf>, ReporterError> {
        let mut by_category: BTreeMap<String, Vec<_>> = BTreeMap::new();
        for result in &report.results {
            by_category
                .entry(result.category().to_string())
                .or_default()
                .push(result.clone());
        }

        let mut paths = Vec::with_capacity(by_category.len());
        for (category, results) in by_category {
            let part = RunReport {
                results,
                ..report.clone()
            };
            paths.push(self.write(&category, &part)?);
        }
        Ok(paths)
    }

    /// Load a report written by [`Self::save`] or [`Self::save_by_category`].
    pub fn load(path: impl AsRef<Path>) -> Result<RunReport, ReporterError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    fn write(&self, prefix: &str, report: &RunReport) -> Result<PathBuf, ReporterError> {
        let timestamp = report.started_at.format("%Y-%m-%dT%H-%M-%SZ");
        let path = self.output_dir.join(format!("{}_{}.json", prefix, timestamp));
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, report)?;
        Ok(path)
    }
}
