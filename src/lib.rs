//! Host and symbiont identity check from `samtools idxstats` read counts.
//!
//! The pipeline reads an idxstats table, groups contigs by organism prefix,
//! computes read percentages, coverage and Wolbachia titer, and renders a text
//! report plus a TSV summary.
pub mod classifier;
pub mod config;
pub mod error;
pub mod generate_test_data;
pub mod idxstats_parser;
pub mod organism_summary;
pub mod report;

use std::path::Path;

use log::info;

use crate::classifier::{classify, enrich, Classification};
use crate::config::SummaryConfig;
use crate::error::Result;
use crate::idxstats_parser::{parse_idxstats, ContigRecord};
use crate::organism_summary::aggregate;
use crate::report::OutputPaths;

pub use crate::error::HostCheckError;

/// Result of one identity check run.
#[derive(Debug, Clone)]
pub struct SampleSummary {
    pub sample: String,
    pub classification: Classification,
}

impl SampleSummary {
    pub fn report_text(&self) -> String {
        report::render_report(&self.sample, &self.classification)
    }

    pub fn tsv_text(&self) -> String {
        report::render_tsv(&self.classification.summaries)
    }

    pub fn json_text(&self) -> Result<String> {
        report::render_json(&self.sample, &self.classification)
    }

    /// Writes the report, the TSV and (if requested) the JSON export. Either all
    /// of them are written or none is.
    pub fn write_outputs(&self, paths: &OutputPaths) -> Result<()> {
        let report_text = self.report_text();
        let tsv_text = self.tsv_text();
        let json_text = match paths.json {
            Some(_) => Some(self.json_text()?),
            None => None,
        };

        let mut outputs: Vec<(&Path, &str)> = vec![
            (paths.summary.as_path(), report_text.as_str()),
            (paths.tsv.as_path(), tsv_text.as_str()),
        ];
        if let (Some(path), Some(text)) = (&paths.json, &json_text) {
            outputs.push((path.as_path(), text.as_str()));
        }
        report::write_all_or_nothing(&outputs)
    }
}

/// Runs aggregation and classification over already parsed records.
pub fn summarize_records(records: &[ContigRecord], config: &SummaryConfig) -> Result<SampleSummary> {
    config.validate()?;
    let predicates = config.classification.compile()?;

    let summaries = enrich(aggregate(records)?, config);
    let classification = classify(
        summaries,
        &predicates,
        config.classification.secondary_threshold,
    );
    info!("{}: {}", config.sample, classification.conclusion());

    Ok(SampleSummary {
        sample: config.sample.clone(),
        classification,
    })
}

/// Full pipeline: parse the idxstats file, aggregate, classify.
pub fn summarize_sample<P: AsRef<Path>>(idxstats_path: P, config: &SummaryConfig) -> Result<SampleSummary> {
    let records = parse_idxstats(idxstats_path)?;
    summarize_records(&records, config)
}
