use std::collections::HashMap;

use log::info;
use serde::Serialize;

use crate::error::{HostCheckError, Result};
use crate::idxstats_parser::ContigRecord;

/// Per-organism totals. `description`, `percentage` and `coverage` are filled in
/// by the classifier; aggregation only sets the counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganismSummary {
    pub organism_key: String,
    pub total_mapped: u64,
    pub total_unmapped: u64,
    pub total_length: u64,
    pub description: String,
    pub percentage: f64,
    pub coverage: f64,
}

impl OrganismSummary {
    pub fn new(organism_key: &str) -> Self {
        Self {
            organism_key: organism_key.to_string(),
            total_mapped: 0,
            total_unmapped: 0,
            total_length: 0,
            description: String::new(),
            percentage: 0.0,
            coverage: 0.0,
        }
    }

    fn add_record(&mut self, record: &ContigRecord) -> Result<()> {
        let overflow = |field: &str| HostCheckError::CountOverflow {
            organism_key: self.organism_key.clone(),
            field: field.to_string(),
        };
        let mapped = self
            .total_mapped
            .checked_add(record.mapped_count)
            .ok_or_else(|| overflow("mapped reads"))?;
        let unmapped = self
            .total_unmapped
            .checked_add(record.unmapped_count)
            .ok_or_else(|| overflow("unmapped reads"))?;
        let length = self
            .total_length
            .checked_add(record.length)
            .ok_or_else(|| overflow("length"))?;

        self.total_mapped = mapped;
        self.total_unmapped = unmapped;
        self.total_length = length;
        Ok(())
    }
}

/// Organism summaries in first-seen order, with an index for key lookups.
#[derive(Debug, Default, Clone)]
pub struct OrganismTable {
    summaries: Vec<OrganismSummary>,
    index: HashMap<String, usize>,
    total_mapped: u64,
}

impl OrganismTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a contig to its organism. Fails when a total would exceed `u64::MAX`.
    pub fn add_record(&mut self, record: &ContigRecord) -> Result<()> {
        let position = match self.index.get(&record.organism_key) {
            Some(&position) => position,
            None => {
                let position = self.summaries.len();
                self.summaries.push(OrganismSummary::new(&record.organism_key));
                self.index.insert(record.organism_key.clone(), position);
                position
            }
        };
        self.summaries[position].add_record(record)?;
        self.total_mapped = self
            .total_mapped
            .checked_add(record.mapped_count)
            .ok_or_else(|| HostCheckError::CountOverflow {
                organism_key: "all organisms".to_string(),
                field: "mapped reads".to_string(),
            })?;
        Ok(())
    }

    #[cfg(test)]
    fn get(&self, organism_key: &str) -> Option<&OrganismSummary> {
        self.index.get(organism_key).map(|&i| &self.summaries[i])
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn total_mapped(&self) -> u64 {
        self.total_mapped
    }

    #[cfg(test)]
    fn iter(&self) -> impl Iterator<Item = &OrganismSummary> {
        self.summaries.iter()
    }

    pub fn into_summaries(self) -> Vec<OrganismSummary> {
        self.summaries
    }
}

/// Groups contig records by exact organism key and sums their counts.
pub fn aggregate(records: &[ContigRecord]) -> Result<OrganismTable> {
    let mut table = OrganismTable::new();
    for record in records {
        table.add_record(record)?;
    }
    info!(
        "Aggregated {} contigs into {} organisms",
        records.len(),
        table.len()
    );
    Ok(table)
}
