use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{HostCheckError, Result};

pub const DEFAULT_HOST_PATTERN: &str = "^d[a-z]+";
pub const DEFAULT_SYMBIONT_PATTERN: &str = "^w";
pub const DEFAULT_SECONDARY_THRESHOLD: f64 = 0.1;

/// Reference entry for one organism key. Extra fields in the JSON are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrganismInfo {
    pub description: String,
}

/// Naming heuristics used to pick host and symbiont candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassificationRules {
    /// Organism keys matching this pattern are host candidates (e.g. "dsim", "dmel").
    pub host_pattern: String,
    /// Organism keys matching this pattern are symbiont candidates (e.g. "wMel").
    pub symbiont_pattern: String,
    /// Secondary candidates are only reported above this percentage of mapped reads.
    pub secondary_threshold: f64,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            host_pattern: DEFAULT_HOST_PATTERN.to_string(),
            symbiont_pattern: DEFAULT_SYMBIONT_PATTERN.to_string(),
            secondary_threshold: DEFAULT_SECONDARY_THRESHOLD,
        }
    }
}

/// Everything the pipeline needs besides the idxstats file itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryConfig {
    pub sample: String,
    #[serde(default)]
    pub organisms: BTreeMap<String, OrganismInfo>,
    pub avg_read_length: f64,
    #[serde(default)]
    pub classification: ClassificationRules,
}

impl SummaryConfig {
    pub fn new(sample: &str, avg_read_length: f64) -> Self {
        Self {
            sample: sample.to_string(),
            organisms: BTreeMap::new(),
            avg_read_length,
            classification: ClassificationRules::default(),
        }
    }

    /// Adds or replaces the description of an organism key.
    pub fn with_organism(mut self, key: &str, description: &str) -> Self {
        self.organisms.insert(
            key.to_string(),
            OrganismInfo {
                description: description.to_string(),
            },
        );
        self
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| HostCheckError::MissingFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SummaryConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.avg_read_length.is_finite() || self.avg_read_length <= 0.0 {
            return Err(HostCheckError::Config(format!(
                "avg_read_length must be a positive number, got {}",
                self.avg_read_length
            )));
        }
        let threshold = self.classification.secondary_threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(HostCheckError::Config(format!(
                "secondary_threshold must be between 0 and 100, got {}",
                threshold
            )));
        }
        // Descriptions are written as a single TSV field.
        if let Some((key, info)) = self
            .organisms
            .iter()
            .find(|(_, info)| info.description.contains(['\t', '\n', '\r']))
        {
            return Err(HostCheckError::Config(format!(
                "description of {} contains a tab or line break: {:?}",
                key, info.description
            )));
        }
        Ok(())
    }

    /// Description for an organism key, "Unknown" when it is not configured.
    pub fn description_for(&self, key: &str) -> &str {
        self.organisms
            .get(key)
            .map(|info| info.description.as_str())
            .unwrap_or("Unknown")
    }
}

impl ClassificationRules {
    pub fn compile(&self) -> Result<OrganismPredicates> {
        Ok(OrganismPredicates {
            host: Regex::new(&self.host_pattern)?,
            symbiont: Regex::new(&self.symbiont_pattern)?,
        })
    }
}

/// Compiled form of `ClassificationRules`.
#[derive(Debug, Clone)]
pub struct OrganismPredicates {
    host: Regex,
    symbiont: Regex,
}

impl OrganismPredicates {
    pub fn is_host(&self, organism_key: &str) -> bool {
        self.host.is_match(organism_key)
    }

    pub fn is_symbiont(&self, organism_key: &str) -> bool {
        self.symbiont.is_match(organism_key)
    }
}
