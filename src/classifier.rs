use std::fmt;

use log::warn;
use serde::Serialize;

use crate::config::{OrganismPredicates, SummaryConfig};
use crate::organism_summary::{OrganismSummary, OrganismTable};

/// Input states that still yield a complete report but deserve a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "organism", rename_all = "snake_case")]
pub enum DegenerateInput {
    NoMappedReads,
    ZeroLengthOrganism(String),
    NoHostDetected,
}

impl fmt::Display for DegenerateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegenerateInput::NoMappedReads => write!(f, "no reads mapped to any organism"),
            DegenerateInput::ZeroLengthOrganism(key) => {
                write!(f, "organism {} has zero total length, coverage reported as 0", key)
            }
            DegenerateInput::NoHostDetected => write!(f, "no host-like organism detected"),
        }
    }
}

/// Final verdict on the sample identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion<'a> {
    Infected { host: &'a str, symbiont: &'a str },
    Uninfected { host: &'a str },
    Undetermined,
}

impl fmt::Display for Conclusion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conclusion::Infected { host, symbiont } => {
                write!(f, "Sample appears to be {} infected with {}", host, symbiont)
            }
            Conclusion::Uninfected { host } => {
                write!(f, "Sample appears to be {} (no Wolbachia detected)", host)
            }
            Conclusion::Undetermined => {
                write!(f, "WARNING: Could not determine host/Wolbachia identity")
            }
        }
    }
}

/// Enriched, sorted summaries plus the host/symbiont interpretation.
/// Candidate fields hold indices into `summaries`.
#[derive(Debug, Clone)]
pub struct Classification {
    pub summaries: Vec<OrganismSummary>,
    pub total_mapped: u64,
    pub primary_host: Option<usize>,
    pub secondary_hosts: Vec<usize>,
    pub primary_symbiont: Option<usize>,
    pub secondary_symbionts: Vec<usize>,
    pub titer: Option<f64>,
    pub warnings: Vec<DegenerateInput>,
}

impl Classification {
    pub fn primary_host(&self) -> Option<&OrganismSummary> {
        self.primary_host.map(|i| &self.summaries[i])
    }

    pub fn primary_symbiont(&self) -> Option<&OrganismSummary> {
        self.primary_symbiont.map(|i| &self.summaries[i])
    }

    pub fn secondary_hosts(&self) -> impl Iterator<Item = &OrganismSummary> {
        self.secondary_hosts.iter().map(move |&i| &self.summaries[i])
    }

    pub fn secondary_symbionts(&self) -> impl Iterator<Item = &OrganismSummary> {
        self.secondary_symbionts.iter().map(move |&i| &self.summaries[i])
    }

    pub fn conclusion(&self) -> Conclusion<'_> {
        match (self.primary_host(), self.primary_symbiont()) {
            (Some(host), Some(symbiont)) => Conclusion::Infected {
                host: &host.organism_key,
                symbiont: &symbiont.organism_key,
            },
            (Some(host), None) => Conclusion::Uninfected {
                host: &host.organism_key,
            },
            (None, _) => Conclusion::Undetermined,
        }
    }
}

fn percentage_of(mapped: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * mapped as f64 / total as f64
    }
}

fn coverage_of(mapped: u64, length: u64, avg_read_length: f64) -> f64 {
    if length == 0 {
        0.0
    } else {
        mapped as f64 * avg_read_length / length as f64
    }
}

/// Attaches descriptions, percentages and coverage, then sorts by mapped reads
/// (descending, stable so ties keep first-seen order).
pub fn enrich(table: OrganismTable, config: &SummaryConfig) -> Vec<OrganismSummary> {
    let total_mapped = table.total_mapped();
    let mut summaries = table.into_summaries();

    for summary in summaries.iter_mut() {
        summary.description = config.description_for(&summary.organism_key).to_string();
        summary.percentage = percentage_of(summary.total_mapped, total_mapped);
        summary.coverage =
            coverage_of(summary.total_mapped, summary.total_length, config.avg_read_length);
    }

    summaries.sort_by(|a, b| b.total_mapped.cmp(&a.total_mapped));
    summaries
}

/// Splits sorted candidates into the primary one and the secondaries above threshold.
fn pick_candidates<F>(
    summaries: &[OrganismSummary],
    is_candidate: F,
    threshold: f64,
) -> (Option<usize>, Vec<usize>)
where
    F: Fn(&str) -> bool,
{
    let mut candidates = summaries
        .iter()
        .enumerate()
        .filter(|(_, s)| is_candidate(&s.organism_key))
        .map(|(i, _)| i);

    let primary = candidates.next();
    let secondaries = candidates
        .filter(|&i| summaries[i].percentage > threshold)
        .collect();
    (primary, secondaries)
}

/// Identifies host and symbiont candidates in already sorted summaries and
/// computes the titer when both are present.
pub fn classify(
    summaries: Vec<OrganismSummary>,
    predicates: &OrganismPredicates,
    secondary_threshold: f64,
) -> Classification {
    let total_mapped: u64 = summaries.iter().map(|s| s.total_mapped).sum();
    let mut warnings = Vec::new();

    if total_mapped == 0 {
        warnings.push(DegenerateInput::NoMappedReads);
    }
    for summary in summaries.iter().filter(|s| s.total_length == 0) {
        warnings.push(DegenerateInput::ZeroLengthOrganism(summary.organism_key.clone()));
    }

    let (primary_host, secondary_hosts) =
        pick_candidates(&summaries, |key| predicates.is_host(key), secondary_threshold);
    let (primary_symbiont, secondary_symbionts) =
        pick_candidates(&summaries, |key| predicates.is_symbiont(key), secondary_threshold);

    if primary_host.is_none() {
        warnings.push(DegenerateInput::NoHostDetected);
    }

    let titer = match (primary_host, primary_symbiont) {
        (Some(h), Some(s)) if summaries[h].total_mapped > 0 => {
            Some(summaries[s].total_mapped as f64 / summaries[h].total_mapped as f64)
        }
        _ => None,
    };

    for warning in &warnings {
        warn!("{}", warning);
    }

    Classification {
        summaries,
        total_mapped,
        primary_host,
        secondary_hosts,
        primary_symbiont,
        secondary_symbionts,
        titer,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassificationRules;
    use crate::idxstats_parser::ContigRecord;
    use crate::organism_summary::aggregate;

    fn config() -> SummaryConfig {
        SummaryConfig::new("S1", 100.0)
            .with_organism("dsim", "Host fly")
            .with_organism("wMel", "Wolbachia strain")
    }

    fn run(records: &[ContigRecord]) -> Classification {
        let config = config();
        let predicates = config.classification.compile().unwrap();
        let summaries = enrich(aggregate(records).unwrap(), &config);
        classify(summaries, &predicates, config.classification.secondary_threshold)
    }

    #[test]
    fn test_enrich_host_and_symbiont() {
        let records = vec![
            ContigRecord::new("wMel_1", 500, 50, 5),
            ContigRecord::new("dsim_1", 1000, 900, 10),
        ];
        let summaries = enrich(aggregate(&records).unwrap(), &config());

        assert_eq!(summaries[0].organism_key, "dsim");
        assert_eq!(summaries[0].description, "Host fly");
        assert!((summaries[0].percentage - 94.7368).abs() < 1e-3);
        assert!((summaries[0].coverage - 90.0).abs() < 1e-9);
        assert_eq!(summaries[1].organism_key, "wMel");
        assert!((summaries[1].percentage - 5.2632).abs() < 1e-3);
        assert!((summaries[1].coverage - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_description() {
        let records = vec![ContigRecord::new("dyak_1", 100, 1, 0)];
        let summaries = enrich(aggregate(&records).unwrap(), &config());
        assert_eq!(summaries[0].description, "Unknown");
    }

    #[test]
    fn test_zero_length_gives_zero_coverage() {
        let records = vec![
            ContigRecord::new("dsim_1", 1000, 900, 10),
            ContigRecord::new("wMel_1", 0, 50, 0),
        ];
        let result = run(&records);
        let wmel = &result.summaries[1];
        assert_eq!(wmel.coverage, 0.0);
        assert!(result
            .warnings
            .contains(&DegenerateInput::ZeroLengthOrganism("wMel".to_string())));
    }

    #[test]
    fn test_zero_mapped_gives_zero_percentages() {
        let records = vec![
            ContigRecord::new("dsim_1", 1000, 0, 10),
            ContigRecord::new("wMel_1", 500, 0, 5),
        ];
        let result = run(&records);
        assert!(result.summaries.iter().all(|s| s.percentage == 0.0));
        assert!(result.warnings.contains(&DegenerateInput::NoMappedReads));
        assert_eq!(result.titer, None);
    }

    #[test]
    fn test_stable_sort_on_ties() {
        let records = vec![
            ContigRecord::new("dmel_1", 100, 10, 0),
            ContigRecord::new("dsim_1", 100, 10, 0),
            ContigRecord::new("wMel_1", 100, 20, 0),
        ];
        let result = run(&records);
        let keys: Vec<&str> = result.summaries.iter().map(|s| s.organism_key.as_str()).collect();
        assert_eq!(keys, vec!["wMel", "dmel", "dsim"]);
        assert_eq!(result.primary_host().unwrap().organism_key, "dmel");
    }

    #[test]
    fn test_titer_and_conclusion() {
        let records = vec![
            ContigRecord::new("dsim_1", 1000, 900, 10),
            ContigRecord::new("wMel_1", 500, 50, 5),
        ];
        let result = run(&records);
        let titer = result.titer.unwrap();
        assert!((titer - 50.0 / 900.0).abs() < 1e-12);
        assert_eq!(
            result.conclusion().to_string(),
            "Sample appears to be dsim infected with wMel"
        );
    }

    #[test]
    fn test_host_only() {
        let result = run(&[ContigRecord::new("dsim_1", 1000, 900, 10)]);
        assert_eq!(result.titer, None);
        assert_eq!(
            result.conclusion().to_string(),
            "Sample appears to be dsim (no Wolbachia detected)"
        );
    }

    #[test]
    fn test_symbiont_without_host_is_undetermined() {
        let result = run(&[ContigRecord::new("wMel_1", 500, 50, 5)]);
        assert!(result.primary_symbiont().is_some());
        assert_eq!(result.titer, None);
        assert_eq!(result.conclusion(), Conclusion::Undetermined);
        assert!(result.warnings.contains(&DegenerateInput::NoHostDetected));
    }

    #[test]
    fn test_secondary_threshold() {
        let records = vec![
            ContigRecord::new("dsim_1", 1000, 10_000, 0),
            ContigRecord::new("dmel_1", 1000, 100, 0),
            ContigRecord::new("dyak_1", 1000, 5, 0),
            ContigRecord::new("wMel_1", 1000, 500, 0),
            ContigRecord::new("wRi_1", 1000, 1, 0),
        ];
        let result = run(&records);
        let hosts: Vec<&str> = result.secondary_hosts().map(|s| s.organism_key.as_str()).collect();
        assert_eq!(hosts, vec!["dmel"]);
        assert_eq!(result.secondary_symbionts().count(), 0);
    }

    #[test]
    fn test_custom_patterns() {
        let mut config = config();
        config.classification = ClassificationRules {
            host_pattern: "^aalb$".to_string(),
            symbiont_pattern: "^wAlb".to_string(),
            ..Default::default()
        };
        let predicates = config.classification.compile().unwrap();
        let records = vec![
            ContigRecord::new("aalb_1", 1000, 800, 0),
            ContigRecord::new("wAlbB_1", 100, 80, 0),
            ContigRecord::new("dsim_1", 1000, 900, 0),
        ];
        let result = classify(enrich(aggregate(&records).unwrap(), &config), &predicates, 0.1);
        assert_eq!(
            result.conclusion().to_string(),
            "Sample appears to be aalb infected with wAlbB"
        );
    }

    #[test]
    fn test_empty_input_is_undetermined() {
        let result = run(&[]);
        assert!(result.summaries.is_empty());
        assert_eq!(result.total_mapped, 0);
        assert_eq!(result.conclusion(), Conclusion::Undetermined);
    }
}
