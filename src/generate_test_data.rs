use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{HostCheckError, Result};

/// Structure to define generation parameters
#[derive(Debug, Clone)]
pub struct GeneratorParams {
    pub output_file: PathBuf,
    pub contigs_per_organism: usize,
    pub hosts: Vec<String>,
    pub symbionts: Vec<String>,
    pub max_length: u64,
    pub max_mapped: u64,
    pub seed: Option<u64>,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            output_file: PathBuf::from("synthetic_idxstats.txt"),
            contigs_per_organism: 100,
            hosts: vec!["dsim".to_string(), "dmel".to_string()],
            symbionts: vec!["wMel".to_string()],
            max_length: 5_000_000,
            max_mapped: 1_000_000,
            seed: None,
        }
    }
}

/// What was written by `generate_idxstats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedStats {
    pub contigs: usize,
    pub total_mapped: u64,
}

/// Writes a synthetic idxstats table with `{organism}_{n}` contigs and a final
/// `*` line for unplaced reads.
///
/// The first host gets the bulk of the reads, further hosts a trickle, and
/// symbionts a few percent of the first host, which resembles an infected sample.
pub fn generate_idxstats(params: &GeneratorParams) -> Result<GeneratedStats> {
    if params.max_length == 0 || params.max_mapped == 0 {
        return Err(HostCheckError::Config(
            "max_length and max_mapped must be positive".to_string(),
        ));
    }

    let start = Instant::now();
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let file = File::create(&params.output_file)?;
    let mut writer = BufWriter::new(file);

    let organisms = params
        .hosts
        .iter()
        .enumerate()
        .map(|(i, name)| (name, if i == 0 { 1.0 } else { 0.01 }))
        .chain(params.symbionts.iter().map(|name| (name, 0.05)));

    let mut stats = GeneratedStats {
        contigs: 0,
        total_mapped: 0,
    };
    for (name, weight) in organisms {
        for n in 1..=params.contigs_per_organism {
            let length = rng.gen_range(1..=params.max_length);
            let mapped_ceiling = ((params.max_mapped as f64 * weight) as u64).max(1);
            let mapped = rng.gen_range(0..=mapped_ceiling);
            let unmapped = rng.gen_range(0..=mapped / 100 + 1);
            writeln!(writer, "{}_{}\t{}\t{}\t{}", name, n, length, mapped, unmapped)?;

            stats.contigs += 1;
            stats.total_mapped += mapped;
        }
    }

    writeln!(writer, "*\t0\t0\t{}", rng.gen_range(0..=params.max_mapped))?;
    writer.flush()?;

    info!(
        "Generated {} contigs ({} mapped reads) in {:.2?}",
        stats.contigs,
        stats.total_mapped,
        start.elapsed()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idxstats_parser::parse_idxstats;

    #[test]
    fn test_generated_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let params = GeneratorParams {
            output_file: dir.path().join("idxstats.txt"),
            contigs_per_organism: 5,
            seed: Some(42),
            ..Default::default()
        };
        let stats = generate_idxstats(&params).unwrap();
        assert_eq!(stats.contigs, 15);

        let records = parse_idxstats(&params.output_file).unwrap();
        assert_eq!(records.len(), 15);
        let total: u64 = records.iter().map(|r| r.mapped_count).sum();
        assert_eq!(total, stats.total_mapped);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = GeneratorParams {
            contigs_per_organism: 3,
            seed: Some(7),
            ..Default::default()
        };
        params.output_file = dir.path().join("a.txt");
        generate_idxstats(&params).unwrap();
        params.output_file = dir.path().join("b.txt");
        generate_idxstats(&params).unwrap();

        let a = std::fs::read_to_string(dir.path().join("a.txt")).unwrap();
        let b = std::fs::read_to_string(dir.path().join("b.txt")).unwrap();
        assert_eq!(a, b);
    }
}
