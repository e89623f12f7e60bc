use std::fmt::Write as FmtWrite;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use tempfile::NamedTempFile;

use crate::classifier::Classification;
use crate::error::{HostCheckError, Result};
use crate::organism_summary::OrganismSummary;

const RULE_WIDTH: usize = 80;

/// Column order of the tabular export.
pub const TSV_HEADER: &str =
    "organism\tmapped_reads\tunmapped_reads\tlength\tdescription\tpercentage\tcoverage";

/// Destinations for one run. `json` is optional.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub summary: PathBuf,
    pub tsv: PathBuf,
    pub json: Option<PathBuf>,
}

/// Formats an integer with comma thousands separators, e.g. `1234567` -> `1,234,567`.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn rule(ch: char) -> String {
    std::iter::repeat(ch).take(RULE_WIDTH).collect()
}

/// Renders the human-readable identity check report.
pub fn render_report(sample: &str, classification: &Classification) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, sample, classification);
    out
}

fn write_report(out: &mut String, sample: &str, c: &Classification) -> std::fmt::Result {
    writeln!(out, "Identity Check Summary for {}", sample)?;
    writeln!(out, "{}\n", rule('='))?;

    writeln!(out, "Mapping Statistics:")?;
    writeln!(out, "{}", rule('-'))?;
    for s in &c.summaries {
        writeln!(
            out,
            "{:<10} ({:<30}): {:>10} reads ({:>5.2}%) | {:>6.1}x coverage",
            s.organism_key,
            s.description,
            format_thousands(s.total_mapped),
            s.percentage,
            s.coverage
        )?;
    }

    writeln!(out, "\n{}", rule('='))?;
    writeln!(out, "Total mapped reads: {}", format_thousands(c.total_mapped))?;

    writeln!(out, "\nInterpretation:")?;
    writeln!(out, "{}", rule('-'))?;

    if let Some(host) = c.primary_host() {
        writeln!(
            out,
            "Primary host: {} ({}) - {:.1}% of reads",
            host.organism_key, host.description, host.percentage
        )?;
        write_secondaries(out, "Alternative hosts detected:", c.secondary_hosts())?;
    }

    if let Some(symbiont) = c.primary_symbiont() {
        writeln!(
            out,
            "Primary Wolbachia: {} ({}) - {:.1}% of reads",
            symbiont.organism_key, symbiont.description, symbiont.percentage
        )?;
        if let Some(titer) = c.titer {
            writeln!(
                out,
                "Estimated titer: {:.4} ({:.2}% Wolbachia/Host)",
                titer,
                titer * 100.0
            )?;
        }
        write_secondaries(
            out,
            "Alternative Wolbachia strains detected:",
            c.secondary_symbionts(),
        )?;
    }

    writeln!(out, "\n{}", rule('='))?;
    writeln!(out, "CONCLUSION:")?;
    writeln!(out, "{}", c.conclusion())
}

fn write_secondaries<'a>(
    out: &mut String,
    heading: &str,
    secondaries: impl Iterator<Item = &'a OrganismSummary>,
) -> std::fmt::Result {
    let mut secondaries = secondaries.peekable();
    if secondaries.peek().is_none() {
        return Ok(());
    }
    writeln!(out, "  {}", heading)?;
    for s in secondaries {
        writeln!(out, "    - {} ({}): {:.2}%", s.organism_key, s.description, s.percentage)?;
    }
    Ok(())
}

/// Renders the tab-separated export, one row per organism in sorted order.
pub fn render_tsv(summaries: &[OrganismSummary]) -> String {
    let mut out = String::new();
    out.push_str(TSV_HEADER);
    out.push('\n');
    for s in summaries {
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            s.organism_key,
            s.total_mapped,
            s.total_unmapped,
            s.total_length,
            s.description,
            s.percentage,
            s.coverage
        );
    }
    out
}

/// Renders the JSON export.
pub fn render_json(sample: &str, c: &Classification) -> Result<String> {
    let json = serde_json::json!({
        "sample": sample,
        "total_mapped": c.total_mapped,
        "organisms": c.summaries,
        "primary_host": c.primary_host().map(|s| &s.organism_key),
        "secondary_hosts": c.secondary_hosts().map(|s| &s.organism_key).collect::<Vec<_>>(),
        "primary_symbiont": c.primary_symbiont().map(|s| &s.organism_key),
        "secondary_symbionts": c.secondary_symbionts().map(|s| &s.organism_key).collect::<Vec<_>>(),
        "titer": c.titer,
        "conclusion": c.conclusion().to_string(),
        "warnings": c.warnings,
    });
    Ok(serde_json::to_string_pretty(&json)?)
}

/// Reads a tabular export back into summaries.
pub fn read_summary_tsv<P: AsRef<Path>>(path: P) -> Result<Vec<OrganismSummary>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| HostCheckError::MissingFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut summaries = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line_number = i + 1;
        let malformed = |reason: &str| HostCheckError::MalformedInput {
            line_number,
            line: line.clone(),
            reason: reason.to_string(),
        };

        if line_number == 1 {
            if line != TSV_HEADER {
                return Err(malformed("unexpected header"));
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 7 {
            return Err(malformed("expected 7 tab-separated fields"));
        }
        let count = |field: &str| field.parse::<u64>().map_err(|_| malformed("bad count"));
        let float = |field: &str| field.parse::<f64>().map_err(|_| malformed("bad number"));

        summaries.push(OrganismSummary {
            organism_key: fields[0].to_string(),
            total_mapped: count(fields[1])?,
            total_unmapped: count(fields[2])?,
            total_length: count(fields[3])?,
            description: fields[4].to_string(),
            percentage: float(fields[5])?,
            coverage: float(fields[6])?,
        });
    }
    Ok(summaries)
}

/// Writes every `(path, contents)` pair or none of them. Contents go to temporary
/// files next to their destinations first and are renamed into place only once
/// all of them were written. Destinations that already exist are copied aside
/// and restored if a later rename fails.
pub fn write_all_or_nothing(outputs: &[(&Path, &str)]) -> Result<()> {
    let mut staged = Vec::with_capacity(outputs.len());
    for (path, contents) in outputs {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.flush()?;

        let backup = if path.is_file() {
            let backup = NamedTempFile::new_in(dir)?;
            fs::copy(path, backup.path())?;
            Some(backup)
        } else {
            None
        };
        staged.push((tmp, *path, backup));
    }

    let mut persisted: Vec<(&Path, Option<NamedTempFile>)> = Vec::with_capacity(staged.len());
    for (tmp, path, backup) in staged {
        if let Err(e) = tmp.persist(path) {
            roll_back(persisted);
            return Err(e.error.into());
        }
        info!("Wrote {}", path.display());
        persisted.push((path, backup));
    }
    Ok(())
}

fn roll_back(persisted: Vec<(&Path, Option<NamedTempFile>)>) {
    for (path, backup) in persisted {
        let restored = match backup {
            Some(backup) => backup.persist(path).map(|_| ()).map_err(|e| e.error),
            None => fs::remove_file(path),
        };
        if let Err(e) = restored {
            warn!("Could not roll back {}: {}", path.display(), e);
        }
    }
}
