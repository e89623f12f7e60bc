use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use log::info;

use hostcheck::classifier::{Classification, Conclusion};
use hostcheck::config::SummaryConfig;
use hostcheck::error::Result;
use hostcheck::generate_test_data::{generate_idxstats, GeneratorParams};
use hostcheck::report::{format_thousands, OutputPaths};
use hostcheck::{summarize_sample, SampleSummary};

#[derive(Parser, Debug)]
#[command(name = "hostcheck", version, about = "Host and Wolbachia identity check from idxstats read counts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize an idxstats table into an identity report
    Summarize {
        /// samtools idxstats output
        idxstats: PathBuf,

        /// JSON configuration (sample, organisms, avg_read_length)
        #[arg(short, long)]
        config: PathBuf,

        /// Text report destination
        #[arg(long)]
        summary: PathBuf,

        /// TSV summary destination
        #[arg(long)]
        tsv: PathBuf,

        /// Optional JSON summary destination
        #[arg(long)]
        json: Option<PathBuf>,

        /// Override the sample name from the configuration
        #[arg(long)]
        sample: Option<String>,

        /// Override the average read length from the configuration
        #[arg(long)]
        avg_read_length: Option<f64>,

        /// Do not print the interpretation to the terminal
        #[arg(short, long)]
        quiet: bool,
    },

    /// Generate a synthetic idxstats table
    Generate {
        /// Output file
        output: PathBuf,

        /// Contigs written per organism
        #[arg(long, default_value_t = 100)]
        contigs: usize,

        /// Comma-separated host prefixes
        #[arg(long, value_delimiter = ',', default_value = "dsim,dmel")]
        hosts: Vec<String>,

        /// Comma-separated symbiont prefixes
        #[arg(long, value_delimiter = ',', default_value = "wMel")]
        symbionts: Vec<String>,

        /// Random seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Summarize {
            idxstats,
            config,
            summary,
            tsv,
            json,
            sample,
            avg_read_length,
            quiet,
        } => {
            let mut config = SummaryConfig::from_json_file(&config)?;
            if let Some(sample) = sample {
                config.sample = sample;
            }
            if let Some(avg_read_length) = avg_read_length {
                config.avg_read_length = avg_read_length;
            }

            let result = summarize_sample(&idxstats, &config)?;
            result.write_outputs(&OutputPaths { summary, tsv, json })?;

            if !quiet {
                print_interpretation(&result);
            }
            Ok(())
        }
        Commands::Generate {
            output,
            contigs,
            hosts,
            symbionts,
            seed,
        } => {
            let params = GeneratorParams {
                output_file: output,
                contigs_per_organism: contigs,
                hosts,
                symbionts,
                seed,
                ..Default::default()
            };
            let stats = generate_idxstats(&params)?;
            info!("Wrote {} contigs to {}", stats.contigs, params.output_file.display());
            Ok(())
        }
    }
}

fn print_interpretation(result: &SampleSummary) {
    let c: &Classification = &result.classification;

    println!("{} {}", "Sample:".bold(), result.sample.cyan());
    println!(
        "{} {}",
        "Total mapped reads:".bold(),
        format_thousands(c.total_mapped).blue()
    );

    if let Some(host) = c.primary_host() {
        println!(
            "Primary host: {} ({}) {}",
            host.organism_key.green(),
            host.description,
            format!("{:.1}%", host.percentage).magenta()
        );
    }
    if let Some(symbiont) = c.primary_symbiont() {
        println!(
            "Primary Wolbachia: {} ({}) {}",
            symbiont.organism_key.yellow(),
            symbiont.description,
            format!("{:.1}%", symbiont.percentage).magenta()
        );
    }
    if let Some(titer) = c.titer {
        println!("Estimated titer: {}", format!("{:.4}", titer).cyan());
    }
    for warning in &c.warnings {
        println!("{} {}", "note:".yellow(), warning);
    }

    let conclusion = c.conclusion();
    let line = conclusion.to_string();
    match conclusion {
        Conclusion::Undetermined => println!("{}", line.red().bold()),
        _ => println!("{}", line.green().bold()),
    }
}
