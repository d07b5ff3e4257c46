use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use study_miner::config::{MinerConfig, APP_NAME, APP_VERSION};
use study_miner::pipeline::canonical::{canonicalize_directory, CanonicalTable, Canonicalizer};
use study_miner::pipeline::extraction::pdfium::PdfiumBlockExtractor;
use study_miner::pipeline::extraction::TesseractCli;
use study_miner::pipeline::processor::StudyMiner;

#[derive(Parser)]
#[command(name = "study-miner", version, about = "Mine study Q&A items from scanned PDFs")]
struct Cli {
    /// JSON config file (missing keys keep their defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Linearize every PDF in a directory and extract Q&A records
    Extract {
        /// Directory of source PDFs
        #[arg(short, long, default_value = "pdf_in")]
        input: PathBuf,
        /// Directory for the linear text artifact and the QA batch
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Write canonicalized snapshots of every QA batch in a directory
    Canonicalize {
        /// Directory holding the QA batch files
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Reference table JSON (default: built-in table)
        #[arg(short, long)]
        table: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    study_miner::init_tracing();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let config = MinerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::debug!(version = APP_VERSION, "{APP_NAME} starting");

    match cli.command {
        Commands::Extract { input, output } => {
            let extractor =
                PdfiumBlockExtractor::new(config.ocr_dpi).context("initializing PDFium")?;
            let ocr = TesseractCli::from_config(&config);
            let miner = StudyMiner::new(Box::new(extractor), Box::new(ocr), config);

            let report = miner
                .run_directory(&input, &output)
                .with_context(|| format!("extracting from {}", input.display()))?;

            for (name, reason) in &report.failed {
                println!("Skipped {name}: {reason}");
            }
            if report.carried_over > 0 {
                println!("Kept {} records from the existing batch", report.carried_over);
            }
            println!(
                "Done: {} documents, {} records -> {} + {} ({:.1}s)",
                report.documents.len(),
                report.records,
                report.linear_text_path.display(),
                report.qa_path.display(),
                t0.elapsed().as_secs_f64()
            );
        }
        Commands::Canonicalize { dir, table } => {
            let table = match table {
                Some(path) => CanonicalTable::load(&path)
                    .with_context(|| format!("loading reference table {}", path.display()))?,
                None => CanonicalTable::builtin(),
            };
            let canonicalizer = Canonicalizer::new(table);
            let report = canonicalize_directory(&canonicalizer, &dir, &config)
                .with_context(|| format!("canonicalizing {}", dir.display()))?;

            println!(
                "Done: {} files, {} records changed, {} not processed -> {}",
                report.files.len(),
                report.total_changed(),
                report.failures.len(),
                report.report_path.display()
            );
        }
    }

    Ok(())
}
