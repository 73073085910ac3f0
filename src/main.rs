// pagesift CLI - extract or classify a document from disk
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pagesift::pdf_extraction::open_document;
use pagesift::{Engine, EngineConfig, ExtractionResult, OcrClassification, RawDocument};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pagesift")]
#[command(about = "Recover text from documents and check whether they carry a text layer")]
struct Cli {
    /// TOML config file (falls back to PAGESIFT_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract all recoverable text
    Extract {
        file: PathBuf,
        /// The document is known to contain text; failure is fatal
        #[arg(long)]
        forced: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Check whether the document contains recoverable text
    Classify {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Classify, then extract in the resulting mode
    Ingest {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the page count of a PDF
    Count { file: PathBuf },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so stdout carries only the output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagesift=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let engine = Engine::new(config);

    match cli.command {
        Commands::Extract { file, forced, format } => {
            let document = read_document(&file)?;
            let result = engine.extract(&document, forced).await;
            print_extraction(&result, format)?;
            Ok(exit_code(&result))
        }
        Commands::Classify { file, format } => {
            let document = read_document(&file)?;
            let classification = engine.classify(&document).await;
            match format {
                OutputFormat::Text => println!("{}", classification_line(&classification)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&classification)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ingest { file, format } => {
            let document = read_document(&file)?;
            let outcome = engine.ingest(&document).await;
            match format {
                OutputFormat::Text => {
                    println!("{}", classification_line(&outcome.classification));
                    println!("{}", outcome.extraction.output_text());
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
            }
            Ok(exit_code(&outcome.extraction))
        }
        Commands::Count { file } => {
            let bytes = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let opened = open_document(&bytes, true)?;
            println!("{}", opened.num_pages());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_document(path: &Path) -> Result<RawDocument> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(RawDocument::from_file_name(bytes, &name))
}

fn print_extraction(result: &ExtractionResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", result.output_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
    }
    Ok(())
}

fn classification_line(classification: &OcrClassification) -> String {
    format!(
        "has_text={} sampled_chars={}",
        classification.has_text, classification.sampled_chars
    )
}

fn exit_code(result: &ExtractionResult) -> ExitCode {
    match result {
        ExtractionResult::Success { .. } => ExitCode::SUCCESS,
        ExtractionResult::SoftFailure { .. } => ExitCode::from(1),
        ExtractionResult::HardFailure { .. } => ExitCode::from(2),
    }
}
