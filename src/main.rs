// src/main.rs
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use xbrl_normalizer::extractors::{self, ExtractOptions, Extraction};
use xbrl_normalizer::storage::{SnapshotKey, SnapshotStore};
use xbrl_normalizer::utils::{self, AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineChoice {
    /// Context-aware tree extraction only
    Primary,
    /// Regex text scan over archive entries only
    Fallback,
    /// Primary, falling back to the text scan when it yields nothing
    Auto,
}

/// Command Line Interface for the XBRL normalizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Filing archive (.zip) or a single XBRL / Inline XBRL document
    #[arg(short, long)]
    input: PathBuf,

    /// Extraction engine
    #[arg(
        short,
        long,
        value_enum,
        default_value_t = EngineChoice::Auto,
        env = "XBRL_NORMALIZER_ENGINE"
    )]
    engine: EngineChoice,

    /// Unit string checked for percent markers on every fact (e.g. "percent")
    #[arg(long)]
    unit_hint: Option<String>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,

    /// Store a snapshot of the result under this directory
    #[arg(short, long, env = "XBRL_NORMALIZER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Company code for the snapshot key (required with --output-dir)
    #[arg(short, long)]
    company: Option<String>,

    /// Fiscal period for the snapshot key (e.g. FY2024)
    #[arg(short, long)]
    period: Option<String>,

    /// Data source for the snapshot key
    #[arg(long, default_value = "edinet")]
    source: String,
}

fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    // 3. Read the input
    let bytes = std::fs::read(&args.input)?;
    tracing::info!("Read {} ({} bytes)", args.input.display(), bytes.len());

    // 4. Run the selected engine
    let options = ExtractOptions {
        unit_hint: args.unit_hint.clone(),
    };
    let extraction = match args.engine {
        EngineChoice::Primary => Extraction::Primary {
            result: extractors::extract_with(&bytes, &options)?,
        },
        EngineChoice::Fallback => Extraction::Fallback {
            result: extractors::extract_fallback(&bytes),
        },
        EngineChoice::Auto => extractors::extract_auto(&bytes, &options),
    };

    // 5. Print the result
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&extraction)
    } else {
        serde_json::to_string(&extraction)
    }
    .map_err(|e| AppError::Processing(format!("Failed to serialize result: {}", e)))?;
    println!("{}", rendered);

    // 6. Optionally store a snapshot
    if let Some(output_dir) = &args.output_dir {
        let key = snapshot_key(&args, &extraction)?;
        let store = SnapshotStore::new(output_dir)?;
        let path = store.save(&key, &extraction)?;
        tracing::info!("Stored snapshot {} at {}", key, path.display());
    }

    Ok(())
}

fn snapshot_key(args: &Args, extraction: &Extraction) -> Result<SnapshotKey, AppError> {
    let company = args
        .company
        .as_deref()
        .ok_or_else(|| AppError::Config("--company is required with --output-dir".to_string()))?;

    let detected = match extraction {
        Extraction::Fallback { result } if !result.period.is_empty() => {
            Some(result.period.as_str())
        }
        _ => None,
    };
    let period = args.period.as_deref().or(detected).ok_or_else(|| {
        AppError::Config("--period is required when the period cannot be detected".to_string())
    })?;

    Ok(SnapshotKey::new(company, period, &args.source))
}
