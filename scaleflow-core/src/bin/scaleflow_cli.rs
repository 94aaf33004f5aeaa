//! ScaleFlow CLI - production QA toolkit
//!
//! Commands: budget, copy, assets, qa
//! Reports go to stdout (text, or JSON with --json); logs go to stderr.
//! Exit codes: 0 all passed, 1 at least one failure, 2 usage error.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use scaleflow_core::{
    budget::{self, CreditTable, DEFAULT_PLAN},
    copy::{self, LimitTable},
    logging,
    pipeline::{AssetPipeline, PipelineOptions},
    qa::{self, QaThresholds},
    report::{usage_exit_code, RunStatus},
    specs::{SpecMapping, SpecTable},
    validation::RuleOptions,
    ToolError,
};

#[derive(Parser)]
#[command(name = "scaleflow-cli")]
#[command(about = "ScaleFlow CLI - credit budgets, copy limits, asset specs and image QA")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate AI-generation credits for a list of deliverables
    Budget {
        /// Plan tier
        #[arg(short, long, default_value = DEFAULT_PLAN)]
        plan: String,

        /// Deliverables file, one `N x type using model` per line
        #[arg(short, long)]
        deliverables: Option<PathBuf>,

        /// JSON price table replacing the built-in one
        #[arg(long)]
        table: Option<PathBuf>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate copy text against platform character limits
    Copy {
        /// JSON array of copy items (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Warn about items over 80% of their limit
        #[arg(long)]
        strict: bool,

        /// JSON object of platform limits replacing the built-in one
        #[arg(long)]
        limits: Option<PathBuf>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate exported assets against an export spec table
    Assets {
        /// JSON array of export specs
        #[arg(short, long)]
        spec: PathBuf,

        /// Directory of exported files
        #[arg(short, long)]
        assets: PathBuf,

        /// JSON object mapping file names to spec asset_name values
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Report unmatched files without failing the run
        #[arg(long)]
        allow_unmatched: bool,

        /// Allowed per-axis pixel deviation for dimension checks
        #[arg(long, default_value_t = 0)]
        tolerance: u32,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Technical QA on images
    Qa {
        /// Image files or directories of images
        #[arg(short, long, num_args = 1.., required = true)]
        images: Vec<PathBuf>,

        /// Minimum width in pixels
        #[arg(long, default_value_t = 1080)]
        min_width: u32,

        /// Minimum height in pixels
        #[arg(long, default_value_t = 1080)]
        min_height: u32,

        /// Maximum file size in megabytes
        #[arg(long, default_value_t = 20.0)]
        max_file_size_mb: f64,

        /// Expected format, e.g. PNG or JPEG
        #[arg(long)]
        expected_format: Option<String>,

        /// Minimum DPI
        #[arg(long, default_value_t = 72)]
        min_dpi: u32,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli.command) {
        Ok(status) => status.exit_code(),
        Err(e) => {
            eprintln!("ERROR: {}", e);
            usage_exit_code()
        }
    }
}

fn run(command: Commands) -> Result<RunStatus, ToolError> {
    match command {
        Commands::Budget { plan, deliverables, table, json } => {
            let table = match table {
                Some(path) => CreditTable::load(&path)?,
                None => CreditTable::builtin(),
            };
            let deliverables = match deliverables {
                Some(path) => budget::load_deliverables(&path)?,
                None => {
                    eprintln!("No deliverables file specified. Using example project.");
                    budget::example_project()
                }
            };

            let result = budget::calculate(&deliverables, &plan, &table)?;
            if json {
                println!("{}", result.to_json()?);
            } else {
                println!("{}", result.render_text());
            }
            // An estimate never fails the run, even with a shortfall.
            Ok(RunStatus::AllPassed)
        }

        Commands::Copy { input, strict, limits, json } => {
            let limits = match limits {
                Some(path) => LimitTable::load(&path)?,
                None => LimitTable::builtin(),
            };
            let items = copy::load_items(input.as_deref())?;
            let run = copy::validate_all(&items, &limits, strict);

            if json {
                println!("{}", run.to_json()?);
            } else {
                println!("{}", run.render_text());
            }
            Ok(run.status())
        }

        Commands::Assets { spec, assets, mapping, allow_unmatched, tolerance, json } => {
            let table = SpecTable::load(&spec)?;
            let mapping = mapping.as_deref().map(SpecMapping::load).transpose()?;
            let options = PipelineOptions {
                allow_unmatched,
                rules: RuleOptions { dimension_tolerance: tolerance },
            };

            let run = AssetPipeline::new(table, mapping, options).validate_dir(&assets)?;
            if json {
                println!("{}", run.to_json()?);
            } else {
                println!("{}", run.render_text());
            }
            Ok(run.status())
        }

        Commands::Qa {
            images,
            min_width,
            min_height,
            max_file_size_mb,
            expected_format,
            min_dpi,
            json,
        } => {
            let thresholds = QaThresholds {
                min_width,
                min_height,
                max_file_size_mb,
                expected_format,
                min_dpi,
            };
            let paths = qa::collect_image_paths(&images)?;
            let run = qa::check_images(&paths, &thresholds);

            if json {
                println!("{}", run.to_json()?);
            } else {
                println!("{}", run.render_text());
            }
            Ok(run.status())
        }
    }
}
