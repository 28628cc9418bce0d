use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use chrono::Local;
use tracing_subscriber::EnvFilter;

use ue_calc::config::Config;
use ue_calc::output::ExportFormat;
use ue_calc::session::Session;

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_FEED: i32 = 2;
const EXIT_EXPORT: i32 = 3;
const EXIT_CONFIG: i32 = 4;

#[derive(Args, Debug)]
struct FeedArgs {
    /// Grades table (CSV, TSV or semicolon-separated, with a header row)
    feed: PathBuf,

    /// Retake table: designation followed by the retake score cells
    #[arg(short, long)]
    retakes: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print module and UE averages
    Show {
        #[command(flatten)]
        feed: FeedArgs,
    },
    /// Write the results as CSV, JSON or a printable report
    Export {
        #[command(flatten)]
        feed: FeedArgs,

        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Output file (defaults to grades.csv, grades.json or grades-report-<date>.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Edit scores, credits and UE layout interactively
    Edit {
        #[command(flatten)]
        feed: FeedArgs,
    },
    /// Create a config file interactively
    Init,
}

#[derive(Parser, Debug)]
#[command(name = "ue-calc")]
#[command(about = "Module and UE grade average calculator", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/ue-calc/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ue_calc::stderr_buffer::writer())
        .with_target(false)
        .without_time()
        .init();
}

/// Load and validate the config, exiting with EXIT_CONFIG on any problem.
fn load_valid_config(path: Option<PathBuf>) -> Config {
    let config = match ue_calc::config::load_config(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(errors) = ue_calc::grading::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }
    config
}

/// Read the feeds and run the first full calculation, exiting with
/// EXIT_FEED when the input is unusable.
fn open_session(config: &Config, args: &FeedArgs) -> Session {
    let rows = match ue_calc::feed::read_grade_feed(&args.feed) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Input error: {}", e);
            std::process::exit(EXIT_FEED);
        }
    };

    let retakes = match &args.retakes {
        Some(path) => match ue_calc::feed::read_retake_feed(path) {
            Ok(rows) => rows,
            Err(e) => {
                eprintln!("Input error: {}", e);
                std::process::exit(EXIT_FEED);
            }
        },
        None => Vec::new(),
    };

    let mut session = Session::new(config);
    if let Err(e) = session.load(&rows, &retakes) {
        eprintln!("Input error: {}", e);
        std::process::exit(EXIT_FEED);
    }

    let report = session.remediation();
    if !report.applied.is_empty() {
        tracing::info!(applied = report.applied.len(), unmatched = report.unmatched.len(), "Retakes applied");
    }
    session
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let start_time = Instant::now();
    let config_path = cli.config.map(PathBuf::from);

    match cli.command {
        Commands::Init => {
            if let Err(e) = ue_calc::config::init::run_init_wizard(config_path) {
                eprintln!("Init failed: {:#}", e);
                std::process::exit(EXIT_CONFIG);
            }
        }
        Commands::Show { feed } => {
            let config = load_valid_config(config_path);
            let session = open_session(&config, &feed);
            let result = session.snapshot();
            let passing = session.passing();
            let use_colors = ue_calc::output::should_use_colors();

            println!("{}", ue_calc::output::format_module_table(result, passing, use_colors));
            println!();
            println!("{}", ue_calc::output::format_group_table(result, passing, use_colors));
            println!();
            println!("{}", ue_calc::output::format_summary(result, passing, use_colors));

            if cli.verbose {
                eprintln!();
                eprintln!("Computed {} modules in {:?}", result.module_count(), start_time.elapsed());
            }
        }
        Commands::Export {
            feed,
            format,
            output,
        } => {
            let config = load_valid_config(config_path);
            let mut session = open_session(&config, &feed);

            let contents = match session.request_export(format) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Export error: {:#}", anyhow::Error::from(e));
                    std::process::exit(EXIT_EXPORT);
                }
            };
            let path = output.unwrap_or_else(|| {
                PathBuf::from(ue_calc::output::default_file_name(format, &Local::now()))
            });
            if let Err(e) = ue_calc::output::write_export(&path, &contents) {
                eprintln!("Export error: {:#}", e);
                std::process::exit(EXIT_EXPORT);
            }
            println!("{} export written to {}", format.label(), path.display());
        }
        Commands::Edit { feed } => {
            let config = load_valid_config(config_path.clone());
            let session = open_session(&config, &feed);

            let save_path = match ue_calc::config::resolve_config_path(config_path) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("Config error: {:#}", e);
                    std::process::exit(EXIT_CONFIG);
                }
            };
            let export_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

            let app = ue_calc::tui::App::new(session, config, save_path, export_dir);
            if let Err(e) = ue_calc::tui::run_tui(app).await {
                eprintln!("Editor error: {:#}", e);
                std::process::exit(EXIT_FAILURE);
            }
        }
    }

    std::process::exit(EXIT_SUCCESS);
}
