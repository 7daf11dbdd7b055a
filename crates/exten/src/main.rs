//! Exten - Entry Point
//!
//! | Command | Description |
//! |---------|-------------|
//! | `exten deps` | Print every unit's library chain, flagging cycles and missing files |
//! | `exten check-config` | Validate and print the merged configuration |

use anyhow::Context;
use clap::{Parser, Subcommand};
use exten::inspect::inspect_units;
use exten_infrastructure::config::ConfigLoader;
use exten_infrastructure::logging::init_logging;
use exten_infrastructure::preprocessor::DirectivePreprocessor;
use exten_infrastructure::source::FileSystemSourceStore;
use std::path::PathBuf;
use std::process::ExitCode;

/// Command line interface for Exten
#[derive(Parser, Debug)]
#[command(name = "exten")]
#[command(about = "Exten - script unit cache and extension registry tools")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at the configured level instead of warnings only
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the library dependencies of every unit
    Deps {
        /// Source root, overriding `source.root_dir`
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Validate and print the merged configuration
    CheckConfig,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    let mut config = loader.load().context("Failed to load configuration")?;

    let mut logging = config.logging.clone();
    if !cli.verbose {
        logging.level = "warn".to_string();
    }
    init_logging(&logging).context("Failed to initialize logging")?;

    match cli.command {
        Command::CheckConfig => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{rendered}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Deps { root } => {
            if let Some(root) = root {
                config.source.root_dir = root;
            }
            let store = FileSystemSourceStore::new(
                &config.source.root_dir,
                config.source.unit_extension.clone(),
            )
            .with_context(|| {
                format!("Failed to open {}", config.source.root_dir.display())
            })?;
            let preprocessor = DirectivePreprocessor::new(config.preprocessor.clone());

            let reports = inspect_units(&store, &preprocessor)?;
            let mut failed = 0;
            for report in &reports {
                println!("{}", report.path);
                for library in &report.libraries {
                    println!("  library   {library}");
                }
                for reference in &report.references {
                    println!("  reference {reference}");
                }
                if let Some(problem) = &report.problem {
                    failed += 1;
                    println!("  error     {problem}");
                }
            }
            println!("{} units, {failed} with problems", reports.len());
            Ok(if failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
