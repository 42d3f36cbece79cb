use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::core::{Engine, NarrativeStatus, ReportAction, SkipReason};

#[derive(Parser, Debug)]
#[command(name = "declscribe")]
#[command(about = "Generate a Markdown report of the functions in a Python codebase")]
#[command(after_help = "Examples:
  declscribe                          # Scan current directory, output to stdout
  declscribe -r /path/to/project      # Scan specific directory
  declscribe -o report.md             # Save report to file
  declscribe -r src -o docs/api.md    # Scan src directory, save to docs/api.md
  declscribe --brief                  # Include only docstring summaries")]
#[command(version)]
pub struct Cli {
    /// Root directory to start the search from (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output file for the report (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include only the first line of docstrings
    #[arg(short, long)]
    pub brief: bool,

    /// Include functions that are commented out
    #[arg(short = 'c', long)]
    pub include_commented: bool,

    /// Include decorator-qualified record types (dataclasses)
    #[arg(short = 't', long)]
    pub include_record_types: bool,

    /// Add a generated description of the codebase to the report
    #[arg(short = 'd', long)]
    pub add_description: bool,

    /// Write the report even when nothing was found
    #[arg(short = 'e', long)]
    pub include_empty: bool,

    /// Only scan the top level of the root directory
    #[arg(long)]
    pub no_recursive: bool,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Layer command line flags over the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(root) = &self.root {
            config.scan.root = root.clone();
        }
        if let Some(output) = &self.output {
            config.report.output = Some(output.clone());
        }
        if self.brief {
            config.report.brief_docstring = true;
        }
        if self.include_commented {
            config.scan.include_commented = true;
        }
        if self.include_record_types {
            config.scan.include_record_types = true;
        }
        if self.add_description {
            config.narrative.enabled = true;
        }
        if self.include_empty {
            config.report.include_empty = true;
        }
        if self.no_recursive {
            config.scan.recursive = false;
        }
    }

    pub async fn execute(self) -> Result<()> {
        let mut config = Config::load_or_default(self.config.as_deref())?;
        self.apply_overrides(&mut config);

        let engine = Engine::new(config)?;
        let outcome = engine.run(None).await?;

        if let NarrativeStatus::Failed(reason) = &outcome.narrative {
            info!("Report written without description ({})", reason);
        }

        match outcome.action {
            ReportAction::Written(_) => {}
            ReportAction::Printed(report) => print!("{}", report),
            ReportAction::Skipped(SkipReason::Unchanged) => {
                if let Some(path) = &engine.config().report.output {
                    info!("Report already up-to-date: {}", path.display());
                }
            }
            ReportAction::Skipped(SkipReason::Empty) => {}
        }

        Ok(())
    }
}
