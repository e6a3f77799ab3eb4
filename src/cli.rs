//! Command-line interface definitions for guba_fetch.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Targets come from repeated `--target` flags, a YAML batch file, or both.

use crate::error::ConfigError;
use crate::models::Target;
use clap::Parser;
use std::fs;

/// Command-line arguments for guba_fetch.
///
/// # Examples
///
/// ```sh
/// # One identifier
/// guba_fetch -o ./out -t 600519@2024-01-10
///
/// # A batch file and a custom configuration
/// guba_fetch -o ./out -b targets.yaml -c config.yaml
///
/// # Override the detail pool width
/// guba_fetch -o ./out -t 600519@2024-01-10 --workers 8
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Identifier and target date, as IDENT@YYYY-MM-DD (repeatable)
    #[arg(short, long = "target")]
    pub targets: Vec<Target>,

    /// YAML file holding a list of `{identifier, date}` targets
    #[arg(short, long)]
    pub batch: Option<String>,

    /// Output directory for the per-identifier JSON files
    #[arg(short, long)]
    pub output_dir: String,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Detail fetches in flight at once (overrides the config file)
    #[arg(long, env = "GUBA_WORKERS")]
    pub workers: Option<usize>,

    /// Pages fetched on each side of the boundary page (overrides the config file)
    #[arg(long)]
    pub window_radius: Option<u32>,
}

impl Cli {
    /// Flag targets first, then batch targets in file order.
    pub fn all_targets(&self) -> Result<Vec<Target>, ConfigError> {
        let mut targets = self.targets.clone();
        if let Some(path) = &self.batch {
            let content = fs::read_to_string(path)?;
            let batch: Vec<Target> = serde_yaml::from_str(&content)?;
            targets.extend(batch);
        }
        if targets.is_empty() {
            return Err(ConfigError::Invalid(
                "no targets given; use --target or --batch".into(),
            ));
        }
        Ok(targets)
    }
}
