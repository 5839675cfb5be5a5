//! Layered runtime configuration.
//!
//! Built-in defaults are overridden by an optional `batch-fetch.{toml,yaml,json}`
//! in the working directory, then by `BATCH_FETCH_*` environment variables,
//! and finally by command-line flags.
use crate::args::Args;
use anyhow::{Result, anyhow};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub threads: usize,
    pub log_level: String,
}

/// Fully validated parameters for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_file: PathBuf,
    pub output_dir: PathBuf,
    pub workers: NonZeroUsize,
    pub log_level: Level,
}

impl Settings {
    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("output_dir", "./output")?
            .set_default("threads", 4)?
            .set_default("log_level", "info")
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::defaults()?
            // Config file (optional)
            .add_source(File::with_name("batch-fetch").required(false))
            // Environment variables (e.g. BATCH_FETCH_THREADS=8)
            .add_source(Environment::with_prefix("BATCH_FETCH"))
            .build()?
            .try_deserialize()
    }

    /// Applies command-line overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Fails when the worker count is zero or the log level is not one of
    /// trace, debug, info, warn, error.
    pub fn resolve(self, args: &Args) -> Result<RunConfig> {
        let workers = match args.threads {
            Some(threads) => threads,
            None => NonZeroUsize::new(self.threads)
                .ok_or_else(|| anyhow!("threads must be at least 1"))?,
        };

        let log_level = match args.loglevel {
            Some(level) => level,
            None => Level::from_str(&self.log_level)
                .map_err(|_| anyhow!("invalid log level {:?}", self.log_level))?,
        };

        Ok(RunConfig {
            input_file: args.file.clone(),
            output_dir: args.outdir.clone().unwrap_or(self.output_dir),
            workers,
            log_level,
        })
    }
}
