use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::Level;

/// Download every URL listed in a file and save them in a directory.
///
/// Flags left unset fall back to `batch-fetch.toml` in the working directory,
/// then to `BATCH_FETCH_*` environment variables, then to built-in defaults.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The path to the input FILE containing URLs, one per line.
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// The DIRECTORY where the files will be saved to [default: ./output].
    #[arg(short, long, visible_short_alias = 'd', value_name = "DIRECTORY")]
    pub outdir: Option<PathBuf>,

    /// Number of concurrent download workers (at least 1) [default: 4].
    #[arg(short = 't', long)]
    pub threads: Option<NonZeroUsize>,

    /// Log level: trace, debug, info, warn or error [default: info].
    #[arg(long)]
    pub loglevel: Option<Level>,
}
