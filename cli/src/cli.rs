use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Watches a folder for new photos and converts them as they arrive.
///
/// Files already in the folder when monitoring starts are left alone. A
/// converted file keeps its name with the new extension, and the original is
/// removed once the conversion succeeded.
#[derive(Parser, Debug)]
#[command(
    name = "photodrop",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Keep source files after converting them.
    #[arg(long)]
    pub keep_original: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a directory until interrupted.
    ///
    /// Reads control commands from stdin: enable, disable, toggle, status,
    /// rescan, quit.
    Watch {
        /// Directory to watch (defaults to the configured one, then Downloads).
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Start with monitoring disabled.
        #[arg(long)]
        disabled: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Convert a single file and exit.
    Convert {
        /// File to convert.
        file: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },
}
