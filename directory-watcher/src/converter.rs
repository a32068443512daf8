//! Conversion of detected files through an external program.
//!
//! The [`Converter`] trait is the seam between the watcher and the process
//! that does the actual work. [`ConversionJob::run`] wraps a converter with
//! the cleanup rules: the source is removed only after a successful
//! conversion, and a failed removal never turns success into failure.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ConverterConfig;
use crate::error::ConversionError;

/// Converts one file into another format.
pub trait Converter: Send + Sync {
    /// Convert `input`, writing the result to `output`.
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionError>;
}

/// Converter that shells out to an external executable.
///
/// The program is invoked as
/// `{program} --setProperty format {format} --out {output} {input}`.
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    config: ConverterConfig,
}

impl ExternalConverter {
    /// Create a converter from its settings.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("--setProperty")
            .arg("format")
            .arg(&self.config.format)
            .arg("--out")
            .arg(output)
            .arg(input);
        cmd
    }
}

impl Converter for ExternalConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionError> {
        let result = self.command(input, output).output();

        let result = match result {
            Ok(result) => result,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConversionError::ProgramNotFound(self.config.program.clone()));
            }
            Err(e) => return Err(ConversionError::Spawn(e)),
        };

        let stdout = String::from_utf8_lossy(&result.stdout);
        let stderr = String::from_utf8_lossy(&result.stderr);
        if !stdout.trim().is_empty() {
            debug!("{} output: {}", self.config.program.display(), stdout.trim());
        }
        if !stderr.trim().is_empty() {
            warn!("{} error output: {}", self.config.program.display(), stderr.trim());
        }

        if result.status.success() {
            Ok(())
        } else {
            Err(ConversionError::Failed {
                status: result.status.code(),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

/// A single file to convert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    /// File to convert.
    pub source: PathBuf,

    /// Where the converted file is written.
    pub destination: PathBuf,
}

impl ConversionJob {
    /// Create a job whose destination is `source` with `target_extension`.
    pub fn new(source: impl Into<PathBuf>, target_extension: &str) -> Self {
        let source = source.into();
        let destination = source.with_extension(target_extension);
        Self {
            source,
            destination,
        }
    }

    /// Run the conversion and, on success, remove the source if asked to.
    pub fn run(&self, converter: &dyn Converter, delete_original: bool) -> ConversionOutcome {
        let start = Instant::now();
        debug!("Converting {}", self.source.display());

        if let Err(e) = converter.convert(&self.source, &self.destination) {
            warn!("Conversion of {} failed: {e}", self.source.display());
            return ConversionOutcome::Failed {
                reason: e.to_string(),
            };
        }

        info!(
            "Converted {} -> {} in {}ms",
            self.source.display(),
            self.destination.display(),
            start.elapsed().as_millis()
        );

        let source_removed = delete_original && self.remove_source();
        ConversionOutcome::Converted {
            output: self.destination.clone(),
            source_removed,
        }
    }

    fn remove_source(&self) -> bool {
        match std::fs::remove_file(&self.source) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Converted {} but could not remove it: {e}",
                    self.source.display()
                );
                false
            }
        }
    }
}

/// Result of running a [`ConversionJob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// The converter succeeded.
    Converted {
        /// The converted file.
        output: PathBuf,

        /// Whether the source was removed afterwards.
        source_removed: bool,
    },

    /// The converter failed; the source was left alone.
    Failed {
        /// Why the conversion failed.
        reason: String,
    },
}

impl ConversionOutcome {
    /// Whether the conversion itself succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Converted { .. })
    }
}
