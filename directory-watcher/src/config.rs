//! Configuration types for the watched directory and the converter.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatcherError};

/// Configuration for the watched directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Path to the directory.
    pub path: PathBuf,

    /// Extension of files to convert, without the leading dot.
    pub source_extension: String,

    /// Extension given to converted files.
    pub target_extension: String,

    /// Whether monitoring starts enabled.
    pub enabled: bool,

    /// Whether the source file is removed after a successful conversion.
    pub delete_original: bool,

    /// External converter settings.
    pub converter: ConverterConfig,
}

impl WatcherConfig {
    /// Create a new config for the given directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source_extension: "heic".to_string(),
            target_extension: "jpeg".to_string(),
            enabled: true,
            delete_original: true,
            converter: ConverterConfig::default(),
        }
    }

    /// Set the source and target extensions.
    pub fn with_extensions(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.source_extension = source.into();
        self.target_extension = target.into();
        self
    }

    /// Set the converter settings.
    pub fn with_converter(mut self, converter: ConverterConfig) -> Self {
        self.converter = converter;
        self
    }

    /// Keep source files after converting them.
    pub fn keep_original(mut self) -> Self {
        self.delete_original = false;
        self
    }

    /// Start with monitoring disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Load a config from a TOML file. Missing keys take their defaults.
    pub fn load(file: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(file)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the extensions for values that would break detection.
    pub fn validate(&self) -> Result<()> {
        for (name, ext) in [
            ("source_extension", &self.source_extension),
            ("target_extension", &self.target_extension),
        ] {
            if ext.is_empty() {
                return Err(WatcherError::Config(format!("{name} must not be empty")));
            }
            if ext.starts_with('.') {
                return Err(WatcherError::Config(format!(
                    "{name} must not start with a dot: {ext}"
                )));
            }
        }

        // Outputs would be picked up again as inputs.
        if self
            .source_extension
            .eq_ignore_ascii_case(&self.target_extension)
        {
            return Err(WatcherError::Config(format!(
                "source and target extension are the same: {}",
                self.source_extension
            )));
        }

        if !format_matches_extension(&self.converter.format, &self.target_extension) {
            return Err(WatcherError::Config(format!(
                "converter format {} does not match target extension {}",
                self.converter.format, self.target_extension
            )));
        }

        Ok(())
    }
}

/// Whether files written in `format` may carry `extension`.
fn format_matches_extension(format: &str, extension: &str) -> bool {
    let format = format.to_ascii_lowercase();
    let extension = extension.to_ascii_lowercase();
    match (format.as_str(), extension.as_str()) {
        ("jpeg", "jpg") | ("tiff", "tif") => true,
        _ => format == extension,
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::new(dirs::download_dir().unwrap_or_default())
    }
}

/// How the external conversion program is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Path to the conversion executable.
    pub program: PathBuf,

    /// Value passed as the output format.
    pub format: String,
}

impl ConverterConfig {
    /// Create a converter config for a program and output format.
    pub fn new(program: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self::new("/usr/bin/sips", "jpeg")
    }
}
