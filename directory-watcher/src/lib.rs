//! # Directory Watcher
//!
//! This crate watches a single directory for newly created photos and
//! converts each one with an external program, removing the original once
//! the conversion succeeded.
//!
//! ## Features
//!
//! - **Event-driven**: native filesystem notifications, no polling
//! - **New files only**: files present when monitoring starts are left alone
//! - **Single dispatch**: every new file is handed to the converter once
//! - **Toggleable**: monitoring can be switched off and on at runtime
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Directory Watcher                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  notify ──► wake-up ──► Rescan ──► ConversionJob ──► Converter │
//! │                           │                                     │
//! │                           ▼                                     │
//! │                      KnownFileSet                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod event;
pub mod scan;
pub mod watcher;

pub use config::{ConverterConfig, WatcherConfig};
pub use converter::{ConversionJob, ConversionOutcome, Converter, ExternalConverter};
pub use error::{ConversionError, Result, WatcherError};
pub use event::FileEventKind;
pub use scan::{KnownFileSet, list_matching, matches_extension};
pub use watcher::{DirectoryWatcher, MonitorState, RescanReport, WatcherStats};
