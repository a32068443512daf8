//! Directory watcher implementation.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WatcherConfig;
use crate::converter::{ConversionJob, ConversionOutcome, Converter, ExternalConverter};
use crate::error::{Result, WatcherError};
use crate::event::FileEventKind;
use crate::scan::{KnownFileSet, list_matching};

/// Whether the watcher is monitoring its directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// No subscription is held.
    Stopped,

    /// Notifications are being received and acted on.
    Running,
}

/// Watches one directory and converts files that appear in it.
///
/// Files already present when monitoring starts are never converted. Every
/// change notification triggers a rescan: the directory is listed, names
/// not seen in the previous scan are handed to the converter one after
/// another, and the listing becomes the new baseline. A name is only ever
/// dispatched once while it stays in the directory, even if its conversion
/// failed.
pub struct DirectoryWatcher {
    /// State shared with the rescan task.
    shared: Arc<Shared>,

    /// Active subscription, present while running.
    subscription: Mutex<Option<Subscription>>,
}

impl DirectoryWatcher {
    /// Create a stopped watcher.
    pub fn new(config: WatcherConfig, converter: Arc<dyn Converter>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                converter,
                known: Mutex::new(KnownFileSet::new()),
                scan_lock: Mutex::new(()),
                counters: RwLock::new(ScanCounters::default()),
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Create a stopped watcher that runs the configured external program.
    pub fn with_external_converter(config: WatcherConfig) -> Self {
        let converter = Arc::new(ExternalConverter::new(config.converter.clone()));
        Self::new(config, converter)
    }

    /// Create a watcher and start it if the config says it is enabled.
    pub async fn launch(config: WatcherConfig, converter: Arc<dyn Converter>) -> Self {
        let enabled = config.enabled;
        let watcher = Self::new(config, converter);
        if enabled {
            watcher.enable().await;
        }
        watcher
    }

    /// Start monitoring. Returns whether the watcher is running afterwards.
    ///
    /// Enabling a running watcher does nothing. If the directory cannot be
    /// watched the failure is logged and the watcher stays stopped.
    pub async fn enable(&self) -> bool {
        let mut subscription = self.subscription.lock().await;
        if subscription.is_some() {
            return true;
        }

        let path = self.shared.config.read().await.path.clone();
        match self.subscribe().await {
            Ok(sub) => {
                *subscription = Some(sub);
                info!("Monitoring started: {}", path.display());
                true
            }
            Err(e) => {
                error!("Failed to start monitoring {}: {e}", path.display());
                false
            }
        }
    }

    /// Stop monitoring.
    ///
    /// No rescan starts after this returns. A rescan that is already
    /// converting files finishes its current batch in the background.
    pub async fn disable(&self) {
        let subscription = self.subscription.lock().await.take();
        if let Some(subscription) = subscription {
            drop(subscription);
            let path = self.shared.config.read().await.path.clone();
            info!("Monitoring stopped: {}", path.display());
        }
    }

    /// Enable or disable monitoring. Returns whether the watcher is running.
    pub async fn set_enabled(&self, enabled: bool) -> bool {
        if enabled {
            self.enable().await
        } else {
            self.disable().await;
            false
        }
    }

    /// Current state.
    pub async fn state(&self) -> MonitorState {
        if self.subscription.lock().await.is_some() {
            MonitorState::Running
        } else {
            MonitorState::Stopped
        }
    }

    /// Check if the watcher is running.
    pub async fn is_running(&self) -> bool {
        self.state().await == MonitorState::Running
    }

    /// Change the watched directory. Only allowed while stopped.
    pub async fn set_path(&self, path: impl Into<PathBuf>) -> Result<()> {
        let subscription = self.subscription.lock().await;
        let mut config = self.shared.config.write().await;
        if subscription.is_some() {
            return Err(WatcherError::AlreadyWatching(
                config.path.display().to_string(),
            ));
        }

        config.path = path.into();
        Ok(())
    }

    /// Current configuration.
    pub async fn config(&self) -> WatcherConfig {
        self.shared.config.read().await.clone()
    }

    /// Run a rescan now, serialized with notification-driven ones.
    ///
    /// Returns `None` when the watcher is stopped or the directory could
    /// not be listed.
    pub async fn rescan(&self) -> Option<RescanReport> {
        if !self.is_running().await {
            debug!("Ignoring rescan request while stopped");
            return None;
        }
        self.shared.rescan().await
    }

    /// Get statistics about the watcher.
    pub async fn stats(&self) -> WatcherStats {
        let state = self.state().await;
        let watched_path = self.shared.config.read().await.path.clone();
        let known_files = self.shared.known.lock().await.len();
        let counters = self.shared.counters.read().await.clone();

        WatcherStats {
            state,
            watched_path,
            known_files,
            scans_completed: counters.scans_completed,
            scans_skipped: counters.scans_skipped,
            conversions_succeeded: counters.conversions_succeeded,
            conversions_failed: counters.conversions_failed,
            last_scan_at: counters.last_scan_at,
        }
    }

    async fn subscribe(&self) -> Result<Subscription> {
        let config = self.shared.config.read().await.clone();
        let path = config.path;

        let metadata = std::fs::metadata(&path).map_err(|e| WatcherError::from_io(&path, e))?;
        if !metadata.is_dir() {
            return Err(WatcherError::Config(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        // Capacity 1: a full channel already holds a pending wake-up, so
        // bursts of notifications collapse into a single rescan.
        let (wake_tx, wake_rx) = mpsc::channel(1);
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if FileEventKind::from(event.kind).triggers_rescan() {
                        let _ = wake_tx.try_send(());
                    }
                }
                Err(e) => warn!("Watch error: {e}"),
            },
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        // Baseline after subscribing, so a file created in between is
        // either part of it or reported by the first notification. Taken
        // under the scan lock so a pass left over from an earlier
        // subscription cannot overwrite it with an older listing.
        {
            let _scan = self.shared.scan_lock.lock().await;
            let current = list_matching_blocking(path.clone(), config.source_extension)
                .await
                .map_err(|e| WatcherError::from_io(&path, e))?;
            debug!(
                "Ignoring {} existing file(s) in {}",
                current.len(),
                path.display()
            );
            self.shared.known.lock().await.reset(current);
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_rescan_loop(
            Arc::downgrade(&self.shared),
            wake_rx,
            cancel.clone(),
        ));

        Ok(Subscription {
            _watcher: watcher,
            cancel,
            _task: task,
        })
    }
}

/// Statistics about the watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherStats {
    /// Current state.
    pub state: MonitorState,

    /// Watched directory.
    pub watched_path: PathBuf,

    /// Number of known matching files.
    pub known_files: usize,

    /// Rescans that listed the directory and dispatched their new files.
    pub scans_completed: u64,

    /// Rescans skipped because the directory could not be listed.
    pub scans_skipped: u64,

    /// Successful conversions.
    pub conversions_succeeded: u64,

    /// Failed conversions.
    pub conversions_failed: u64,

    /// When the last rescan completed.
    pub last_scan_at: Option<DateTime<Utc>>,
}

/// What a single rescan found and did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescanReport {
    /// Outcome per newly detected file name.
    pub conversions: Vec<(String, ConversionOutcome)>,
}

impl RescanReport {
    /// Names of newly detected files.
    pub fn new_files(&self) -> Vec<&str> {
        self.conversions
            .iter()
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Number of successful conversions.
    pub fn succeeded(&self) -> usize {
        self.conversions
            .iter()
            .filter(|(_, outcome)| outcome.is_success())
            .count()
    }

    /// Number of failed conversions.
    pub fn failed(&self) -> usize {
        self.conversions.len() - self.succeeded()
    }
}

/// Keeps the native watch alive; dropping it ends monitoring.
struct Subscription {
    _watcher: RecommendedWatcher,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Runs before the fields drop, so the loop stops before the
        // native watcher goes away.
        self.cancel.cancel();
    }
}

#[derive(Debug, Clone, Default)]
struct ScanCounters {
    scans_completed: u64,
    scans_skipped: u64,
    conversions_succeeded: u64,
    conversions_failed: u64,
    last_scan_at: Option<DateTime<Utc>>,
}

struct Shared {
    config: RwLock<WatcherConfig>,
    converter: Arc<dyn Converter>,
    known: Mutex<KnownFileSet>,

    /// Held for a whole rescan so passes never interleave.
    scan_lock: Mutex<()>,

    counters: RwLock<ScanCounters>,
}

impl Shared {
    async fn rescan(&self) -> Option<RescanReport> {
        let _scan = self.scan_lock.lock().await;
        let config = self.config.read().await.clone();

        let current =
            match list_matching_blocking(config.path.clone(), config.source_extension.clone())
                .await
            {
                Ok(current) => current,
                Err(e) => {
                    warn!("Skipping scan of {}: {e}", config.path.display());
                    self.counters.write().await.scans_skipped += 1;
                    return None;
                }
            };

        // The set is settled before any conversion runs.
        let new_files = self.known.lock().await.apply(current);
        debug!(
            "Rescan of {} found {} new file(s)",
            config.path.display(),
            new_files.len()
        );

        let mut report = RescanReport::default();
        for name in new_files {
            let job = ConversionJob::new(config.path.join(&name), &config.target_extension);
            let outcome = self.dispatch(job, config.delete_original).await;
            report.conversions.push((name, outcome));
        }

        let mut counters = self.counters.write().await;
        counters.scans_completed += 1;
        counters.conversions_succeeded += report.succeeded() as u64;
        counters.conversions_failed += report.failed() as u64;
        counters.last_scan_at = Some(Utc::now());

        Some(report)
    }

    async fn dispatch(&self, job: ConversionJob, delete_original: bool) -> ConversionOutcome {
        let converter = Arc::clone(&self.converter);
        let source = job.source.clone();

        match tokio::task::spawn_blocking(move || job.run(converter.as_ref(), delete_original))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Conversion task for {} failed: {e}", source.display());
                ConversionOutcome::Failed {
                    reason: format!("conversion task failed: {e}"),
                }
            }
        }
    }
}

/// Receives wake-ups and runs one rescan per wake-up until cancelled.
async fn run_rescan_loop(
    shared: Weak<Shared>,
    mut wake_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            wake = wake_rx.recv() => {
                if wake.is_none() {
                    break;
                }
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                // Disabled while this wake-up was being received.
                if cancel.is_cancelled() {
                    break;
                }
                shared.rescan().await;
            }
        }
    }
    debug!("Rescan loop exited");
}

async fn list_matching_blocking(dir: PathBuf, extension: String) -> io::Result<HashSet<String>> {
    tokio::task::spawn_blocking(move || list_matching(&dir, &extension))
        .await
        .map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingConverter {
        calls: std::sync::Mutex<Vec<PathBuf>>,
        fail: HashSet<String>,
    }

    impl RecordingConverter {
        fn failing(names: &[&str]) -> Self {
            Self {
                calls: std::sync::Mutex::default(),
                fail: names.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl Converter for RecordingConverter {
        fn convert(
            &self,
            input: &Path,
            output: &Path,
        ) -> std::result::Result<(), ConversionError> {
            self.calls.lock().unwrap().push(input.to_path_buf());
            let name = input.file_name().unwrap().to_string_lossy().to_string();
            if self.fail.contains(&name) {
                return Err(ConversionError::Failed {
                    status: Some(1),
                    stderr: String::new(),
                });
            }
            std::fs::write(output, b"jpeg").map_err(ConversionError::Spawn)
        }
    }

    /// A watcher with its baseline taken, but no native subscription, so
    /// rescans only happen when a test asks for them.
    async fn primed(dir: &Path, converter: Arc<RecordingConverter>) -> DirectoryWatcher {
        let watcher = DirectoryWatcher::new(WatcherConfig::new(dir), converter);
        let current = list_matching(dir, "heic").unwrap();
        watcher.shared.known.lock().await.reset(current);
        watcher
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let watcher = DirectoryWatcher::with_external_converter(WatcherConfig::new("/tmp"));
        assert!(!watcher.is_running().await);
        assert_eq!(watcher.stats().await.state, MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_enable_missing_directory_stays_stopped() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = DirectoryWatcher::new(
            WatcherConfig::new(temp_dir.path().join("missing")),
            Arc::new(RecordingConverter::default()),
        );

        assert!(!watcher.enable().await);
        assert_eq!(watcher.state().await, MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_enable_and_disable_are_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = DirectoryWatcher::new(
            WatcherConfig::new(temp_dir.path()),
            Arc::new(RecordingConverter::default()),
        );

        watcher.disable().await;
        assert!(watcher.set_enabled(true).await);
        assert!(watcher.set_enabled(true).await);
        assert!(watcher.is_running().await);
        assert!(!watcher.set_enabled(false).await);
        watcher.disable().await;
        assert!(!watcher.is_running().await);
    }

    #[tokio::test]
    async fn test_launch_respects_enabled_flag() {
        let temp_dir = TempDir::new().unwrap();
        let converter = Arc::new(RecordingConverter::default());

        let config = WatcherConfig::new(temp_dir.path());

        let running = DirectoryWatcher::launch(config.clone(), converter.clone()).await;
        assert!(running.is_running().await);

        let stopped = DirectoryWatcher::launch(config.disabled(), converter).await;
        assert!(!stopped.is_running().await);
    }

    #[tokio::test]
    async fn test_set_path_only_while_stopped() {
        let temp_dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let watcher = DirectoryWatcher::new(
            WatcherConfig::new(temp_dir.path()),
            Arc::new(RecordingConverter::default()),
        );

        watcher.enable().await;
        assert!(matches!(
            watcher.set_path(other.path()).await,
            Err(WatcherError::AlreadyWatching(_))
        ));

        watcher.disable().await;
        watcher.set_path(other.path()).await.unwrap();
        assert_eq!(watcher.config().await.path, other.path());
    }

    #[tokio::test]
    async fn test_rescan_ignores_existing_and_converts_new() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.HEIC"), b"old").unwrap();
        let converter = Arc::new(RecordingConverter::default());
        let watcher = primed(temp_dir.path(), converter.clone()).await;

        std::fs::write(temp_dir.path().join("b.heic"), b"new").unwrap();
        let report = watcher.shared.rescan().await.unwrap();

        assert_eq!(report.new_files(), vec!["b.heic"]);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(
            *converter.calls.lock().unwrap(),
            vec![temp_dir.path().join("b.heic")]
        );
        assert!(temp_dir.path().join("a.HEIC").exists());
        assert!(temp_dir.path().join("b.jpeg").exists());
        assert!(!temp_dir.path().join("b.heic").exists());
    }

    #[tokio::test]
    async fn test_failed_file_is_not_retried() {
        let temp_dir = TempDir::new().unwrap();
        let converter = Arc::new(RecordingConverter::failing(&["c.HEIC"]));
        let watcher = primed(temp_dir.path(), converter.clone()).await;

        std::fs::write(temp_dir.path().join("c.HEIC"), b"new").unwrap();
        let first = watcher.shared.rescan().await.unwrap();
        assert_eq!(first.failed(), 1);

        std::fs::write(temp_dir.path().join("notes.txt"), b"unrelated").unwrap();
        let second = watcher.shared.rescan().await.unwrap();
        assert!(second.conversions.is_empty());

        assert_eq!(converter.calls.lock().unwrap().len(), 1);
        assert!(temp_dir.path().join("c.HEIC").exists());
        assert!(!temp_dir.path().join("c.jpeg").exists());

        let stats = watcher.stats().await;
        assert_eq!(stats.conversions_failed, 1);
        assert_eq!(stats.scans_completed, 2);
        assert_eq!(stats.known_files, 1);
    }

    #[tokio::test]
    async fn test_unreadable_directory_skips_scan() {
        let temp_dir = TempDir::new().unwrap();
        let watched = temp_dir.path().join("inbox");
        std::fs::create_dir(&watched).unwrap();
        std::fs::write(watched.join("a.heic"), b"old").unwrap();
        let converter = Arc::new(RecordingConverter::default());
        let watcher = primed(&watched, converter).await;

        std::fs::rename(&watched, temp_dir.path().join("moved")).unwrap();
        assert!(watcher.shared.rescan().await.is_none());

        let stats = watcher.stats().await;
        assert_eq!(stats.scans_skipped, 1);
        assert_eq!(stats.known_files, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_enable_waits_for_in_flight_scan() {
        let temp_dir = TempDir::new().unwrap();
        let converter = Arc::new(RecordingConverter::default());
        let watcher = Arc::new(DirectoryWatcher::new(
            WatcherConfig::new(temp_dir.path()),
            converter.clone(),
        ));

        // A pass from an earlier subscription has listed the directory but
        // not applied its listing yet.
        let scan = watcher.shared.scan_lock.lock().await;
        let older_listing = list_matching(temp_dir.path(), "heic").unwrap();
        std::fs::write(temp_dir.path().join("x.heic"), b"existing").unwrap();

        let pending = tokio::spawn({
            let watcher = Arc::clone(&watcher);
            async move { watcher.enable().await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(!pending.is_finished());

        watcher.shared.known.lock().await.apply(older_listing);
        drop(scan);

        assert!(pending.await.unwrap());
        assert!(watcher.shared.known.lock().await.contains("x.heic"));

        let report = watcher.rescan().await.unwrap();
        assert!(report.conversions.is_empty());
        assert!(converter.calls.lock().unwrap().is_empty());
        assert!(temp_dir.path().join("x.heic").exists());

        watcher.disable().await;
    }

    #[tokio::test]
    async fn test_manual_rescan_requires_running() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = DirectoryWatcher::new(
            WatcherConfig::new(temp_dir.path()),
            Arc::new(RecordingConverter::default()),
        );

        assert!(watcher.rescan().await.is_none());
    }
}
