//! Shared helpers for the watcher integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use photodrop_directory_watcher::{ConversionError, Converter, DirectoryWatcher};

/// How long to wait for asynchronous filesystem effects.
pub const DEADLINE: Duration = Duration::from_secs(10);

/// Converter that records its inputs and writes a placeholder output.
#[derive(Default)]
pub struct RecordingConverter {
    calls: Mutex<Vec<PathBuf>>,
    fail: HashSet<String>,
    delay: Duration,
}

impl RecordingConverter {
    /// Fail every file whose name is in `names`.
    pub fn failing(names: &[&str]) -> Self {
        Self {
            calls: Mutex::default(),
            fail: names.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
        }
    }

    /// Take `delay` for every conversion. The call is recorded before waiting.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// File names passed to `convert`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    /// Number of calls for one file name.
    pub fn calls_for(&self, name: &str) -> usize {
        self.calls().iter().filter(|n| *n == name).count()
    }
}

impl Converter for RecordingConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionError> {
        self.calls.lock().unwrap().push(input.to_path_buf());
        std::thread::sleep(self.delay);
        let name = input.file_name().unwrap().to_string_lossy().to_string();
        if self.fail.contains(&name) {
            return Err(ConversionError::Failed {
                status: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }
        std::fs::write(output, b"jpeg").map_err(ConversionError::Spawn)
    }
}

/// Poll `condition` until it holds or the deadline passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < DEADLINE {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}

/// Wait until the watcher completes a rescan beyond `previous`.
pub async fn wait_for_scan_after(watcher: &DirectoryWatcher, previous: u64) -> bool {
    let start = Instant::now();
    while start.elapsed() < DEADLINE {
        if watcher.stats().await.scans_completed > previous {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}
