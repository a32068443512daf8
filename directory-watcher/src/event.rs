//! Classification of raw filesystem notifications.
//!
//! Notifications only wake the watcher up; their paths are never inspected.
//! The kind decides whether a wake-up is worth a rescan at all.

use serde::{Deserialize, Serialize};

/// Kind of file event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    /// File was created.
    Created,

    /// File was modified.
    Modified,

    /// File was deleted.
    Deleted,

    /// File was renamed (old path).
    RenamedFrom,

    /// File was renamed (new path).
    RenamedTo,

    /// File metadata changed.
    MetadataChanged,

    /// File or directory was opened, read or closed without writing.
    Accessed,

    /// Unknown event type.
    Unknown,
}

impl FileEventKind {
    /// Whether this notification should trigger a rescan.
    ///
    /// Access events are ignored: listing the watched directory opens it,
    /// so reacting to them would wake the watcher after every scan.
    pub fn triggers_rescan(self) -> bool {
        !matches!(self, Self::Accessed)
    }
}

impl From<notify::EventKind> for FileEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Modify(modify_kind) => match modify_kind {
                notify::event::ModifyKind::Name(rename) => match rename {
                    notify::event::RenameMode::From => Self::RenamedFrom,
                    notify::event::RenameMode::To => Self::RenamedTo,
                    _ => Self::Modified,
                },
                notify::event::ModifyKind::Metadata(_) => Self::MetadataChanged,
                _ => Self::Modified,
            },
            notify::EventKind::Remove(_) => Self::Deleted,
            notify::EventKind::Access(notify::event::AccessKind::Close(
                notify::event::AccessMode::Write,
            )) => Self::Modified,
            notify::EventKind::Access(_) => Self::Accessed,
            _ => Self::Unknown,
        }
    }
}
