use super::errors::unknown_event_kind_error;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// One notification from a watch stream
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<K> {
    Added(K),
    Modified(K),
    Deleted(K),
    /// Progress marker, carries no object
    Bookmark { resource_version: String },
    /// Error reported inside the stream by the API server
    Error(String),
}

impl<K> WatchEvent<K> {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Added(_) => EventKind::Added,
            Self::Modified(_) => EventKind::Modified,
            Self::Deleted(_) => EventKind::Deleted,
            Self::Bookmark { .. } => EventKind::Bookmark,
            Self::Error(_) => EventKind::Error,
        }
    }
}

impl<K> From<kube::api::WatchEvent<K>> for WatchEvent<K> {
    fn from(event: kube::api::WatchEvent<K>) -> Self {
        match event {
            kube::api::WatchEvent::Added(obj) => Self::Added(obj),
            kube::api::WatchEvent::Modified(obj) => Self::Modified(obj),
            kube::api::WatchEvent::Deleted(obj) => Self::Deleted(obj),
            kube::api::WatchEvent::Bookmark(bookmark) => Self::Bookmark {
                resource_version: bookmark.metadata.resource_version,
            },
            kube::api::WatchEvent::Error(status) => Self::Error(status.to_string()),
        }
    }
}

/// The wire-level event type names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Bookmark => "BOOKMARK",
            Self::Error => "ERROR",
        }
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ADDED" => Ok(Self::Added),
            "MODIFIED" => Ok(Self::Modified),
            "DELETED" => Ok(Self::Deleted),
            "BOOKMARK" => Ok(Self::Bookmark),
            "ERROR" => Ok(Self::Error),
            other => Err(unknown_event_kind_error(other)),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a change notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Added => "Added",
            Self::Modified => "Modified",
            Self::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

/// A detected change delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<K> {
    pub kind: ChangeKind,
    pub resource: K,
}

impl<K> ChangeEvent<K> {
    pub const fn new(kind: ChangeKind, resource: K) -> Self {
        Self { kind, resource }
    }
}
