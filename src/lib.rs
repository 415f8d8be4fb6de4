//! Local, change-filtered mirrors of watched Kubernetes collections.
//!
//! A [`WatchedResource`] probes the collection, keeps one watch stream open while it has
//! members, and forwards only the events whose content actually changed.

pub mod error;
pub mod k8s;

pub use error::{Error, Result};
pub use k8s::cache::{ChangeEvent, ChangeKind, WatchConfig, WatchedResource};
