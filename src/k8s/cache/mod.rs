pub mod change;
pub mod config;
pub mod errors;
pub mod event;
pub mod resource_cache;
pub mod session;
pub mod source;
pub mod subscription;
pub mod supervisor;
pub mod watched_resource;

pub use change::{ChangeDetection, ContentEq};
pub use config::WatchConfig;
pub use event::{ChangeEvent, ChangeKind, EventKind, WatchEvent};
pub use resource_cache::{CacheStats, ResourceCache};
pub use source::{KubeSource, ResourceSource, WatchStream};
pub use subscription::SubscriptionManager;
pub use supervisor::{DiagnosticKind, WatchConnectionStatus, WatchDiagnostic, WatchStats};
pub use watched_resource::{Watchable, WatchedResource};
