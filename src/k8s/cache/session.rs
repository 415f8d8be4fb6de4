/**
 * Watch session
 *
 * Consumes one watch stream end to end. Every event is applied to the resource cache and,
 * when the content actually changed, forwarded to subscribers in stream order.
 */
use super::change::ChangeDetection;
use super::event::{ChangeEvent, ChangeKind, WatchEvent};
use super::resource_cache::ResourceCache;
use super::source::WatchStream;
use super::subscription::SubscriptionManager;
use super::watched_resource::Watchable;
use crate::error::Error;
use futures::StreamExt;
use kube::ResourceExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Why a session stopped
#[derive(Debug)]
pub enum SessionEnd {
    /// Remote side closed the stream
    Closed,
    /// Transport or protocol failure
    StreamError(Error),
    /// ERROR event delivered inside the stream
    ErrorEvent(String),
    /// Local shutdown
    Cancelled,
    /// Contract violation, the subsystem must stop
    Fatal(Error),
}

/// What applying a single event did
#[derive(Debug, Clone, PartialEq)]
pub enum Applied<K> {
    Changed(ChangeEvent<K>),
    Unchanged,
    Bookmark(String),
    Ignored,
}

pub struct WatchSession<K> {
    cache: Arc<ResourceCache<K>>,
    subscriptions: Arc<SubscriptionManager<K>>,
    detection: ChangeDetection,
}

impl<K: Watchable> WatchSession<K> {
    pub const fn new(
        cache: Arc<ResourceCache<K>>,
        subscriptions: Arc<SubscriptionManager<K>>,
        detection: ChangeDetection,
    ) -> Self {
        Self {
            cache,
            subscriptions,
            detection,
        }
    }

    /// Drive `stream` until it ends, fails or `cancel` fires.
    ///
    /// `on_applied` sees every applied event, after subscribers were notified.
    pub async fn run(
        &self,
        mut stream: WatchStream<K>,
        cancel: CancellationToken,
        mut on_applied: impl FnMut(&Applied<K>) + Send,
    ) -> SessionEnd {
        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => return SessionEnd::Cancelled,
                next = stream.next() => next,
            };

            match next {
                None => return SessionEnd::Closed,
                Some(Err(e)) if e.is_fatal() => return SessionEnd::Fatal(e),
                Some(Err(e)) => return SessionEnd::StreamError(e),
                Some(Ok(WatchEvent::Error(message))) => return SessionEnd::ErrorEvent(message),
                Some(Ok(event)) => {
                    // A subscriber that stopped reading must not hold off shutdown
                    let applied = tokio::select! {
                        () = cancel.cancelled() => return SessionEnd::Cancelled,
                        applied = self.apply(event) => applied,
                    };
                    on_applied(&applied);
                }
            }
        }
    }

    /// Apply one event to the cache and notify subscribers when it was a real change
    pub async fn apply(&self, event: WatchEvent<K>) -> Applied<K> {
        let applied = match event {
            WatchEvent::Added(resource) => self.upsert(ChangeKind::Added, resource).await,
            WatchEvent::Modified(resource) => self.upsert(ChangeKind::Modified, resource).await,
            WatchEvent::Deleted(resource) => {
                let name = resource.name_any();
                match self.cache.remove(&name).await {
                    Some(_) => Applied::Changed(ChangeEvent::new(ChangeKind::Deleted, resource)),
                    None => {
                        trace!("Delete for unknown {} ignored", name);
                        Applied::Unchanged
                    }
                }
            }
            WatchEvent::Bookmark { resource_version } => {
                trace!("🔖 Bookmark at resource version {}", resource_version);
                Applied::Bookmark(resource_version)
            }
            // Terminal, handled by run()
            WatchEvent::Error(_) => Applied::Ignored,
        };

        if let Applied::Changed(change) = &applied {
            debug!(
                "📣 Emitting change event {}: {}",
                change.kind,
                change.resource.name_any()
            );
            self.subscriptions.notify(change).await;
        }

        applied
    }

    async fn upsert(&self, kind: ChangeKind, resource: K) -> Applied<K> {
        let changed = self.cache.upsert(resource.clone(), self.detection).await;
        if changed {
            Applied::Changed(ChangeEvent::new(kind, resource))
        } else {
            trace!("No content change for {}", resource.name_any());
            Applied::Unchanged
        }
    }
}
