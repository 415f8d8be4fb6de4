/**
 * Watch supervisor
 *
 * Keeps exactly one watch session alive whenever the remote collection has members and
 * restarts it after any interruption. An empty collection is re-probed on the longer
 * interval instead of holding an idle stream open.
 */
use super::config::{WatchConfig, PROBE_LIMIT};
use super::event::{ChangeEvent, ChangeKind};
use super::resource_cache::ResourceCache;
use super::session::{Applied, SessionEnd, WatchSession};
use super::source::ResourceSource;
use super::subscription::SubscriptionManager;
use super::watched_resource::Watchable;
use crate::error::{Error, Result};
use kube::ResourceExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchConnectionStatus {
    /// A session is consuming the stream
    Connected,
    /// No session; the collection was empty or the probe failed
    Disconnected,
    /// The last session ended and the next tick will re-probe
    Reconnecting,
    /// Shut down or stopped after a fatal error
    Stopped,
}

#[derive(Debug, Clone)]
pub struct WatchStats {
    pub status: WatchConnectionStatus,
    pub retry_interval: Duration,
    pub probes: u64,
    pub probe_failures: u64,
    pub establish_failures: u64,
    pub sessions_established: u64,
    pub stream_errors: u64,
    pub stream_closures: u64,
    pub error_events: u64,
    pub bookmarks: u64,
    pub changes_emitted: u64,
    pub last_resource_version: Option<String>,
}

impl WatchStats {
    const fn new(retry_interval: Duration) -> Self {
        Self {
            status: WatchConnectionStatus::Disconnected,
            retry_interval,
            probes: 0,
            probe_failures: 0,
            establish_failures: 0,
            sessions_established: 0,
            stream_errors: 0,
            stream_closures: 0,
            error_events: 0,
            bookmarks: 0,
            changes_emitted: 0,
            last_resource_version: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    ProbeFailed,
    EstablishFailed,
    StreamError,
    StreamClosed,
    ErrorEvent,
    Fatal,
}

/// Observation-only report of an operational failure
#[derive(Debug, Clone)]
pub struct WatchDiagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

struct ActiveSession {
    generation: u64,
}

/// Counters written from the event path
#[derive(Debug, Default)]
struct EventTally {
    bookmarks: u64,
    changes_emitted: u64,
    last_resource_version: Option<String>,
}

fn record_applied<K>(tally: &std::sync::RwLock<EventTally>, applied: &Applied<K>) {
    let Ok(mut tally) = tally.write() else {
        return;
    };
    match applied {
        Applied::Changed(_) => tally.changes_emitted += 1,
        Applied::Bookmark(version) => {
            tally.bookmarks += 1;
            tally.last_resource_version = Some(version.clone());
        }
        Applied::Unchanged | Applied::Ignored => {}
    }
}

/// Everything the tick and the session exit path must agree on
struct SupervisorState {
    session: Option<ActiveSession>,
    generation: u64,
    stats: WatchStats,
}

pub struct Supervisor<K> {
    source: Arc<dyn ResourceSource<K>>,
    config: WatchConfig,
    pub(crate) cache: Arc<ResourceCache<K>>,
    pub(crate) subscriptions: Arc<SubscriptionManager<K>>,
    state: Mutex<SupervisorState>,
    tally: Arc<std::sync::RwLock<EventTally>>,
    diagnostics: broadcast::Sender<WatchDiagnostic>,
    shutdown: CancellationToken,
}

impl<K: Watchable> Supervisor<K> {
    pub fn new(source: Arc<dyn ResourceSource<K>>, config: WatchConfig) -> Self {
        let (diagnostics, _) = broadcast::channel(config.diagnostic_capacity.max(1));
        let subscriptions = Arc::new(SubscriptionManager::new(config.subscriber_capacity));
        let state = SupervisorState {
            session: None,
            generation: 0,
            stats: WatchStats::new(config.retry_interval),
        };

        Self {
            source,
            config,
            cache: Arc::new(ResourceCache::new()),
            subscriptions,
            state: Mutex::new(state),
            tally: Arc::new(std::sync::RwLock::new(EventTally::default())),
            diagnostics,
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawn the supervisor loop on the current runtime
    pub fn start(self: &Arc<Self>) {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move { supervisor.run().await });
    }

    async fn run(self: Arc<Self>) {
        info!("🔍 Starting supervisor for {}", self.source.describe());

        while !self.shutdown.is_cancelled() {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = self.tick() => {}
            }

            let delay = self.retry_interval().await;
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = sleep(delay) => {}
            }
        }

        self.update_stats(|s| s.status = WatchConnectionStatus::Stopped).await;
        info!("🛑 Supervisor for {} stopped", self.source.describe());
    }

    /// One supervisor step: no-op while a session is active, otherwise probe and maybe connect
    async fn tick(self: &Arc<Self>) {
        if self.state.lock().await.session.is_some() {
            return;
        }

        debug!("Checking if entities are available for {}", self.source.describe());
        self.update_stats(|s| s.probes += 1).await;

        let probe = match self.source.list(Some(PROBE_LIMIT)).await {
            Ok(items) => items,
            Err(e) => {
                self.record_failure(DiagnosticKind::ProbeFailed, &e).await;
                return;
            }
        };

        if probe.is_empty() {
            debug!(
                "No {} present, next probe in {:?}",
                self.source.describe(),
                self.config.empty_retry_interval
            );
            self.update_stats(|s| {
                s.status = WatchConnectionStatus::Disconnected;
                s.retry_interval = self.config.empty_retry_interval;
            })
            .await;
            return;
        }

        if let Err(e) = self.establish().await {
            self.record_failure(DiagnosticKind::EstablishFailed, &e).await;
        }
    }

    async fn record_failure(&self, kind: DiagnosticKind, e: &Error) {
        let describe = self.source.describe();
        if kind == DiagnosticKind::ProbeFailed {
            error!("❌ Probe of {} failed: {}", describe, e);
        } else {
            error!("❌ Error while establishing new watch for {}: {}", describe, e);
        }
        self.update_stats(|s| {
            if kind == DiagnosticKind::ProbeFailed {
                s.probe_failures += 1;
            } else {
                s.establish_failures += 1;
            }
            s.status = WatchConnectionStatus::Disconnected;
            s.retry_interval = self.config.retry_interval;
        })
        .await;
        self.diagnose(kind, e.to_string());
    }

    async fn establish(self: &Arc<Self>) -> Result<()> {
        if self.config.relist_on_reconnect {
            self.reconcile().await?;
        }

        debug!("Establishing new watcher for {}", self.source.describe());
        let stream = self.source.watch().await?;

        // Registering under the lock keeps the session's exit path from running first
        let mut state = self.state.lock().await;
        state.generation += 1;
        let generation = state.generation;
        let cancel = self.shutdown.child_token();
        state.session = Some(ActiveSession { generation });
        state.stats.sessions_established += 1;
        state.stats.status = WatchConnectionStatus::Connected;
        state.stats.retry_interval = self.config.retry_interval;

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let session = WatchSession::new(
                Arc::clone(&supervisor.cache),
                Arc::clone(&supervisor.subscriptions),
                supervisor.config.change_detection,
            );
            let tally = Arc::clone(&supervisor.tally);
            let end = session
                .run(stream, cancel, move |applied| record_applied(&tally, applied))
                .await;
            supervisor.finish_session(generation, end).await;
        });
        drop(state);

        info!("📡 Watch established for {}", self.source.describe());
        Ok(())
    }

    /// Drop cached entries that are no longer listed remotely
    async fn reconcile(&self) -> Result<()> {
        let listed = self.source.list(None).await?;
        let names: HashSet<String> = listed.iter().map(ResourceExt::name_any).collect();

        let removed = self.cache.retain_names(&names).await;
        if !removed.is_empty() {
            info!(
                "🧹 Relist removed {} stale {} entries",
                removed.len(),
                self.source.describe()
            );
        }
        for resource in removed {
            self.subscriptions
                .notify(&ChangeEvent::new(ChangeKind::Deleted, resource))
                .await;
            if let Ok(mut tally) = self.tally.write() {
                tally.changes_emitted += 1;
            }
        }
        Ok(())
    }

    async fn finish_session(&self, generation: u64, end: SessionEnd) {
        let describe = self.source.describe();
        let mut state = self.state.lock().await;
        if state.session.as_ref().is_some_and(|s| s.generation == generation) {
            state.session = None;
        }

        match end {
            SessionEnd::Closed => {
                info!("🔌 Connection was closed while watching {}", describe);
                state.stats.stream_closures += 1;
                state.stats.status = WatchConnectionStatus::Reconnecting;
                state.stats.retry_interval = self.config.retry_interval;
                drop(state);
                self.diagnose(DiagnosticKind::StreamClosed, "stream closed".to_string());
            }
            SessionEnd::StreamError(e) => {
                error!("❌ Error while watching {}: {}", describe, e);
                state.stats.stream_errors += 1;
                state.stats.status = WatchConnectionStatus::Reconnecting;
                state.stats.retry_interval = self.config.retry_interval;
                drop(state);
                self.diagnose(DiagnosticKind::StreamError, e.to_string());
            }
            SessionEnd::ErrorEvent(message) => {
                warn!("⚠️  Watch for {} reported an error event: {}", describe, message);
                state.stats.error_events += 1;
                state.stats.status = WatchConnectionStatus::Reconnecting;
                drop(state);
                self.diagnose(DiagnosticKind::ErrorEvent, message);
            }
            SessionEnd::Cancelled => {
                debug!("Watch session for {} cancelled", describe);
            }
            SessionEnd::Fatal(e) => {
                error!("💀 Unrecoverable watch failure for {}: {}", describe, e);
                state.stats.status = WatchConnectionStatus::Stopped;
                drop(state);
                self.diagnose(DiagnosticKind::Fatal, e.to_string());
                self.shutdown.cancel();
            }
        }
    }

    async fn retry_interval(&self) -> Duration {
        self.state.lock().await.stats.retry_interval
    }

    async fn update_stats(&self, f: impl FnOnce(&mut WatchStats)) {
        f(&mut self.state.lock().await.stats);
    }

    fn diagnose(&self, kind: DiagnosticKind, message: String) {
        // No receivers is fine
        let _ = self.diagnostics.send(WatchDiagnostic { kind, message });
    }

    pub async fn stats(&self) -> WatchStats {
        let mut stats = self.state.lock().await.stats.clone();
        if let Ok(tally) = self.tally.read() {
            stats.bookmarks = tally.bookmarks;
            stats.changes_emitted = tally.changes_emitted;
            stats.last_resource_version.clone_from(&tally.last_resource_version);
        }
        stats
    }

    pub async fn has_active_session(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    pub fn diagnostics(&self) -> broadcast::Receiver<WatchDiagnostic> {
        self.diagnostics.subscribe()
    }

    /// Stop the loop and dispose the active session right away
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
