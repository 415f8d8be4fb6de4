use super::config::WatchConfig;
use super::errors::type_mismatch_error;
use super::event::ChangeEvent;
use super::resource_cache::CacheStats;
use super::source::{KubeSource, ResourceSource};
use super::supervisor::{Supervisor, WatchDiagnostic, WatchStats};
use crate::error::Result;
use k8s_openapi::serde_json;
use kube::api::Api;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Bound for resource types that can be mirrored
pub trait Watchable:
    Resource<DynamicType = ()>
    + Clone
    + Debug
    + PartialEq
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> Watchable for T where
    T: Resource<DynamicType = ()>
        + Clone
        + Debug
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// A locally cached, self-healing mirror of one remote collection.
///
/// The supervisor starts on construction and keeps running until [`Self::shutdown`] is
/// called or the value is dropped.
pub struct WatchedResource<K: Watchable> {
    supervisor: Arc<Supervisor<K>>,
}

impl<K: Watchable> WatchedResource<K> {
    /// Start mirroring `source`.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime
    #[must_use]
    pub fn new<S>(source: S, config: WatchConfig) -> Self
    where
        S: ResourceSource<K> + 'static,
    {
        let supervisor = Arc::new(Supervisor::new(Arc::new(source), config));
        supervisor.start();
        Self { supervisor }
    }

    /// Start mirroring the collection behind a kube [`Api`]
    #[must_use]
    pub fn from_api(api: Api<K>, config: WatchConfig) -> Self {
        Self::new(KubeSource::new(api), config)
    }

    /// Snapshot of every cached resource, unordered
    pub async fn get_all(&self) -> Vec<K> {
        self.supervisor.cache.list().await
    }

    pub async fn get(&self, name: &str) -> Option<K> {
        self.supervisor.cache.get(name).await
    }

    pub async fn len(&self) -> usize {
        self.supervisor.cache.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.supervisor.cache.is_empty().await
    }

    /// Snapshot projected onto `T`, which must describe the same kind and apiVersion.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for a different resource type and `Json` when a cached
    /// object does not fit `T`
    pub async fn get_all_as<T>(&self) -> Result<Vec<T>>
    where
        T: Resource<DynamicType = ()> + DeserializeOwned,
    {
        ensure_same_type::<K, T>()?;
        self.get_all()
            .await
            .into_iter()
            .map(|resource| -> Result<T> {
                Ok(serde_json::from_value(serde_json::to_value(resource)?)?)
            })
            .collect()
    }

    /// Receive every detected change, in processing order
    pub async fn subscribe(&self) -> (String, mpsc::Receiver<ChangeEvent<K>>) {
        self.supervisor.subscriptions.subscribe().await
    }

    /// Receive changes of resources whose name matches `pattern` (`*`, exact, or `prefix*`)
    pub async fn subscribe_matching(
        &self,
        pattern: impl Into<String>,
    ) -> (String, mpsc::Receiver<ChangeEvent<K>>) {
        self.supervisor
            .subscriptions
            .subscribe_matching(pattern.into())
            .await
    }

    pub async fn unsubscribe(&self, subscription_id: &str) {
        self.supervisor.subscriptions.unsubscribe(subscription_id).await;
    }

    /// Operational failures, for logging or health reporting only
    #[must_use]
    pub fn diagnostics(&self) -> broadcast::Receiver<WatchDiagnostic> {
        self.supervisor.diagnostics()
    }

    pub async fn stats(&self) -> WatchStats {
        self.supervisor.stats().await
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.supervisor.cache.stats()
    }

    pub async fn has_active_session(&self) -> bool {
        self.supervisor.has_active_session().await
    }

    /// Stop the supervisor and dispose the active session.
    ///
    /// The background task is not joined; it exits at its next suspension point.
    pub fn shutdown(&self) {
        self.supervisor.shutdown();
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.supervisor.is_shutdown()
    }
}

impl<K: Watchable> Drop for WatchedResource<K> {
    fn drop(&mut self) {
        self.supervisor.shutdown();
    }
}

fn ensure_same_type<K, T>() -> Result<()>
where
    K: Resource<DynamicType = ()>,
    T: Resource<DynamicType = ()>,
{
    let expected = format!("{}/{}", K::api_version(&()), K::kind(&()));
    let requested = format!("{}/{}", T::api_version(&()), T::kind(&()));
    if expected == requested {
        Ok(())
    } else {
        Err(type_mismatch_error(&expected, &requested))
    }
}
