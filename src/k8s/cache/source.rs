use super::errors::classify_watch_error;
use super::event::WatchEvent;
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::api::{Api, ListParams, WatchParams};
use kube::Resource;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Live stream of watch events; `None` means the remote side closed it
pub type WatchStream<K> = BoxStream<'static, Result<WatchEvent<K>>>;

/// The list/watch operations of the remote collection
#[async_trait]
pub trait ResourceSource<K>: Send + Sync {
    /// List current members, at most `limit` of them when given
    async fn list(&self, limit: Option<u32>) -> Result<Vec<K>>;

    /// Open an unbounded watch over the whole collection
    async fn watch(&self) -> Result<WatchStream<K>>;

    /// Human readable name used in log lines
    fn describe(&self) -> String {
        std::any::type_name::<K>().to_string()
    }
}

/// [`ResourceSource`] backed by a kube [`Api`]
#[derive(Clone)]
pub struct KubeSource<K> {
    api: Api<K>,
    label: String,
}

impl<K> KubeSource<K>
where
    K: Resource<DynamicType = ()>,
{
    #[must_use]
    pub fn new(api: Api<K>) -> Self {
        let label = format!("{}.{}", K::plural(&()), K::api_version(&()));
        Self { api, label }
    }
}

#[async_trait]
impl<K> ResourceSource<K> for KubeSource<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    async fn list(&self, limit: Option<u32>) -> Result<Vec<K>> {
        let mut lp = ListParams::default();
        if let Some(limit) = limit {
            lp = lp.limit(limit);
        }
        Ok(self.api.list(&lp).await?.items)
    }

    async fn watch(&self) -> Result<WatchStream<K>> {
        // "0" lets the server start from any version; existing members arrive as ADDED
        let stream = self.api.watch(&WatchParams::default(), "0").await?;

        Ok(stream
            .map(|item| item.map(WatchEvent::from).map_err(classify_watch_error))
            .boxed())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
