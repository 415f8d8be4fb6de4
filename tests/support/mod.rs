#![allow(dead_code)]
//! Scripted in-memory collection used by the integration tests.

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use simplewatch::k8s::cache::{ResourceSource, WatchEvent, WatchStream};
use simplewatch::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_stream::wrappers::UnboundedReceiverStream;

pub type EventSender = mpsc::UnboundedSender<Result<WatchEvent<ConfigMap>>>;

/// Upper bound for anything a test waits on (virtual time)
pub const WAIT: Duration = Duration::from_secs(120);

pub fn cm(name: &str, value: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("test".to_string()),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([("value".to_string(), value.to_string())])),
        ..ConfigMap::default()
    }
}

#[derive(Default)]
struct Remote {
    members: Vec<ConfigMap>,
    list_calls: Vec<(Instant, Option<u32>)>,
    watch_calls: Vec<Instant>,
    failing_lists: usize,
    failing_watches: usize,
}

/// The source handed to `WatchedResource`
pub struct ScriptedSource {
    remote: Arc<Mutex<Remote>>,
    sessions: mpsc::UnboundedSender<EventSender>,
}

/// Test-side handle onto the scripted collection
pub struct Control {
    remote: Arc<Mutex<Remote>>,
    sessions: mpsc::UnboundedReceiver<EventSender>,
}

pub fn scripted(members: Vec<ConfigMap>) -> (ScriptedSource, Control) {
    let remote = Arc::new(Mutex::new(Remote {
        members,
        ..Remote::default()
    }));
    let (tx, rx) = mpsc::unbounded_channel();

    (
        ScriptedSource {
            remote: remote.clone(),
            sessions: tx,
        },
        Control {
            remote,
            sessions: rx,
        },
    )
}

impl Control {
    pub fn set_members(&self, members: Vec<ConfigMap>) {
        self.remote.lock().unwrap().members = members;
    }

    pub fn fail_next_lists(&self, count: usize) {
        self.remote.lock().unwrap().failing_lists = count;
    }

    pub fn fail_next_watches(&self, count: usize) {
        self.remote.lock().unwrap().failing_watches = count;
    }

    /// Wait until the supervisor opens a watch and return the feed of that stream
    pub async fn next_session(&mut self) -> EventSender {
        timeout(WAIT, self.sessions.recv())
            .await
            .expect("no watch session was established in time")
            .expect("source dropped")
    }

    pub fn list_calls(&self) -> Vec<(Instant, Option<u32>)> {
        self.remote.lock().unwrap().list_calls.clone()
    }

    pub fn watch_calls(&self) -> Vec<Instant> {
        self.remote.lock().unwrap().watch_calls.clone()
    }
}

#[async_trait]
impl ResourceSource<ConfigMap> for ScriptedSource {
    async fn list(&self, limit: Option<u32>) -> Result<Vec<ConfigMap>> {
        let mut remote = self.remote.lock().unwrap();
        remote.list_calls.push((Instant::now(), limit));

        if remote.failing_lists > 0 {
            remote.failing_lists -= 1;
            return Err(Error::Custom("connection refused".to_string()));
        }

        let take = limit.map_or(usize::MAX, |l| l as usize);
        Ok(remote.members.iter().take(take).cloned().collect())
    }

    async fn watch(&self) -> Result<WatchStream<ConfigMap>> {
        {
            let mut remote = self.remote.lock().unwrap();
            remote.watch_calls.push(Instant::now());
            if remote.failing_watches > 0 {
                remote.failing_watches -= 1;
                return Err(Error::Custom("watch rejected".to_string()));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions
            .send(tx)
            .map_err(|_| Error::Custom("test finished".to_string()))?;
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    fn describe(&self) -> String {
        "configmaps.v1 (scripted)".to_string()
    }
}
