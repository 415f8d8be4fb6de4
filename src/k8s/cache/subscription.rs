use super::config::DEFAULT_SUBSCRIBER_CAPACITY;
use super::event::ChangeEvent;
use kube::{Resource, ResourceExt};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

pub struct Subscription<K> {
    pub id: String,
    pub pattern: String,
    pub sender: mpsc::Sender<ChangeEvent<K>>,
    /// Fired on unsubscribe so an in-flight send gives up
    removed: CancellationToken,
}

impl<K> Subscription<K> {
    #[must_use]
    pub fn new(pattern: String, capacity: usize) -> (Self, mpsc::Receiver<ChangeEvent<K>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = Uuid::new_v4().to_string();

        (
            Self {
                id,
                pattern,
                sender: tx,
                removed: CancellationToken::new(),
            },
            rx,
        )
    }
}

/// Fan-out of change events to every registered subscriber.
///
/// Subscribers are kept in registration order; each notification is awaited on every
/// matching channel before the next one is sent.
pub struct SubscriptionManager<K> {
    subscriptions: RwLock<Vec<Subscription<K>>>,
    capacity: usize,
}

impl<K> Default for SubscriptionManager<K>
where
    K: Resource + Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl<K> SubscriptionManager<K>
where
    K: Resource + Clone,
{
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            subscriptions: RwLock::const_new(Vec::new()),
            capacity,
        }
    }

    /// Subscribe to every change
    pub async fn subscribe(&self) -> (String, mpsc::Receiver<ChangeEvent<K>>) {
        self.subscribe_matching("*".to_string()).await
    }

    /// Subscribe to changes of resources whose name matches `pattern`
    pub async fn subscribe_matching(&self, pattern: String) -> (String, mpsc::Receiver<ChangeEvent<K>>) {
        let (subscription, receiver) = Subscription::new(pattern, self.capacity);
        let id = subscription.id.clone();

        self.subscriptions.write().await.push(subscription);

        (id, receiver)
    }

    pub async fn unsubscribe(&self, subscription_id: &str) {
        let mut subs = self.subscriptions.write().await;
        if let Some(pos) = subs.iter().position(|s| s.id == subscription_id) {
            subs.remove(pos).removed.cancel();
        }
    }

    /// Deliver `event` to every matching subscriber, pruning the ones that went away.
    ///
    /// The subscriber list is only locked while the targets are collected, so a full channel
    /// never blocks `subscribe`/`unsubscribe`.
    pub async fn notify(&self, event: &ChangeEvent<K>) {
        let name = event.resource.name_any();
        let targets: Vec<(String, mpsc::Sender<ChangeEvent<K>>, CancellationToken)> = self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|s| Self::pattern_matches(&s.pattern, &name))
            .map(|s| (s.id.clone(), s.sender.clone(), s.removed.clone()))
            .collect();

        let mut closed = Vec::new();
        for (id, sender, removed) in targets {
            tokio::select! {
                () = removed.cancelled() => {
                    debug!("Subscriber {} left with an event pending", id);
                }
                sent = sender.send(event.clone()) => {
                    if sent.is_err() {
                        closed.push(id);
                    }
                }
            }
        }

        if !closed.is_empty() {
            debug!("Dropping {} closed subscriber(s)", closed.len());
            self.subscriptions
                .write()
                .await
                .retain(|s| !closed.contains(&s.id));
        }
    }

    fn pattern_matches(pattern: &str, name: &str) -> bool {
        if pattern == "*" || pattern == name {
            return true;
        }

        // "web-*" matches "web-frontend"
        pattern
            .strip_suffix('*')
            .is_some_and(|prefix| name.starts_with(prefix))
    }

    pub async fn active_subscriptions(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}
