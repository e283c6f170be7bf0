use ahash::AHashMap;
use futures::Stream;
use imagegen_schema::ProfileChange;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 16;

type Channels = AHashMap<String, broadcast::Sender<ProfileChange>>;

struct FeedInner {
    channels: Mutex<Channels>,
    capacity: usize,
}

impl FeedInner {
    fn lock(&self) -> MutexGuard<'_, Channels> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle to the change feed. All clones share the same registry.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChangeFeed {
    /// `capacity` bounds how many undelivered changes a slow subscriber may lag behind.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                channels: Mutex::new(AHashMap::new()),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register interest in `user_id`.
    pub fn subscribe(&self, user_id: &str) -> ProfileSubscription {
        let receiver = {
            let mut channels = self.inner.lock();
            channels
                .entry(user_id.to_string())
                .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
                .subscribe()
        };
        debug!(user_id, "Profile subscription registered");

        ProfileSubscription {
            user_id: user_id.to_string(),
            receiver: Some(receiver),
            feed: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `change` to the subscribers of its profile. Returns how many received it.
    pub fn publish(&self, change: ProfileChange) -> usize {
        let channels = self.inner.lock();
        let Some(sender) = channels.get(&change.user_id) else {
            return 0;
        };
        sender.send(change).unwrap_or(0)
    }

    /// Number of profile keys with at least one live subscription.
    pub fn watched_keys(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Live interest in one profile. Unregisters on drop.
pub struct ProfileSubscription {
    user_id: String,
    /// Only `None` while dropping.
    receiver: Option<broadcast::Receiver<ProfileChange>>,
    feed: Weak<FeedInner>,
}

impl ProfileSubscription {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Next change for this profile. `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<ProfileChange> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %self.user_id, skipped, "Profile subscriber lagged; changes dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Turn the subscription into a stream. Dropping the stream unregisters.
    pub fn into_stream(self) -> impl Stream<Item = ProfileChange> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            let change = sub.recv().await?;
            Some((change, sub))
        })
    }
}

impl Drop for ProfileSubscription {
    fn drop(&mut self) {
        let Some(inner) = self.feed.upgrade() else {
            return;
        };
        let mut channels = inner.lock();
        drop(self.receiver.take());
        let last = channels
            .get(&self.user_id)
            .is_some_and(|sender| sender.receiver_count() == 0);
        if last {
            channels.remove(&self.user_id);
            debug!(user_id = %self.user_id, "Profile subscription key released");
        }
    }
}
