//! Live profile updates.
//!
//! After a profile write the admin service publishes one [`ProfileUpdate`] through the
//! [`ProfileNotifier`]. The notifier fans it out over a list of named channels:
//!
//! - `profile:update`: listeners registered in this process, invoked synchronously.
//! - `profile`: a broadcast channel whose subscribers are the server-sent event streams of
//!   every connected client.
//!
//! Each channel send is isolated, and so is each listener inside the listener channel. A failing
//! or panicking channel is logged and counted while the remaining channels still run; `publish`
//! itself never fails.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use metrics::counter;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cache::lock::{rw_read, rw_write};

const SOURCE: &str = "live";
pub const LISTENER_CHANNEL: &str = "profile:update";
pub const BROADCAST_CHANNEL: &str = "profile";
pub(crate) const METRIC_PUBLISH_FAILED: &str = "vitrine_live_publish_failed_total";
const DEFAULT_BROADCAST_CAPACITY: usize = 16;

/// Display-ready profile state pushed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub photo_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel unavailable: {0}")]
    Unavailable(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

pub trait UpdateChannel: Send + Sync {
    fn name(&self) -> &'static str;

    fn send(&self, update: &ProfileUpdate) -> Result<(), ChannelError>;
}

pub type Listener = Box<dyn Fn(&ProfileUpdate) -> Result<(), ChannelError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Same-process listeners, called in registration order.
pub struct ListenerChannel {
    listeners: RwLock<Vec<(ListenerId, Arc<Listener>)>>,
    next_id: AtomicU64,
}

impl ListenerChannel {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add_listener(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        rw_write(&self.listeners, SOURCE, "add_listener").push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = rw_write(&self.listeners, SOURCE, "remove_listener");
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        rw_read(&self.listeners, SOURCE, "listener_count").len()
    }
}

impl Default for ListenerChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateChannel for ListenerChannel {
    fn name(&self) -> &'static str {
        LISTENER_CHANNEL
    }

    fn send(&self, update: &ProfileUpdate) -> Result<(), ChannelError> {
        // Snapshot so listeners may register or unregister while being called.
        let listeners: Vec<Arc<Listener>> = rw_read(&self.listeners, SOURCE, "send")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut failures = Vec::new();
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(update))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => failures.push(err.to_string()),
                Err(_) => failures.push("listener panicked".to_string()),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ChannelError::Delivery(failures.join("; ")))
        }
    }
}

/// Fan-out to every live client stream.
#[derive(Clone)]
pub struct BroadcastChannel {
    sender: broadcast::Sender<ProfileUpdate>,
}

impl BroadcastChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProfileUpdate> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BroadcastChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastChannel")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl UpdateChannel for BroadcastChannel {
    fn name(&self) -> &'static str {
        BROADCAST_CHANNEL
    }

    fn send(&self, update: &ProfileUpdate) -> Result<(), ChannelError> {
        // No subscribers means nobody is watching, not a failure.
        let delivered = self.sender.send(update.clone()).unwrap_or_default();
        debug!(channel = BROADCAST_CHANNEL, delivered, "profile update broadcast");
        Ok(())
    }
}

pub struct ProfileNotifier {
    channels: Vec<Arc<dyn UpdateChannel>>,
}

impl ProfileNotifier {
    pub fn new(channels: Vec<Arc<dyn UpdateChannel>>) -> Self {
        Self { channels }
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|channel| channel.name()).collect()
    }

    /// Deliver `update` on every channel. Channel failures are logged and never returned.
    pub fn publish(&self, update: &ProfileUpdate) {
        for channel in &self.channels {
            let name = channel.name();
            match catch_unwind(AssertUnwindSafe(|| channel.send(update))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    counter!(METRIC_PUBLISH_FAILED, "channel" => name).increment(1);
                    warn!(channel = name, error = %err, "profile update not delivered");
                }
                Err(_) => {
                    counter!(METRIC_PUBLISH_FAILED, "channel" => name).increment(1);
                    warn!(channel = name, "profile update channel panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn update(description: &str) -> ProfileUpdate {
        ProfileUpdate {
            photo_url: Some("/api/profile/photo?key=profile%2F1-me.jpg".to_string()),
            description: Some(description.to_string()),
        }
    }

    struct FailingChannel;

    impl UpdateChannel for FailingChannel {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn send(&self, _update: &ProfileUpdate) -> Result<(), ChannelError> {
            Err(ChannelError::Unavailable("not supported here".to_string()))
        }
    }

    struct PanickingChannel;

    impl UpdateChannel for PanickingChannel {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn send(&self, _update: &ProfileUpdate) -> Result<(), ChannelError> {
            panic!("listener blew up")
        }
    }

    #[tokio::test]
    async fn every_channel_receives_the_update() {
        let listeners = Arc::new(ListenerChannel::new());
        let broadcast = Arc::new(BroadcastChannel::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        listeners.add_listener(Box::new({
            let seen = seen.clone();
            move |update: &ProfileUpdate| {
                seen.lock().expect("lock").push(update.clone());
                Ok(())
            }
        }));
        let mut receiver = broadcast.subscribe();

        let channels: Vec<Arc<dyn UpdateChannel>> = vec![listeners.clone(), broadcast.clone()];
        let notifier = ProfileNotifier::new(channels);
        notifier.publish(&update("Hello"));

        assert_eq!(seen.lock().expect("lock").as_slice(), &[update("Hello")]);
        assert_eq!(receiver.recv().await.expect("broadcast"), update("Hello"));
        assert_eq!(notifier.channel_names(), vec![LISTENER_CHANNEL, BROADCAST_CHANNEL]);
    }

    #[tokio::test]
    async fn failing_channels_do_not_block_others() {
        let broadcast = Arc::new(BroadcastChannel::new());
        let mut receiver = broadcast.subscribe();
        let channels: Vec<Arc<dyn UpdateChannel>> = vec![
            Arc::new(FailingChannel),
            Arc::new(PanickingChannel),
            broadcast.clone(),
        ];
        let notifier = ProfileNotifier::new(channels);

        notifier.publish(&update("Still delivered"));

        assert_eq!(
            receiver.recv().await.expect("broadcast"),
            update("Still delivered")
        );
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let channels: Vec<Arc<dyn UpdateChannel>> = vec![
            Arc::new(ListenerChannel::new()),
            Arc::new(BroadcastChannel::new()),
        ];
        let notifier = ProfileNotifier::new(channels);
        notifier.publish(&update("Nobody listening"));
    }

    #[test]
    fn failing_listener_does_not_skip_later_listeners() {
        let channel = ListenerChannel::new();
        let calls = Arc::new(AtomicU64::new(0));
        channel.add_listener(Box::new(|_: &ProfileUpdate| {
            Err(ChannelError::Delivery("boom".to_string()))
        }));
        channel.add_listener(Box::new({
            let calls = calls.clone();
            move |_: &ProfileUpdate| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        assert!(channel.send(&update("x")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_skip_later_listeners() {
        let channel = ListenerChannel::new();
        let calls = Arc::new(AtomicU64::new(0));
        channel.add_listener(Box::new(|_: &ProfileUpdate| -> Result<(), ChannelError> {
            panic!("listener blew up")
        }));
        channel.add_listener(Box::new({
            let calls = calls.clone();
            move |_: &ProfileUpdate| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        let err = channel.send(&update("x")).expect_err("panic is reported");
        assert!(err.to_string().contains("listener panicked"), "{err}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_listeners_are_not_called() {
        let channel = ListenerChannel::new();
        let calls = Arc::new(AtomicU64::new(0));
        let id = channel.add_listener(Box::new({
            let calls = calls.clone();
            move |_: &ProfileUpdate| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        assert!(channel.remove_listener(id));
        assert_eq!(channel.listener_count(), 0);
        channel.send(&update("x")).expect("send");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
