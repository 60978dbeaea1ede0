//! Server-sent profile updates.
//!
//! Each connected client gets the current profile as its first event, then one event per
//! update published on the broadcast channel. Events are datastar signal patches of the form
//! `{"profile": {"photoUrl": .., "description": ..}}`.

use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use datastar::prelude::PatchSignals;
use futures::Stream;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use vitrine_api_types::ProfileUpdateEvent;

use crate::live::ProfileUpdate;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub(super) fn signal_event(update: &ProfileUpdate) -> Event {
    let payload = json!({
        "profile": ProfileUpdateEvent {
            photo_url: update.photo_url.clone(),
            description: update.description.clone(),
        }
    });
    PatchSignals::new(payload.to_string()).write_as_axum_sse_event()
}

pub(super) fn profile_stream(
    initial: Option<ProfileUpdate>,
    mut updates: broadcast::Receiver<ProfileUpdate>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream! {
        if let Some(current) = initial {
            yield Ok(signal_event(&current));
        }

        loop {
            match updates.recv().await {
                Ok(update) => yield Ok(signal_event(&update)),
                Err(RecvError::Lagged(skipped)) => {
                    // Later updates supersede the missed ones.
                    debug!(skipped, "live profile stream lagged");
                }
                Err(RecvError::Closed) => {
                    warn!("profile broadcast channel closed");
                    break;
                }
            }
        }
    }
}

pub(super) fn into_sse<S>(stream: S) -> Sse<KeepAliveStream<S>>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn update(description: &str) -> ProfileUpdate {
        ProfileUpdate {
            photo_url: None,
            description: Some(description.to_string()),
        }
    }

    #[tokio::test]
    async fn stream_starts_with_current_profile_then_follows_updates() {
        let (sender, receiver) = broadcast::channel(4);
        let stream = profile_stream(Some(update("now")), receiver);
        tokio::pin!(stream);

        assert!(stream.next().await.is_some());
        sender.send(update("later")).expect("send update");
        assert!(stream.next().await.is_some());

        drop(sender);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn stream_without_initial_state_waits_for_updates() {
        let (sender, receiver) = broadcast::channel(4);
        let stream = profile_stream(None, receiver);
        tokio::pin!(stream);

        drop(sender);
        assert!(stream.next().await.is_none());
    }
}
