//! Hosted pub/sub relay: strategy (a).
//!
//! Events are handed to an external relay service over its REST API and
//! the relay fans them out to browser subscribers on its own. This
//! process never sees a subscriber, so `subscribe` yields nothing and
//! there is no presence count.
//!
//! All publishes for all scopes flow through one worker task, so the
//! relay sees events in commit order. A failed POST is retried once and
//! then dropped with an error log; the relay side may redeliver on its
//! own, so clients de-duplicate by message id anyway.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use guestbook_types::events::ChatEvent;

use crate::transport::Transport;

const PUBLISH_ATTEMPTS: u32 = 2;

/// Publishes chat events to a relay channel endpoint
/// (`POST {base}/channels/{scope}/messages`, basic auth).
pub struct RelayPublisher {
    queue: Option<mpsc::UnboundedSender<(String, ChatEvent)>>,
}

struct RelayCredentials {
    app: String,
    secret: String,
}

impl RelayPublisher {
    /// `key` is the relay API key in `app:secret` form. Without a URL and
    /// a key the publisher starts disabled: REST keeps working, nothing
    /// goes live.
    pub fn new(base_url: Option<&str>, key: Option<&str>) -> Self {
        let Some(base_url) = base_url.map(str::trim).filter(|s| !s.is_empty()) else {
            warn!("Relay URL not configured; live updates are disabled");
            return Self { queue: None };
        };
        let Some(credentials) = Self::parse_key(key) else {
            warn!("Relay API key not configured; live updates are disabled");
            return Self { queue: None };
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let base_url = base_url.trim_end_matches('/').to_string();
        tokio::spawn(publish_worker(base_url, credentials, rx));
        info!("Relay publisher started");
        Self { queue: Some(tx) }
    }

    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    fn parse_key(key: Option<&str>) -> Option<RelayCredentials> {
        let key = key?.trim();
        let (app, secret) = key.split_once(':')?;
        if app.is_empty() || secret.is_empty() {
            warn!("Relay API key is malformed, expected app:secret");
            return None;
        }
        Some(RelayCredentials {
            app: app.to_string(),
            secret: secret.to_string(),
        })
    }
}

impl Transport for RelayPublisher {
    fn name(&self) -> &'static str {
        "relay"
    }

    fn publish(&self, scope: &str, event: ChatEvent) {
        let Some(queue) = &self.queue else {
            debug!("relay disabled, dropping {} event", event.kind());
            return;
        };
        // Fails only when the worker is gone, i.e. at shutdown.
        let _ = queue.send((scope.to_string(), event));
    }

    fn subscribe(&self, _scope: &str) -> Option<broadcast::Receiver<ChatEvent>> {
        None
    }
}

/// Drains the queue one event at a time. Sequential sends are what keep
/// relay delivery in commit order.
async fn publish_worker(
    base_url: String,
    credentials: RelayCredentials,
    mut rx: mpsc::UnboundedReceiver<(String, ChatEvent)>,
) {
    let client = reqwest::Client::new();

    while let Some((scope, event)) = rx.recv().await {
        let url = format!("{}/channels/{}/messages", base_url, scope);
        let kind = event.kind();

        let mut delivered = false;
        for attempt in 1..=PUBLISH_ATTEMPTS {
            let result = client
                .post(&url)
                .basic_auth(&credentials.app, Some(&credentials.secret))
                .json(&event)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    delivered = true;
                    break;
                }
                Ok(response) => {
                    warn!(
                        "Relay rejected {} for '{}' with {} (attempt {})",
                        kind,
                        scope,
                        response.status(),
                        attempt
                    );
                }
                Err(e) => {
                    warn!(
                        "Relay publish of {} for '{}' failed (attempt {}): {}",
                        kind, scope, attempt, e
                    );
                }
            }
        }

        if !delivered {
            error!("Giving up on {} for '{}'", kind, scope);
        }
    }

    debug!("relay publish worker stopped");
}
