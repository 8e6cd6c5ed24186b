//! LastState cache and subscriber fan-out.

use nowcast_core::{AllowList, MediaState};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::error::BridgeError;

/// Updates buffered per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Payload of `GET /api/debug/app`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDebug {
    pub app_id: Option<String>,
    pub allow_env: Vec<String>,
}

/// Single owner of the last accepted record.
///
/// Writers go through [`NowPlayingHub::publish`], which overwrites the cache
/// and broadcasts while holding the write lock; subscribers register under
/// the read lock, so a new subscriber sees each update exactly once, either
/// as its greeting or as a broadcast.
pub struct NowPlayingHub {
    policy: AllowList,
    last: RwLock<Option<MediaState>>,
    tx: broadcast::Sender<MediaState>,
}

impl NowPlayingHub {
    pub fn new(policy: AllowList) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            policy,
            last: RwLock::new(None),
            tx,
        }
    }

    pub fn policy(&self) -> &AllowList {
        &self.policy
    }

    /// Decode one watcher line and accept it. Malformed lines change nothing.
    pub async fn accept_line(&self, line: &str) -> Result<MediaState, BridgeError> {
        let record = MediaState::from_line(line)?;
        Ok(self.accept(record).await)
    }

    /// Re-check `record` against the allow-list, then publish it (or its
    /// redacted form).
    ///
    /// The redacted record keeps `appId` so `/api/debug/app` can name the
    /// rejected app; everything else is cleared. This is wider than the bare
    /// `{type, state}` the overlay needs, which ignores `appId` anyway.
    pub async fn accept(&self, record: MediaState) -> MediaState {
        let record = if self.policy.is_allowed(record.app_id.as_deref()) {
            record
        } else {
            MediaState::redacted(record.app_id)
        };
        self.publish(record.clone()).await;
        record
    }

    /// Overwrite the cache and broadcast to all subscribers.
    pub async fn publish(&self, record: MediaState) {
        let mut last = self.last.write().await;
        debug!(state = ?record.state, app_id = ?record.app_id, "publishing");
        *last = Some(record.clone());
        // No receivers is fine; the cache still answers later subscribers.
        let _ = self.tx.send(record);
    }

    pub async fn current(&self) -> Option<MediaState> {
        self.last.read().await.clone()
    }

    /// Register a subscriber, returning the greeting record (if any) and the
    /// update stream that follows it.
    pub async fn subscribe(&self) -> (Option<MediaState>, broadcast::Receiver<MediaState>) {
        let last = self.last.read().await;
        (last.clone(), self.tx.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub async fn debug_app(&self) -> AppDebug {
        AppDebug {
            app_id: self.last.read().await.as_ref().and_then(|s| s.app_id.clone()),
            allow_env: self.policy.patterns().to_vec(),
        }
    }
}
