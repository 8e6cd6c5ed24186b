//! Abstraction over the OS media-session registry.
//!
//! The watcher only talks to these traits; the Windows SMTC backend and the
//! in-memory fakes used by tests both implement them.

use std::future::Future;

use nowcast_core::AppIdentity;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Error)]
pub enum ReadError {
    #[error("session registry unavailable: {0}")]
    Registry(String),

    #[error("session is gone")]
    SessionGone,

    #[error("OS read failed: {0}")]
    Os(String),
}

/// Playback status as the OS reports it, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeStatus {
    Closed,
    Opened,
    Changing,
    Stopped,
    Playing,
    Paused,
}

/// Title/artist/album plus an optional handle to the thumbnail stream.
#[derive(Debug, Clone)]
pub struct MediaProperties<T> {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub thumbnail: Option<T>,
}

impl<T> Default for MediaProperties<T> {
    fn default() -> Self {
        Self {
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            thumbnail: None,
        }
    }
}

/// Timeline values in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timeline {
    pub position: f64,
    pub start: f64,
    pub end: f64,
}

/// A change notification from the registry or from the attached session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    CurrentSessionChanged,
    SessionsChanged,
    MediaPropertiesChanged,
    TimelineChanged,
    PlaybackInfoChanged,
}

impl Notification {
    /// Reason tag used in logs.
    pub fn reason(self) -> &'static str {
        match self {
            Self::CurrentSessionChanged => "session_changed",
            Self::SessionsChanged => "sessions_changed",
            Self::MediaPropertiesChanged => "media_changed",
            Self::TimelineChanged => "timeline_changed",
            Self::PlaybackInfoChanged => "playback_changed",
        }
    }
}

pub type NotificationSender = mpsc::UnboundedSender<Notification>;

/// One OS media session. Borrowed from the registry; may vanish at any time.
pub trait MediaSession: AppIdentity + Clone + Send + Sync {
    type Thumbnail: Send + Sync;

    /// Whether both handles refer to the same OS session.
    fn is_same(&self, other: &Self) -> bool;

    fn media_properties(
        &self,
    ) -> impl Future<Output = Result<MediaProperties<Self::Thumbnail>, ReadError>> + Send;

    fn timeline(&self) -> Result<Timeline, ReadError>;

    fn playback_status(&self) -> Result<NativeStatus, ReadError>;

    fn read_thumbnail(
        &self,
        thumbnail: &Self::Thumbnail,
    ) -> impl Future<Output = Result<Vec<u8>, ReadError>> + Send;
}

/// The OS registry of media sessions.
pub trait SessionRegistry {
    type Session: MediaSession;
    /// Per-session listener registration; dropping it detaches the listeners.
    type Listeners;

    /// Live sessions in registry order.
    fn sessions(&self) -> Result<Vec<Self::Session>, ReadError>;

    /// What the OS considers the current session.
    fn current_session(&self) -> Result<Option<Self::Session>, ReadError>;

    /// Route registry-level notifications into `tx` for the process lifetime.
    fn subscribe(&mut self, tx: NotificationSender) -> Result<(), ReadError>;

    /// Route media/timeline/playback notifications of `session` into `tx`.
    fn attach(
        &self,
        session: &Self::Session,
        tx: NotificationSender,
    ) -> Result<Self::Listeners, ReadError>;
}
