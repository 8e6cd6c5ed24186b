//! Snapshot reader: turns one selected session into a [`MediaState`].

use nowcast_core::{thumbnail, AllowList, MediaState, PlaybackState};
use tracing::warn;

use crate::session::{MediaProperties, MediaSession, NativeStatus, ReadError, Timeline};

/// Outcome of a single OS read: the fresh value, or a fallback plus the
/// failure that forced it.
#[derive(Debug)]
pub enum FieldRead<T> {
    Fresh(T),
    Degraded { fallback: T, cause: ReadError },
}

impl<T> FieldRead<T> {
    pub fn new(result: Result<T, ReadError>, fallback: impl FnOnce() -> T) -> Self {
        match result {
            Ok(value) => Self::Fresh(value),
            Err(cause) => Self::Degraded {
                fallback: fallback(),
                cause,
            },
        }
    }

    /// Unwrap the value, recording the field in `degraded` if it fell back.
    fn settle(self, field: Field, degraded: &mut Vec<Field>) -> T {
        match self {
            Self::Fresh(value) => value,
            Self::Degraded { fallback, cause } => {
                warn!(?field, error = %cause, "snapshot field degraded");
                degraded.push(field);
                fallback
            }
        }
    }
}

/// Parts of a snapshot that can fail independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Metadata,
    Timeline,
    Playback,
    Thumbnail,
}

/// A built record plus the fields that had to fall back to defaults.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: MediaState,
    pub degraded: Vec<Field>,
}

impl Snapshot {
    fn complete(state: MediaState) -> Self {
        Self {
            state,
            degraded: Vec::new(),
        }
    }
}

pub fn normalize_status(status: NativeStatus) -> PlaybackState {
    match status {
        NativeStatus::Playing => PlaybackState::Playing,
        NativeStatus::Paused => PlaybackState::Paused,
        NativeStatus::Stopped => PlaybackState::Stopped,
        NativeStatus::Closed | NativeStatus::Opened | NativeStatus::Changing => {
            PlaybackState::Unknown
        }
    }
}

/// Read the current state of `session`.
///
/// Never fails: per-field read errors degrade that field only. Sessions
/// outside the allow-list short-circuit into a redacted record before any
/// metadata, timeline or art is read.
pub async fn read_snapshot<S: MediaSession>(session: Option<&S>, policy: &AllowList) -> Snapshot {
    let Some(session) = session else {
        return Snapshot::complete(MediaState::no_session());
    };

    let app_id = session.app_id();
    if !policy.is_allowed(app_id.as_deref()) {
        return Snapshot::complete(MediaState::redacted(app_id));
    }

    let mut degraded = Vec::new();

    let props = FieldRead::new(session.media_properties().await, MediaProperties::default)
        .settle(Field::Metadata, &mut degraded);
    let timeline =
        FieldRead::new(session.timeline(), Timeline::default).settle(Field::Timeline, &mut degraded);
    let state = FieldRead::new(session.playback_status().map(normalize_status), || {
        PlaybackState::Unknown
    })
    .settle(Field::Playback, &mut degraded);

    // A present but empty stream still encodes (as octet-stream); only a
    // missing or unreadable thumbnail yields no art.
    let art = match &props.thumbnail {
        Some(thumb) => FieldRead::new(session.read_thumbnail(thumb).await.map(Some), || None)
            .settle(Field::Thumbnail, &mut degraded),
        None => None,
    };
    let album_art_data_url = art.map(|bytes| thumbnail::encode(&bytes));

    Snapshot {
        state: MediaState {
            title: props.title,
            artist: props.artist,
            album: props.album,
            album_art_data_url,
            state,
            position_seconds: timeline.position.max(0.0),
            duration_seconds: (timeline.end - timeline.start).max(0.0),
            app_id,
            ..Default::default()
        },
        degraded,
    }
}
