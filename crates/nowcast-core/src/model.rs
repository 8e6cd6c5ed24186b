use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Discriminator carried by every record on the wire (`"type": "now_playing"`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    #[default]
    #[serde(rename = "now_playing")]
    NowPlaying,
}

/// Normalized playback state of the observed session.
///
/// The last three variants are synthetic: they are produced by the watcher
/// or the bridge rather than reported by the OS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
    #[default]
    Unknown,
    NoSession,
    NotYandex,
    HelperExited,
}

impl PlaybackState {
    /// Whether an overlay should render media info for this state.
    pub fn is_renderable(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// A single "now playing" snapshot, exactly as it travels between processes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaState {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_art_data_url: Option<String>,
    pub state: PlaybackState,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub app_id: Option<String>,
}

impl MediaState {
    /// Record emitted when the registry has no session to observe.
    pub fn no_session() -> Self {
        Self {
            state: PlaybackState::NoSession,
            ..Default::default()
        }
    }

    /// Record for a session whose app is not on the allow-list.
    ///
    /// Metadata and art are always cleared; only the app id survives.
    pub fn redacted(app_id: Option<String>) -> Self {
        Self {
            state: PlaybackState::NotYandex,
            app_id,
            ..Default::default()
        }
    }

    /// Record published by the bridge when the watcher process goes away.
    pub fn helper_exited() -> Self {
        Self {
            state: PlaybackState::HelperExited,
            ..Default::default()
        }
    }

    /// Serialize into a single protocol line (no trailing newline).
    pub fn to_line(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode one protocol line.
    pub fn from_line(line: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

/// Real-time push envelope: `{"type":"now_playing","data":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub data: MediaState,
}

impl Envelope {
    pub fn now_playing(data: MediaState) -> Self {
        Self {
            kind: RecordKind::NowPlaying,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MediaState {
        MediaState {
            title: "Song".into(),
            artist: "Band".into(),
            album: "Record".into(),
            album_art_data_url: Some("data:image/png;base64,AAAA".into()),
            state: PlaybackState::Playing,
            position_seconds: 12.5,
            duration_seconds: 201.0,
            app_id: Some("com.yandex.music".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_wire_field_names() {
        let value: serde_json::Value = serde_json::from_str(&sample().to_line().unwrap()).unwrap();
        assert_eq!(value["type"], "now_playing");
        assert_eq!(value["state"], "Playing");
        assert_eq!(value["albumArtDataUrl"], "data:image/png;base64,AAAA");
        assert_eq!(value["positionSeconds"], 12.5);
        assert_eq!(value["durationSeconds"], 201.0);
        assert_eq!(value["appId"], "com.yandex.music");
    }

    #[test]
    fn test_line_roundtrip() {
        let state = sample();
        let line = state.to_line().unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(MediaState::from_line(&line).unwrap(), state);
    }

    #[test]
    fn test_partial_record_fills_defaults() {
        let state =
            MediaState::from_line(r#"{"appId":"com.yandex.music","state":"Playing","title":"Song"}"#)
                .unwrap();
        assert_eq!(state.kind, RecordKind::NowPlaying);
        assert_eq!(state.title, "Song");
        assert_eq!(state.artist, "");
        assert_eq!(state.album_art_data_url, None);
        assert_eq!(state.state, PlaybackState::Playing);
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert!(MediaState::from_line("not-json").is_err());
        assert!(MediaState::from_line(r#"{"state":"Dancing"}"#).is_err());
        assert!(MediaState::from_line(r#"{"type":"something_else"}"#).is_err());
        assert!(MediaState::from_line("[1,2,3]").is_err());
    }

    #[test]
    fn test_synthetic_records_carry_no_metadata() {
        for state in [
            MediaState::no_session(),
            MediaState::redacted(Some("com.spotify.client".into())),
            MediaState::helper_exited(),
        ] {
            assert!(state.title.is_empty());
            assert!(state.artist.is_empty());
            assert!(state.album.is_empty());
            assert!(state.album_art_data_url.is_none());
            assert!(!state.state.is_renderable());
        }
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(Envelope::now_playing(MediaState::helper_exited())).unwrap();
        assert_eq!(json["type"], "now_playing");
        assert_eq!(json["data"]["state"], "HelperExited");
    }
}
