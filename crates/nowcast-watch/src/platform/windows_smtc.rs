use tracing::debug;
use windows::Foundation::TypedEventHandler;
use windows::Media::Control::{
    GlobalSystemMediaTransportControlsSession, GlobalSystemMediaTransportControlsSessionManager,
    GlobalSystemMediaTransportControlsSessionPlaybackStatus as SmtcStatus,
};
use windows::Storage::Streams::{DataReader, IRandomAccessStreamReference};

use nowcast_core::AppIdentity;

use crate::session::{
    MediaProperties, MediaSession, NativeStatus, Notification, NotificationSender, ReadError,
    SessionRegistry, Timeline,
};

/// 100ns ticks per second in a WinRT `TimeSpan`.
const TICKS_PER_SECOND: f64 = 10_000_000.0;

impl From<windows::core::Error> for ReadError {
    fn from(e: windows::core::Error) -> Self {
        ReadError::Os(e.to_string())
    }
}

/// A live event subscription; unregisters itself when dropped.
pub struct Registration(Option<Box<dyn FnOnce() + Send>>);

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(remove) = self.0.take() {
            remove();
        }
    }
}

/// Media/timeline/playback listeners of one attached session.
pub struct SmtcListeners(#[allow(dead_code)] Vec<Registration>);

/// Handle to the Windows System Media Transport Controls session manager.
pub struct SmtcRegistry {
    manager: GlobalSystemMediaTransportControlsSessionManager,
    registrations: Vec<Registration>,
}

impl SmtcRegistry {
    pub async fn request() -> Result<Self, ReadError> {
        let manager = GlobalSystemMediaTransportControlsSessionManager::RequestAsync()
            .map_err(|e| ReadError::Registry(e.to_string()))?
            .await
            .map_err(|e| ReadError::Registry(e.to_string()))?;
        Ok(Self {
            manager,
            registrations: Vec::new(),
        })
    }
}

fn forward<S, A>(tx: &NotificationSender, notification: Notification) -> TypedEventHandler<S, A>
where
    S: windows::core::RuntimeType + 'static,
    A: windows::core::RuntimeType + 'static,
{
    let tx = tx.clone();
    TypedEventHandler::new(move |_, _| {
        let _ = tx.send(notification);
        Ok(())
    })
}

impl SessionRegistry for SmtcRegistry {
    type Session = SmtcSession;
    type Listeners = SmtcListeners;

    fn sessions(&self) -> Result<Vec<SmtcSession>, ReadError> {
        let sessions = self.manager.GetSessions()?;
        let mut out = Vec::with_capacity(sessions.Size()? as usize);
        for i in 0..sessions.Size()? {
            out.push(SmtcSession(sessions.GetAt(i)?));
        }
        Ok(out)
    }

    fn current_session(&self) -> Result<Option<SmtcSession>, ReadError> {
        // A null current session surfaces as an error from the projection.
        Ok(self.manager.GetCurrentSession().ok().map(SmtcSession))
    }

    fn subscribe(&mut self, tx: NotificationSender) -> Result<(), ReadError> {
        let token = self
            .manager
            .CurrentSessionChanged(&forward(&tx, Notification::CurrentSessionChanged))?;
        let manager = self.manager.clone();
        self.registrations.push(Registration(Some(Box::new(move || {
            let _ = manager.RemoveCurrentSessionChanged(token);
        }))));

        let token = self
            .manager
            .SessionsChanged(&forward(&tx, Notification::SessionsChanged))?;
        let manager = self.manager.clone();
        self.registrations.push(Registration(Some(Box::new(move || {
            let _ = manager.RemoveSessionsChanged(token);
        }))));

        Ok(())
    }

    fn attach(
        &self,
        session: &SmtcSession,
        tx: NotificationSender,
    ) -> Result<SmtcListeners, ReadError> {
        let s = &session.0;
        let mut registrations = Vec::with_capacity(3);

        let token = s.MediaPropertiesChanged(&forward(&tx, Notification::MediaPropertiesChanged))?;
        let owner = s.clone();
        registrations.push(Registration(Some(Box::new(move || {
            let _ = owner.RemoveMediaPropertiesChanged(token);
        }))));

        let token = s.TimelinePropertiesChanged(&forward(&tx, Notification::TimelineChanged))?;
        let owner = s.clone();
        registrations.push(Registration(Some(Box::new(move || {
            let _ = owner.RemoveTimelinePropertiesChanged(token);
        }))));

        let token = s.PlaybackInfoChanged(&forward(&tx, Notification::PlaybackInfoChanged))?;
        let owner = s.clone();
        registrations.push(Registration(Some(Box::new(move || {
            let _ = owner.RemovePlaybackInfoChanged(token);
        }))));

        debug!(app_id = ?session.app_id(), "session listeners registered");
        Ok(SmtcListeners(registrations))
    }
}

/// One SMTC session.
#[derive(Clone)]
pub struct SmtcSession(GlobalSystemMediaTransportControlsSession);

impl AppIdentity for SmtcSession {
    fn app_id(&self) -> Option<String> {
        self.0
            .SourceAppUserModelId()
            .ok()
            .map(|id| id.to_string())
            .filter(|id| !id.is_empty())
    }
}

impl MediaSession for SmtcSession {
    type Thumbnail = IRandomAccessStreamReference;

    fn is_same(&self, other: &Self) -> bool {
        self.0 == other.0
    }

    async fn media_properties(&self) -> Result<MediaProperties<Self::Thumbnail>, ReadError> {
        let props = self.0.TryGetMediaPropertiesAsync()?.await?;
        Ok(MediaProperties {
            title: props.Title().map(|s| s.to_string()).unwrap_or_default(),
            artist: props.Artist().map(|s| s.to_string()).unwrap_or_default(),
            album: props.AlbumTitle().map(|s| s.to_string()).unwrap_or_default(),
            thumbnail: props.Thumbnail().ok(),
        })
    }

    fn timeline(&self) -> Result<Timeline, ReadError> {
        let timeline = self.0.GetTimelineProperties()?;
        Ok(Timeline {
            position: timeline.Position()?.Duration as f64 / TICKS_PER_SECOND,
            start: timeline.StartTime()?.Duration as f64 / TICKS_PER_SECOND,
            end: timeline.EndTime()?.Duration as f64 / TICKS_PER_SECOND,
        })
    }

    fn playback_status(&self) -> Result<NativeStatus, ReadError> {
        let status = self.0.GetPlaybackInfo()?.PlaybackStatus()?;
        Ok(match status {
            SmtcStatus::Playing => NativeStatus::Playing,
            SmtcStatus::Paused => NativeStatus::Paused,
            SmtcStatus::Stopped => NativeStatus::Stopped,
            SmtcStatus::Opened => NativeStatus::Opened,
            SmtcStatus::Changing => NativeStatus::Changing,
            _ => NativeStatus::Closed,
        })
    }

    async fn read_thumbnail(&self, thumbnail: &Self::Thumbnail) -> Result<Vec<u8>, ReadError> {
        let stream = thumbnail.OpenReadAsync()?.await?;
        let size = stream.Size()? as u32;
        if size == 0 {
            return Ok(Vec::new());
        }

        let input = stream.GetInputStreamAt(0)?;
        let reader = DataReader::CreateDataReader(&input)?;
        reader.LoadAsync(size)?.await?;

        let mut buf = vec![0u8; size as usize];
        reader.ReadBytes(&mut buf)?;
        Ok(buf)
    }
}
