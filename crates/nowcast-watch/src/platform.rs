#[cfg(target_os = "windows")]
pub mod windows_smtc;

use crate::session::ReadError;

/// The native registry type for this platform.
#[cfg(target_os = "windows")]
pub type NativeRegistry = windows_smtc::SmtcRegistry;

#[cfg(not(target_os = "windows"))]
pub type NativeRegistry = unsupported::Unsupported;

/// Request the OS media-session registry.
///
/// Failure here is fatal for the watcher; process-level retry belongs to
/// the supervising bridge.
pub async fn open_registry() -> Result<NativeRegistry, ReadError> {
    #[cfg(target_os = "windows")]
    {
        windows_smtc::SmtcRegistry::request().await
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(ReadError::Registry(format!(
            "no media session registry on {}",
            std::env::consts::OS
        )))
    }
}

#[cfg(not(target_os = "windows"))]
mod unsupported {
    use nowcast_core::AppIdentity;

    use crate::session::{
        MediaProperties, MediaSession, NativeStatus, NotificationSender, ReadError,
        SessionRegistry, Timeline,
    };

    /// Uninhabited registry for platforms without a session API.
    #[derive(Debug, Clone)]
    pub enum Unsupported {}

    impl AppIdentity for Unsupported {
        fn app_id(&self) -> Option<String> {
            match *self {}
        }
    }

    impl MediaSession for Unsupported {
        type Thumbnail = ();

        fn is_same(&self, _other: &Self) -> bool {
            match *self {}
        }

        async fn media_properties(&self) -> Result<MediaProperties<()>, ReadError> {
            match *self {}
        }

        fn timeline(&self) -> Result<Timeline, ReadError> {
            match *self {}
        }

        fn playback_status(&self) -> Result<NativeStatus, ReadError> {
            match *self {}
        }

        async fn read_thumbnail(&self, _thumbnail: &()) -> Result<Vec<u8>, ReadError> {
            match *self {}
        }
    }

    impl SessionRegistry for Unsupported {
        type Session = Unsupported;
        type Listeners = ();

        fn sessions(&self) -> Result<Vec<Unsupported>, ReadError> {
            match *self {}
        }

        fn current_session(&self) -> Result<Option<Unsupported>, ReadError> {
            match *self {}
        }

        fn subscribe(&mut self, _tx: NotificationSender) -> Result<(), ReadError> {
            match *self {}
        }

        fn attach(&self, _session: &Unsupported, _tx: NotificationSender) -> Result<(), ReadError> {
            match *self {}
        }
    }
}

#[cfg(all(test, not(target_os = "windows")))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_unavailable_off_windows() {
        assert!(matches!(open_registry().await, Err(ReadError::Registry(_))));
    }
}
