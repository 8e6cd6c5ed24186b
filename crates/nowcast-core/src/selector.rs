use crate::allow::AllowList;

/// Anything that exposes the application identifier of a media session.
pub trait AppIdentity {
    fn app_id(&self) -> Option<String>;
}

/// Pick the session to observe.
///
/// The first session (in registry order) whose app id passes `policy` wins.
/// Without a match, falls back to `current`, even when `current` itself is
/// not allowed; the snapshot reader redacts it in that case.
pub fn select<S, I>(sessions: I, current: Option<S>, policy: &AllowList) -> Option<S>
where
    S: AppIdentity,
    I: IntoIterator<Item = S>,
{
    sessions
        .into_iter()
        .find(|s| policy.is_allowed(s.app_id().as_deref()))
        .or(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Fake(Option<&'static str>);

    impl AppIdentity for Fake {
        fn app_id(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[test]
    fn test_first_allowed_session_wins() {
        let sessions = vec![
            Fake(Some("chrome.exe")),
            Fake(Some("Yandex.Music!App")),
            Fake(Some("com.yandex.music")),
        ];
        let picked = select(sessions, Some(Fake(Some("chrome.exe"))), &AllowList::default());
        assert_eq!(picked, Some(Fake(Some("Yandex.Music!App"))));
    }

    #[test]
    fn test_falls_back_to_current() {
        let sessions = vec![Fake(Some("spotify.exe")), Fake(None)];
        let picked = select(sessions, Some(Fake(Some("spotify.exe"))), &AllowList::default());
        assert_eq!(picked, Some(Fake(Some("spotify.exe"))));
    }

    #[test]
    fn test_nothing_to_pick() {
        assert_eq!(select(Vec::<Fake>::new(), None, &AllowList::default()), None);
        assert_eq!(
            select(vec![Fake(Some("vlc.exe"))], None, &AllowList::default()),
            None
        );
    }

    #[test]
    fn test_selection_is_deterministic() {
        let sessions = vec![
            Fake(Some("com.yandex.music.a")),
            Fake(Some("com.yandex.music.b")),
        ];
        let policy = AllowList::default();
        let first = select(sessions.clone(), None, &policy);
        for _ in 0..10 {
            assert_eq!(select(sessions.clone(), None, &policy), first);
        }
        assert_eq!(first, Some(Fake(Some("com.yandex.music.a"))));
    }
}
