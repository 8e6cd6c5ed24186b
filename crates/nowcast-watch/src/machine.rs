//! Watcher state machine.
//!
//! Every OS callback is turned into a [`Notification`] on one channel, and a
//! single loop consumes it: select a session, re-attach listeners if the
//! selection changed, read a snapshot, emit one JSON line. The loop is the
//! only owner of the attached session and its listeners, so attach and
//! detach can never interleave.

use std::io::Write;

use nowcast_core::{select, AllowList, AppIdentity, MediaState};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::WatchError;
use crate::reader::read_snapshot;
use crate::session::{MediaSession, Notification, NotificationSender, SessionRegistry};

/// Which session, if any, the watcher is listening to.
#[derive(Debug)]
pub enum WatcherState<S> {
    Uninitialized,
    Attached(S),
    Detached,
}

pub struct Watcher<R: SessionRegistry, W: Write> {
    registry: R,
    policy: AllowList,
    state: WatcherState<R::Session>,
    listeners: Option<R::Listeners>,
    tx: NotificationSender,
    rx: mpsc::UnboundedReceiver<Notification>,
    out: W,
}

impl<R: SessionRegistry, W: Write> Watcher<R, W> {
    pub fn new(registry: R, policy: AllowList, out: W) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            registry,
            policy,
            state: WatcherState::Uninitialized,
            listeners: None,
            tx,
            rx,
            out,
        }
    }

    pub fn state(&self) -> &WatcherState<R::Session> {
        &self.state
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Sender feeding the watcher's notification queue.
    pub fn sender(&self) -> NotificationSender {
        self.tx.clone()
    }

    /// Subscribe to registry notifications and emit the initial snapshot.
    pub async fn start(&mut self) -> Result<MediaState, WatchError> {
        self.registry
            .subscribe(self.tx.clone())
            .map_err(WatchError::Subscribe)?;
        info!(allow = ?self.policy.patterns(), "watching media sessions");
        self.step("init").await
    }

    /// Start, then process notifications until the process is killed.
    pub async fn run(mut self) -> Result<(), WatchError> {
        self.start().await?;
        loop {
            self.turn().await?;
        }
    }

    /// Wait for the next notification and run the pipeline once for it.
    pub async fn turn(&mut self) -> Result<MediaState, WatchError> {
        let notification = self.rx.recv().await.ok_or(WatchError::ChannelClosed)?;
        self.step(notification.reason()).await
    }

    /// One pipeline run: select, re-attach, read, emit.
    pub async fn step(&mut self, reason: &str) -> Result<MediaState, WatchError> {
        let selected = self.select_session();
        self.reattach(selected);

        let session = match &self.state {
            WatcherState::Attached(session) => Some(session),
            _ => None,
        };
        let snapshot = read_snapshot(session, &self.policy).await;
        debug!(
            reason,
            state = ?snapshot.state.state,
            app_id = ?snapshot.state.app_id,
            degraded = ?snapshot.degraded,
            "emitting snapshot"
        );

        self.emit(&snapshot.state)?;
        Ok(snapshot.state)
    }

    fn select_session(&self) -> Option<R::Session> {
        let sessions = self.registry.sessions().unwrap_or_else(|e| {
            warn!(error = %e, "failed to list sessions");
            Vec::new()
        });
        let current = self.registry.current_session().unwrap_or_else(|e| {
            warn!(error = %e, "failed to get current session");
            None
        });
        select(sessions, current, &self.policy)
    }

    /// Swap listeners over to `selected` if it differs from the attached one.
    ///
    /// The fresh handle always replaces the stored one; listeners are only
    /// torn down and re-registered when the underlying session changed, or
    /// retried when the previous attach failed.
    fn reattach(&mut self, selected: Option<R::Session>) {
        let unchanged = match (&self.state, &selected) {
            (WatcherState::Attached(current), Some(next)) => current.is_same(next),
            (WatcherState::Detached, None) => true,
            _ => false,
        };

        if unchanged {
            if let Some(session) = selected {
                self.state = WatcherState::Attached(session);
                if self.listeners.is_none() {
                    self.attach_listeners();
                }
            }
            return;
        }

        // Old listeners detach on drop, before the new ones are registered.
        self.listeners = None;

        match selected {
            Some(session) => {
                info!(app_id = ?session.app_id(), "attached to session");
                self.state = WatcherState::Attached(session);
                self.attach_listeners();
            }
            None => {
                info!("no media session to observe");
                self.state = WatcherState::Detached;
            }
        }
    }

    /// Register listeners on the attached session. On failure the session
    /// stays selected without listeners; the next notification retries.
    fn attach_listeners(&mut self) {
        let WatcherState::Attached(session) = &self.state else {
            return;
        };
        match self.registry.attach(session, self.tx.clone()) {
            Ok(listeners) => self.listeners = Some(listeners),
            Err(e) => warn!(error = %e, "failed to attach session listeners"),
        }
    }

    fn emit(&mut self, state: &MediaState) -> Result<(), WatchError> {
        let line = state.to_line()?;
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use nowcast_core::PlaybackState;

    use super::*;
    use crate::reader::tests::FakeSession;
    use crate::session::ReadError;

    #[derive(Clone, Default)]
    struct FakeRegistry {
        sessions: Arc<Mutex<Vec<FakeSession>>>,
        current: Arc<Mutex<Option<FakeSession>>>,
        live: Arc<Mutex<Vec<u32>>>,
        attaches: Arc<Mutex<u32>>,
        subscribed: Arc<Mutex<bool>>,
        refuse_subscribe: bool,
        refuse_attaches: Arc<Mutex<u32>>,
    }

    impl FakeRegistry {
        fn set_sessions(&self, sessions: Vec<FakeSession>) {
            *self.sessions.lock().unwrap() = sessions;
        }

        fn set_current(&self, session: Option<FakeSession>) {
            *self.current.lock().unwrap() = session;
        }

        fn live(&self) -> Vec<u32> {
            self.live.lock().unwrap().clone()
        }

        fn attaches(&self) -> u32 {
            *self.attaches.lock().unwrap()
        }
    }

    struct FakeListeners {
        id: u32,
        live: Arc<Mutex<Vec<u32>>>,
    }

    impl Drop for FakeListeners {
        fn drop(&mut self) {
            self.live.lock().unwrap().retain(|id| *id != self.id);
        }
    }

    impl SessionRegistry for FakeRegistry {
        type Session = FakeSession;
        type Listeners = FakeListeners;

        fn sessions(&self) -> Result<Vec<FakeSession>, ReadError> {
            Ok(self.sessions.lock().unwrap().clone())
        }

        fn current_session(&self) -> Result<Option<FakeSession>, ReadError> {
            Ok(self.current.lock().unwrap().clone())
        }

        fn subscribe(&mut self, _tx: NotificationSender) -> Result<(), ReadError> {
            if self.refuse_subscribe {
                return Err(ReadError::Registry("access denied".into()));
            }
            *self.subscribed.lock().unwrap() = true;
            Ok(())
        }

        fn attach(
            &self,
            session: &FakeSession,
            _tx: NotificationSender,
        ) -> Result<FakeListeners, ReadError> {
            *self.attaches.lock().unwrap() += 1;
            let mut refusals = self.refuse_attaches.lock().unwrap();
            if *refusals > 0 {
                *refusals -= 1;
                return Err(ReadError::SessionGone);
            }
            self.live.lock().unwrap().push(session.id);
            Ok(FakeListeners {
                id: session.id,
                live: self.live.clone(),
            })
        }
    }

    fn lines(watcher: &Watcher<FakeRegistry, Vec<u8>>) -> Vec<MediaState> {
        String::from_utf8(watcher.output().clone())
            .unwrap()
            .lines()
            .map(|l| MediaState::from_line(l).unwrap())
            .collect()
    }

    fn watcher(registry: &FakeRegistry) -> Watcher<FakeRegistry, Vec<u8>> {
        Watcher::new(registry.clone(), AllowList::default(), Vec::new())
    }

    #[tokio::test]
    async fn test_init_without_sessions() {
        let registry = FakeRegistry::default();
        let mut w = watcher(&registry);
        assert!(matches!(w.state(), WatcherState::Uninitialized));

        let state = w.start().await.unwrap();
        assert_eq!(state.state, PlaybackState::NoSession);
        assert!(matches!(w.state(), WatcherState::Detached));
        assert!(*registry.subscribed.lock().unwrap());
        assert_eq!(lines(&w), vec![MediaState::no_session()]);
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_fatal() {
        let registry = FakeRegistry {
            refuse_subscribe: true,
            ..Default::default()
        };
        let mut w = watcher(&registry);
        assert!(matches!(w.start().await, Err(WatchError::Subscribe(_))));
        assert!(w.output().is_empty());
    }

    #[tokio::test]
    async fn test_init_attaches_allowed_session() {
        let registry = FakeRegistry::default();
        let yandex = FakeSession::playing(7, "com.yandex.music", "Song");
        registry.set_sessions(vec![yandex.clone()]);

        let mut w = watcher(&registry);
        let state = w.start().await.unwrap();
        assert_eq!(state.title, "Song");
        assert_eq!(state.state, PlaybackState::Playing);
        assert!(matches!(w.state(), WatcherState::Attached(s) if s.id == 7));
        assert_eq!(registry.live(), vec![7]);
    }

    #[tokio::test]
    async fn test_switches_to_allowed_session_when_it_appears() {
        let registry = FakeRegistry::default();
        let spotify = FakeSession::playing(1, "com.spotify.client", "Other");
        registry.set_sessions(vec![spotify.clone()]);
        registry.set_current(Some(spotify.clone()));

        let mut w = watcher(&registry);
        let first = w.start().await.unwrap();
        assert_eq!(first.state, PlaybackState::NotYandex);
        assert_eq!(first.title, "");
        assert_eq!(registry.live(), vec![1]);

        let yandex = FakeSession::playing(2, "com.yandex.music", "Song");
        registry.set_sessions(vec![spotify, yandex]);
        w.sender().send(Notification::SessionsChanged).unwrap();
        let second = w.turn().await.unwrap();

        assert_eq!(second.title, "Song");
        assert_eq!(registry.live(), vec![2]);
        assert_eq!(registry.attaches(), 2);
        assert_eq!(lines(&w), vec![first, second]);
    }

    #[tokio::test]
    async fn test_same_session_is_not_reattached() {
        let registry = FakeRegistry::default();
        let yandex = FakeSession::playing(3, "com.yandex.music", "Song");
        registry.set_sessions(vec![yandex.clone()]);

        let mut w = watcher(&registry);
        w.start().await.unwrap();
        let tx = w.sender();
        for n in [
            Notification::MediaPropertiesChanged,
            Notification::TimelineChanged,
            Notification::PlaybackInfoChanged,
            Notification::CurrentSessionChanged,
        ] {
            tx.send(n).unwrap();
            w.turn().await.unwrap();
        }

        assert_eq!(registry.attaches(), 1);
        assert_eq!(registry.live(), vec![3]);
        assert_eq!(lines(&w).len(), 5);
    }

    #[tokio::test]
    async fn test_failed_attach_is_retried() {
        let registry = FakeRegistry::default();
        *registry.refuse_attaches.lock().unwrap() = 1;
        registry.set_sessions(vec![FakeSession::playing(9, "com.yandex.music", "Song")]);

        let mut w = watcher(&registry);
        let state = w.start().await.unwrap();
        assert_eq!(state.title, "Song");
        assert!(matches!(w.state(), WatcherState::Attached(s) if s.id == 9));
        assert!(registry.live().is_empty());

        for _ in 0..3 {
            w.sender().send(Notification::SessionsChanged).unwrap();
            w.turn().await.unwrap();
        }

        assert_eq!(registry.live(), vec![9]);
        assert_eq!(registry.attaches(), 2);
    }

    #[tokio::test]
    async fn test_session_closed_detaches() {
        let registry = FakeRegistry::default();
        registry.set_sessions(vec![FakeSession::playing(4, "com.yandex.music", "Song")]);

        let mut w = watcher(&registry);
        w.start().await.unwrap();
        assert_eq!(registry.live(), vec![4]);

        registry.set_sessions(Vec::new());
        w.sender().send(Notification::SessionsChanged).unwrap();
        let state = w.turn().await.unwrap();

        assert_eq!(state, MediaState::no_session());
        assert!(matches!(w.state(), WatcherState::Detached));
        assert!(registry.live().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_changes_are_reread() {
        let registry = FakeRegistry::default();
        let yandex = FakeSession::playing(5, "com.yandex.music", "First");
        registry.set_sessions(vec![yandex.clone()]);

        let mut w = watcher(&registry);
        w.start().await.unwrap();

        let _ = yandex.with(|d| {
            if let Ok(props) = d.props.as_mut() {
                props.title = "Second".into();
            }
        });
        w.sender().send(Notification::MediaPropertiesChanged).unwrap();
        let state = w.turn().await.unwrap();
        assert_eq!(state.title, "Second");
    }

    #[test]
    fn test_emitted_lines_are_newline_terminated() {
        let registry = FakeRegistry::default();
        let mut w = watcher(&registry);
        w.emit(&MediaState::no_session()).unwrap();
        w.emit(&MediaState::helper_exited()).unwrap();
        let text = String::from_utf8(w.output().clone()).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 2);
    }
}
