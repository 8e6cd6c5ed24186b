//! Media-session watcher: observes the OS session registry and emits one
//! JSON line per observed change on stdout.

pub mod error;
pub mod machine;
pub mod platform;
pub mod reader;
pub mod session;

pub use error::WatchError;
pub use machine::{Watcher, WatcherState};
pub use reader::{read_snapshot, Field, FieldRead, Snapshot};
pub use session::{MediaSession, Notification, ReadError, SessionRegistry};
