//! Shared model and pure building blocks for the now-playing bridge:
//! the wire record, allow-list policy, session selection, thumbnail
//! encoding and line framing.

pub mod allow;
pub mod error;
pub mod framer;
pub mod model;
pub mod selector;
pub mod thumbnail;

pub use allow::{AllowList, ALLOW_ENV};
pub use error::CoreError;
pub use framer::LineFramer;
pub use model::{Envelope, MediaState, PlaybackState, RecordKind};
pub use selector::{select, AppIdentity};
