pub mod cli;
pub mod config;
pub mod error;
pub mod hub;
pub mod logging;
pub mod server;
pub mod supervisor;

pub use config::BridgeConfig;
pub use error::BridgeError;
pub use hub::NowPlayingHub;
pub use supervisor::{LaunchTarget, Supervisor};
