//! Concrete implementations of the ports layer.
//!
//! `time` and `config` are always available (and always free of I/O
//! dependencies beyond `std`/`toml`); `udp` requires the `network`
//! feature since it pulls in tokio's UDP socket.

pub mod config;
pub mod time;

#[cfg(feature = "network")]
pub mod persistence;
#[cfg(feature = "network")]
pub mod udp;

pub use config::StaticConfigProvider;
pub use time::{FixedClock, SystemClock};

#[cfg(feature = "network")]
pub use config::{ConfigError, TomlConfigProvider};

#[cfg(feature = "network")]
pub use persistence::{JsonStateStore, PersistedState, PersistenceError};
#[cfg(feature = "network")]
pub use udp::TokioUdpSocket;
