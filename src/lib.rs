//! sbi-irc - Social Bot Interface IRC protocol core
//!
//! Connections, a single parser task, and channel/user state tracking for
//! IRC clients and bots.
//!
//! ## Layout
//!
//! - [`engine`]: the [`IrcEngine`] context object (pools, listeners, parser)
//! - [`connection`]: transport, read/write tasks, send and receive queues
//! - [`parser`]: line decoding and the numeric/command handlers
//! - [`state`]: networks, channels and users
//! - [`pool`] and [`factory`]: object allocation and parent linking
//! - [`listener`]: the [`IrcEvent`] notification surface
//! - [`config`]: TOML configuration
//!
//! The wire-level primitives live in the `sbi-proto` crate.

pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod factory;
pub mod listener;
pub mod parser;
pub mod pool;
pub mod state;

pub use connection::{ConnState, IrcConnection};
pub use engine::IrcEngine;
pub use error::{IrcResult, IrcStatus};
pub use listener::{EventKind, IrcEvent, IrcListener, LoggingListener};
pub use state::{IrcChannel, IrcNetwork, IrcUser};
