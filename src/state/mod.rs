//! State management module.
//!
//! Ownership runs parent to child through `Arc` (network → connection →
//! channel → user); every back-reference is a `Weak` that reads as "not
//! found" once the parent is gone.

mod channel;
mod network;
mod user;

pub use channel::IrcChannel;
pub use network::{ClientInfo, IrcNetwork, ServerInfo};
pub use user::IrcUser;
