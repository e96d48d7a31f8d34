//! Transports and correlation for the wallet bridge contexts.
//!
//! The page talks to its relay over a [`transport::Transport`] carrying
//! [`wb_protocol::BusMessage`] values; [`connection::Connection`] correlates
//! responses by id. The relay reaches the background through a
//! [`channel::PrivilegedChannel`].

pub mod channel;
pub mod connection;
pub mod error;
pub mod fake_transport;
pub mod transport;

pub use channel::PrivilegedChannel;
pub use connection::Connection;
pub use error::{Error, Result};
pub use transport::{Transport, TransportParts, TransportReceiver, memory_pair};
