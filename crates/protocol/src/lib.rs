//! Wire types for the wallet request protocol.
//!
//! This crate contains the serde-serializable types that cross the page,
//! relay and background contexts. They describe the shapes of data as they
//! appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization and small derivations
//! * Closed: the kind vocabulary is fixed at compile time
//! * Stable: Changes only when the wire protocol changes
//!
//! Routing, persistence and the page surface are built on top in `wb-rs`.

pub mod bus;
pub mod discovery;
pub mod envelope;
pub mod error;
pub mod kind;
pub mod record;

pub use bus::*;
pub use discovery::*;
pub use envelope::*;
pub use error::*;
pub use kind::*;
pub use record::*;
