#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

//! A DNS stub-client connection: framing of the inbound byte stream,
//! correlation of responses to queries, and concrete tokio transports.
//!
//! One `Connection` drives one socket.  Connections share nothing
//! mutable with each other; a connection itself is not for concurrent
//! use - query submission and inbound data must be serialised by the
//! host, which the usual single-task-per-connection setup gives for
//! free.

pub mod connection;
pub mod framing;
pub mod net;
pub mod transport;

pub use connection::{Connection, MatchStrategy, QueryError};
pub use transport::{Transport, TransportKind};
