//! The DNS wire format: a structured view of responses, plus
//! serialisation of queries and deserialisation of responses.

pub mod deserialise;
pub mod serialise;
pub mod types;
