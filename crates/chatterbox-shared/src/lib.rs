//! Vocabulary shared by every ChatterBox crate: identifiers, records, topic
//! names, live event payloads and the error taxonomy.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod topics;
pub mod types;

pub use error::ChatError;
