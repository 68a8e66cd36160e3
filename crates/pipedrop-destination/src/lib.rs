//! Destination catalog clients.

pub mod adapter;
pub mod error;
pub mod options;
pub mod postgres;
pub mod redaction;

pub use adapter::{DestinationClient, SqlClient, StateRecord};
pub use error::{DestinationError, DestinationResult};
pub use options::{DestinationOptions, STATE_TABLE};
pub use postgres::PostgresDestination;
pub use redaction::redact_connection_string;
