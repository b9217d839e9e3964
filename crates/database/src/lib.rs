pub mod connection;
pub mod error;

pub use connection::{Database, DatabaseConfig};
pub use error::{DatabaseError, Result};
