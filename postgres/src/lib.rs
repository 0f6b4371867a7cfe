//! `PostgreSQL` user directory for the event notification pipeline.
//!
//! The user records belong to the events API; this crate only reads the
//! email and preference columns to answer "who is interested in these
//! categories". Matching uses the array-overlap operator (`&&`) on the
//! `preferences` text array.
//!
//! # Example
//!
//! ```ignore
//! use event_notify_postgres::PostgresUserDirectory;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let directory = PostgresUserDirectory::new("postgres://localhost/events").await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod directory;

pub use directory::{DEFAULT_USERS_TABLE, PostgresUserDirectory};
