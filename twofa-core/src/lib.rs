//! twofa-core - Account model, compliance rules and enforcement operations
//!
//! Shared by the `twofa` command-line tool and the request gate in `twofa-web`.

pub mod account;
pub mod audit;
pub mod compliance;
pub mod config;
pub mod enforcement;
pub mod error;
pub mod logging;
pub mod operator;
pub mod store;

pub use account::*;
pub use audit::*;
pub use compliance::*;
pub use config::*;
pub use enforcement::*;
pub use error::*;
pub use logging::*;
pub use operator::*;
pub use store::{AccountFilter, AccountStore, MemoryAccountStore, PostgresAccountStore, RowOutcome};

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tracing;
