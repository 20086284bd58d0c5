//! Execution core for statements: a type-keyed configuration registry, a customizer hook
//! pipeline around the driver call, and a cleanup ledger that releases every acquired
//! resource exactly once when the statement closes.
//!
//! ```rust
//! use std::sync::Arc;
//! use sql_statement_core::prelude::*;
//! use sql_statement_core::test_utils::{DriverScript, ScriptedConnection};
//!
//! let script = DriverScript::default()
//!     .with_rows(&["id"], vec![vec![RowValues::Int(1)], vec![RowValues::Int(2)]]);
//! let handle = Handle::new(Box::new(ScriptedConnection::new(script)), Arc::new(ConfigRegistry::new()));
//!
//! let rows = handle
//!     .create_query("select id from users")
//!     .with_customizer(FetchSize(50))?
//!     .execute()?;
//! assert_eq!(rows.len(), 2);
//! # Ok::<(), StatementError>(())
//! ```

pub mod cleanup;
pub mod config;
pub mod context;
pub mod customizer;
pub mod driver;
pub mod error;
pub mod handle;
pub mod handle_supplier;
pub mod prelude;
pub mod results;
pub mod statement;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{CustomizerError, DriverError, StatementError};
