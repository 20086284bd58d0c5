//! Contracts with the driver collaborator.
//!
//! The core never talks to a database itself. A driver supplies a [`Connection`] that can
//! prepare [`RawStatement`]s; those are what customizers touch and what concrete statement
//! types execute. Every call may fail with a [`DriverError`].

use crate::error::DriverError;
use crate::types::RowValues;

/// One physical connection owned by a `Handle`.
pub trait Connection: Send + Sync {
    /// Prepare `sql` for execution.
    ///
    /// # Errors
    /// Returns `DriverError` if the driver rejects the statement.
    fn prepare(&self, sql: &str) -> Result<Box<dyn RawStatement>, DriverError>;
}

/// Raw preparable-statement handle as exposed by the driver.
///
/// `close` must tolerate being called more than once.
pub trait RawStatement: Send {
    fn sql(&self) -> &str;

    /// # Errors
    /// Returns `DriverError` if the driver cannot bind the value.
    fn bind(&mut self, position: usize, value: &RowValues) -> Result<(), DriverError>;

    /// # Errors
    /// Returns `DriverError` if the driver rejects the setting.
    fn set_query_timeout(&mut self, seconds: u32) -> Result<(), DriverError>;

    /// # Errors
    /// Returns `DriverError` if the driver rejects the setting.
    fn set_fetch_size(&mut self, rows: u32) -> Result<(), DriverError>;

    /// # Errors
    /// Returns `DriverError` if the driver rejects the setting.
    fn set_max_rows(&mut self, rows: u64) -> Result<(), DriverError>;

    /// # Errors
    /// Returns `DriverError` if execution fails.
    fn execute_update(&mut self) -> Result<u64, DriverError>;

    /// # Errors
    /// Returns `DriverError` if execution fails.
    fn execute_query(&mut self) -> Result<Box<dyn RawCursor>, DriverError>;

    /// # Errors
    /// Returns `DriverError` if the driver fails to release the statement.
    fn close(&mut self) -> Result<(), DriverError>;
}

/// Open cursor over query results. `close` must tolerate being called more than once.
pub trait RawCursor: Send {
    fn column_names(&self) -> Vec<String>;

    /// # Errors
    /// Returns `DriverError` if fetching the next row fails.
    fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, DriverError>;

    /// # Errors
    /// Returns `DriverError` if the driver fails to release the cursor.
    fn close(&mut self) -> Result<(), DriverError>;
}
