//! Ordered cleanup obligations tied to a statement's lifetime.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use crate::driver::{RawCursor, RawStatement};
use crate::error::{DriverError, StatementError};

/// A registered obligation to release one acquired resource.
///
/// `clean` consumes the box, so a cleanable can be released at most once.
pub trait Cleanable: Send {
    /// # Errors
    /// Returns `DriverError` if releasing the resource fails.
    fn clean(self: Box<Self>) -> Result<(), DriverError>;
}

impl<F> Cleanable for F
where
    F: FnOnce() -> Result<(), DriverError> + Send,
{
    fn clean(self: Box<Self>) -> Result<(), DriverError> {
        (*self)()
    }
}

/// Raw statement shared between the executing code and its cleanup entry.
pub type SharedStatement = Arc<Mutex<Box<dyn RawStatement>>>;

/// Open cursor shared between the reading code and its cleanup entry.
pub type SharedCursor = Arc<Mutex<Box<dyn RawCursor>>>;

/// Cleanable that closes a driver cursor.
#[must_use]
pub fn cleanable_for_cursor(cursor: SharedCursor) -> Box<dyn Cleanable> {
    Box::new(move || {
        let mut cursor = cursor.lock().unwrap_or_else(PoisonError::into_inner);
        cursor.close()
    })
}

/// Cleanable that closes a prepared driver statement.
#[must_use]
pub fn cleanable_for_statement(statement: SharedStatement) -> Box<dyn Cleanable> {
    Box::new(move || {
        let mut statement = statement.lock().unwrap_or_else(PoisonError::into_inner);
        statement.close()
    })
}

#[derive(Default)]
pub struct CleanupLedger {
    entries: Vec<Box<dyn Cleanable>>,
    closed: bool,
}

impl CleanupLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cleanable. On an already-closed ledger it is released immediately.
    pub fn add(&mut self, cleanable: Box<dyn Cleanable>) {
        if self.closed {
            if let Err(e) = release(cleanable) {
                tracing::warn!(error = %e, "cleanable added after close failed to release");
            }
            return;
        }
        self.entries.push(cleanable);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release every entry in registration order. A failing entry never stops the ones after
    /// it; the first failure is returned once all have been attempted.
    ///
    /// # Errors
    /// Returns `StatementError::Cleanup` carrying the first release failure.
    pub fn close(&mut self) -> Result<(), StatementError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first: Option<DriverError> = None;
        let mut suppressed = 0usize;
        for cleanable in self.entries.drain(..) {
            if let Err(e) = release(cleanable) {
                if first.is_none() {
                    first = Some(e);
                } else {
                    tracing::warn!(error = %e, "suppressed cleanup failure");
                    suppressed += 1;
                }
            }
        }

        match first {
            Some(source) => Err(StatementError::Cleanup { source, suppressed }),
            None => Ok(()),
        }
    }
}

/// A panicking cleanable counts as a failed release so the entries after it still run.
fn release(cleanable: Box<dyn Cleanable>) -> Result<(), DriverError> {
    catch_unwind(AssertUnwindSafe(move || cleanable.clean()))
        .map_err(|_| DriverError::new("cleanable panicked while releasing"))?
}

impl fmt::Debug for CleanupLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupLedger")
            .field("pending", &self.entries.len())
            .field("closed", &self.closed)
            .finish()
    }
}
