//! In-memory scripted driver for exercising statements without a database.
//!
//! Every driver call is appended to a shared [`EventLog`] so tests can assert on ordering.

use std::sync::{Arc, Mutex, PoisonError};

use crate::driver::{Connection, RawCursor, RawStatement};
use crate::error::DriverError;
use crate::types::RowValues;

#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Prepared(String),
    Bound(usize, RowValues),
    QueryTimeout(u32),
    FetchSize(u32),
    MaxRows(u64),
    ExecutedUpdate(String),
    ExecutedQuery(String),
    RowFetched,
    CursorClosed,
    StatementClosed(String),
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<DriverEvent>>>);

impl EventLog {
    pub fn push(&self, event: DriverEvent) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<DriverEvent> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn count(&self, pred: impl Fn(&DriverEvent) -> bool) -> usize {
        self.snapshot().iter().filter(|e| pred(e)).count()
    }
}

/// What the scripted driver returns and where it fails.
#[derive(Debug, Clone, Default)]
pub struct DriverScript {
    pub update_count: u64,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RowValues>>,
    pub fail_prepare: bool,
    pub fail_bind: bool,
    pub fail_execute: bool,
    pub fail_settings: bool,
    /// Fail when fetching the row at this index.
    pub fail_fetch_at: Option<usize>,
    pub fail_statement_close: bool,
    pub fail_cursor_close: bool,
}

impl DriverScript {
    #[must_use]
    pub fn with_rows(mut self, columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        self.columns = columns.iter().map(|c| (*c).to_string()).collect();
        self.rows = rows;
        self
    }

    #[must_use]
    pub fn with_update_count(mut self, count: u64) -> Self {
        self.update_count = count;
        self
    }
}

#[derive(Debug, Default)]
pub struct ScriptedConnection {
    script: DriverScript,
    log: EventLog,
}

impl ScriptedConnection {
    #[must_use]
    pub fn new(script: DriverScript) -> Self {
        Self {
            script,
            log: EventLog::default(),
        }
    }

    #[must_use]
    pub fn log(&self) -> EventLog {
        self.log.clone()
    }
}

impl Connection for ScriptedConnection {
    fn prepare(&self, sql: &str) -> Result<Box<dyn RawStatement>, DriverError> {
        if self.script.fail_prepare {
            return Err(DriverError::new(format!("cannot prepare: {sql}")).with_sql_state("42000"));
        }
        self.log.push(DriverEvent::Prepared(sql.to_string()));
        Ok(Box::new(ScriptedStatement::new(
            sql,
            self.script.clone(),
            self.log.clone(),
        )))
    }
}

#[derive(Debug)]
pub struct ScriptedStatement {
    sql: String,
    script: DriverScript,
    log: EventLog,
}

impl ScriptedStatement {
    #[must_use]
    pub fn new(sql: &str, script: DriverScript, log: EventLog) -> Self {
        Self {
            sql: sql.to_string(),
            script,
            log,
        }
    }

    fn setting(&self, event: DriverEvent) -> Result<(), DriverError> {
        if self.script.fail_settings {
            return Err(DriverError::new("setting rejected by driver"));
        }
        self.log.push(event);
        Ok(())
    }
}

impl RawStatement for ScriptedStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, position: usize, value: &RowValues) -> Result<(), DriverError> {
        if self.script.fail_bind {
            return Err(DriverError::new("bind rejected"));
        }
        self.log.push(DriverEvent::Bound(position, value.clone()));
        Ok(())
    }

    fn set_query_timeout(&mut self, seconds: u32) -> Result<(), DriverError> {
        self.setting(DriverEvent::QueryTimeout(seconds))
    }

    fn set_fetch_size(&mut self, rows: u32) -> Result<(), DriverError> {
        self.setting(DriverEvent::FetchSize(rows))
    }

    fn set_max_rows(&mut self, rows: u64) -> Result<(), DriverError> {
        self.setting(DriverEvent::MaxRows(rows))
    }

    fn execute_update(&mut self) -> Result<u64, DriverError> {
        if self.script.fail_execute {
            return Err(DriverError::new("execution failed").with_sql_state("40001"));
        }
        self.log.push(DriverEvent::ExecutedUpdate(self.sql.clone()));
        Ok(self.script.update_count)
    }

    fn execute_query(&mut self) -> Result<Box<dyn RawCursor>, DriverError> {
        if self.script.fail_execute {
            return Err(DriverError::new("execution failed").with_sql_state("40001"));
        }
        self.log.push(DriverEvent::ExecutedQuery(self.sql.clone()));
        Ok(Box::new(ScriptedCursor {
            columns: self.script.columns.clone(),
            rows: self.script.rows.clone(),
            position: 0,
            fail_fetch_at: self.script.fail_fetch_at,
            fail_close: self.script.fail_cursor_close,
            log: self.log.clone(),
        }))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.log.push(DriverEvent::StatementClosed(self.sql.clone()));
        if self.script.fail_statement_close {
            return Err(DriverError::new("statement close failed"));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ScriptedCursor {
    columns: Vec<String>,
    rows: Vec<Vec<RowValues>>,
    position: usize,
    fail_fetch_at: Option<usize>,
    fail_close: bool,
    log: EventLog,
}

impl RawCursor for ScriptedCursor {
    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, DriverError> {
        if self.fail_fetch_at == Some(self.position) {
            return Err(DriverError::new("fetch failed"));
        }
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
            self.log.push(DriverEvent::RowFetched);
        }
        Ok(row)
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.log.push(DriverEvent::CursorClosed);
        if self.fail_close {
            return Err(DriverError::new("cursor close failed"));
        }
        Ok(())
    }
}
