use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value as JsonValue;

use crate::cleanup::{Cleanable, CleanupLedger};
use crate::config::{ConfigRegistry, Configurable, SqlStatements};
use crate::error::StatementError;
use crate::types::Binding;

/// Identifies the extension method a statement runs on behalf of.
///
/// The core carries it as metadata only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionMethod {
    pub type_name: String,
    pub method_name: String,
}

impl ExtensionMethod {
    #[must_use]
    pub fn new(type_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl fmt::Display for ExtensionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.type_name, self.method_name)
    }
}

/// Owned snapshot of a statement context, attached to errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSummary {
    pub sql: Option<String>,
    pub extension_method: Option<ExtensionMethod>,
}

impl fmt::Display for ContextSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statement:{}", self.sql.as_deref().unwrap_or("<none>"))?;
        if let Some(method) = &self.extension_method {
            write!(f, ", method:{method}")?;
        }
        Ok(())
    }
}

/// Per-statement bundle: the active registry, the cleanup ledger, and ambient metadata.
///
/// Dropping a context that was never closed closes it; failures at that point can only be
/// logged.
pub struct ExecutionContext {
    config: Arc<ConfigRegistry>,
    cleanables: CleanupLedger,
    extension_method: Option<ExtensionMethod>,
    raw_sql: Option<String>,
    binding: Binding,
    execution_moment: Option<DateTime<Utc>>,
    completion_moment: Option<DateTime<Utc>>,
    exception_moment: Option<DateTime<Utc>>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(config: Arc<ConfigRegistry>) -> Self {
        Self {
            config,
            cleanables: CleanupLedger::new(),
            extension_method: None,
            raw_sql: None,
            binding: Binding::default(),
            execution_moment: None,
            completion_moment: None,
            exception_moment: None,
        }
    }

    #[must_use]
    pub fn with_extension_method(mut self, method: Option<ExtensionMethod>) -> Self {
        self.extension_method = method;
        self
    }

    #[must_use]
    pub fn with_raw_sql(mut self, sql: impl Into<String>) -> Self {
        self.raw_sql = Some(sql.into());
        self
    }

    #[must_use]
    pub fn config(&self) -> &Arc<ConfigRegistry> {
        &self.config
    }

    /// Statement attribute defined through [`SqlStatements`] in the active registry.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<JsonValue> {
        self.config
            .get::<SqlStatements>()
            .read()
            .attribute(key)
            .cloned()
    }

    #[must_use]
    pub fn extension_method(&self) -> Option<&ExtensionMethod> {
        self.extension_method.as_ref()
    }

    #[must_use]
    pub fn raw_sql(&self) -> Option<&str> {
        self.raw_sql.as_deref()
    }

    #[must_use]
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }

    #[must_use]
    pub fn cleanables(&self) -> &CleanupLedger {
        &self.cleanables
    }

    pub fn add_cleanable(&mut self, cleanable: Box<dyn Cleanable>) {
        self.cleanables.add(cleanable);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cleanables.is_closed()
    }

    /// Drain the cleanup ledger. Idempotent.
    ///
    /// # Errors
    /// Returns `StatementError::Cleanup` if any registered cleanable failed to release.
    pub fn close(&mut self) -> Result<(), StatementError> {
        if self.cleanables.is_closed() {
            return Ok(());
        }
        tracing::debug!(
            sql = self.raw_sql.as_deref().unwrap_or(""),
            pending = self.cleanables.len(),
            "closing statement context"
        );
        self.cleanables.close()
    }

    #[must_use]
    pub fn summary(&self) -> ContextSummary {
        ContextSummary {
            sql: self.raw_sql.clone(),
            extension_method: self.extension_method.clone(),
        }
    }

    pub(crate) fn mark_execution_started(&mut self) {
        self.execution_moment = Some(Utc::now());
    }

    pub(crate) fn mark_execution_completed(&mut self) {
        self.completion_moment = Some(Utc::now());
    }

    pub(crate) fn mark_execution_failed(&mut self) {
        self.exception_moment = Some(Utc::now());
    }

    #[must_use]
    pub fn execution_moment(&self) -> Option<DateTime<Utc>> {
        self.execution_moment
    }

    #[must_use]
    pub fn completion_moment(&self) -> Option<DateTime<Utc>> {
        self.completion_moment
    }

    #[must_use]
    pub fn exception_moment(&self) -> Option<DateTime<Utc>> {
        self.exception_moment
    }

    /// Time between execution start and completion (or failure).
    #[must_use]
    pub fn elapsed(&self) -> Option<TimeDelta> {
        let start = self.execution_moment?;
        let end = self.completion_moment.or(self.exception_moment)?;
        Some(end - start)
    }
}

impl Configurable for ExecutionContext {
    fn config_registry(&self) -> Arc<ConfigRegistry> {
        Arc::clone(&self.config)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("raw_sql", &self.raw_sql)
            .field("extension_method", &self.extension_method)
            .field("cleanables", &self.cleanables)
            .finish_non_exhaustive()
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "cleanup failed while dropping statement context");
        }
    }
}
