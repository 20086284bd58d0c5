use std::sync::{Arc, Mutex, PoisonError};

use super::BaseStatement;
use crate::cleanup::{SharedStatement, cleanable_for_statement};
use crate::config::{ConfigRegistry, Configurable};
use crate::context::ExecutionContext;
use crate::customizer::StatementCustomizer;
use crate::error::StatementError;
use crate::handle::Handle;
use crate::types::RowValues;

/// Statement that changes rows and reports how many were affected.
///
/// ```rust
/// use std::sync::Arc;
/// use sql_statement_core::prelude::*;
/// use sql_statement_core::test_utils::{DriverScript, ScriptedConnection};
///
/// let conn = ScriptedConnection::new(DriverScript::default().with_update_count(2));
/// let handle = Handle::new(Box::new(conn), Arc::new(ConfigRegistry::new()));
/// let rows = handle
///     .create_update("update users set active = ?1 where id = ?2")
///     .bind(0, true)
///     .bind(1, 7_i64)
///     .execute()?;
/// assert_eq!(rows, 2);
/// # Ok::<(), StatementError>(())
/// ```
#[derive(Debug)]
pub struct Update<'h> {
    handle: &'h Handle,
    sql: String,
    base: BaseStatement,
}

impl<'h> Update<'h> {
    pub(crate) fn new(handle: &'h Handle, sql: &str, context: ExecutionContext) -> Self {
        let mut base = BaseStatement::new(Arc::clone(context.config()), context);
        base.apply_config_defaults();
        Self {
            handle,
            sql: sql.to_string(),
            base,
        }
    }

    #[must_use]
    pub fn bind(mut self, position: usize, value: impl Into<RowValues>) -> Self {
        self.base
            .context_mut()
            .binding_mut()
            .set(position, value.into());
        self
    }

    /// # Errors
    /// Returns `StatementError::Execution` if the statement can no longer be customized.
    pub fn with_customizer(
        mut self,
        customizer: impl StatementCustomizer + 'static,
    ) -> Result<Self, StatementError> {
        self.base.add_customizer(customizer)?;
        Ok(self)
    }

    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        self.base.context()
    }

    /// Prepare, run and close the statement.
    ///
    /// # Errors
    /// Returns the driver, customization or execution failure; if execution succeeded but
    /// cleanup failed, returns `StatementError::Cleanup`.
    pub fn execute(mut self) -> Result<u64, StatementError> {
        let result = self.run();
        self.base.finish(result)
    }

    fn run(&mut self) -> Result<u64, StatementError> {
        let raw = self.handle.connection().prepare(&self.sql)?;
        let shared: SharedStatement = Arc::new(Mutex::new(raw));
        self.base
            .add_cleanable(cleanable_for_statement(Arc::clone(&shared)));

        let mut stmt = shared.lock().unwrap_or_else(PoisonError::into_inner);
        self.base
            .execute_with(&mut **stmt, |s| s.execute_update())
    }
}

impl Configurable for Update<'_> {
    fn config_registry(&self) -> Arc<ConfigRegistry> {
        self.base.config_registry()
    }
}
