use std::sync::{Arc, Mutex, PoisonError};

use super::BaseStatement;
use crate::cleanup::{SharedCursor, SharedStatement, cleanable_for_cursor, cleanable_for_statement};
use crate::config::{ConfigRegistry, Configurable};
use crate::context::ExecutionContext;
use crate::customizer::StatementCustomizer;
use crate::error::StatementError;
use crate::handle::Handle;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Statement that reads rows.
///
/// The cursor is registered with the statement's cleanup ledger as soon as the driver hands
/// it over, before the after-hooks run, so it is released even when a hook or a fetch fails.
#[derive(Debug)]
pub struct Query<'h> {
    handle: &'h Handle,
    sql: String,
    base: BaseStatement,
}

impl<'h> Query<'h> {
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

    /// Prepare and run the query, materialize every row, then close.
    ///
    /// # Errors
    /// Returns the driver, customization, execution or fetch failure; if reading succeeded
    /// but cleanup failed, returns `StatementError::Cleanup`.
    pub fn execute(mut self) -> Result<ResultSet, StatementError> {
        let result = self.run();
        self.base.finish(result)
    }

    fn run(&mut self) -> Result<ResultSet, StatementError> {
        let raw = self.handle.connection().prepare(&self.sql)?;
        let shared: SharedStatement = Arc::new(Mutex::new(raw));
        self.base
            .add_cleanable(cleanable_for_statement(Arc::clone(&shared)));

        let cursor: SharedCursor = {
            let mut stmt = shared.lock().unwrap_or_else(PoisonError::into_inner);
            self.base.execute_and_register(
                &mut **stmt,
                |s| {
                    let cursor: SharedCursor = Arc::new(Mutex::new(s.execute_query()?));
                    Ok(cursor)
                },
                |base, cursor| base.add_cleanable(cleanable_for_cursor(Arc::clone(cursor))),
            )?
        };

        let mut cursor = cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let mut result_set = ResultSet::new(Arc::new(cursor.column_names()));
        while let Some(row) = cursor.next_row().map_err(|e| StatementError::Execution {
            message: "unable to fetch row".into(),
            context: self.base.context().summary(),
            source: Some(e),
            suppressed: None,
        })? {
            result_set.add_row_values(row);
        }
        Ok(result_set)
    }
}

impl Configurable for Query<'_> {
    fn config_registry(&self) -> Arc<ConfigRegistry> {
        self.base.config_registry()
    }
}
