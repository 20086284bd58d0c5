//! Statement lifecycle shared by every statement type.
//!
//! A [`BaseStatement`] moves through [`StatementState`] as it is configured, executed and
//! closed. It owns the [`ExecutionContext`] (and with it the cleanup ledger) and the
//! customizer pipeline; the registry is shared with whoever created the statement.

mod query;
mod update;

use std::sync::Arc;

pub use query::Query;
pub use update::Update;

use crate::cleanup::Cleanable;
use crate::config::{Config, ConfigObject, ConfigRegistry, Configurable, SqlStatements};
use crate::context::ExecutionContext;
use crate::customizer::{CustomizerPipeline, QueryTimeout, StatementCustomizer};
use crate::driver::RawStatement;
use crate::error::{DriverError, StatementError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Constructed,
    Configuring,
    Executing,
    Closed,
}

#[derive(Debug)]
pub struct BaseStatement {
    config: Arc<ConfigRegistry>,
    context: ExecutionContext,
    customizers: CustomizerPipeline,
    state: StatementState,
}

impl BaseStatement {
    #[must_use]
    pub fn new(config: Arc<ConfigRegistry>, context: ExecutionContext) -> Self {
        Self {
            config,
            context,
            customizers: CustomizerPipeline::new(),
            state: StatementState::Constructed,
        }
    }

    /// The configuration object of type `C` associated with this statement.
    #[must_use]
    pub fn get_config<C: ConfigObject>(&self) -> Config<C> {
        self.config.get::<C>()
    }

    #[must_use]
    pub fn config(&self) -> &Arc<ConfigRegistry> {
        &self.config
    }

    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    #[must_use]
    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn add_cleanable(&mut self, cleanable: Box<dyn Cleanable>) {
        self.touch();
        self.context.add_cleanable(cleanable);
    }

    /// # Errors
    /// Returns `StatementError::Execution` once execution has started or the statement is
    /// closed.
    pub fn add_customizer(
        &mut self,
        customizer: impl StatementCustomizer + 'static,
    ) -> Result<(), StatementError> {
        self.ensure_configurable()?;
        self.customizers.add(customizer);
        Ok(())
    }

    /// # Errors
    /// Returns `StatementError::Execution` once execution has started or the statement is
    /// closed.
    pub fn add_customizers(
        &mut self,
        customizers: impl IntoIterator<Item = Arc<dyn StatementCustomizer>>,
    ) -> Result<(), StatementError> {
        self.ensure_configurable()?;
        self.customizers.extend(customizers);
        Ok(())
    }

    #[must_use]
    pub fn customizers(&self) -> &CustomizerPipeline {
        &self.customizers
    }

    /// Run the before-hooks against `stmt`.
    ///
    /// # Errors
    /// Returns `StatementError::Customization` from the first failing hook.
    pub fn before_execution(&mut self, stmt: &mut dyn RawStatement) -> Result<(), StatementError> {
        self.customizers.before_execution(stmt, &self.context)
    }

    /// # Errors
    /// Returns `StatementError::Customization` from the first failing hook.
    pub fn after_execution(&mut self, stmt: &mut dyn RawStatement) -> Result<(), StatementError> {
        self.customizers.after_execution(stmt, &self.context)
    }

    /// Bind arguments, bracket `call` with the customizer hooks and record timing.
    ///
    /// The statement counts as executing from the first step, so the customizer list is
    /// frozen and a second attempt is rejected even if binding fails. After-hooks run only
    /// when `call` succeeded.
    ///
    /// # Errors
    /// Returns `StatementError::Execution` if the statement already executed or was closed,
    /// or if binding or the driver call fails; `StatementError::Customization` if a hook
    /// fails.
    pub fn execute_with<T>(
        &mut self,
        stmt: &mut dyn RawStatement,
        call: impl FnOnce(&mut dyn RawStatement) -> Result<T, DriverError>,
    ) -> Result<T, StatementError> {
        self.execute_and_register(stmt, call, |_, _| {})
    }

    /// Like [`BaseStatement::execute_with`], but hands whatever `call` produced to
    /// `register` before the after-hooks run. Resources registered there are released by
    /// the ledger even when an after-hook fails.
    ///
    /// # Errors
    /// Same as [`BaseStatement::execute_with`].
    pub fn execute_and_register<T>(
        &mut self,
        stmt: &mut dyn RawStatement,
        call: impl FnOnce(&mut dyn RawStatement) -> Result<T, DriverError>,
        register: impl FnOnce(&mut Self, &T),
    ) -> Result<T, StatementError> {
        match self.state {
            StatementState::Executing => {
                return Err(self.execution_error("statement already executed", None));
            }
            StatementState::Closed => {
                return Err(self.execution_error("statement is closed", None));
            }
            StatementState::Constructed | StatementState::Configuring => {}
        }

        self.state = StatementState::Executing;
        tracing::debug!(sql = stmt.sql(), binds = self.context.binding().len(), "executing statement");
        self.context.mark_execution_started();

        let outcome = self.bracket(stmt, call, register);
        match &outcome {
            Ok(_) => self.context.mark_execution_completed(),
            Err(e) => {
                tracing::debug!(error = %e, "statement execution failed");
                self.context.mark_execution_failed();
            }
        }
        outcome
    }

    fn bracket<T>(
        &mut self,
        stmt: &mut dyn RawStatement,
        call: impl FnOnce(&mut dyn RawStatement) -> Result<T, DriverError>,
        register: impl FnOnce(&mut Self, &T),
    ) -> Result<T, StatementError> {
        for (position, value) in self.context.binding().iter() {
            stmt.bind(position, value)
                .map_err(|e| self.execution_error("unable to bind argument", Some(e)))?;
        }
        self.before_execution(stmt)?;
        let value = call(&mut *stmt).map_err(|e| {
            let message = e.message.clone();
            self.execution_error(&message, Some(e))
        })?;
        register(self, &value);
        self.after_execution(stmt)?;
        Ok(value)
    }

    /// Close the statement context. Idempotent and valid in every state.
    ///
    /// # Errors
    /// Returns `StatementError::Cleanup` if a cleanable failed to release.
    pub fn close(&mut self) -> Result<(), StatementError> {
        self.state = StatementState::Closed;
        self.context.close()
    }

    /// Close the statement and fold the cleanup outcome into `result`.
    ///
    /// An execution failure takes priority; a cleanup failure alongside it is attached as
    /// its [`StatementError::suppressed`] failure.
    ///
    /// # Errors
    /// Returns the execution error if there was one, otherwise any cleanup error.
    pub fn finish<T>(&mut self, result: Result<T, StatementError>) -> Result<T, StatementError> {
        let closed = self.close();
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup)) => {
                tracing::warn!(error = %e, suppressed = %cleanup, "cleanup also failed");
                Err(e.with_suppressed(cleanup))
            }
        }
    }

    /// Install customizers derived from the registry, such as the default query timeout.
    pub(crate) fn apply_config_defaults(&mut self) {
        if let Some(seconds) = self.config.get::<SqlStatements>().read().query_timeout() {
            self.customizers.add(QueryTimeout(seconds));
        }
    }

    fn touch(&mut self) {
        if self.state == StatementState::Constructed {
            self.state = StatementState::Configuring;
        }
    }

    fn ensure_configurable(&mut self) -> Result<(), StatementError> {
        match self.state {
            StatementState::Constructed | StatementState::Configuring => {
                self.touch();
                Ok(())
            }
            StatementState::Executing | StatementState::Closed => Err(self.execution_error(
                "customizers cannot be changed after execution has started",
                None,
            )),
        }
    }

    fn execution_error(&self, message: &str, source: Option<DriverError>) -> StatementError {
        StatementError::Execution {
            message: message.to_string(),
            context: self.context.summary(),
            source,
            suppressed: None,
        }
    }
}

impl Configurable for BaseStatement {
    fn config_registry(&self) -> Arc<ConfigRegistry> {
        Arc::clone(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CustomizerError;
    use crate::test_utils::{DriverEvent, DriverScript, EventLog, ScriptedStatement};
    use std::sync::Mutex;

    struct AfterProbe(Arc<Mutex<u32>>);

    impl StatementCustomizer for AfterProbe {
        fn after_execution(
            &self,
            _stmt: &mut dyn RawStatement,
            _ctx: &crate::context::ExecutionContext,
        ) -> Result<(), CustomizerError> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn statement(sql: &str) -> BaseStatement {
        let config = Arc::new(ConfigRegistry::new());
        let context = ExecutionContext::new(Arc::clone(&config)).with_raw_sql(sql);
        BaseStatement::new(config, context)
    }

    #[test]
    fn close_is_valid_from_constructed_and_idempotent() {
        let mut stmt = statement("select 1");
        assert_eq!(stmt.state(), StatementState::Constructed);
        stmt.close().unwrap();
        stmt.close().unwrap();
        assert_eq!(stmt.state(), StatementState::Closed);
    }

    #[test]
    fn config_and_context_available_after_close() {
        let mut stmt = statement("select 1");
        stmt.close().unwrap();
        let cfg = stmt.get_config::<SqlStatements>();
        assert!(cfg.same_instance(&stmt.config().get::<SqlStatements>()));
        assert_eq!(stmt.context().raw_sql(), Some("select 1"));
    }

    #[test]
    fn customizers_frozen_once_executing() {
        let log = EventLog::default();
        let mut raw = ScriptedStatement::new("select 1", DriverScript::default(), log);
        let mut stmt = statement("select 1");
        stmt.add_customizer(crate::customizer::FetchSize(5)).unwrap();
        assert_eq!(stmt.state(), StatementState::Configuring);

        stmt.execute_with(&mut raw, |s| s.execute_update()).unwrap();
        let err = stmt.add_customizer(crate::customizer::MaxRows(1)).unwrap_err();
        assert!(matches!(err, StatementError::Execution { .. }));
        assert_eq!(stmt.customizers().len(), 1);
    }

    #[test]
    fn execute_twice_is_rejected() {
        let log = EventLog::default();
        let mut raw = ScriptedStatement::new("update t", DriverScript::default(), log.clone());
        let mut stmt = statement("update t");
        stmt.execute_with(&mut raw, |s| s.execute_update()).unwrap();
        assert!(stmt.execute_with(&mut raw, |s| s.execute_update()).is_err());
        assert_eq!(
            log.count(|e| matches!(e, DriverEvent::ExecutedUpdate(_))),
            1
        );
    }

    #[test]
    fn after_hooks_skipped_when_driver_fails() {
        let hits = Arc::new(Mutex::new(0));
        let log = EventLog::default();
        let script = DriverScript {
            fail_execute: true,
            ..DriverScript::default()
        };
        let mut raw = ScriptedStatement::new("update t", script, log);
        let mut stmt = statement("update t");
        stmt.add_customizer(AfterProbe(Arc::clone(&hits))).unwrap();

        let err = stmt.execute_with(&mut raw, |s| s.execute_update()).unwrap_err();
        match err {
            StatementError::Execution { source, context, .. } => {
                assert_eq!(source.and_then(|s| s.sql_state).as_deref(), Some("40001"));
                assert_eq!(context.sql.as_deref(), Some("update t"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*hits.lock().unwrap(), 0);
        assert!(stmt.context().exception_moment().is_some());
        assert!(stmt.context().completion_moment().is_none());
    }

    #[test]
    fn finish_prefers_execution_error_over_cleanup_error() {
        let mut stmt = statement("update t");
        stmt.add_cleanable(Box::new(|| -> Result<(), DriverError> {
            Err(DriverError::new("close failed"))
        }));
        let failed: Result<(), StatementError> = Err(StatementError::Execution {
            message: "boom".into(),
            context: stmt.context().summary(),
            source: None,
            suppressed: None,
        });
        let err = stmt.finish(failed).unwrap_err();
        assert!(matches!(err, StatementError::Execution { ref message, .. } if message == "boom"));
        assert!(matches!(
            err.suppressed(),
            Some(StatementError::Cleanup { source, .. }) if source.message == "close failed"
        ));
    }

    #[test]
    fn finish_surfaces_cleanup_error_on_success() {
        let mut stmt = statement("update t");
        stmt.add_cleanable(Box::new(|| -> Result<(), DriverError> {
            Err(DriverError::new("close failed"))
        }));
        let err = stmt.finish(Ok(5)).unwrap_err();
        assert!(matches!(err, StatementError::Cleanup { .. }));
    }

    #[test]
    fn binds_are_applied_before_hooks() {
        let log = EventLog::default();
        let mut raw = ScriptedStatement::new("update t", DriverScript::default(), log.clone());
        let mut stmt = statement("update t");
        stmt.context_mut().binding_mut().set(0, 9_i64.into());
        stmt.add_customizer(crate::customizer::QueryTimeout(3)).unwrap();
        stmt.execute_with(&mut raw, |s| s.execute_update()).unwrap();
        assert_eq!(
            log.snapshot(),
            vec![
                DriverEvent::Bound(0, 9_i64.into()),
                DriverEvent::QueryTimeout(3),
                DriverEvent::ExecutedUpdate("update t".into()),
            ]
        );
    }

    #[test]
    fn bind_failure_still_counts_as_the_one_execution() {
        let log = EventLog::default();
        let script = DriverScript {
            fail_bind: true,
            ..DriverScript::default()
        };
        let mut raw = ScriptedStatement::new("update t", script, log.clone());
        let mut stmt = statement("update t");
        stmt.context_mut().binding_mut().set(0, 1_i64.into());

        let err = stmt.execute_with(&mut raw, |s| s.execute_update()).unwrap_err();
        assert!(matches!(err, StatementError::Execution { ref message, .. } if message == "unable to bind argument"));
        assert_eq!(stmt.state(), StatementState::Executing);

        let again = stmt.execute_with(&mut raw, |s| s.execute_update()).unwrap_err();
        assert!(matches!(again, StatementError::Execution { ref message, .. } if message == "statement already executed"));
        assert_eq!(log.count(|e| matches!(e, DriverEvent::ExecutedUpdate(_))), 0);
    }

    #[test]
    fn manual_before_execution_does_not_consume_the_statement() {
        let log = EventLog::default();
        let mut raw = ScriptedStatement::new("update t", DriverScript::default(), log.clone());
        let mut stmt = statement("update t");
        stmt.add_customizer(crate::customizer::FetchSize(2)).unwrap();

        stmt.before_execution(&mut raw).unwrap();
        assert_eq!(stmt.state(), StatementState::Configuring);
        stmt.execute_with(&mut raw, |s| s.execute_update()).unwrap();
        assert_eq!(log.count(|e| matches!(e, DriverEvent::ExecutedUpdate(_))), 1);
    }
}
