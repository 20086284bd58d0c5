use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{ConfigRegistry, Configurable, SqlObjectConfig};
use crate::context::{ExecutionContext, ExtensionMethod};
use crate::driver::Connection;
use crate::statement::{Query, Update};

/// Logical session over one physical connection.
///
/// The active registry and extension-method marker can be swapped while the handle is
/// shared; statements snapshot both when they are created.
pub struct Handle {
    connection: Box<dyn Connection>,
    config: Mutex<Arc<ConfigRegistry>>,
    extension_method: Mutex<Option<ExtensionMethod>>,
}

impl Handle {
    #[must_use]
    pub fn new(connection: Box<dyn Connection>, config: Arc<ConfigRegistry>) -> Self {
        Self {
            connection,
            config: Mutex::new(config),
            extension_method: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> Arc<ConfigRegistry> {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the active registry, returning the previous one.
    pub fn set_config(&self, config: Arc<ConfigRegistry>) -> Arc<ConfigRegistry> {
        let mut current = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, config)
    }

    #[must_use]
    pub fn extension_method(&self) -> Option<ExtensionMethod> {
        self.extension_method
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the extension-method marker, returning the previous one.
    pub fn set_extension_method(&self, method: Option<ExtensionMethod>) -> Option<ExtensionMethod> {
        let mut current = self
            .extension_method
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, method)
    }

    /// SQL for the current extension method, resolved through [`SqlObjectConfig`].
    #[must_use]
    pub fn locate_sql(&self) -> Option<String> {
        let method = self.extension_method()?;
        self.config().get::<SqlObjectConfig>().read().locate(&method)
    }

    #[must_use]
    pub fn create_update(&self, sql: &str) -> Update<'_> {
        Update::new(self, sql, self.new_context(sql))
    }

    #[must_use]
    pub fn create_query(&self, sql: &str) -> Query<'_> {
        Query::new(self, sql, self.new_context(sql))
    }

    fn new_context(&self, sql: &str) -> ExecutionContext {
        ExecutionContext::new(self.config())
            .with_raw_sql(sql)
            .with_extension_method(self.extension_method())
    }
}

impl Configurable for Handle {
    fn config_registry(&self) -> Arc<ConfigRegistry> {
        self.config()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("config", &self.config())
            .field("extension_method", &self.extension_method())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SqlStatements, StaticSqlLocator};
    use crate::test_utils::{DriverScript, ScriptedConnection};

    fn handle() -> Handle {
        Handle::new(
            Box::new(ScriptedConnection::new(DriverScript::default())),
            Arc::new(ConfigRegistry::new()),
        )
    }

    #[test]
    fn set_config_returns_previous() {
        let handle = handle();
        let original = handle.config();
        let replacement = Arc::new(ConfigRegistry::new());
        let previous = handle.set_config(Arc::clone(&replacement));
        assert!(Arc::ptr_eq(&previous, &original));
        assert!(Arc::ptr_eq(&handle.config(), &replacement));
    }

    #[test]
    fn statements_snapshot_handle_state() {
        let handle = handle();
        handle.set_extension_method(Some(ExtensionMethod::new("Dao", "list")));
        let query = handle.create_query("select 1");
        assert_eq!(
            query.context().extension_method(),
            Some(&ExtensionMethod::new("Dao", "list"))
        );
        assert!(Arc::ptr_eq(query.context().config(), &handle.config()));
        handle.set_extension_method(None);
        assert!(query.context().extension_method().is_some());
    }

    #[test]
    fn configure_mutates_shared_registry() {
        let handle = handle();
        handle.configure::<SqlStatements, _>(|s| s.set_query_timeout(Some(4)));
        let update = handle.create_update("delete from t");
        assert_eq!(
            update.get_config::<SqlStatements>().read().query_timeout(),
            Some(4)
        );
        assert_eq!(update.context().raw_sql(), Some("delete from t"));
    }

    #[test]
    fn locate_sql_uses_current_method_and_config() {
        let handle = handle();
        assert_eq!(handle.locate_sql(), None);
        handle.configure::<SqlObjectConfig, _>(|c| {
            c.set_sql_locator(Arc::new(
                StaticSqlLocator::new().with_sql("Dao", "count", "select count(*) from t"),
            ));
        });
        handle.set_extension_method(Some(ExtensionMethod::new("Dao", "count")));
        assert_eq!(handle.locate_sql().as_deref(), Some("select count(*) from t"));
    }
}
