use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::ConfigObject;
use crate::context::ExtensionMethod;
use crate::error::StatementError;

/// Statement-level settings shared by every statement created under a registry.
///
/// Can be loaded from JSON:
/// ```rust
/// use sql_statement_core::prelude::*;
///
/// let cfg = SqlStatements::from_json(r#"{"attributes": {"schema": "app"}, "query_timeout": 10}"#)?;
/// assert_eq!(cfg.query_timeout(), Some(10));
/// assert_eq!(cfg.attribute("schema"), Some(&serde_json::json!("app")));
/// # Ok::<(), StatementError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlStatements {
    attributes: Map<String, JsonValue>,
    query_timeout: Option<u32>,
}

impl SqlStatements {
    /// Parse settings from a JSON document.
    ///
    /// # Errors
    /// Returns `StatementError::Config` if the document is not valid for this type.
    pub fn from_json(json: &str) -> Result<Self, StatementError> {
        serde_json::from_str(json)
            .map_err(|e| StatementError::Config(format!("invalid SqlStatements config: {e}")))
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.define(key, value);
        self
    }

    #[must_use]
    pub fn with_query_timeout(mut self, seconds: Option<u32>) -> Self {
        self.query_timeout = seconds;
        self
    }

    /// Define (or replace) an attribute visible to every statement context.
    pub fn define(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&JsonValue> {
        self.attributes.get(key)
    }

    #[must_use]
    pub fn attributes(&self) -> &Map<String, JsonValue> {
        &self.attributes
    }

    pub fn set_query_timeout(&mut self, seconds: Option<u32>) {
        self.query_timeout = seconds;
    }

    #[must_use]
    pub fn query_timeout(&self) -> Option<u32> {
        self.query_timeout
    }
}

impl ConfigObject for SqlStatements {
    fn create_copy(&self) -> Self {
        self.clone()
    }
}

/// Resolves the SQL text for an extension method.
pub trait SqlLocator: fmt::Debug + Send + Sync {
    fn locate(&self, method: &ExtensionMethod) -> Option<String>;
}

/// Locator backed by a fixed table built up front.
#[derive(Debug, Clone, Default)]
pub struct StaticSqlLocator {
    entries: HashMap<(String, String), String>,
}

impl StaticSqlLocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sql(
        mut self,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        self.entries
            .insert((type_name.into(), method_name.into()), sql.into());
        self
    }
}

impl SqlLocator for StaticSqlLocator {
    fn locate(&self, method: &ExtensionMethod) -> Option<String> {
        self.entries
            .get(&(method.type_name.clone(), method.method_name.clone()))
            .cloned()
    }
}

/// Settings for extension objects that bind methods to SQL.
#[derive(Debug, Clone)]
pub struct SqlObjectConfig {
    sql_locator: Arc<dyn SqlLocator>,
}

impl Default for SqlObjectConfig {
    fn default() -> Self {
        Self {
            sql_locator: Arc::new(StaticSqlLocator::default()),
        }
    }
}

impl SqlObjectConfig {
    #[must_use]
    pub fn sql_locator(&self) -> &Arc<dyn SqlLocator> {
        &self.sql_locator
    }

    pub fn set_sql_locator(&mut self, locator: Arc<dyn SqlLocator>) {
        self.sql_locator = locator;
    }

    #[must_use]
    pub fn locate(&self, method: &ExtensionMethod) -> Option<String> {
        self.sql_locator.locate(method)
    }
}

impl ConfigObject for SqlObjectConfig {
    // Locators are immutable once installed, so the fork shares the same one.
    fn create_copy(&self) -> Self {
        Self {
            sql_locator: Arc::clone(&self.sql_locator),
        }
    }
}
