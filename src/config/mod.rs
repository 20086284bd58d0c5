//! Type-keyed configuration registry.
//!
//! A [`ConfigRegistry`] holds at most one instance of each [`ConfigObject`] type. Instances
//! are created lazily from `Default` on first lookup and then cached, so repeated lookups on
//! the same registry hand back the same shared slot. [`ConfigRegistry::fork`] produces an
//! independent registry in which every materialized object has been replaced by its own
//! [`ConfigObject::create_copy`].
//!
//! ```rust
//! use sql_statement_core::prelude::*;
//!
//! let parent = ConfigRegistry::new();
//! parent.get::<SqlStatements>().update(|s| s.set_query_timeout(Some(5)));
//!
//! let child = parent.fork();
//! child.get::<SqlStatements>().update(|s| s.set_query_timeout(Some(30)));
//!
//! assert_eq!(parent.get::<SqlStatements>().read().query_timeout(), Some(5));
//! assert_eq!(child.get::<SqlStatements>().read().query_timeout(), Some(30));
//! ```

mod builtin;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use builtin::{SqlLocator, SqlObjectConfig, SqlStatements, StaticSqlLocator};

/// A configuration value stored in a [`ConfigRegistry`], keyed by its own type.
///
/// `create_copy` decides how deep a fork goes for this type: whatever it returns must not
/// share mutable state with `self`.
pub trait ConfigObject: Default + Send + Sync + 'static {
    #[must_use]
    fn create_copy(&self) -> Self;
}

/// Shared handle to one configuration instance inside a registry.
///
/// Clones of a `Config` point at the same instance; use [`Config::same_instance`] to compare
/// identity.
pub struct Config<C> {
    inner: Arc<RwLock<C>>,
}

impl<C: ConfigObject> Config<C> {
    fn new(value: C) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, C> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, C> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the instance in place and return whatever the closure returns.
    pub fn update<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.write())
    }

    #[must_use]
    pub fn snapshot(&self) -> C
    where
        C: Clone,
    {
        self.read().clone()
    }

    #[must_use]
    pub fn same_instance(&self, other: &Config<C>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C> Clone for Config<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: ConfigObject + fmt::Debug> fmt::Debug for Config<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Config").field(&*self.read()).finish()
    }
}

/// Object-safe view of a `Config<C>` so slots of different types share one map.
trait ErasedConfig: Send + Sync {
    fn fork(&self) -> Box<dyn ErasedConfig>;
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<C: ConfigObject> ErasedConfig for Config<C> {
    fn fork(&self) -> Box<dyn ErasedConfig> {
        let copy = self.read().create_copy();
        Box::new(Config::new(copy))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }
}

#[derive(Default)]
pub struct ConfigRegistry {
    configs: Mutex<HashMap<TypeId, Box<dyn ErasedConfig>>>,
}

impl ConfigRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the instance of `C`, creating and caching a default on first access.
    #[must_use]
    pub fn get<C: ConfigObject>(&self) -> Config<C> {
        let mut configs = self.configs.lock().unwrap_or_else(PoisonError::into_inner);
        let key = TypeId::of::<C>();
        if let Some(existing) = configs
            .get(&key)
            .and_then(|slot| slot.as_any().downcast_ref::<Config<C>>())
        {
            return existing.clone();
        }
        tracing::trace!(config = std::any::type_name::<C>(), "materializing default config");
        let slot = Config::new(C::default());
        configs.insert(key, Box::new(slot.clone()));
        slot
    }

    /// Whether an instance of `C` has been materialized in this registry.
    #[must_use]
    pub fn contains<C: ConfigObject>(&self) -> bool {
        self.configs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<C>())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.configs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create an independent registry. Materialized objects are copied with
    /// `create_copy`; types never looked up here stay lazy in the fork too.
    #[must_use]
    pub fn fork(&self) -> ConfigRegistry {
        let configs = self.configs.lock().unwrap_or_else(PoisonError::into_inner);
        let forked = configs
            .iter()
            .map(|(key, slot)| (*key, slot.fork()))
            .collect();
        ConfigRegistry {
            configs: Mutex::new(forked),
        }
    }
}

impl fmt::Debug for ConfigRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let configs = self.configs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&str> = configs.values().map(|slot| slot.type_name()).collect();
        names.sort_unstable();
        f.debug_struct("ConfigRegistry")
            .field("configs", &names)
            .finish()
    }
}

/// Anything that carries a configuration registry.
pub trait Configurable {
    fn config_registry(&self) -> Arc<ConfigRegistry>;

    fn get_config<C: ConfigObject>(&self) -> Config<C> {
        self.config_registry().get::<C>()
    }

    fn configure<C: ConfigObject, R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        self.get_config::<C>().update(f)
    }
}
