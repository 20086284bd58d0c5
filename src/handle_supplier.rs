//! Scoped access to a shared [`Handle`] for nested and extension calls.
//!
//! [`HandleSupplier::with_config`] overlays a different registry on the handle for the
//! duration of one task and puts the previous registry back afterwards, whether the task
//! returns, fails or panics.

use std::sync::Arc;

use crate::config::ConfigRegistry;
use crate::context::ExtensionMethod;
use crate::handle::Handle;

pub trait HandleSupplier {
    fn handle(&self) -> &Handle;

    fn config(&self) -> Arc<ConfigRegistry> {
        self.handle().config()
    }

    /// Run `task` with `config` active on the handle, then restore the previous registry.
    fn with_config<R>(&self, config: Arc<ConfigRegistry>, task: impl FnOnce(&Handle) -> R) -> R {
        let handle = self.handle();
        let _restore = ConfigOverride::install(handle, config);
        task(handle)
    }

    /// Run `task` with `method` as the handle's extension method, then restore the previous
    /// marker.
    fn with_extension_method<R>(
        &self,
        method: Option<ExtensionMethod>,
        task: impl FnOnce(&Handle) -> R,
    ) -> R {
        let handle = self.handle();
        let _restore = ExtensionMethodOverride::install(handle, method);
        task(handle)
    }

    fn extension_method(&self) -> Option<ExtensionMethod> {
        self.handle().extension_method()
    }

    fn set_extension_method(&self, method: Option<ExtensionMethod>) {
        self.handle().set_extension_method(method);
    }
}

/// Supplier that always hands out the same handle.
#[derive(Debug, Clone)]
pub struct ConstantHandleSupplier {
    handle: Arc<Handle>,
}

impl ConstantHandleSupplier {
    #[must_use]
    pub fn of(handle: Arc<Handle>) -> Self {
        Self { handle }
    }
}

impl HandleSupplier for ConstantHandleSupplier {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Restores a handle's previous registry when dropped.
#[must_use = "the previous registry is restored as soon as the guard is dropped"]
pub struct ConfigOverride<'h> {
    handle: &'h Handle,
    previous: Option<Arc<ConfigRegistry>>,
}

impl<'h> ConfigOverride<'h> {
    pub fn install(handle: &'h Handle, config: Arc<ConfigRegistry>) -> Self {
        let previous = handle.set_config(config);
        Self {
            handle,
            previous: Some(previous),
        }
    }
}

impl Drop for ConfigOverride<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.handle.set_config(previous);
        }
    }
}

/// Restores a handle's previous extension-method marker when dropped.
#[must_use = "the previous extension method is restored as soon as the guard is dropped"]
pub struct ExtensionMethodOverride<'h> {
    handle: &'h Handle,
    previous: Option<Option<ExtensionMethod>>,
}

impl<'h> ExtensionMethodOverride<'h> {
    pub fn install(handle: &'h Handle, method: Option<ExtensionMethod>) -> Self {
        let previous = handle.set_extension_method(method);
        Self {
            handle,
            previous: Some(previous),
        }
    }
}

impl Drop for ExtensionMethodOverride<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.handle.set_extension_method(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{DriverScript, ScriptedConnection};

    fn supplier() -> ConstantHandleSupplier {
        ConstantHandleSupplier::of(Arc::new(Handle::new(
            Box::new(ScriptedConnection::new(DriverScript::default())),
            Arc::new(ConfigRegistry::new()),
        )))
    }

    #[test]
    fn guard_restores_on_drop() {
        let supplier = supplier();
        let original = supplier.config();
        {
            let _guard = ConfigOverride::install(supplier.handle(), Arc::new(ConfigRegistry::new()));
            assert!(!Arc::ptr_eq(&supplier.config(), &original));
        }
        assert!(Arc::ptr_eq(&supplier.config(), &original));
    }

    #[test]
    fn nested_overrides_unwind_in_order() {
        let supplier = supplier();
        let outer = supplier.config();
        let first = Arc::new(ConfigRegistry::new());
        let second = Arc::new(ConfigRegistry::new());

        supplier.with_config(Arc::clone(&first), |_| {
            supplier.with_config(Arc::clone(&second), |h| {
                assert!(Arc::ptr_eq(&h.config(), &second));
            });
            assert!(Arc::ptr_eq(&supplier.config(), &first));
        });
        assert!(Arc::ptr_eq(&supplier.config(), &outer));
    }

    #[test]
    fn extension_method_is_scoped() {
        let supplier = supplier();
        supplier.set_extension_method(Some(ExtensionMethod::new("Outer", "run")));
        let seen = supplier.with_extension_method(Some(ExtensionMethod::new("Inner", "run")), |h| {
            h.extension_method()
        });
        assert_eq!(seen, Some(ExtensionMethod::new("Inner", "run")));
        assert_eq!(
            supplier.extension_method(),
            Some(ExtensionMethod::new("Outer", "run"))
        );
    }
}
