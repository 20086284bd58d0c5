//! Hooks run immediately before and after the driver call.
//!
//! Unlike the cleanup ledger, the pipeline is fail-fast: the first hook that fails ends the
//! pass and its error is wrapped with the statement context.

use std::fmt;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::driver::RawStatement;
use crate::error::{CustomizerError, StatementError};

pub trait StatementCustomizer: Send + Sync {
    /// # Errors
    /// Returns `CustomizerError` to abort execution.
    fn before_execution(
        &self,
        _stmt: &mut dyn RawStatement,
        _ctx: &ExecutionContext,
    ) -> Result<(), CustomizerError> {
        Ok(())
    }

    /// # Errors
    /// Returns `CustomizerError` to fail the statement after the driver call.
    fn after_execution(
        &self,
        _stmt: &mut dyn RawStatement,
        _ctx: &ExecutionContext,
    ) -> Result<(), CustomizerError> {
        Ok(())
    }
}

/// Sets the driver query timeout, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTimeout(pub u32);

impl StatementCustomizer for QueryTimeout {
    fn before_execution(
        &self,
        stmt: &mut dyn RawStatement,
        _ctx: &ExecutionContext,
    ) -> Result<(), CustomizerError> {
        stmt.set_query_timeout(self.0)?;
        Ok(())
    }
}

/// Sets the driver fetch size hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSize(pub u32);

impl StatementCustomizer for FetchSize {
    fn before_execution(
        &self,
        stmt: &mut dyn RawStatement,
        _ctx: &ExecutionContext,
    ) -> Result<(), CustomizerError> {
        stmt.set_fetch_size(self.0)?;
        Ok(())
    }
}

/// Caps the number of rows the driver returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxRows(pub u64);

impl StatementCustomizer for MaxRows {
    fn before_execution(
        &self,
        stmt: &mut dyn RawStatement,
        _ctx: &ExecutionContext,
    ) -> Result<(), CustomizerError> {
        stmt.set_max_rows(self.0)?;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct CustomizerPipeline {
    customizers: Vec<Arc<dyn StatementCustomizer>>,
}

impl CustomizerPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, customizer: impl StatementCustomizer + 'static) {
        self.customizers.push(Arc::new(customizer));
    }

    pub fn add_shared(&mut self, customizer: Arc<dyn StatementCustomizer>) {
        self.customizers.push(customizer);
    }

    pub fn extend(&mut self, customizers: impl IntoIterator<Item = Arc<dyn StatementCustomizer>>) {
        self.customizers.extend(customizers);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.customizers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.customizers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn StatementCustomizer>> {
        self.customizers.iter()
    }

    /// Run every before-hook in insertion order, stopping at the first failure.
    ///
    /// # Errors
    /// Returns `StatementError::Customization` wrapping the failing hook's error.
    pub fn before_execution(
        &self,
        stmt: &mut dyn RawStatement,
        ctx: &ExecutionContext,
    ) -> Result<(), StatementError> {
        for customizer in &self.customizers {
            customizer
                .before_execution(stmt, ctx)
                .map_err(|source| customization_failed(source, ctx))?;
        }
        Ok(())
    }

    /// Run every after-hook in insertion order, stopping at the first failure.
    ///
    /// # Errors
    /// Returns `StatementError::Customization` wrapping the failing hook's error.
    pub fn after_execution(
        &self,
        stmt: &mut dyn RawStatement,
        ctx: &ExecutionContext,
    ) -> Result<(), StatementError> {
        for customizer in &self.customizers {
            customizer
                .after_execution(stmt, ctx)
                .map_err(|source| customization_failed(source, ctx))?;
        }
        Ok(())
    }
}

fn customization_failed(source: CustomizerError, ctx: &ExecutionContext) -> StatementError {
    tracing::debug!(error = %source, "statement customizer failed");
    StatementError::Customization {
        source,
        context: ctx.summary(),
        suppressed: None,
    }
}

impl fmt::Debug for CustomizerPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomizerPipeline")
            .field("len", &self.customizers.len())
            .finish()
    }
}
