//! Convenient imports for common functionality.

pub use crate::cleanup::{
    Cleanable, CleanupLedger, SharedCursor, SharedStatement, cleanable_for_cursor,
    cleanable_for_statement,
};
pub use crate::config::{
    Config, ConfigObject, ConfigRegistry, Configurable, SqlLocator, SqlObjectConfig,
    SqlStatements, StaticSqlLocator,
};
pub use crate::context::{ContextSummary, ExecutionContext, ExtensionMethod};
pub use crate::customizer::{
    CustomizerPipeline, FetchSize, MaxRows, QueryTimeout, StatementCustomizer,
};
pub use crate::driver::{Connection, RawCursor, RawStatement};
pub use crate::error::{CustomizerError, DriverError, StatementError};
pub use crate::handle::Handle;
pub use crate::handle_supplier::{
    ConfigOverride, ConstantHandleSupplier, ExtensionMethodOverride, HandleSupplier,
};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::statement::{BaseStatement, Query, StatementState, Update};
pub use crate::types::{Binding, RowValues};
