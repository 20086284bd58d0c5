use thiserror::Error;

use crate::context::ContextSummary;

/// Failure reported by the driver collaborator.
///
/// The core treats it as opaque: it is passed through untouched except where the
/// customizer pipeline or the execution bracket wraps it with statement context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
    pub sql_state: Option<String>,
}

impl DriverError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql_state: None,
        }
    }

    #[must_use]
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }
}

/// Failure raised by a statement customizer hook.
#[derive(Debug, Error)]
pub enum CustomizerError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum StatementError {
    /// Reserved for config objects whose construction can fail; the registry never raises it.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exception thrown in statement customization [{context}]")]
    Customization {
        #[source]
        source: CustomizerError,
        context: ContextSummary,
        /// Cleanup failure that happened while unwinding this one.
        suppressed: Option<Box<StatementError>>,
    },

    #[error("Cleanup error: {source} ({suppressed} further failure(s) suppressed)")]
    Cleanup {
        #[source]
        source: DriverError,
        suppressed: usize,
    },

    #[error("Unable to execute statement: {message} [{context}]")]
    Execution {
        message: String,
        context: ContextSummary,
        #[source]
        source: Option<DriverError>,
        /// Cleanup failure that happened while unwinding this one.
        suppressed: Option<Box<StatementError>>,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl StatementError {
    /// The statement context attached to this error, when one was captured.
    #[must_use]
    pub fn context(&self) -> Option<&ContextSummary> {
        match self {
            StatementError::Customization { context, .. }
            | StatementError::Execution { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The secondary failure recorded alongside this one, if any.
    #[must_use]
    pub fn suppressed(&self) -> Option<&StatementError> {
        match self {
            StatementError::Customization { suppressed, .. }
            | StatementError::Execution { suppressed, .. } => suppressed.as_deref(),
            _ => None,
        }
    }

    /// Attach `other` as the suppressed failure. Variants without a slot for it keep only
    /// `self` and log `other`.
    #[must_use]
    pub(crate) fn with_suppressed(mut self, other: StatementError) -> Self {
        match self {
            StatementError::Customization {
                ref mut suppressed, ..
            }
            | StatementError::Execution {
                ref mut suppressed, ..
            } => {
                *suppressed = Some(Box::new(other));
                self
            }
            primary => {
                tracing::warn!(error = %primary, suppressed = %other, "dropping suppressed failure");
                primary
            }
        }
    }
}
