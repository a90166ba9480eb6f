use std::error::Error;
use std::fmt::{self, Display};

use grounded_agent_model::ModelProviderError;
use grounded_agent_store::StoreError;

use crate::conversation::Conversation;

/// The kind of a [`ConfigurationError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigurationErrorKind {
    /// No schema was provided, or the schema is unreadable or empty.
    MissingSchema,
    /// No store was provided.
    MissingStore,
    /// The store could not be reached while starting up.
    StoreUnavailable,
}

impl Display for ConfigurationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationErrorKind::MissingSchema => {
                write!(f, "Missing schema")
            }
            ConfigurationErrorKind::MissingStore => {
                write!(f, "Missing store")
            }
            ConfigurationErrorKind::StoreUnavailable => {
                write!(f, "Store unavailable")
            }
        }
    }
}

/// An error raised while building an agent, before any run starts.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConfigurationError {
    kind: ConfigurationErrorKind,
    reason: String,
}

impl ConfigurationError {
    /// Creates a new error.
    #[inline]
    pub fn new<S: Into<String>>(
        kind: ConfigurationErrorKind,
        reason: S,
    ) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ConfigurationErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigurationError: {}: {}", self.kind, self.reason)
    }
}

impl Error for ConfigurationError {}

/// An error that ends an agent run without an answer.
///
/// Tool failures are not run errors. They are reported back to the planner
/// as tool results so it can correct itself.
#[derive(Debug)]
pub enum RunError {
    /// The planner kept requesting tools after the step limit was reached.
    StepLimitExceeded {
        /// The number of planning steps taken, including the aborted one.
        steps: usize,
        /// The conversation up to the last completed tool results.
        conversation: Conversation,
    },
    /// The planner failed, and retrying did not help.
    Model(Box<dyn ModelProviderError>),
    /// The store session for this run could not be opened.
    Store(Box<dyn StoreError>),
}

impl Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::StepLimitExceeded { steps, .. } => write!(
                f,
                "StepLimitExceeded: planner still requested tools after \
                 {steps} steps"
            ),
            RunError::Model(err) => write!(f, "Planner failed: {err}"),
            RunError::Store(err) => write!(f, "Store failed: {err}"),
        }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunError::StepLimitExceeded { .. } => None,
            RunError::Model(err) => Some(err.as_ref()),
            RunError::Store(err) => Some(err.as_ref()),
        }
    }
}
