use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The call could not be dispatched: the tool is unknown, or the
    /// arguments are malformed.
    ToolInvocation,
    /// The store rejected the query or failed to run it.
    QueryExecution,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ToolInvocation => write!(f, "ToolInvocationError"),
            ErrorKind::QueryExecution => write!(f, "QueryExecutionError"),
        }
    }
}

/// Describes a tool call error.
///
/// Tool call errors never end a run. They are rendered into the tool result
/// and shown to the planner.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    /// Creates an error for a call to a tool that is not registered.
    #[inline]
    pub fn unknown_tool(name: &str) -> Self {
        Self::tool_invocation().with_reason(format!("unknown tool `{name}`"))
    }

    /// Creates a new error with the `ToolInvocation` kind.
    #[inline]
    pub fn tool_invocation() -> Self {
        Self {
            kind: ErrorKind::ToolInvocation,
            reason: None,
        }
    }

    /// Creates a new error with the `QueryExecution` kind.
    #[inline]
    pub fn query_execution() -> Self {
        Self {
            kind: ErrorKind::QueryExecution,
            reason: None,
        }
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Borrowed(match self.kind {
                ErrorKind::ToolInvocation => "tool invocation failed",
                ErrorKind::QueryExecution => "query execution failed",
            }),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason())
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_display() {
        let err = Error::unknown_tool("read_file");
        assert_eq!(err.kind(), ErrorKind::ToolInvocation);
        assert_eq!(
            err.to_string(),
            "ToolInvocationError: unknown tool `read_file`"
        );

        let err = Error::tool_invocation();
        assert_eq!(err.kind(), ErrorKind::ToolInvocation);
        assert_eq!(err.reason(), "tool invocation failed");

        let err = Error::query_execution().with_reason("no such table: x");
        assert_eq!(err.kind(), ErrorKind::QueryExecution);
        assert_eq!(err.to_string(), "QueryExecutionError: no such table: x");
    }
}
