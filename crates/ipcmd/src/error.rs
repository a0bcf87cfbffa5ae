//! Error types for command parsing and execution.

use std::io;

/// Result type for ip command operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing or executing a command.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A keyword was not understood at the current cursor position.
    #[error(
        "this was fine: '{fine}', and this was left, '{left}', and this was not understood, '{bad}'; only options are '{options}'"
    )]
    Usage {
        /// Tokens consumed before the failure.
        fine: String,
        /// Tokens from the failure onwards.
        left: String,
        /// The token that was not understood.
        bad: String,
        /// The expected-value set at the failure point.
        options: String,
    },

    /// The parser needed another token but none were left.
    #[error("args: {args}, I got to arg {pos}, expected {expected} after that")]
    OutOfTokens {
        /// The whole argument vector.
        args: String,
        /// The position the cursor reached.
        pos: isize,
        /// The expected-value set at the failure point.
        expected: String,
    },

    /// A value was syntactically wrong.
    #[error("{0}")]
    Invalid(String),

    /// A recognised feature that is not implemented.
    #[error("{0}")]
    Unsupported(String),

    /// The gateway failed to execute a well-formed request.
    #[error("{operation}: {source}")]
    Gateway {
        /// Which object and operation failed.
        operation: String,
        /// The underlying gateway error.
        #[source]
        source: GatewayError,
    },

    /// A batch line failed and the batch was not forced.
    #[error("failed to run command '{line}': {source}")]
    BatchLine {
        /// The line as read from the batch file.
        line: String,
        /// Why it failed.
        #[source]
        source: Box<Error>,
    },

    /// I/O error while writing output or reading a batch file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an [`Error::Invalid`] from anything displayable.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Build an [`Error::Unsupported`] from anything displayable.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Wrap a gateway error with the operation that produced it.
    pub fn gateway(operation: impl Into<String>, source: GatewayError) -> Self {
        Self::Gateway {
            operation: operation.into(),
            source,
        }
    }

    /// Check whether this is a grammar error (usage or out of tokens).
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. } | Self::OutOfTokens { .. })
    }
}

/// Errors reported by a [`Gateway`](crate::gateway::Gateway) implementation.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Kernel returned an error code.
    #[error("{message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// A named object does not exist.
    #[error("{kind} {name} not found")]
    NotFound {
        /// Object kind, e.g. "link".
        kind: &'static str,
        /// The name that was looked up.
        name: String,
    },

    /// The gateway does not implement this operation.
    #[error("{0} is not supported by this gateway")]
    NotSupported(String),

    /// Network namespace could not be entered.
    #[error("failed to find network namespace {name:?}: {reason}")]
    Namespace {
        /// Namespace name.
        name: String,
        /// Why it failed.
        reason: String,
    },

    /// A reply could not be decoded.
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GatewayError {
    /// Create a kernel error from a negative errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Check if this error indicates a missing object.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } => matches!(*errno, 2 | 19), // ENOENT, ENODEV
            Self::NotFound { .. } => true,
            _ => false,
        }
    }
}

/// Render a token list the way diagnostics show it: `[a b c]`.
pub fn token_list<S: AsRef<str>>(items: &[S]) -> String {
    let joined: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
    format!("[{}]", joined.join(" "))
}
