//! Error type and severity policy for encode/decode operations

use thiserror::Error;

/// Main error type for codec operations
///
/// The variants follow the error taxonomy of the runtime: a decoder can hit
/// malformed input in a handful of well-defined ways, and the policy below
/// decides which of them abort the operation and which are logged and
/// survived on a best-effort basis.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unbound value: {0}")]
    Unbound(String),

    #[error("Tag mismatch: {0}")]
    TagMismatch(String),

    #[error("Incomplete message: {0}")]
    Incomplete(String),

    #[error("Superfluous data: {0}")]
    Superfluous(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("No {format} codec available for type {type_name}")]
    NoCodec {
        format: &'static str,
        type_name: &'static str,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// A codec path was reached that should be unreachable given prior
    /// validation. Never downgradable to a warning.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Discriminant of [`CodecError`], used as the key of [`ErrorPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unbound,
    TagMismatch,
    Incomplete,
    Superfluous,
    Constraint,
    NoCodec,
    InvalidData,
    InvalidToken,
    Internal,
}

impl CodecError {
    /// Get the taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::Unbound(_) => ErrorKind::Unbound,
            CodecError::TagMismatch(_) => ErrorKind::TagMismatch,
            CodecError::Incomplete(_) => ErrorKind::Incomplete,
            CodecError::Superfluous(_) => ErrorKind::Superfluous,
            CodecError::Constraint(_) => ErrorKind::Constraint,
            CodecError::NoCodec { .. } => ErrorKind::NoCodec,
            CodecError::InvalidData(_) => ErrorKind::InvalidData,
            CodecError::InvalidToken(_) => ErrorKind::InvalidToken,
            CodecError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Severity assigned to an error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Abort the current encode/decode call
    Fatal,
    /// Log the condition and continue on a best-effort basis
    Warning,
}

/// Per-kind severity configuration
///
/// Passed explicitly through decode contexts instead of living in a global
/// table, so two concurrent decodes can run under different policies.
/// `Internal` and `NoCodec` are pinned to `Fatal`: a programming error or a
/// missing codec cannot be survived by skipping bytes.
#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    tag_mismatch: ErrorSeverity,
    incomplete: ErrorSeverity,
    superfluous: ErrorSeverity,
    constraint: ErrorSeverity,
    invalid_data: ErrorSeverity,
    invalid_token: ErrorSeverity,
    unbound: ErrorSeverity,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            tag_mismatch: ErrorSeverity::Fatal,
            incomplete: ErrorSeverity::Fatal,
            superfluous: ErrorSeverity::Fatal,
            constraint: ErrorSeverity::Fatal,
            invalid_data: ErrorSeverity::Fatal,
            invalid_token: ErrorSeverity::Fatal,
            unbound: ErrorSeverity::Fatal,
        }
    }
}

impl ErrorPolicy {
    /// Create a policy with every downgradable kind set to Fatal
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the severity of one error kind
    ///
    /// Requests to downgrade `Internal` or `NoCodec` are ignored.
    pub fn set(&mut self, kind: ErrorKind, severity: ErrorSeverity) -> &mut Self {
        match kind {
            ErrorKind::TagMismatch => self.tag_mismatch = severity,
            ErrorKind::Incomplete => self.incomplete = severity,
            ErrorKind::Superfluous => self.superfluous = severity,
            ErrorKind::Constraint => self.constraint = severity,
            ErrorKind::InvalidData => self.invalid_data = severity,
            ErrorKind::InvalidToken => self.invalid_token = severity,
            ErrorKind::Unbound => self.unbound = severity,
            ErrorKind::Internal | ErrorKind::NoCodec => {}
        }
        self
    }

    /// Get the severity of one error kind
    pub fn severity_of(&self, kind: ErrorKind) -> ErrorSeverity {
        match kind {
            ErrorKind::TagMismatch => self.tag_mismatch,
            ErrorKind::Incomplete => self.incomplete,
            ErrorKind::Superfluous => self.superfluous,
            ErrorKind::Constraint => self.constraint,
            ErrorKind::InvalidData => self.invalid_data,
            ErrorKind::InvalidToken => self.invalid_token,
            ErrorKind::Unbound => self.unbound,
            ErrorKind::Internal | ErrorKind::NoCodec => ErrorSeverity::Fatal,
        }
    }

    /// Dispatch an error through the policy
    ///
    /// Returns `Ok(())` after logging when the kind is configured as a
    /// warning, so the call site can continue with a sentinel value.
    pub fn dispatch(&self, error: CodecError) -> CodecResult<()> {
        match self.severity_of(error.kind()) {
            ErrorSeverity::Fatal => Err(error),
            ErrorSeverity::Warning => {
                log::warn!("recoverable decode error: {}", error);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_fatal() {
        let policy = ErrorPolicy::default();
        assert_eq!(
            policy.severity_of(ErrorKind::TagMismatch),
            ErrorSeverity::Fatal
        );
        assert!(policy
            .dispatch(CodecError::TagMismatch("x".to_string()))
            .is_err());
    }

    #[test]
    fn test_warning_dispatch_continues() {
        let mut policy = ErrorPolicy::new();
        policy.set(ErrorKind::Superfluous, ErrorSeverity::Warning);
        assert!(policy
            .dispatch(CodecError::Superfluous("trailing".to_string()))
            .is_ok());
    }

    #[test]
    fn test_internal_cannot_be_downgraded() {
        let mut policy = ErrorPolicy::new();
        policy.set(ErrorKind::Internal, ErrorSeverity::Warning);
        assert_eq!(
            policy.severity_of(ErrorKind::Internal),
            ErrorSeverity::Fatal
        );
    }
}
