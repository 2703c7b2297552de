//! Error types for otter-bridge
//!
//! Every failure that can stop a conversion is a [`BridgeError`]. When a
//! conversion is driven through [`Marshaller::convert`](crate::Marshaller::convert)
//! the error is raised in the script runtime as an error object whose `name`
//! comes from [`BridgeError::script_name`] and whose `message` is the
//! `Display` text below.

use thiserror::Error;

use crate::script::{ExceptionSignal, ScriptContext};

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Structured error types for host-to-script conversion
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A container directly contains itself (element, set member, map key or value)
    #[error("Unable to map objects with circular reference.")]
    CircularReference,

    /// Host value of a runtime type with no conversion rule
    #[error("Cannot convert host type '{0}' to a js value.")]
    UnsupportedType(String),

    /// Non-string key in a string-keyed object
    #[error("Cannot convert host map to js value: only string keys are supported.")]
    NonStringKey,

    /// Named global constructor (`Map`, `Set`) is missing from the script runtime
    #[error("JS constructor '{0}' not found.")]
    ConstructorNotFound(String),

    /// Nesting exceeded the configured depth limit
    #[error("Maximum conversion depth of {0} exceeded.")]
    DepthExceeded(usize),

    /// A host accessor failed
    #[error("{0}")]
    Host(String),

    /// Invalid configuration
    #[error("Invalid bridge configuration: {0}")]
    Config(String),

    /// Malformed host value fixture
    #[error("Invalid host fixture: {0}")]
    Fixture(String),

    /// The script runtime already has an exception pending
    #[error("An exception is already pending in the script runtime")]
    Pending,
}

impl BridgeError {
    /// Create a host accessor error
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a fixture error
    pub fn fixture(message: impl Into<String>) -> Self {
        Self::Fixture(message.into())
    }

    /// Name of the script error object raised for this failure
    pub fn script_name(&self) -> &'static str {
        match self {
            Self::CircularReference => "CircularReferenceError",
            Self::UnsupportedType(_) | Self::NonStringKey | Self::ConstructorNotFound(_) => {
                "TypeMappingError"
            }
            Self::DepthExceeded(_) => "RangeError",
            Self::Host(_) | Self::Config(_) | Self::Fixture(_) | Self::Pending => "InternalError",
        }
    }

    /// Returns `true` if the error only reports an exception that is already pending
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Raise this error in the script runtime.
    ///
    /// `Pending` raises nothing: the runtime already holds the exception and a
    /// second throw would replace it.
    pub fn raise<C: ScriptContext + ?Sized>(&self, ctx: &C) -> ExceptionSignal {
        if self.is_pending() {
            return ExceptionSignal;
        }

        let error = ctx.new_error();
        // The throw replaces any exception left by a failed write
        let _ = ctx.set_property(&error, "name", ctx.string(self.script_name()));
        let _ = ctx.set_property(&error, "message", ctx.string(&self.to_string()));
        ctx.throw(error);
        ExceptionSignal
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Fixture(e.to_string())
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_names() {
        assert_eq!(
            BridgeError::CircularReference.script_name(),
            "CircularReferenceError"
        );
        assert_eq!(BridgeError::NonStringKey.script_name(), "TypeMappingError");
        assert_eq!(
            BridgeError::UnsupportedType("java.lang.Thread".into()).script_name(),
            "TypeMappingError"
        );
        assert_eq!(BridgeError::DepthExceeded(8).script_name(), "RangeError");
        assert_eq!(BridgeError::host("boom").script_name(), "InternalError");
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            BridgeError::UnsupportedType("java.lang.Thread".into()).to_string(),
            "Cannot convert host type 'java.lang.Thread' to a js value."
        );
        assert!(
            BridgeError::NonStringKey
                .to_string()
                .contains("only string keys are supported")
        );
        assert_eq!(
            BridgeError::ConstructorNotFound("Map".into()).to_string(),
            "JS constructor 'Map' not found."
        );
    }
}
