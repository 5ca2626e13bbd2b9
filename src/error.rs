//! Error Types
//!
//! One error enum for the whole binding engine. Every fallible operation
//! returns [`Result`]; the copy engine is the only component that may
//! swallow failures (see [`crate::copy::CopyEngine::strict`]).

use crate::core::QName;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T, E = BindError> = std::result::Result<T, E>;

/// Errors raised while reading, writing, buffering or copying
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BindError {
    /// The depth/structure invariant of a token stream was broken
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A builder produced no object or one of its callbacks failed
    #[error("cannot build {type_name} from {element}: {reason}")]
    BuildFailure {
        type_name: &'static str,
        element: String,
        reason: String,
    },

    /// A serializer produced no element or one of its callbacks failed
    #[error("cannot serialize {type_name}: {reason}")]
    SerializeFailure {
        type_name: &'static str,
        reason: String,
    },

    /// Underlying transport failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The token-level parser rejected the input
    #[error("XML syntax error: {0}")]
    Syntax(String),

    /// Input or output could not be represented in the required encoding
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A copy strategy failed while duplicating a graph
    #[error("cannot copy {type_name}: {reason}")]
    CopyFailure {
        type_name: &'static str,
        reason: String,
    },

    /// A registration key was already taken in strict mode
    #[error("duplicate registration for {0}")]
    DuplicateRegistration(String),

    /// An event buffer was modified while an iterator over it was active
    #[error("event buffer was modified during iteration")]
    StaleIterator,
}

impl BindError {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        BindError::ProtocolViolation(msg.into())
    }

    /// Build failure for output type `T` at element `element`
    pub fn build<T: ?Sized>(element: &QName, reason: impl Into<String>) -> Self {
        BindError::BuildFailure {
            type_name: std::any::type_name::<T>(),
            element: element.to_string(),
            reason: reason.into(),
        }
    }

    /// Serialize failure for input type `T`
    pub fn serialize<T: ?Sized>(reason: impl Into<String>) -> Self {
        BindError::SerializeFailure {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }

    /// Copy failure for type `T`
    pub fn copy<T: ?Sized>(reason: impl Into<String>) -> Self {
        BindError::CopyFailure {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }
}

impl From<quick_xml::Error> for BindError {
    fn from(err: quick_xml::Error) -> Self {
        BindError::Syntax(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for BindError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        BindError::Syntax(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_failure_names_type_and_element() {
        let err = BindError::build::<String>(&QName::new("urn:a", "item"), "no object");
        let msg = err.to_string();
        assert!(msg.contains("alloc::string::String"), "{msg}");
        assert!(msg.contains("{urn:a}item"), "{msg}");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::other("disk gone");
        let err: BindError = io.into();
        assert!(matches!(err, BindError::Io(_)));
    }
}
