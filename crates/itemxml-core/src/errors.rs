//! Error types for the itemxml core library.

use crate::models::ItemId;

/// Top-level error enum for the itemxml core library.
#[derive(Debug, thiserror::Error)]
pub enum ItemXmlError {
    #[error("Item declared with neither class-name nor set of interfaces")]
    NoType,

    #[error("'{0}' is not a class in this model")]
    UnknownClass(String),

    #[error("Could not find field {field} in [{classes}]")]
    UnknownField { field: String, classes: String },

    #[error("This value ({value}) is not suitable for this field ({field})")]
    PropertyMismatch { value: String, field: String },

    #[error("no value supplied for {0}")]
    EmptyValue(String),

    #[error("value of {field} contains U+{codepoint:04X}, which XML 1.0 cannot represent")]
    InvalidXmlChar { field: String, codepoint: u32 },

    #[error("No item with id {0}")]
    NotFound(ItemId),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Writer error: {0}")]
    WriterState(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Payload-free classification of [`ItemXmlError`], for callers that branch
/// on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoType,
    UnknownClass,
    UnknownField,
    PropertyMismatch,
    EmptyValue,
    InvalidXmlChar,
    NotFound,
    Schema,
    WriterState,
    Io,
    Json,
    Xml,
}

impl ItemXmlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ItemXmlError::NoType => ErrorKind::NoType,
            ItemXmlError::UnknownClass(_) => ErrorKind::UnknownClass,
            ItemXmlError::UnknownField { .. } => ErrorKind::UnknownField,
            ItemXmlError::PropertyMismatch { .. } => ErrorKind::PropertyMismatch,
            ItemXmlError::EmptyValue(_) => ErrorKind::EmptyValue,
            ItemXmlError::InvalidXmlChar { .. } => ErrorKind::InvalidXmlChar,
            ItemXmlError::NotFound(_) => ErrorKind::NotFound,
            ItemXmlError::Schema(_) => ErrorKind::Schema,
            ItemXmlError::WriterState(_) => ErrorKind::WriterState,
            ItemXmlError::Io(_) => ErrorKind::Io,
            ItemXmlError::Json(_) => ErrorKind::Json,
            ItemXmlError::Xml(_) => ErrorKind::Xml,
        }
    }

    /// True for the failures raised while checking an item against its schema.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NoType
                | ErrorKind::UnknownClass
                | ErrorKind::UnknownField
                | ErrorKind::PropertyMismatch
        )
    }
}

pub type ItemXmlResult<T> = Result<T, ItemXmlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = ItemXmlError::UnknownClass("Foo".to_string());
        assert_eq!(err.to_string(), "'Foo' is not a class in this model");

        let err = ItemXmlError::EmptyValue("name".to_string());
        assert_eq!(err.to_string(), "no value supplied for name");

        let err = ItemXmlError::InvalidXmlChar {
            field: "name".to_string(),
            codepoint: 1,
        };
        assert_eq!(
            err.to_string(),
            "value of name contains U+0001, which XML 1.0 cannot represent"
        );
        assert!(!err.is_validation());
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(ItemXmlError::NoType.kind(), ErrorKind::NoType);
        assert!(ItemXmlError::NoType.is_validation());
        assert!(!ItemXmlError::EmptyValue("x".into()).is_validation());

        let io = ItemXmlError::from(std::io::Error::other("boom"));
        assert_eq!(io.kind(), ErrorKind::Io);
    }
}
