//! Error types.
//!
//! Very little in this crate can fail. Builder-level validation produces an
//! [`Error`] which is logged and dropped; only configuration loading and
//! frame scheduler construction hand errors back to the caller.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A class name would corrupt the serialized class list.
    #[error("class name {name:?} contains whitespace")]
    InvalidClassName { name: String },

    #[error("attribute key is empty")]
    EmptyAttributeKey,

    #[error("value for attribute {key:?} is empty")]
    EmptyAttributeValue { key: String },

    /// The configuration document could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A tokio-backed frame scheduler needs a runtime to spawn onto.
    #[error("no tokio runtime is available to schedule frames on")]
    NoAsyncRuntime,
}

/// Reject class names that contain whitespace.
pub fn validate_class_name(name: &str) -> Result<()> {
    if name.chars().any(char::is_whitespace) {
        return Err(Error::InvalidClassName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Reject empty keys and values for attributes and styles.
pub fn validate_attribute(key: &str, value: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::EmptyAttributeKey);
    }
    if value.is_empty() {
        return Err(Error::EmptyAttributeValue {
            key: key.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names_with_whitespace_are_rejected() {
        assert!(validate_class_name("btn").is_ok());
        assert!(validate_class_name("btn-primary").is_ok());
        assert!(matches!(
            validate_class_name("btn primary"),
            Err(Error::InvalidClassName { .. })
        ));
        assert!(validate_class_name("tab\there").is_err());
    }

    #[test]
    fn empty_attribute_parts_are_rejected() {
        assert!(validate_attribute("href", "/").is_ok());
        assert!(matches!(
            validate_attribute("", "x"),
            Err(Error::EmptyAttributeKey)
        ));
        assert!(matches!(
            validate_attribute("href", ""),
            Err(Error::EmptyAttributeValue { .. })
        ));
    }

    #[test]
    fn error_messages_name_the_offender() {
        let err = validate_class_name("a b").unwrap_err();
        assert_eq!(err.to_string(), "class name \"a b\" contains whitespace");
    }
}
