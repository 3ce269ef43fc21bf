//! Field-level validation errors.
//!
//! Serialized as a flat JSON object of field name to messages, e.g.
//! `{"items": ["Cart is empty."]}`. Nested inputs use dotted keys such as
//! `address.zip_code`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Message used for missing required fields.
pub const REQUIRED: &str = "This field is required.";

/// Accumulated validation failures keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single error on one field.
    #[must_use]
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record an error against `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Fold `other` in, prefixing its keys with `prefix.`.
    pub fn extend_prefixed(&mut self, prefix: &str, other: Self) {
        for (field, messages) in other.0 {
            self.0
                .entry(format!("{prefix}.{field}"))
                .or_default()
                .extend(messages);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(f, "{field}: {message}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_field_map() {
        let mut errors = ValidationErrors::field("items", "Cart is empty.");
        errors.add("items", "Second.");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"items": ["Cart is empty.", "Second."]}));
    }

    #[test]
    fn test_extend_prefixed() {
        let mut errors = ValidationErrors::new();
        errors.extend_prefixed("address", ValidationErrors::field("city", REQUIRED));
        assert_eq!(errors.get("address.city").unwrap(), [REQUIRED]);
        assert_eq!(errors.to_string(), "address.city: This field is required.");
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());
        assert!(ValidationErrors::field("a", "b").into_result().is_err());
    }
}
