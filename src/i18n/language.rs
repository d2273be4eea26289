//! LanguageCode: validated translation language identifier.
//!
//! A `LanguageCode` can only be obtained from a [`LanguageRegistry`], which
//! hands out codes for the configured languages minus the source language.
//! Holding a `LanguageCode` therefore proves the code is a valid language for
//! a translation row.

use crate::i18n::LanguageRegistry;
use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// Errors raised when resolving a language code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageError {
    #[error("Unknown language code: '{0}'")]
    Unknown(String),

    #[error("Language '{0}' is the source language and cannot be used for a translation")]
    SourceLanguage(String),

    #[error("Source language '{0}' is not one of the configured languages")]
    SourceNotConfigured(String),

    #[error("Duplicate language code: '{0}'")]
    Duplicate(String),
}

/// A validated translation language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    /// Resolve a code against the registry.
    ///
    /// # Arguments
    /// * `code` - The language code (e.g., "es", "de")
    /// * `registry` - The registry holding the configured languages
    ///
    /// # Returns
    /// * `Ok(LanguageCode)` if the code is configured and is not the source language
    /// * `Err(LanguageError)` otherwise
    pub fn parse(code: &str, registry: &LanguageRegistry) -> Result<Self, LanguageError> {
        match registry.get_by_code(code) {
            Some(config) if config.is_source => Err(LanguageError::SourceLanguage(code.into())),
            Some(config) => Ok(LanguageCode(config.code.clone())),
            None => Err(LanguageError::Unknown(code.into())),
        }
    }

    /// Wrap a code read back from storage, where the check constraint on the
    /// language column already guarantees validity.
    pub(crate) fn from_storage(code: String) -> Self {
        LanguageCode(code)
    }

    /// Get the language code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LanguageCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for LanguageCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for LanguageCode {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for LanguageCode {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> LanguageRegistry {
        LanguageRegistry::new(
            vec![
                ("en".to_string(), "English".to_string()),
                ("es".to_string(), "Spanish".to_string()),
                ("de".to_string(), "German".to_string()),
            ],
            "en",
        )
        .expect("Should build registry")
    }

    // ==================== parse Tests ====================

    #[test]
    fn test_parse_translation_language() {
        let language = LanguageCode::parse("es", &registry()).expect("Should succeed");
        assert_eq!(language.as_str(), "es");
        assert_eq!(language, "es");
    }

    #[test]
    fn test_parse_source_language_rejected() {
        let result = LanguageCode::parse("en", &registry());
        assert_eq!(result, Err(LanguageError::SourceLanguage("en".into())));
    }

    #[test]
    fn test_parse_unknown_language() {
        let result = LanguageCode::parse("xx", &registry());
        assert!(result.unwrap_err().to_string().contains("Unknown"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(LanguageCode::parse("", &registry()).is_err());
    }

    // ==================== Trait Tests ====================

    #[test]
    fn test_display_and_serialize() {
        let language = LanguageCode::parse("de", &registry()).unwrap();
        assert_eq!(language.to_string(), "de");
        assert_eq!(serde_json::to_string(&language).unwrap(), "\"de\"");
    }

    #[test]
    fn test_ordering_is_by_code() {
        let registry = registry();
        let de = LanguageCode::parse("de", &registry).unwrap();
        let es = LanguageCode::parse("es", &registry).unwrap();
        assert!(de < es);
    }
}
