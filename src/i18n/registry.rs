//! Language registry: single source of truth for configured languages.
//!
//! The registry holds every configured language, marks exactly one of them as
//! the source language, and derives the "allowed translation languages" from
//! the rest. A process-wide instance is available through
//! [`LanguageRegistry::get`], initialized from the environment on first use.

use crate::config::Settings;
use crate::i18n::{LanguageCode, LanguageError};
use serde::Serialize;
use std::sync::OnceLock;
use tracing::warn;

/// Configuration for a configured language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageConfig {
    /// Language code (e.g., "en", "es", "pt-br")
    pub code: String,

    /// Display label (e.g., "English", "Spanish")
    pub label: String,

    /// Whether this is the source language (exactly one is)
    pub is_source: bool,
}

/// One member of the allowed translation language enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageChoice {
    /// Member name: the code upper-cased with `-` replaced by `_` (e.g., "PT_BR")
    pub name: String,

    /// Stored value: the language code
    pub value: String,

    /// Human-readable label
    pub label: String,
}

/// Registry of configured languages.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Build a registry from `(code, label)` pairs and the source language code.
    ///
    /// # Returns
    /// * `Err(LanguageError::SourceNotConfigured)` if the source language is not listed
    /// * `Err(LanguageError::Duplicate)` if a code is listed twice
    pub fn new(languages: Vec<(String, String)>, source_language: &str) -> Result<Self, LanguageError> {
        let mut configs: Vec<LanguageConfig> = Vec::with_capacity(languages.len());

        for (code, label) in languages {
            if configs.iter().any(|c| c.code == code) {
                return Err(LanguageError::Duplicate(code));
            }
            configs.push(LanguageConfig {
                is_source: code == source_language,
                code,
                label,
            });
        }

        if !configs.iter().any(|c| c.is_source) {
            return Err(LanguageError::SourceNotConfigured(source_language.into()));
        }

        Ok(Self { languages: configs })
    }

    /// Build a registry from loaded settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, LanguageError> {
        Self::new(settings.languages.clone(), &settings.source_language)
    }

    /// Get the global language registry instance.
    ///
    /// Initialized from [`Settings::from_env`] on first call unless
    /// [`LanguageRegistry::install`] ran earlier. Falls back to the default
    /// settings if the environment is misconfigured.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| {
            let settings = Settings::from_env().unwrap_or_else(|e| {
                warn!("Invalid language settings, using defaults: {:#}", e);
                Settings::default()
            });
            Self::from_settings(&settings).unwrap_or_else(|e| {
                warn!("Invalid language settings, using defaults: {}", e);
                Self::fallback()
            })
        })
    }

    /// Install the global registry. Fails (returning the registry back) if the
    /// global instance was already initialized.
    pub fn install(registry: LanguageRegistry) -> Result<(), LanguageRegistry> {
        REGISTRY.set(registry)
    }

    fn fallback() -> Self {
        Self {
            languages: vec![LanguageConfig {
                code: crate::config::DEFAULT_SOURCE_LANGUAGE.to_string(),
                label: "English".to_string(),
                is_source: true,
            }],
        }
    }

    /// Get a language configuration by its code.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Get all configured languages, source language included.
    pub fn list_all(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().collect()
    }

    /// Get the source language configuration.
    pub fn source(&self) -> &LanguageConfig {
        // `new` guarantees exactly one source entry
        self.languages
            .iter()
            .find(|lang| lang.is_source)
            .unwrap_or(&self.languages[0])
    }

    /// Get the allowed translation languages, in configuration order.
    pub fn translation_languages(&self) -> Vec<LanguageCode> {
        self.languages
            .iter()
            .filter(|lang| !lang.is_source)
            .map(|lang| LanguageCode::from_storage(lang.code.clone()))
            .collect()
    }

    /// Check if a code is an allowed translation language.
    pub fn is_translation_language(&self, code: &str) -> bool {
        self.get_by_code(code)
            .map(|lang| !lang.is_source)
            .unwrap_or(false)
    }

    /// Resolve a code to a [`LanguageCode`].
    pub fn language(&self, code: &str) -> Result<LanguageCode, LanguageError> {
        LanguageCode::parse(code, self)
    }

    /// Get the allowed translation languages as an enumeration of choices.
    pub fn choices(&self) -> Vec<LanguageChoice> {
        self.languages
            .iter()
            .filter(|lang| !lang.is_source)
            .map(|lang| LanguageChoice {
                name: lang.code.replace('-', "_").to_uppercase(),
                value: lang.code.clone(),
                label: lang.label.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn languages() -> Vec<(String, String)> {
        vec![
            ("en".to_string(), "English".to_string()),
            ("es".to_string(), "Spanish".to_string()),
            ("de".to_string(), "German".to_string()),
        ]
    }

    #[test]
    fn test_registry_get_returns_singleton() {
        let registry1 = LanguageRegistry::get();
        let registry2 = LanguageRegistry::get();

        assert!(std::ptr::eq(registry1, registry2));
    }

    #[test]
    fn test_source_language() {
        let registry = LanguageRegistry::new(languages(), "en").unwrap();
        let source = registry.source();

        assert_eq!(source.code, "en");
        assert!(source.is_source);
    }

    #[test]
    fn test_translation_languages_exclude_source() {
        let registry = LanguageRegistry::new(languages(), "en").unwrap();
        let allowed = registry.translation_languages();

        assert_eq!(allowed, vec!["es", "de"]);
        assert!(!registry.is_translation_language("en"));
        assert!(registry.is_translation_language("es"));
        assert!(!registry.is_translation_language("xx"));
    }

    #[test]
    fn test_translation_languages_follow_source_override() {
        let registry = LanguageRegistry::new(languages(), "es").unwrap();
        let allowed = registry.translation_languages();

        assert_eq!(allowed, vec!["en", "de"]);
    }

    #[test]
    fn test_unconfigured_source_language() {
        let result = LanguageRegistry::new(languages(), "fr");
        assert!(matches!(result, Err(LanguageError::SourceNotConfigured(code)) if code == "fr"));
    }

    #[test]
    fn test_duplicate_language() {
        let mut langs = languages();
        langs.push(("es".to_string(), "Español".to_string()));
        assert!(matches!(
            LanguageRegistry::new(langs, "en"),
            Err(LanguageError::Duplicate(_))
        ));
    }

    #[test]
    fn test_choices() {
        let mut langs = languages();
        langs.push(("pt-br".to_string(), "Brazilian Portuguese".to_string()));
        let registry = LanguageRegistry::new(langs, "en").unwrap();
        let choices = registry.choices();

        assert_eq!(choices.len(), 3);
        assert!(choices.iter().all(|c| c.value != "en"));
        assert_eq!(choices[2].name, "PT_BR");
        assert_eq!(choices[2].value, "pt-br");
        assert_eq!(choices[2].label, "Brazilian Portuguese");
    }

    #[test]
    fn test_get_by_code() {
        let registry = LanguageRegistry::new(languages(), "en").unwrap();

        assert_eq!(registry.get_by_code("de").map(|l| l.label.as_str()), Some("German"));
        assert!(registry.get_by_code("fr").is_none());
        assert_eq!(registry.list_all().len(), 3);
    }
}
