use anyhow::{bail, Context, Result};

/// Languages used when `TRANSLATION_LANGUAGES` is not set.
pub const DEFAULT_LANGUAGES: &str = "en:English,es:Spanish,de:German";

/// Source language used when neither `TRANSLATION_SOURCE_LANGUAGE` nor
/// `LANGUAGE_CODE` is set.
pub const DEFAULT_SOURCE_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    // Languages
    pub source_language: String,
    pub languages: Vec<(String, String)>,

    // Storage
    pub database_url: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let languages = match std::env::var("TRANSLATION_LANGUAGES") {
            Ok(raw) => {
                parse_languages(&raw).context("TRANSLATION_LANGUAGES is malformed")?
            }
            Err(_) => parse_languages(DEFAULT_LANGUAGES)?,
        };

        let settings = Self {
            // The app-specific variable wins over the project-wide one
            source_language: std::env::var("TRANSLATION_SOURCE_LANGUAGE")
                .or_else(|_| std::env::var("LANGUAGE_CODE"))
                .unwrap_or_else(|_| DEFAULT_SOURCE_LANGUAGE.to_string()),
            languages,

            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite::memory:".to_string()),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Check that the source language is one of the configured languages.
    pub fn validate(&self) -> Result<()> {
        if !self
            .languages
            .iter()
            .any(|(code, _)| code == &self.source_language)
        {
            bail!(
                "Source language '{}' is not one of the configured languages",
                self.source_language
            );
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_language: DEFAULT_SOURCE_LANGUAGE.to_string(),
            languages: parse_languages(DEFAULT_LANGUAGES).unwrap_or_default(),
            database_url: "sqlite::memory:".to_string(),
        }
    }
}

/// Parse a `code:Label,code:Label` list.
///
/// A bare `code` entry uses the code itself as its label.
pub fn parse_languages(raw: &str) -> Result<Vec<(String, String)>> {
    let mut languages: Vec<(String, String)> = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (code, label) = match entry.split_once(':') {
            Some((code, label)) => (code.trim(), label.trim()),
            None => (entry, entry),
        };

        if code.is_empty() {
            bail!("Empty language code in entry '{}'", entry);
        }
        if languages.iter().any(|(existing, _)| existing == code) {
            bail!("Duplicate language code '{}'", code);
        }

        languages.push((code.to_string(), label.to_string()));
    }

    if languages.is_empty() {
        bail!("At least one language must be configured");
    }

    Ok(languages)
}
