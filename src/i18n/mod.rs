//! Language configuration for translations.
//!
//! # Architecture
//!
//! - `registry`: configured languages, the source language and the allowed
//!   translation languages derived from them
//! - `language`: `LanguageCode`, a code that is valid for a translation row
//! - `active`: the language in effect on the current thread
//!
//! # Example
//!
//! ```rust,ignore
//! use model_translations::i18n::{LanguageCode, LanguageRegistry};
//!
//! let registry = LanguageRegistry::get();
//! let spanish = LanguageCode::parse("es", registry)?;
//! let allowed = registry.translation_languages();
//! ```

mod active;
mod language;
mod registry;

pub use active::{
    activate, active_language, deactivate, get_language, CurrentLanguage, FixedLanguage,
    ThreadLanguage,
};
pub use language::{LanguageCode, LanguageError};
pub use registry::{LanguageChoice, LanguageConfig, LanguageRegistry};
