//! Field-level translations for relational models.
//!
//! A *source* entity is declared once in the source language. A translation
//! entity mirrors a chosen subset of its fields and holds one row per source
//! row and language.
//!
//! # Architecture
//!
//! - `config`: settings loaded from the environment
//! - `i18n`: configured languages and the active language
//! - `schema`: entity descriptors and derivation of translation entities
//! - `db`: SQLite storage for registered entities
//! - `query`: source-row queries with batched translation prefetch
//! - `manager`: translation lookups for one source/translation pair
//!
//! # Example
//!
//! ```rust,ignore
//! let post = SourceEntityDescriptor::translatable("Post", "blog_post")
//!     .field(FieldDescriptor::char("name", 250))
//!     .field(FieldDescriptor::slug("slug", 250).unique())
//!     .build();
//!
//! let manager = TranslationManager::register(
//!     db,
//!     registry,
//!     TranslationEntityDescriptor::new("PostTranslation", "blog_post_translation")
//!         .source(post)
//!         .translate(["name", "slug"]),
//! )
//! .await?;
//!
//! let rows = manager
//!     .prefetch_current_translation(manager.objects())
//!     .fetch_all(manager.database())
//!     .await?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod manager;
pub mod query;
pub mod rows;
pub mod schema;
mod sql;

pub use config::Settings;
pub use db::{Database, QueryStats, StoreError};
pub use error::Error;
pub use i18n::{LanguageCode, LanguageError, LanguageRegistry};
pub use manager::{Localized, TranslationManager};
pub use query::{SourceQuery, TranslationFilter};
pub use rows::{Record, SourceRow, TranslationRow, TranslationSet};
pub use schema::{
    Capability, ConfigurationError, DerivedTranslationEntity, FieldDescriptor, SchemaDeriver,
    SourceEntityDescriptor, TranslationEntityDescriptor,
};
