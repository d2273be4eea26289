//! Entity descriptors and translation schema derivation.

mod constraint;
mod derive;
mod entity;
mod field;

pub use constraint::Constraint;
pub use derive::{ConfigurationError, Derivation, SchemaDeriver, LANGUAGE_MAX_LENGTH};
pub use entity::{
    Capability, DerivedTranslationEntity, SourceEntityBuilder, SourceEntityDescriptor,
    TranslationEntityDescriptor, DEFAULT_REVERSE_LINK_NAME, DEFAULT_SOURCE_LINK_NAME,
    LANGUAGE_FIELD,
};
pub use field::{FieldDescriptor, FieldKind, ForeignKey, OnDelete};
