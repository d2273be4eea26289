//! Schema derivation for translation entities.
//!
//! [`SchemaDeriver::derive`] turns a [`TranslationEntityDescriptor`] into a
//! [`DerivedTranslationEntity`]:
//!
//! - a many-to-one link to the source entity is added, with cascading delete
//!   and the configured back-reference name
//! - the listed source fields are copied; copies of unique fields lose their
//!   global uniqueness and become unique per language instead
//! - one translation per language per source row is enforced with a unique
//!   constraint over the language field and the link
//!
//! Derivation has no I/O and is deterministic: constraint names depend only
//! on the source table and field names, so they are stable across restarts.

use crate::i18n::LanguageRegistry;
use crate::schema::{
    Capability, Constraint, DerivedTranslationEntity, FieldDescriptor, FieldKind, ForeignKey,
    OnDelete, SourceEntityDescriptor, TranslationEntityDescriptor, DEFAULT_REVERSE_LINK_NAME,
    DEFAULT_SOURCE_LINK_NAME, LANGUAGE_FIELD,
};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum length of a language code stored on a translation row.
pub const LANGUAGE_MAX_LENGTH: u32 = 8;

static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();

fn identifier_regex() -> &'static Regex {
    IDENTIFIER_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// A translation entity declaration that cannot be derived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{entity}: missing source entity")]
    MissingSourceEntity { entity: String },

    #[error("{entity}: invalid source entity type, '{source_entity}' is not translatable")]
    InvalidSourceEntity { entity: String, source_entity: String },

    #[error("{entity}: not a translation entity")]
    NotTranslationEntity { entity: String },

    #[error("{entity}: abstract translation entities have no storage and cannot be registered")]
    AbstractEntity { entity: String },

    #[error("field '{field}' not found in source '{source_entity}'")]
    FieldNotFound { field: String, source_entity: String },

    #[error("primary key fields cannot be translated ('{field}')")]
    PrimaryKeyField { field: String },

    #[error("relational field '{field}' cannot be translated")]
    RelationalField { field: String },

    #[error("{entity}: field '{field}' clashes with an existing field")]
    FieldClash { entity: String, field: String },

    #[error("{entity}: '{name}' is not a valid identifier")]
    InvalidIdentifier { entity: String, name: String },
}

/// Result of deriving a declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// Abstract declarations pass through untouched.
    Abstract(TranslationEntityDescriptor),
    Concrete(DerivedTranslationEntity),
}

impl Derivation {
    pub fn into_concrete(self) -> Option<DerivedTranslationEntity> {
        match self {
            Derivation::Concrete(entity) => Some(entity),
            Derivation::Abstract(_) => None,
        }
    }
}

/// Derives translation entities against the configured languages.
pub struct SchemaDeriver<'a> {
    registry: &'a LanguageRegistry,
}

impl<'a> SchemaDeriver<'a> {
    pub fn new(registry: &'a LanguageRegistry) -> Self {
        Self { registry }
    }

    /// Derive a concrete declaration, rejecting abstract ones.
    pub fn derive_concrete(
        &self,
        descriptor: TranslationEntityDescriptor,
    ) -> Result<Arc<DerivedTranslationEntity>, ConfigurationError> {
        let entity = descriptor.name.clone();
        match self.derive(descriptor)? {
            Derivation::Concrete(derived) => Ok(Arc::new(derived)),
            Derivation::Abstract(_) => Err(ConfigurationError::AbstractEntity { entity }),
        }
    }

    pub fn derive(
        &self,
        descriptor: TranslationEntityDescriptor,
    ) -> Result<Derivation, ConfigurationError> {
        if descriptor.is_abstract {
            debug!(entity = %descriptor.name, "Skipping derivation of abstract entity");
            return Ok(Derivation::Abstract(descriptor));
        }

        let entity = descriptor.name.clone();

        if !descriptor.implements(Capability::Translation) {
            return Err(ConfigurationError::NotTranslationEntity { entity });
        }

        let source = descriptor
            .source_entity
            .clone()
            .ok_or_else(|| ConfigurationError::MissingSourceEntity {
                entity: entity.clone(),
            })?;

        if !source.implements(Capability::TranslationSource) {
            return Err(ConfigurationError::InvalidSourceEntity {
                entity,
                source_entity: source.name.clone(),
            });
        }

        let source_link_name = descriptor
            .source_link_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SOURCE_LINK_NAME.to_string());
        let reverse_link_name = descriptor
            .reverse_link_name
            .clone()
            .unwrap_or_else(|| DEFAULT_REVERSE_LINK_NAME.to_string());

        for name in [&source_link_name, &reverse_link_name] {
            if !identifier_regex().is_match(name) {
                return Err(ConfigurationError::InvalidIdentifier {
                    entity,
                    name: name.clone(),
                });
            }
        }

        let mut fields = self.base_fields(&descriptor)?;

        let link = source_link_field(&source, &source_link_name, &reverse_link_name);
        if fields.iter().any(|f| clashes(f, &link)) {
            return Err(ConfigurationError::FieldClash {
                entity,
                field: source_link_name,
            });
        }
        fields.push(link);

        let (mirrored, per_language_unique) =
            mirror_fields(&descriptor, &source, &mut fields)?;

        let constraints = self.constraints(
            &descriptor,
            &source,
            &source_link_name,
            &per_language_unique,
        );

        debug!(
            entity = %entity,
            source = %source.name,
            mirrored = mirrored.len(),
            constraints = constraints.len(),
            "Derived translation entity"
        );

        Ok(Derivation::Concrete(DerivedTranslationEntity {
            name: descriptor.name,
            table: descriptor.table,
            source,
            source_link_name,
            reverse_link_name,
            fields,
            mirrored_fields: mirrored,
            constraints,
        }))
    }

    /// Primary key, language field and declared fields.
    fn base_fields(
        &self,
        descriptor: &TranslationEntityDescriptor,
    ) -> Result<Vec<FieldDescriptor>, ConfigurationError> {
        let mut fields = Vec::with_capacity(descriptor.fields.len() + 2);

        if !descriptor.fields.iter().any(|f| f.primary_key) {
            fields.push(FieldDescriptor::auto_id());
        }
        fields.push(self.language_field());

        for field in &descriptor.fields {
            if fields.iter().any(|f| clashes(f, field)) {
                return Err(ConfigurationError::FieldClash {
                    entity: descriptor.name.clone(),
                    field: field.name.clone(),
                });
            }
            fields.push(field.clone());
        }

        Ok(fields)
    }

    fn language_field(&self) -> FieldDescriptor {
        let codes = self
            .registry
            .translation_languages()
            .into_iter()
            .map(|code| code.as_str().to_string())
            .collect();

        FieldDescriptor::new(
            LANGUAGE_FIELD,
            FieldKind::Char {
                max_length: LANGUAGE_MAX_LENGTH,
            },
        )
        .with_choices(codes)
        .with_verbose_name(LANGUAGE_FIELD)
    }

    fn constraints(
        &self,
        descriptor: &TranslationEntityDescriptor,
        source: &SourceEntityDescriptor,
        source_link_name: &str,
        per_language_unique: &[String],
    ) -> Vec<Constraint> {
        let mut constraints = descriptor.constraints.clone();

        constraints.push(Constraint::Check {
            name: format!("{}_language_valid", descriptor.table),
            field: LANGUAGE_FIELD.to_string(),
            allowed: self.language_field().choices.unwrap_or_default(),
        });

        // One translation per language per source row
        constraints.push(Constraint::unique(
            format!("{}_language_source_unique", source.table),
            [LANGUAGE_FIELD, source_link_name],
        ));

        for field in per_language_unique {
            constraints.push(Constraint::unique(
                format!("{}_language_{}_unique", source.table, field),
                [LANGUAGE_FIELD, field.as_str()],
            ));
        }

        constraints
    }
}

/// Two fields clash when they share a name or a storage column.
fn clashes(existing: &FieldDescriptor, field: &FieldDescriptor) -> bool {
    existing.name == field.name || existing.column() == field.column()
}

fn source_link_field(
    source: &SourceEntityDescriptor,
    source_link_name: &str,
    reverse_link_name: &str,
) -> FieldDescriptor {
    FieldDescriptor::new(
        source_link_name,
        FieldKind::ForeignKey(ForeignKey {
            target: source.name.clone(),
            target_table: source.table.clone(),
            on_delete: OnDelete::Cascade,
            related_name: Some(reverse_link_name.to_string()),
        }),
    )
    .read_only()
    .with_verbose_name(source_link_name)
}

/// Copy the listed source fields onto `fields`.
///
/// Returns the mirrored names and, among them, the ones that were unique on
/// the source.
fn mirror_fields(
    descriptor: &TranslationEntityDescriptor,
    source: &SourceEntityDescriptor,
    fields: &mut Vec<FieldDescriptor>,
) -> Result<(Vec<String>, Vec<String>), ConfigurationError> {
    let mut mirrored: Vec<String> = Vec::new();
    let mut per_language_unique: Vec<String> = Vec::new();

    for name in &descriptor.translation_field_names {
        if mirrored.contains(name) {
            warn!(entity = %descriptor.name, field = %name, "Field listed twice for translation");
            continue;
        }

        let source_field = source
            .field(name)
            .ok_or_else(|| ConfigurationError::FieldNotFound {
                field: name.clone(),
                source_entity: source.name.clone(),
            })?;

        if source_field.primary_key {
            return Err(ConfigurationError::PrimaryKeyField {
                field: name.clone(),
            });
        }
        if source_field.is_relation() {
            return Err(ConfigurationError::RelationalField {
                field: name.clone(),
            });
        }
        if fields.iter().any(|f| clashes(f, source_field)) {
            return Err(ConfigurationError::FieldClash {
                entity: descriptor.name.clone(),
                field: name.clone(),
            });
        }

        let mut copy = source_field.clone();
        if copy.unique {
            copy.unique = false;
            per_language_unique.push(copy.name.clone());
        }

        fields.push(copy);
        mirrored.push(name.clone());
    }

    Ok((mirrored, per_language_unique))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> LanguageRegistry {
        LanguageRegistry::new(
            vec![
                ("en".to_string(), "English".to_string()),
                ("es".to_string(), "Spanish".to_string()),
                ("de".to_string(), "German".to_string()),
            ],
            "en",
        )
        .unwrap()
    }

    fn post() -> Arc<SourceEntityDescriptor> {
        SourceEntityDescriptor::translatable("Post", "blog_post")
            .field(FieldDescriptor::char("name", 250))
            .field(FieldDescriptor::slug("slug", 250).unique())
            .field(FieldDescriptor::foreign_key(
                "author",
                "Author",
                "blog_author",
                OnDelete::Cascade,
            ))
            .field(FieldDescriptor::integer("views"))
            .build()
    }

    fn post_translation() -> TranslationEntityDescriptor {
        TranslationEntityDescriptor::new("PostTranslation", "blog_post_translation")
            .source(post())
            .translate(["name", "slug"])
    }

    fn derive(descriptor: TranslationEntityDescriptor) -> Result<DerivedTranslationEntity, ConfigurationError> {
        SchemaDeriver::new(&registry())
            .derive(descriptor)
            .map(|d| d.into_concrete().expect("Should be concrete"))
    }

    // ==================== Link Field Tests ====================

    #[test]
    fn test_default_link_names() {
        let derived = derive(post_translation()).expect("Should derive");

        assert_eq!(derived.source_link_name(), "source");
        assert_eq!(derived.reverse_link_name(), "translations");
        assert_eq!(derived.source_link_column(), "source_id");

        let link = derived.field("source").expect("Link field should exist");
        let fk = link.foreign_key_target().expect("Link should be a relation");
        assert_eq!(fk.target_table, "blog_post");
        assert_eq!(fk.on_delete, OnDelete::Cascade);
        assert_eq!(fk.related_name.as_deref(), Some("translations"));
        assert!(!link.editable);
    }

    #[test]
    fn test_custom_link_names() {
        let derived = derive(
            post_translation()
                .source_link_name("parent")
                .reverse_link_name("localized"),
        )
        .expect("Should derive");

        assert!(derived.field("parent").is_some());
        assert!(derived.field("source").is_none());
        assert_eq!(derived.reverse_link_name(), "localized");
        assert!(derived
            .unique_constraints()
            .any(|c| c.is_unique_over(&["language", "parent"])));
    }

    #[test]
    fn test_invalid_link_name() {
        let result = derive(post_translation().source_link_name("bad name"));
        assert!(matches!(result, Err(ConfigurationError::InvalidIdentifier { .. })));
    }

    // ==================== Language Field Tests ====================

    #[test]
    fn test_language_field_choices() {
        let derived = derive(post_translation()).unwrap();
        let language = derived.field("language").expect("Language field should exist");

        assert!(!language.null);
        assert!(language.default.is_none());
        assert_eq!(derived.languages(), ["es", "de"]);
    }

    #[test]
    fn test_language_check_constraint() {
        let derived = derive(post_translation()).unwrap();
        let check = derived
            .constraints()
            .iter()
            .find(|c| c.name() == "blog_post_translation_language_valid")
            .expect("Check constraint should exist");

        assert!(matches!(check, Constraint::Check { allowed, .. } if allowed == &["es", "de"]));
    }

    // ==================== Mirrored Field Tests ====================

    #[test]
    fn test_mirrored_fields_in_declared_order() {
        let derived = derive(
            TranslationEntityDescriptor::new("PostTranslation", "blog_post_translation")
                .source(post())
                .translate(["slug", "name"]),
        )
        .unwrap();

        assert_eq!(derived.mirrored_fields(), ["slug", "name"]);
        let names: Vec<_> = derived.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "language", "source", "slug", "name"]);
    }

    #[test]
    fn test_unique_field_becomes_unique_per_language() {
        let source = post();
        let derived = derive(post_translation()).unwrap();

        assert!(source.field("slug").unwrap().unique);
        assert!(!derived.field("slug").unwrap().unique);

        let per_language: Vec<_> = derived
            .unique_constraints()
            .filter(|c| c.is_unique_over(&["language", "slug"]))
            .collect();
        assert_eq!(per_language.len(), 1);
        assert_eq!(per_language[0].name(), "blog_post_language_slug_unique");
    }

    #[test]
    fn test_non_unique_field_has_no_constraint() {
        let derived = derive(post_translation()).unwrap();
        assert!(!derived
            .unique_constraints()
            .any(|c| c.is_unique_over(&["language", "name"])));
    }

    #[test]
    fn test_exactly_one_language_source_constraint() {
        let derived = derive(post_translation()).unwrap();
        let matching: Vec<_> = derived
            .unique_constraints()
            .filter(|c| c.is_unique_over(&["language", "source"]))
            .collect();

        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].name(), "blog_post_language_source_unique");
    }

    #[test]
    fn test_inline_constraints_come_first() {
        let derived = derive(
            post_translation()
                .field(FieldDescriptor::boolean("reviewed"))
                .constraint(Constraint::unique("reviewed_name", ["reviewed", "name"])),
        )
        .unwrap();

        assert_eq!(derived.constraints()[0].name(), "reviewed_name");
        assert!(derived.field("reviewed").is_some());
    }

    #[test]
    fn test_duplicate_translation_field_is_ignored() {
        let derived = derive(post_translation().translate(["name"])).unwrap();
        assert_eq!(derived.mirrored_fields(), ["name", "slug"]);
    }

    #[test]
    fn test_empty_translation_fields() {
        let derived = derive(
            TranslationEntityDescriptor::new("PostTranslation", "blog_post_translation").source(post()),
        )
        .unwrap();

        assert!(derived.mirrored_fields().is_empty());
        assert_eq!(derived.unique_constraints().count(), 1);
    }

    // ==================== Rejection Tests ====================

    #[test]
    fn test_missing_field_rejected() {
        let result = derive(post_translation().translate(["summary"]));
        assert_eq!(
            result.unwrap_err(),
            ConfigurationError::FieldNotFound {
                field: "summary".into(),
                source_entity: "Post".into()
            }
        );
    }

    #[test]
    fn test_primary_key_rejected() {
        let result = derive(post_translation().translate(["id"]));
        assert!(matches!(result, Err(ConfigurationError::PrimaryKeyField { field }) if field == "id"));
    }

    #[test]
    fn test_relation_rejected() {
        let result = derive(post_translation().translate(["author"]));
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "relational field 'author' cannot be translated");
    }

    #[test]
    fn test_missing_source_rejected() {
        let result = derive(TranslationEntityDescriptor::new("Orphan", "orphan"));
        assert!(matches!(result, Err(ConfigurationError::MissingSourceEntity { .. })));
    }

    #[test]
    fn test_untranslatable_source_rejected() {
        let plain = SourceEntityDescriptor::builder("Author", "blog_author")
            .field(FieldDescriptor::char("name", 100))
            .build();
        let result = derive(TranslationEntityDescriptor::new("AuthorTranslation", "t").source(plain));
        assert!(matches!(result, Err(ConfigurationError::InvalidSourceEntity { .. })));
    }

    #[test]
    fn test_missing_translation_marker_rejected() {
        let mut descriptor = post_translation();
        descriptor.capabilities.clear();
        let result = derive(descriptor);
        assert!(matches!(result, Err(ConfigurationError::NotTranslationEntity { .. })));
    }

    #[test]
    fn test_clash_with_declared_field() {
        let result = derive(post_translation().field(FieldDescriptor::text("name")));
        assert!(matches!(result, Err(ConfigurationError::FieldClash { field, .. }) if field == "name"));
    }

    #[test]
    fn test_link_clash_with_declared_field() {
        let result = derive(post_translation().field(FieldDescriptor::text("source")));
        assert!(matches!(result, Err(ConfigurationError::FieldClash { field, .. }) if field == "source"));
    }

    #[test]
    fn test_mirror_clashes_with_link_column() {
        let source = SourceEntityDescriptor::translatable("Post", "blog_post")
            .field(FieldDescriptor::char("name", 250))
            .field(FieldDescriptor::char("source_id", 50))
            .build();
        let result = derive(
            TranslationEntityDescriptor::new("PostTranslation", "blog_post_translation")
                .source(source)
                .translate(["source_id"]),
        );
        assert!(matches!(result, Err(ConfigurationError::FieldClash { field, .. }) if field == "source_id"));
    }

    #[test]
    fn test_link_column_clashes_with_declared_field() {
        let result = derive(
            post_translation()
                .source_link_name("parent")
                .field(FieldDescriptor::integer("parent_id")),
        );
        assert!(matches!(result, Err(ConfigurationError::FieldClash { field, .. }) if field == "parent"));
    }

    #[test]
    fn test_declared_fields_clash_by_column() {
        let result = derive(
            post_translation()
                .field(FieldDescriptor::foreign_key("editor", "User", "auth_user", OnDelete::SetNull).nullable())
                .field(FieldDescriptor::integer("editor_id")),
        );
        assert!(matches!(result, Err(ConfigurationError::FieldClash { field, .. }) if field == "editor_id"));
    }

    // ==================== Abstract Tests ====================

    #[test]
    fn test_abstract_passes_through() {
        let base = TranslationEntityDescriptor::abstract_base("TranslationBase");
        let derivation = SchemaDeriver::new(&registry()).derive(base.clone()).unwrap();

        assert_eq!(derivation, Derivation::Abstract(base));
    }

    #[test]
    fn test_derive_concrete_rejects_abstract() {
        let base = TranslationEntityDescriptor::abstract_base("TranslationBase");
        let result = SchemaDeriver::new(&registry()).derive_concrete(base);
        assert!(matches!(
            result,
            Err(ConfigurationError::AbstractEntity { entity }) if entity == "TranslationBase"
        ));
    }

    // ==================== Property Tests ====================

    proptest! {
        #[test]
        fn prop_derivation_is_deterministic(order in Just(vec!["name", "slug", "views"]).prop_shuffle()) {
            let descriptor = TranslationEntityDescriptor::new("PostTranslation", "blog_post_translation")
                .source(post())
                .translate(order.clone());

            let first = derive(descriptor.clone()).unwrap();
            let second = derive(descriptor).unwrap();
            prop_assert_eq!(first.constraints(), second.constraints());
            prop_assert_eq!(first.mirrored_fields().to_vec(), order.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        }

        #[test]
        fn prop_every_unique_mirror_gets_one_language_constraint(unique_name in any::<bool>(), unique_views in any::<bool>()) {
            let mut name = FieldDescriptor::char("name", 250);
            name.unique = unique_name;
            let mut views = FieldDescriptor::integer("views");
            views.unique = unique_views;
            let source = SourceEntityDescriptor::translatable("Post", "blog_post")
                .field(name)
                .field(views)
                .build();

            let derived = derive(
                TranslationEntityDescriptor::new("PostTranslation", "blog_post_translation")
                    .source(source)
                    .translate(["name", "views"]),
            )
            .unwrap();

            for (field, was_unique) in [("name", unique_name), ("views", unique_views)] {
                prop_assert!(!derived.field(field).unwrap().unique);
                let count = derived
                    .unique_constraints()
                    .filter(|c| c.is_unique_over(&["language", field]))
                    .count();
                prop_assert_eq!(count, usize::from(was_unique));
            }
        }
    }
}
