use crate::schema::{Constraint, FieldDescriptor};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Default name of the link from a translation row to its source row.
pub const DEFAULT_SOURCE_LINK_NAME: &str = "source";

/// Default name of the source entity's collection of translations.
pub const DEFAULT_REVERSE_LINK_NAME: &str = "translations";

/// Name of the language field every translation entity carries.
pub const LANGUAGE_FIELD: &str = "language";

/// Marker capabilities an entity declaration opts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Capability {
    /// The entity's rows can be translated.
    TranslationSource,
    /// The entity holds translations of another entity.
    Translation,
}

///
/// SourceEntityDescriptor
///

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceEntityDescriptor {
    pub name: String,
    pub table: String,
    pub fields: Vec<FieldDescriptor>,
    pub capabilities: BTreeSet<Capability>,
}

impl SourceEntityDescriptor {
    /// Start declaring a plain entity. An `id` primary key is added on
    /// `build` unless a primary key field was declared.
    pub fn builder(name: impl Into<String>, table: impl Into<String>) -> SourceEntityBuilder {
        SourceEntityBuilder {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
            capabilities: BTreeSet::new(),
        }
    }

    /// Start declaring an entity whose rows can be translated.
    pub fn translatable(name: impl Into<String>, table: impl Into<String>) -> SourceEntityBuilder {
        Self::builder(name, table).capability(Capability::TranslationSource)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.primary_key)
    }

    pub fn implements(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

pub struct SourceEntityBuilder {
    name: String,
    table: String,
    fields: Vec<FieldDescriptor>,
    capabilities: BTreeSet<Capability>,
}

impl SourceEntityBuilder {
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn build(mut self) -> Arc<SourceEntityDescriptor> {
        if !self.fields.iter().any(|f| f.primary_key) {
            self.fields.insert(0, FieldDescriptor::auto_id());
        }

        Arc::new(SourceEntityDescriptor {
            name: self.name,
            table: self.table,
            fields: self.fields,
            capabilities: self.capabilities,
        })
    }
}

///
/// TranslationEntityDescriptor
///
/// A translation entity as declared, before derivation.
///

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationEntityDescriptor {
    pub name: String,
    pub table: String,
    pub is_abstract: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_entity: Option<Arc<SourceEntityDescriptor>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_link_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse_link_name: Option<String>,

    pub translation_field_names: Vec<String>,

    /// Extra fields declared on the translation entity itself
    pub fields: Vec<FieldDescriptor>,

    /// Constraints declared inline on the translation entity
    pub constraints: Vec<Constraint>,

    pub capabilities: BTreeSet<Capability>,
}

impl TranslationEntityDescriptor {
    /// Declare a concrete translation entity.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            is_abstract: false,
            source_entity: None,
            source_link_name: None,
            reverse_link_name: None,
            translation_field_names: Vec::new(),
            fields: Vec::new(),
            constraints: Vec::new(),
            capabilities: BTreeSet::from([Capability::Translation]),
        }
    }

    /// Declare an abstract translation entity (a template for others).
    pub fn abstract_base(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut descriptor = Self::new(name.clone(), name);
        descriptor.is_abstract = true;
        descriptor
    }

    #[must_use]
    pub fn source(mut self, source: Arc<SourceEntityDescriptor>) -> Self {
        self.source_entity = Some(source);
        self
    }

    #[must_use]
    pub fn source_link_name(mut self, name: impl Into<String>) -> Self {
        self.source_link_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn reverse_link_name(mut self, name: impl Into<String>) -> Self {
        self.reverse_link_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn translate<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.translation_field_names
            .extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn implements(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

///
/// DerivedTranslationEntity
///
/// The fully specified translation entity. Produced only by
/// [`SchemaDeriver`](crate::schema::SchemaDeriver).
///

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedTranslationEntity {
    pub(crate) name: String,
    pub(crate) table: String,
    pub(crate) source: Arc<SourceEntityDescriptor>,
    pub(crate) source_link_name: String,
    pub(crate) reverse_link_name: String,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) mirrored_fields: Vec<String>,
    pub(crate) constraints: Vec<Constraint>,
}

impl DerivedTranslationEntity {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn source(&self) -> &Arc<SourceEntityDescriptor> {
        &self.source
    }

    pub fn source_link_name(&self) -> &str {
        &self.source_link_name
    }

    pub fn reverse_link_name(&self) -> &str {
        &self.reverse_link_name
    }

    /// Storage column holding the source row's key.
    pub fn source_link_column(&self) -> String {
        format!("{}_id", self.source_link_name)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the fields copied from the source entity, in declared order.
    pub fn mirrored_fields(&self) -> &[String] {
        &self.mirrored_fields
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn unique_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_unique())
    }

    /// Languages accepted by the language field.
    pub fn languages(&self) -> &[String] {
        self.field(LANGUAGE_FIELD)
            .and_then(|f| f.choices.as_deref())
            .unwrap_or(&[])
    }
}
