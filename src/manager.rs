//! Translation lookups bound to one source entity and its translation entity.
//!
//! Lookups read the row's memoized translation collection and load it once
//! when missing. A row returned by a query that prefetched the relation never
//! goes back to storage for any lookup below.

use crate::db::{Database, StoreError};
use crate::error::Error;
use crate::i18n::{CurrentLanguage, LanguageCode, LanguageRegistry, ThreadLanguage};
use crate::query::{SourceQuery, TranslationFilter};
use crate::rows::{Record, SourceRow, TranslationRow, TranslationSet};
use crate::schema::{DerivedTranslationEntity, SchemaDeriver, SourceEntityDescriptor, TranslationEntityDescriptor};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Either a translation or, failing that, the source row itself.
#[derive(Debug, Clone)]
pub enum Localized<'r> {
    Translation(Arc<TranslationRow>),
    Source(&'r SourceRow),
}

impl Localized<'_> {
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Localized::Translation(row) => row.get(field),
            Localized::Source(row) => row.get(field),
        }
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn is_translation(&self) -> bool {
        matches!(self, Localized::Translation(_))
    }
}

#[derive(Clone)]
pub struct TranslationManager {
    db: Database,
    relation: Arc<DerivedTranslationEntity>,
    registry: Arc<LanguageRegistry>,
    current: Arc<dyn CurrentLanguage>,
}

impl TranslationManager {
    /// Bind a manager to an already registered relation. The current
    /// language is the thread's active language.
    pub fn new(db: Database, relation: Arc<DerivedTranslationEntity>, registry: Arc<LanguageRegistry>) -> Self {
        Self {
            db,
            relation,
            registry,
            current: Arc::new(ThreadLanguage),
        }
    }

    /// Derive `descriptor`, register the source and translation tables and
    /// bind a manager to them.
    pub async fn register(
        db: Database,
        registry: Arc<LanguageRegistry>,
        descriptor: TranslationEntityDescriptor,
    ) -> Result<Self, Error> {
        let relation = SchemaDeriver::new(&registry).derive_concrete(descriptor)?;

        db.register_source(relation.source()).await?;
        db.register_translation(&relation).await?;

        info!(
            "Translations of {} available as {}",
            relation.source().name,
            relation.reverse_link_name()
        );

        Ok(Self::new(db, relation, registry))
    }

    /// Replace the source of the current language.
    pub fn with_current_language(mut self, current: Arc<dyn CurrentLanguage>) -> Self {
        self.current = current;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn relation(&self) -> &Arc<DerivedTranslationEntity> {
        &self.relation
    }

    pub fn source(&self) -> &Arc<SourceEntityDescriptor> {
        self.relation.source()
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    /// The current language code, or the source language if none is active.
    pub fn current_language(&self) -> String {
        self.current
            .current_language()
            .unwrap_or_else(|| self.registry.source().code.clone())
    }

    // ==================== Rows ====================

    /// A query over all source rows.
    pub fn objects(&self) -> SourceQuery {
        SourceQuery::new(Arc::clone(self.source()))
    }

    pub async fn get(&self, pk: i64) -> Result<Option<SourceRow>, StoreError> {
        self.db.get_source(self.source(), pk).await
    }

    pub async fn create_source(&self, values: Record) -> Result<SourceRow, StoreError> {
        self.db.create_source(self.source(), values).await
    }

    /// Create a translation of `row`. The row's memoized collection is
    /// dropped so the next lookup sees the new translation.
    pub async fn create_translation(
        &self,
        row: &SourceRow,
        language: &LanguageCode,
        values: Record,
    ) -> Result<Arc<TranslationRow>, StoreError> {
        let translation = self
            .db
            .create_translation(&self.relation, row.pk(), language, values)
            .await?;
        row.forget_translations(self.relation.reverse_link_name());
        Ok(Arc::new(translation))
    }

    pub async fn update_translation(
        &self,
        translation: &TranslationRow,
        values: Record,
    ) -> Result<Option<TranslationRow>, StoreError> {
        self.db.update_translation(&self.relation, translation.pk, values).await
    }

    pub async fn delete_source(&self, pk: i64) -> Result<bool, StoreError> {
        self.db.delete_source(self.source(), pk).await
    }

    // ==================== Lookups ====================

    /// The translations of `row` by language, loaded once per row.
    pub async fn translations_dict(&self, row: &SourceRow) -> Result<Arc<TranslationSet>, StoreError> {
        let relation = self.relation.reverse_link_name();
        if let Some(set) = row.cached_translations(relation) {
            return Ok(set);
        }

        let set = self.load(row).await?;
        Ok(row.cache_translations(relation, set))
    }

    /// Reload the translations of `row`, replacing its memoized collection.
    pub async fn refresh_translations(&self, row: &SourceRow) -> Result<Arc<TranslationSet>, StoreError> {
        let set = self.load(row).await?;
        Ok(row.replace_translations(self.relation.reverse_link_name(), set))
    }

    async fn load(&self, row: &SourceRow) -> Result<TranslationSet, StoreError> {
        debug!("Loading {} of {} {}", self.relation.reverse_link_name(), self.source().name, row.pk());
        let rows = self.db.fetch_translations(&self.relation, &[row.pk()], None).await?;
        Ok(TranslationSet::new(rows.into_iter().map(Arc::new).collect()))
    }

    /// The translation of `row` in `language`, if one exists.
    pub async fn get_translation(
        &self,
        row: &SourceRow,
        language: &str,
    ) -> Result<Option<Arc<TranslationRow>>, StoreError> {
        Ok(self.translations_dict(row).await?.get(language).cloned())
    }

    /// The translation of `row` in the current language, if one exists.
    pub async fn get_current_translation(&self, row: &SourceRow) -> Result<Option<Arc<TranslationRow>>, StoreError> {
        let language = self.current_language();
        self.get_translation(row, &language).await
    }

    pub async fn has_translation(&self, row: &SourceRow, language: &str) -> Result<bool, StoreError> {
        Ok(self.translations_dict(row).await?.contains(language))
    }

    /// Configured translation languages that `row` has no translation for.
    pub async fn get_available_translation_languages(&self, row: &SourceRow) -> Result<Vec<LanguageCode>, StoreError> {
        let allowed = self.registry.translation_languages();
        self.available_languages_among(row, &allowed).await
    }

    /// Languages of `allowed`, in order, that `row` has no translation for.
    pub async fn available_languages_among(
        &self,
        row: &SourceRow,
        allowed: &[LanguageCode],
    ) -> Result<Vec<LanguageCode>, StoreError> {
        let translations = self.translations_dict(row).await?;
        Ok(allowed
            .iter()
            .filter(|language| !translations.contains(language.as_str()))
            .cloned()
            .collect())
    }

    /// The translation of `row` in `language`, or the row itself when there
    /// is none.
    pub async fn get_translation_or_source<'r>(
        &self,
        row: &'r SourceRow,
        language: &str,
    ) -> Result<Localized<'r>, StoreError> {
        Ok(match self.get_translation(row, language).await? {
            Some(translation) => Localized::Translation(translation),
            None => Localized::Source(row),
        })
    }

    // ==================== Prefetch ====================

    /// Eagerly load this relation for every row of `query`.
    pub fn prefetch_translations(&self, query: SourceQuery, filter: Option<TranslationFilter>) -> SourceQuery {
        query.prefetch_translations(&self.relation, filter)
    }

    /// Eagerly load only the current-language translation for every row of
    /// `query`.
    pub fn prefetch_current_translation(&self, query: SourceQuery) -> SourceQuery {
        let filter = TranslationFilter::language(self.current_language());
        self.prefetch_translations(query, Some(filter))
    }
}

impl std::fmt::Debug for TranslationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationManager")
            .field("source", &self.source().name)
            .field("relation", &self.relation.name())
            .finish()
    }
}
