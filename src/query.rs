//! Source-row queries with batched translation prefetch.

use crate::db::{Database, StoreError};
use crate::rows::{SourceRow, TranslationRow, TranslationSet};
use crate::schema::{DerivedTranslationEntity, SourceEntityDescriptor};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Restriction applied to prefetched translations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationFilter {
    languages: Option<Vec<String>>,
    fields: Vec<(String, Value)>,
}

impl TranslationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only translations in `language`.
    pub fn language(language: impl Into<String>) -> Self {
        Self::new().languages([language])
    }

    /// Only translations in one of `languages`.
    pub fn languages<S: Into<String>>(mut self, languages: impl IntoIterator<Item = S>) -> Self {
        self.languages = Some(languages.into_iter().map(Into::into).collect());
        self
    }

    /// Only translations whose `field` equals `value`.
    pub fn field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    pub fn language_set(&self) -> Option<&[String]> {
        self.languages.as_deref()
    }

    pub fn field_conditions(&self) -> &[(String, Value)] {
        &self.fields
    }
}

#[derive(Debug, Clone)]
struct Prefetch {
    relation: Arc<DerivedTranslationEntity>,
    filter: Option<TranslationFilter>,
}

/// A query over the rows of a source entity.
#[derive(Debug, Clone)]
pub struct SourceQuery {
    entity: Arc<SourceEntityDescriptor>,
    filters: Vec<(String, Value)>,
    prefetches: Vec<Prefetch>,
}

impl SourceQuery {
    pub fn new(entity: Arc<SourceEntityDescriptor>) -> Self {
        Self {
            entity,
            filters: Vec::new(),
            prefetches: Vec::new(),
        }
    }

    pub fn entity(&self) -> &Arc<SourceEntityDescriptor> {
        &self.entity
    }

    /// Keep rows whose `field` equals `value`.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Eagerly load the translations of `relation` for every fetched row.
    ///
    /// A later prefetch of the same relation replaces an earlier one.
    pub fn prefetch_translations(
        mut self,
        relation: &Arc<DerivedTranslationEntity>,
        filter: Option<TranslationFilter>,
    ) -> Self {
        self.prefetches
            .retain(|p| p.relation.reverse_link_name() != relation.reverse_link_name());
        self.prefetches.push(Prefetch {
            relation: Arc::clone(relation),
            filter,
        });
        self
    }

    /// Names of the relations this query prefetches.
    pub fn prefetched_relations(&self) -> Vec<&str> {
        self.prefetches
            .iter()
            .map(|p| p.relation.reverse_link_name())
            .collect()
    }

    /// Run the query: one statement for the rows, then one batched statement
    /// per prefetched relation (per chunk of source keys).
    pub async fn fetch_all(&self, db: &Database) -> Result<Vec<SourceRow>, StoreError> {
        let rows = db.fetch_sources(&self.entity, &self.filters, None).await?;
        self.apply_prefetches(db, &rows).await?;
        Ok(rows)
    }

    /// Run the query for the single row with primary key `pk`.
    pub async fn get(&self, db: &Database, pk: i64) -> Result<Option<SourceRow>, StoreError> {
        let rows = db.fetch_sources(&self.entity, &self.filters, Some(pk)).await?;
        self.apply_prefetches(db, &rows).await?;
        Ok(rows.into_iter().next())
    }

    async fn apply_prefetches(&self, db: &Database, rows: &[SourceRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let pks: Vec<i64> = rows.iter().map(SourceRow::pk).collect();

        for prefetch in &self.prefetches {
            let relation = &prefetch.relation;
            if relation.source().table != self.entity.table {
                return Err(StoreError::UnrelatedEntity {
                    relation: relation.name().to_string(),
                    entity: self.entity.name.clone(),
                });
            }

            let translations = db
                .fetch_translations(relation, &pks, prefetch.filter.as_ref())
                .await?;

            let mut grouped: HashMap<i64, Vec<Arc<TranslationRow>>> = HashMap::new();
            for translation in translations {
                grouped
                    .entry(translation.source_pk)
                    .or_default()
                    .push(Arc::new(translation));
            }

            for row in rows {
                let set = TranslationSet::new(grouped.remove(&row.pk()).unwrap_or_default());
                row.replace_translations(relation.reverse_link_name(), set);
            }

            debug!(
                "Prefetched {} for {} {} rows",
                relation.reverse_link_name(),
                rows.len(),
                self.entity.name
            );
        }

        Ok(())
    }
}
