//! Runtime rows: source rows and their translations.

use crate::i18n::LanguageCode;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// Field values of a row, keyed by field name.
pub type Record = BTreeMap<String, Value>;

/// A translation of one source row into one language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationRow {
    pub pk: i64,
    pub source_pk: i64,
    pub language: LanguageCode,
    pub values: Record,
}

impl TranslationRow {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }
}

/// The translations of one source row, in storage order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationSet {
    rows: Vec<Arc<TranslationRow>>,
}

impl TranslationSet {
    pub fn new(rows: Vec<Arc<TranslationRow>>) -> Self {
        Self { rows }
    }

    pub fn get(&self, language: &str) -> Option<&Arc<TranslationRow>> {
        self.rows.iter().find(|row| row.language == language)
    }

    pub fn contains(&self, language: &str) -> bool {
        self.get(language).is_some()
    }

    pub fn languages(&self) -> Vec<&LanguageCode> {
        self.rows.iter().map(|row| &row.language).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TranslationRow>> {
        self.rows.iter()
    }
}

/// A row of a translatable entity.
///
/// Each instance memoizes the translation collections it has loaded, keyed by
/// the relation's back-reference name. The memo belongs to this instance
/// only: fetching the same row again yields an instance with an empty memo.
#[derive(Debug)]
pub struct SourceRow {
    pk: i64,
    values: Record,
    translations: Mutex<HashMap<String, Arc<TranslationSet>>>,
}

impl SourceRow {
    pub(crate) fn new(pk: i64, values: Record) -> Self {
        Self {
            pk,
            values,
            translations: Mutex::new(HashMap::new()),
        }
    }

    pub fn pk(&self) -> i64 {
        self.pk
    }

    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// The memoized translations for `relation`, if already loaded.
    pub fn cached_translations(&self, relation: &str) -> Option<Arc<TranslationSet>> {
        self.lock().get(relation).cloned()
    }

    /// Whether translations for `relation` are loaded.
    pub fn has_cached_translations(&self, relation: &str) -> bool {
        self.lock().contains_key(relation)
    }

    /// Memoize `set` unless a collection is already loaded; the first one wins.
    pub(crate) fn cache_translations(&self, relation: &str, set: TranslationSet) -> Arc<TranslationSet> {
        self.lock()
            .entry(relation.to_string())
            .or_insert_with(|| Arc::new(set))
            .clone()
    }

    /// Memoize `set`, replacing any loaded collection.
    pub(crate) fn replace_translations(&self, relation: &str, set: TranslationSet) -> Arc<TranslationSet> {
        let set = Arc::new(set);
        self.lock().insert(relation.to_string(), Arc::clone(&set));
        set
    }

    /// Drop the memoized translations for `relation`.
    pub fn forget_translations(&self, relation: &str) {
        self.lock().remove(relation);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<TranslationSet>>> {
        self.translations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for SourceRow {
    fn eq(&self, other: &Self) -> bool {
        self.pk == other.pk && self.values == other.values
    }
}
