use crate::config::Settings;
use crate::i18n::LanguageCode;
use crate::query::TranslationFilter;
use crate::rows::{Record, SourceRow, TranslationRow};
use crate::schema::{
    DerivedTranslationEntity, FieldDescriptor, FieldKind, SourceEntityDescriptor, LANGUAGE_FIELD,
};
use crate::sql::{self, quote_ident};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Maximum number of source keys bound into one prefetch query.
pub const PREFETCH_CHUNK_SIZE: usize = 500;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Entity '{0}' is not registered")]
    UnregisteredEntity(String),

    #[error("'{source_entity}' already has a relation named '{name}' (from '{existing}')")]
    RelationClash {
        source_entity: String,
        name: String,
        existing: String,
    },

    #[error("Entity '{entity}' must have an integer primary key")]
    UnsupportedPrimaryKey { entity: String },

    #[error("Entity '{entity}' has no field '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("Field '{field}' of '{entity}' cannot be set directly")]
    ReadOnlyField { entity: String, field: String },

    #[error("'{relation}' does not translate '{entity}'")]
    UnrelatedEntity { relation: String, entity: String },
}

impl StoreError {
    /// Whether a uniqueness constraint rejected the write.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::Database(sqlx::Error::Database(e)) if e.is_unique_violation())
    }

    /// Whether a check constraint rejected the write.
    pub fn is_check_violation(&self) -> bool {
        matches!(self, StoreError::Database(sqlx::Error::Database(e)) if e.is_check_violation())
    }

    /// Whether a foreign key constraint rejected the write.
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, StoreError::Database(sqlx::Error::Database(e)) if e.is_foreign_key_violation())
    }
}

/// Counters of statements run against the database.
#[derive(Debug, Default)]
pub struct QueryStats {
    /// Every statement executed
    statements: AtomicUsize,

    /// Statements that loaded translation rows
    translation_fetches: AtomicUsize,
}

impl QueryStats {
    fn record_statement(&self) {
        self.statements.fetch_add(1, Ordering::Relaxed);
    }

    fn record_translation_fetch(&self) {
        self.translation_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn statements(&self) -> usize {
        self.statements.load(Ordering::Relaxed)
    }

    pub fn translation_fetches(&self) -> usize {
        self.translation_fetches.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct Registered {
    /// Registered source tables
    sources: HashSet<String>,

    /// (source table, reverse link name) -> translation table
    relations: HashMap<(String, String), String>,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    stats: Arc<QueryStats>,
    registered: Arc<Mutex<Registered>>,
}

impl Database {
    /// Open a database from a `sqlite:` URL, creating the file if needed.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database is a separate database
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        info!("Connected to {}", url);

        Ok(Self {
            pool,
            stats: Arc::new(QueryStats::default()),
            registered: Arc::new(Mutex::new(Registered::default())),
        })
    }

    /// Open a private in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    pub async fn from_settings(settings: &Settings) -> Result<Self, StoreError> {
        Self::connect(&settings.database_url).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    fn registered(&self) -> std::sync::MutexGuard<'_, Registered> {
        self.registered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_registered(&self, table: &str) -> bool {
        let registered = self.registered();
        registered.sources.contains(table) || registered.relations.values().any(|t| t == table)
    }

    // ==================== Registration ====================

    /// Create the table of a translatable entity.
    pub async fn register_source(&self, entity: &SourceEntityDescriptor) -> Result<(), StoreError> {
        require_integer_pk(&entity.name, &entity.fields)?;

        let ddl = sql::create_table(&entity.table, &entity.fields, &[]);
        debug!("Registering {}: {}", entity.name, ddl);
        self.execute(&ddl).await?;

        self.registered().sources.insert(entity.table.clone());
        info!("Registered source entity {} ({})", entity.name, entity.table);
        Ok(())
    }

    /// Create the table of a derived translation entity. Its source entity
    /// must be registered first.
    pub async fn register_translation(&self, entity: &DerivedTranslationEntity) -> Result<(), StoreError> {
        let source = entity.source();
        require_integer_pk(entity.name(), entity.fields())?;

        {
            let registered = self.registered();
            if !registered.sources.contains(&source.table) {
                return Err(StoreError::UnregisteredEntity(source.name.clone()));
            }
            let key = (source.table.clone(), entity.reverse_link_name().to_string());
            if let Some(existing) = registered.relations.get(&key) {
                if existing != entity.table() {
                    return Err(StoreError::RelationClash {
                        source_entity: source.name.clone(),
                        name: entity.reverse_link_name().to_string(),
                        existing: existing.clone(),
                    });
                }
            }
        }

        let ddl = sql::create_table(entity.table(), entity.fields(), entity.constraints());
        debug!("Registering {}: {}", entity.name(), ddl);
        self.execute(&ddl).await?;

        self.registered().relations.insert(
            (source.table.clone(), entity.reverse_link_name().to_string()),
            entity.table().to_string(),
        );
        info!(
            "Registered translation entity {} ({}) as {}.{}",
            entity.name(),
            entity.table(),
            source.name,
            entity.reverse_link_name()
        );
        Ok(())
    }

    async fn execute(&self, statement: &str) -> Result<(), StoreError> {
        self.stats.record_statement();
        sqlx::query(statement).execute(&self.pool).await?;
        Ok(())
    }

    fn require_registered(&self, name: &str, table: &str) -> Result<(), StoreError> {
        if self.is_registered(table) {
            Ok(())
        } else {
            Err(StoreError::UnregisteredEntity(name.to_string()))
        }
    }

    // ==================== Source Rows ====================

    /// Insert a source row and return it as stored.
    pub async fn create_source(
        &self,
        entity: &SourceEntityDescriptor,
        values: Record,
    ) -> Result<SourceRow, StoreError> {
        self.require_registered(&entity.name, &entity.table)?;
        let columns = writable_fields(&entity.name, &entity.fields, &values, &[])?;

        let pk = self.insert(&entity.table, &columns).await?;
        debug!("Created {} {}", entity.name, pk);

        self.get_source(entity, pk)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    /// Load one source row by primary key.
    pub async fn get_source(
        &self,
        entity: &SourceEntityDescriptor,
        pk: i64,
    ) -> Result<Option<SourceRow>, StoreError> {
        let rows = self.fetch_sources(entity, &[], Some(pk)).await?;
        Ok(rows.into_iter().next())
    }

    /// Load source rows matching every `field = value` filter, ordered by
    /// primary key.
    pub async fn fetch_sources(
        &self,
        entity: &SourceEntityDescriptor,
        filters: &[(String, Value)],
        pk: Option<i64>,
    ) -> Result<Vec<SourceRow>, StoreError> {
        self.require_registered(&entity.name, &entity.table)?;
        let pk_field = primary_key(&entity.name, &entity.fields)?;

        let pk_value = pk.map(Value::from);
        let mut conditions: Vec<String> = Vec::new();
        let mut bindings: Vec<(&FieldDescriptor, &Value)> = Vec::new();
        for (name, value) in filters {
            let field = lookup_field(&entity.name, &entity.fields, name)?;
            conditions.push(condition(field, value));
            if !value.is_null() {
                bindings.push((field, value));
            }
        }

        if let Some(value) = &pk_value {
            conditions.push(format!("{} = ?", quote_ident(&pk_field.column())));
            bindings.push((pk_field, value));
        }

        let mut statement = format!(
            "SELECT {} FROM {}",
            sql::column_list(&entity.fields),
            quote_ident(&entity.table)
        );
        if !conditions.is_empty() {
            statement.push_str(" WHERE ");
            statement.push_str(&conditions.join(" AND "));
        }
        statement.push_str(&format!(" ORDER BY {}", quote_ident(&pk_field.column())));

        let mut query = sqlx::query(&statement);
        for (field, value) in bindings {
            query = sql::bind_value(query, field, value);
        }

        self.stats.record_statement();
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| decode_source(row, pk_field, &entity.fields))
            .collect()
    }

    /// Delete a source row. Its translations are removed by the cascading
    /// foreign key.
    pub async fn delete_source(&self, entity: &SourceEntityDescriptor, pk: i64) -> Result<bool, StoreError> {
        self.require_registered(&entity.name, &entity.table)?;
        let pk_field = primary_key(&entity.name, &entity.fields)?;

        let statement = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_ident(&entity.table),
            quote_ident(&pk_field.column())
        );

        self.stats.record_statement();
        let result = sqlx::query(&statement).bind(pk).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Translation Rows ====================

    /// Insert a translation of the source row `source_pk`.
    pub async fn create_translation(
        &self,
        entity: &DerivedTranslationEntity,
        source_pk: i64,
        language: &LanguageCode,
        values: Record,
    ) -> Result<TranslationRow, StoreError> {
        self.require_registered(entity.name(), entity.table())?;
        let language_value = Value::from(language.as_str());
        let source_value = Value::from(source_pk);
        let reserved = [LANGUAGE_FIELD, entity.source_link_name()];
        let mut columns = writable_fields(entity.name(), entity.fields(), &values, &reserved)?;
        columns.push((lookup_field(entity.name(), entity.fields(), LANGUAGE_FIELD)?, &language_value));
        columns.push((
            lookup_field(entity.name(), entity.fields(), entity.source_link_name())?,
            &source_value,
        ));

        let pk = self.insert(entity.table(), &columns).await?;
        debug!("Created {} {} ({})", entity.name(), pk, language);

        self.get_translation(entity, pk)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    /// Update the translated values of a translation row.
    pub async fn update_translation(
        &self,
        entity: &DerivedTranslationEntity,
        pk: i64,
        values: Record,
    ) -> Result<Option<TranslationRow>, StoreError> {
        self.require_registered(entity.name(), entity.table())?;
        let reserved = [LANGUAGE_FIELD, entity.source_link_name()];
        let columns = writable_fields(entity.name(), entity.fields(), &values, &reserved)?;

        if !columns.is_empty() {
            let pk_field = primary_key(entity.name(), entity.fields())?;
            let assignments = columns
                .iter()
                .map(|(field, _)| format!("{} = ?", quote_ident(&field.column())))
                .collect::<Vec<_>>()
                .join(", ");
            let statement = format!(
                "UPDATE {} SET {} WHERE {} = ?",
                quote_ident(entity.table()),
                assignments,
                quote_ident(&pk_field.column())
            );

            let mut query = sqlx::query(&statement);
            for (field, value) in &columns {
                query = sql::bind_value(query, field, value);
            }

            self.stats.record_statement();
            query.bind(pk).execute(&self.pool).await?;
        }

        self.get_translation(entity, pk).await
    }

    async fn get_translation(
        &self,
        entity: &DerivedTranslationEntity,
        pk: i64,
    ) -> Result<Option<TranslationRow>, StoreError> {
        let pk_field = primary_key(entity.name(), entity.fields())?;
        let statement = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            sql::column_list(entity.fields()),
            quote_ident(entity.table()),
            quote_ident(&pk_field.column())
        );

        self.stats.record_statement();
        let row = sqlx::query(&statement)
            .bind(pk)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| decode_translation(&row, entity)).transpose()
    }

    /// Load the translations of every source row in `source_pks`, restricted
    /// by `filter`.
    ///
    /// Runs one query per [`PREFETCH_CHUNK_SIZE`] source keys, never one per
    /// source row.
    pub async fn fetch_translations(
        &self,
        entity: &DerivedTranslationEntity,
        source_pks: &[i64],
        filter: Option<&TranslationFilter>,
    ) -> Result<Vec<TranslationRow>, StoreError> {
        self.require_registered(entity.name(), entity.table())?;
        let pk_field = primary_key(entity.name(), entity.fields())?;
        let link_column = quote_ident(&entity.source_link_column());

        let language_values: Vec<Value> = filter
            .and_then(TranslationFilter::language_set)
            .map(|languages| languages.iter().map(|l| Value::from(l.as_str())).collect())
            .unwrap_or_default();

        // Filter conditions are shared by every chunk
        let mut conditions: Vec<String> = Vec::new();
        let mut bindings: Vec<(&FieldDescriptor, &Value)> = Vec::new();
        if let Some(filter) = filter {
            if filter.language_set().is_some() {
                let language_field = lookup_field(entity.name(), entity.fields(), LANGUAGE_FIELD)?;
                if language_values.is_empty() {
                    return Ok(Vec::new());
                }
                conditions.push(format!(
                    "{} IN ({})",
                    quote_ident(LANGUAGE_FIELD),
                    sql::placeholders(language_values.len())
                ));
                bindings.extend(language_values.iter().map(|v| (language_field, v)));
            }
            for (name, value) in filter.field_conditions() {
                let field = lookup_field(entity.name(), entity.fields(), name)?;
                conditions.push(condition(field, value));
                if !value.is_null() {
                    bindings.push((field, value));
                }
            }
        }

        let mut translations = Vec::new();

        for chunk in source_pks.chunks(PREFETCH_CHUNK_SIZE) {
            let mut statement = format!(
                "SELECT {} FROM {} WHERE {} IN ({})",
                sql::column_list(entity.fields()),
                quote_ident(entity.table()),
                link_column,
                sql::placeholders(chunk.len())
            );
            for condition in &conditions {
                statement.push_str(" AND ");
                statement.push_str(condition);
            }
            statement.push_str(&format!(
                " ORDER BY {}, {}",
                link_column,
                quote_ident(&pk_field.column())
            ));

            let mut query = sqlx::query(&statement);
            for pk in chunk {
                query = query.bind(*pk);
            }
            for (field, value) in &bindings {
                query = sql::bind_value(query, field, value);
            }

            self.stats.record_statement();
            self.stats.record_translation_fetch();
            let rows = query.fetch_all(&self.pool).await?;

            for row in &rows {
                translations.push(decode_translation(row, entity)?);
            }
        }

        debug!(
            "Fetched {} {} rows for {} source rows",
            translations.len(),
            entity.name(),
            source_pks.len()
        );

        Ok(translations)
    }

    async fn insert(&self, table: &str, columns: &[(&FieldDescriptor, &Value)]) -> Result<i64, StoreError> {
        let statement = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
        } else {
            let names = columns
                .iter()
                .map(|(field, _)| quote_ident(&field.column()))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table),
                names,
                sql::placeholders(columns.len())
            )
        };

        let mut query = sqlx::query(&statement);
        for (field, value) in columns {
            query = sql::bind_value(query, field, value);
        }

        self.stats.record_statement();
        let result = query.execute(&self.pool).await?;

        Ok(result.last_insert_rowid())
    }
}

fn require_integer_pk(entity: &str, fields: &[FieldDescriptor]) -> Result<(), StoreError> {
    match fields.iter().find(|f| f.primary_key) {
        Some(field) if matches!(field.kind, FieldKind::AutoId | FieldKind::Integer) => Ok(()),
        _ => Err(StoreError::UnsupportedPrimaryKey {
            entity: entity.to_string(),
        }),
    }
}

fn primary_key<'a>(entity: &str, fields: &'a [FieldDescriptor]) -> Result<&'a FieldDescriptor, StoreError> {
    fields
        .iter()
        .find(|f| f.primary_key)
        .ok_or_else(|| StoreError::UnsupportedPrimaryKey {
            entity: entity.to_string(),
        })
}

fn lookup_field<'a>(
    entity: &str,
    fields: &'a [FieldDescriptor],
    name: &str,
) -> Result<&'a FieldDescriptor, StoreError> {
    fields
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| StoreError::UnknownField {
            entity: entity.to_string(),
            field: name.to_string(),
        })
}

/// `column = ?`, or `column IS NULL` for a null value (which binds nothing).
fn condition(field: &FieldDescriptor, value: &Value) -> String {
    if value.is_null() {
        format!("{} IS NULL", quote_ident(&field.column()))
    } else {
        format!("{} = ?", quote_ident(&field.column()))
    }
}

/// Pair each value with its field, rejecting unknown, non-editable and
/// `reserved` fields.
fn writable_fields<'a>(
    entity: &str,
    fields: &'a [FieldDescriptor],
    values: &'a Record,
    reserved: &[&str],
) -> Result<Vec<(&'a FieldDescriptor, &'a Value)>, StoreError> {
    values
        .iter()
        .map(|(name, value)| {
            let field = lookup_field(entity, fields, name)?;
            if !field.editable || field.primary_key || reserved.contains(&name.as_str()) {
                return Err(StoreError::ReadOnlyField {
                    entity: entity.to_string(),
                    field: name.clone(),
                });
            }
            Ok((field, value))
        })
        .collect()
}

fn decode_source(
    row: &SqliteRow,
    pk_field: &FieldDescriptor,
    fields: &[FieldDescriptor],
) -> Result<SourceRow, StoreError> {
    let pk: i64 = row.try_get(pk_field.column().as_str())?;
    let mut values = Record::new();
    for field in fields.iter().filter(|f| !f.primary_key) {
        values.insert(field.name.clone(), sql::decode_value(row, field)?);
    }
    Ok(SourceRow::new(pk, values))
}

fn decode_translation(row: &SqliteRow, entity: &DerivedTranslationEntity) -> Result<TranslationRow, StoreError> {
    let pk_field = primary_key(entity.name(), entity.fields())?;
    let pk: i64 = row.try_get(pk_field.column().as_str())?;
    let source_pk: i64 = row.try_get(entity.source_link_column().as_str())?;
    let language: String = row.try_get(LANGUAGE_FIELD)?;

    let mut values = Record::new();
    for field in entity.fields() {
        if field.primary_key || field.name == LANGUAGE_FIELD || field.name == entity.source_link_name() {
            continue;
        }
        values.insert(field.name.clone(), sql::decode_value(row, field)?);
    }

    Ok(TranslationRow {
        pk,
        source_pk,
        language: LanguageCode::from_storage(language),
        values,
    })
}
