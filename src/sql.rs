//! SQLite statements for registered entities.

use crate::schema::{Constraint, FieldDescriptor, FieldKind};
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::Row;

pub(crate) type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_literal(s),
        other => quote_literal(&other.to_string()),
    }
}

fn column_type(kind: &FieldKind) -> String {
    match kind {
        FieldKind::AutoId | FieldKind::Integer | FieldKind::ForeignKey(_) => "INTEGER".to_string(),
        FieldKind::Float => "REAL".to_string(),
        FieldKind::Boolean => "BOOLEAN".to_string(),
        FieldKind::Char { max_length } | FieldKind::Slug { max_length } => {
            format!("VARCHAR({max_length})")
        }
        FieldKind::Text | FieldKind::Json => "TEXT".to_string(),
    }
}

fn column_definition(field: &FieldDescriptor) -> String {
    let mut def = format!("{} {}", quote_ident(&field.column()), column_type(&field.kind));

    if field.primary_key {
        def.push_str(" PRIMARY KEY");
        if field.kind == FieldKind::AutoId {
            def.push_str(" AUTOINCREMENT");
        }
        return def;
    }

    if !field.null {
        def.push_str(" NOT NULL");
    }
    if field.unique {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = &field.default {
        def.push_str(" DEFAULT ");
        def.push_str(&literal(default));
    }
    if let FieldKind::ForeignKey(fk) = &field.kind {
        def.push_str(&format!(
            " REFERENCES {} ON DELETE {}",
            quote_ident(&fk.target_table),
            fk.on_delete.as_sql()
        ));
    }

    def
}

/// Column for a field name, resolving relation fields to their `_id` column.
fn constraint_column(fields: &[FieldDescriptor], name: &str) -> String {
    fields
        .iter()
        .find(|f| f.name == name)
        .map(FieldDescriptor::column)
        .unwrap_or_else(|| name.to_string())
}

fn constraint_definition(fields: &[FieldDescriptor], constraint: &Constraint) -> String {
    match constraint {
        Constraint::Unique { name, fields: on } => format!(
            "CONSTRAINT {} UNIQUE ({})",
            quote_ident(name),
            on.iter()
                .map(|f| quote_ident(&constraint_column(fields, f)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Constraint::Check { name, field, allowed } => format!(
            "CONSTRAINT {} CHECK ({} IN ({}))",
            quote_ident(name),
            quote_ident(&constraint_column(fields, field)),
            allowed
                .iter()
                .map(|v| quote_literal(v))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// `CREATE TABLE IF NOT EXISTS` for an entity.
pub(crate) fn create_table(table: &str, fields: &[FieldDescriptor], constraints: &[Constraint]) -> String {
    let mut parts: Vec<String> = fields.iter().map(column_definition).collect();
    parts.extend(constraints.iter().map(|c| constraint_definition(fields, c)));

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(table),
        parts.join(",\n    ")
    )
}

/// Quoted column list for `fields`.
pub(crate) fn column_list(fields: &[FieldDescriptor]) -> String {
    fields
        .iter()
        .map(|f| quote_ident(&f.column()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `?, ?, ?` with `count` placeholders.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Bind a value for `field`. JSON fields are stored as serialized text.
pub(crate) fn bind_value<'q>(query: SqliteQuery<'q>, field: &FieldDescriptor, value: &'q Value) -> SqliteQuery<'q> {
    match (value, &field.kind) {
        (Value::Null, _) => query.bind(Option::<String>::None),
        (other, FieldKind::Json) => query.bind(other.to_string()),
        (Value::Bool(b), _) => query.bind(*b),
        (Value::Number(n), _) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        (Value::String(s), _) => query.bind(s.as_str()),
        (other, _) => query.bind(other.to_string()),
    }
}

/// Read the value of `field` from a row.
pub(crate) fn decode_value(row: &SqliteRow, field: &FieldDescriptor) -> Result<Value, sqlx::Error> {
    let column = field.column();
    let column = column.as_str();

    let value = match &field.kind {
        FieldKind::AutoId | FieldKind::Integer | FieldKind::ForeignKey(_) => row
            .try_get::<Option<i64>, _>(column)?
            .map(Value::from),
        FieldKind::Float => row
            .try_get::<Option<f64>, _>(column)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        FieldKind::Boolean => row.try_get::<Option<bool>, _>(column)?.map(Value::Bool),
        FieldKind::Char { .. } | FieldKind::Slug { .. } | FieldKind::Text => row
            .try_get::<Option<String>, _>(column)?
            .map(Value::String),
        FieldKind::Json => match row.try_get::<Option<String>, _>(column)? {
            Some(raw) => Some(
                serde_json::from_str(&raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            ),
            None => None,
        },
    };

    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OnDelete;
    use serde_json::json;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_column_definitions() {
        assert_eq!(
            column_definition(&FieldDescriptor::auto_id()),
            "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"
        );
        assert_eq!(
            column_definition(&FieldDescriptor::slug("slug", 250).unique()),
            "\"slug\" VARCHAR(250) NOT NULL UNIQUE"
        );
        assert_eq!(
            column_definition(&FieldDescriptor::text("body").nullable()),
            "\"body\" TEXT"
        );
        assert_eq!(
            column_definition(&FieldDescriptor::boolean("draft").with_default(json!(true))),
            "\"draft\" BOOLEAN NOT NULL DEFAULT 1"
        );
        assert_eq!(
            column_definition(&FieldDescriptor::foreign_key("source", "Post", "blog_post", OnDelete::Cascade)),
            "\"source_id\" INTEGER NOT NULL REFERENCES \"blog_post\" ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_constraints_use_columns() {
        let fields = vec![
            FieldDescriptor::char("language", 8),
            FieldDescriptor::foreign_key("source", "Post", "blog_post", OnDelete::Cascade),
        ];
        let unique = Constraint::unique("blog_post_language_source_unique", ["language", "source"]);
        assert_eq!(
            constraint_definition(&fields, &unique),
            "CONSTRAINT \"blog_post_language_source_unique\" UNIQUE (\"language\", \"source_id\")"
        );

        let check = Constraint::Check {
            name: "t_language_valid".into(),
            field: "language".into(),
            allowed: vec!["es".into(), "o'x".into()],
        };
        assert_eq!(
            constraint_definition(&fields, &check),
            "CONSTRAINT \"t_language_valid\" CHECK (\"language\" IN ('es', 'o''x'))"
        );
    }

    #[test]
    fn test_create_table() {
        let sql = create_table(
            "blog_post",
            &[FieldDescriptor::auto_id(), FieldDescriptor::char("name", 250)],
            &[],
        );
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"blog_post\" (\n    \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n    \"name\" VARCHAR(250) NOT NULL\n)"
        );
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(0), "");
    }
}
