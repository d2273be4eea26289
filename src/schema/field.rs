use serde::Serialize;
use serde_json::Value;

/// What happens to referencing rows when the referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OnDelete {
    Cascade,
    Restrict,
    SetNull,
}

impl OnDelete {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::SetNull => "SET NULL",
        }
    }
}

/// Many-to-one reference to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    /// Name of the referenced entity
    pub target: String,
    /// Storage identifier of the referenced entity
    pub target_table: String,
    pub on_delete: OnDelete,
    /// Name of the back-reference collection on the referenced entity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    /// Auto-incrementing integer primary key
    AutoId,
    Integer,
    Float,
    Boolean,
    Char { max_length: u32 },
    Slug { max_length: u32 },
    Text,
    Json,
    ForeignKey(ForeignKey),
}

///
/// FieldDescriptor
///

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub primary_key: bool,
    pub unique: bool,
    pub null: bool,
    pub editable: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose_name: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_key: false,
            unique: false,
            null: false,
            editable: true,
            choices: None,
            default: None,
            verbose_name: None,
        }
    }

    /// The implicit `id` primary key.
    pub fn auto_id() -> Self {
        let mut field = Self::new("id", FieldKind::AutoId);
        field.primary_key = true;
        field.editable = false;
        field
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn char(name: impl Into<String>, max_length: u32) -> Self {
        Self::new(name, FieldKind::Char { max_length })
    }

    pub fn slug(name: impl Into<String>, max_length: u32) -> Self {
        Self::new(name, FieldKind::Slug { max_length })
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Json)
    }

    pub fn foreign_key(
        name: impl Into<String>,
        target: impl Into<String>,
        target_table: impl Into<String>,
        on_delete: OnDelete,
    ) -> Self {
        Self::new(
            name,
            FieldKind::ForeignKey(ForeignKey {
                target: target.into(),
                target_table: target_table.into(),
                on_delete,
                related_name: None,
            }),
        )
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    #[must_use]
    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.choices = Some(choices);
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn with_verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    pub fn is_relation(&self) -> bool {
        matches!(self.kind, FieldKind::ForeignKey(_))
    }

    pub fn foreign_key_target(&self) -> Option<&ForeignKey> {
        match &self.kind {
            FieldKind::ForeignKey(fk) => Some(fk),
            _ => None,
        }
    }

    /// Storage column name: relations are stored as `<name>_id`.
    pub fn column(&self) -> String {
        if self.is_relation() {
            format!("{}_id", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_id() {
        let id = FieldDescriptor::auto_id();
        assert_eq!(id.name, "id");
        assert!(id.primary_key);
        assert!(!id.editable);
        assert!(!id.is_relation());
    }

    #[test]
    fn test_builder_flags() {
        let slug = FieldDescriptor::slug("slug", 250).unique().nullable();
        assert!(slug.unique);
        assert!(slug.null);
        assert_eq!(slug.kind, FieldKind::Slug { max_length: 250 });
    }

    #[test]
    fn test_relation_column() {
        let author = FieldDescriptor::foreign_key("author", "Author", "blog_author", OnDelete::Cascade);
        assert!(author.is_relation());
        assert_eq!(author.column(), "author_id");
        assert_eq!(author.foreign_key_target().unwrap().target_table, "blog_author");
        assert_eq!(FieldDescriptor::text("body").column(), "body");
    }

    #[test]
    fn test_clone_is_independent() {
        let original = FieldDescriptor::char("name", 100).unique();
        let mut copy = original.clone();
        copy.unique = false;

        assert!(original.unique);
        assert!(!copy.unique);
    }
}
