use serde::Serialize;
use std::fmt::{self, Display};

///
/// Constraint
///

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    /// The combination of `fields` is unique across rows.
    Unique { name: String, fields: Vec<String> },

    /// `field` only holds one of `allowed`.
    Check {
        name: String,
        field: String,
        allowed: Vec<String>,
    },
}

impl Constraint {
    pub fn unique<S: Into<String>>(name: impl Into<String>, fields: impl IntoIterator<Item = S>) -> Self {
        Constraint::Unique {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Constraint::Unique { name, .. } | Constraint::Check { name, .. } => name,
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self, Constraint::Unique { .. })
    }

    /// Whether this is a unique constraint over exactly `fields`, in any order.
    pub fn is_unique_over(&self, fields: &[&str]) -> bool {
        match self {
            Constraint::Unique { fields: own, .. } => {
                own.len() == fields.len() && fields.iter().all(|f| own.iter().any(|o| o == f))
            }
            Constraint::Check { .. } => false,
        }
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Unique { name, fields } => write!(f, "{name}: UNIQUE ({})", fields.join(", ")),
            Constraint::Check { name, field, allowed } => {
                write!(f, "{name}: CHECK ({field} IN ({}))", allowed.join(", "))
            }
        }
    }
}
