//! Identifier newtypes and small shared enums.
//!
//! Ids are opaque strings on the wire; the newtypes only keep them from being
//! mixed up with each other in signatures.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Id of a built-in or custom equipment type (`belt_weigher`, `tmd`, `eq_…`).
    EquipmentTypeId
);
string_id!(
    /// Id of a parameter template.
    TemplateId
);
string_id!(
    /// Id of a template parameter, unique within its template.
    ParamId
);
string_id!(
    /// Id assigned to a draft row by the document repository.
    DraftId
);

/// Short random id, 8 lowercase hex chars.
pub fn short_uid() -> String {
    let mut s = Uuid::new_v4().simple().to_string();
    s.truncate(8);
    s
}

/// Role of the person acting on the portal. Only `Admin` may delete
/// finalized reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Technician,
    Manager,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Technician => write!(f, "technician"),
            Role::Manager => write!(f, "manager"),
            Role::Admin => write!(f, "admin"),
        }
    }
}
