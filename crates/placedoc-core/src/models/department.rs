use serde::{Deserialize, Serialize};

/// Department, keyed by its unique name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Department {
    pub name: String,
}
