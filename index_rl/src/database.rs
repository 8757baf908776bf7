// Database backend strategy: index DDL per engine
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::arm::IndexArm;
use crate::error::AgentError;

/// Engine dialect, picked once from configuration and handed to whichever
/// collaborator materializes arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    Mssql,
}

impl DatabaseBackend {
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            DatabaseBackend::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            DatabaseBackend::Mssql => format!("[{}]", ident.replace(']', "]]")),
        }
    }

    fn qualified(&self, schema: &str, name: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(name))
    }

    fn column_list(&self, cols: &[String]) -> String {
        cols.iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_index_statement(&self, schema: &str, arm: &IndexArm) -> String {
        let include = if arm.include_cols.is_empty() {
            String::new()
        } else {
            format!(" INCLUDE ({})", self.column_list(&arm.include_cols))
        };
        let columns = self.column_list(&arm.index_cols);
        let table = self.qualified(schema, &arm.table_name);
        let index = self.quote_ident(&arm.index_name);
        match self {
            DatabaseBackend::Postgres => format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({}){}",
                index, table, columns, include
            ),
            DatabaseBackend::Mssql => format!(
                "CREATE NONCLUSTERED INDEX {} ON {} ({}){}",
                index, table, columns, include
            ),
        }
    }

    pub fn drop_index_statement(&self, schema: &str, arm: &IndexArm) -> String {
        match self {
            DatabaseBackend::Postgres => format!(
                "DROP INDEX IF EXISTS {}",
                self.qualified(schema, &arm.index_name)
            ),
            DatabaseBackend::Mssql => format!(
                "DROP INDEX IF EXISTS {} ON {}",
                self.quote_ident(&arm.index_name),
                self.qualified(schema, &arm.table_name)
            ),
        }
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseBackend::Postgres => write!(f, "postgres"),
            DatabaseBackend::Mssql => write!(f, "mssql"),
        }
    }
}

impl FromStr for DatabaseBackend {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DatabaseBackend::Postgres),
            "mssql" | "sqlserver" => Ok(DatabaseBackend::Mssql),
            other => Err(AgentError::configuration(format!(
                "unknown database backend '{}'",
                other
            ))),
        }
    }
}
