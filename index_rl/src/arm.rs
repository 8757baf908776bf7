// Arms: candidate indexes the agent can choose to materialize
use serde::{Deserialize, Serialize};

/// Anything the controller can hand back as a selection. Rewards are keyed
/// by `name`, so names must be unique within a catalog.
pub trait Arm {
    fn name(&self) -> &str;
}

/// A candidate secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexArm {
    pub index_name: String,
    pub table_name: String,
    pub index_cols: Vec<String>,
    #[serde(default)]
    pub include_cols: Vec<String>,
}

impl IndexArm {
    pub fn new(table_name: &str, index_cols: &[&str], include_cols: &[&str]) -> Self {
        let mut index_name = format!("ix_{}_{}", table_name, index_cols.join("_"));
        if !include_cols.is_empty() {
            index_name.push_str("_inc_");
            index_name.push_str(&include_cols.join("_"));
        }
        Self {
            index_name: index_name.to_lowercase(),
            table_name: table_name.to_string(),
            index_cols: index_cols.iter().map(|c| c.to_string()).collect(),
            include_cols: include_cols.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Arm for IndexArm {
    fn name(&self) -> &str {
        &self.index_name
    }
}

impl Arm for String {
    fn name(&self) -> &str {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_name_is_derived_from_columns() {
        let arm = IndexArm::new("Orders", &["CustomerId", "Date"], &["Total"]);
        assert_eq!(arm.name(), "ix_orders_customerid_date_inc_total");
        assert_eq!(arm.index_cols, vec!["CustomerId", "Date"]);
    }

    #[test]
    fn test_plain_index_has_no_include_suffix() {
        let arm = IndexArm::new("lineitem", &["l_orderkey"], &[]);
        assert_eq!(arm.name(), "ix_lineitem_l_orderkey");
        assert!(arm.include_cols.is_empty());
    }
}
