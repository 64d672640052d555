//! Schema introspection records
//!
//! [`ColumnInfo`] and [`IndexInfo`] are what the SQL backend port reports.
//! [`FieldDescriptor`] is the flattened shape the legacy caller expects, with
//! index classification folded into each column and one pseudo-row per
//! multi-column index.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Column metadata reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Base type name, lower case (`int`, `varchar`, `text`, ...)
    pub type_name: String,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub unsigned: bool,
    pub nullable: bool,
    pub default: Option<String>,
    pub auto_increment: bool,
}

/// Index metadata reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub primary: bool,
    pub unique: bool,
    /// Indexed columns in index order
    pub columns: Vec<String>,
}

impl IndexInfo {
    pub fn kind(&self) -> IndexKind {
        if self.primary {
            IndexKind::Primary
        } else if self.unique {
            IndexKind::Unique
        } else {
            IndexKind::Key
        }
    }
}

/// Index classification of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexKind {
    Primary,
    Unique,
    Key,
    #[default]
    #[serde(rename = "")]
    None,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Primary => "PRIMARY",
            IndexKind::Unique => "UNIQUE",
            IndexKind::Key => "KEY",
            IndexKind::None => "",
        }
    }

    /// Strength order used when a column belongs to several indexes
    fn rank(&self) -> u8 {
        match self {
            IndexKind::Primary => 3,
            IndexKind::Unique => 2,
            IndexKind::Key => 1,
            IndexKind::None => 0,
        }
    }
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type name used for multi-column index pseudo-rows
pub const INDEX_PSEUDO_TYPE: &str = "index";

/// One field (or multi-column index) in the legacy schema listing shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub attributes: String,
    pub index: IndexKind,
    #[serde(rename = "null")]
    pub nullable: bool,
    pub default: Option<String>,
    pub extra: String,
    /// Only set on multi-column index pseudo-rows
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index_fields: Vec<String>,
}

impl FieldDescriptor {
    /// True for the synthetic rows describing multi-column indexes
    pub fn is_index_row(&self) -> bool {
        self.field_type == INDEX_PSEUDO_TYPE
    }
}

/// Builds the legacy field listing from backend columns and indexes
///
/// Single-column indexes classify their column (the strongest index wins);
/// every multi-column index becomes an extra pseudo-row after the columns.
pub fn describe_fields(columns: &[ColumnInfo], indexes: &[IndexInfo]) -> Vec<FieldDescriptor> {
    let mut fields: Vec<FieldDescriptor> = columns
        .iter()
        .map(|column| {
            let index = indexes
                .iter()
                .filter(|idx| idx.columns.len() == 1 && idx.columns[0] == column.name)
                .map(IndexInfo::kind)
                .max_by_key(IndexKind::rank)
                .unwrap_or_default();

            FieldDescriptor {
                name: column.name.clone(),
                field_type: column.type_name.clone(),
                length: column.length,
                precision: column.precision,
                attributes: if column.unsigned {
                    "unsigned".to_string()
                } else {
                    String::new()
                },
                index,
                nullable: column.nullable,
                default: column.default.clone(),
                extra: if column.auto_increment {
                    "auto_increment".to_string()
                } else {
                    String::new()
                },
                index_fields: Vec::new(),
            }
        })
        .collect();

    fields.extend(
        indexes
            .iter()
            .filter(|idx| idx.columns.len() > 1)
            .map(|idx| FieldDescriptor {
                name: idx.name.clone(),
                field_type: INDEX_PSEUDO_TYPE.to_string(),
                length: None,
                precision: None,
                attributes: String::new(),
                index: idx.kind(),
                nullable: false,
                default: None,
                extra: String::new(),
                index_fields: idx.columns.clone(),
            }),
    );

    fields
}

/// Lock mode for `LOCK TABLES`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    ReadLocal,
    Write,
    LowPriorityWrite,
}

impl LockMode {
    pub fn as_sql(&self) -> &'static str {
        match self {
            LockMode::Read => "READ",
            LockMode::ReadLocal => "READ LOCAL",
            LockMode::Write => "WRITE",
            LockMode::LowPriorityWrite => "LOW_PRIORITY WRITE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, type_name: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            type_name: type_name.to_string(),
            ..Default::default()
        }
    }

    fn index(name: &str, primary: bool, unique: bool, columns: &[&str]) -> IndexInfo {
        IndexInfo {
            name: name.to_string(),
            primary,
            unique,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_single_column_indexes_classify_fields() {
        let columns = vec![
            ColumnInfo {
                unsigned: true,
                auto_increment: true,
                ..column("id", "int")
            },
            column("alias", "varchar"),
            column("pid", "int"),
            column("title", "varchar"),
        ];
        let indexes = vec![
            index("PRIMARY", true, true, &["id"]),
            index("alias", false, true, &["alias"]),
            index("pid", false, false, &["pid"]),
        ];

        let fields = describe_fields(&columns, &indexes);
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].index, IndexKind::Primary);
        assert_eq!(fields[0].attributes, "unsigned");
        assert_eq!(fields[0].extra, "auto_increment");
        assert_eq!(fields[1].index, IndexKind::Unique);
        assert_eq!(fields[2].index, IndexKind::Key);
        assert_eq!(fields[3].index, IndexKind::None);
    }

    #[test]
    fn test_strongest_index_wins() {
        let columns = vec![column("id", "int")];
        let indexes = vec![
            index("id_key", false, false, &["id"]),
            index("PRIMARY", true, true, &["id"]),
        ];
        let fields = describe_fields(&columns, &indexes);
        assert_eq!(fields[0].index, IndexKind::Primary);
    }

    #[test]
    fn test_multi_column_index_becomes_pseudo_row() {
        let columns = vec![column("pid", "int"), column("sorting", "int")];
        let indexes = vec![index("pid_sorting", false, false, &["pid", "sorting"])];

        let fields = describe_fields(&columns, &indexes);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].index, IndexKind::None);
        let pseudo = &fields[2];
        assert!(pseudo.is_index_row());
        assert_eq!(pseudo.name, "pid_sorting");
        assert_eq!(pseudo.index, IndexKind::Key);
        assert_eq!(pseudo.index_fields, vec!["pid", "sorting"]);
    }

    #[test]
    fn test_field_descriptor_serializes_legacy_keys() {
        let fields = describe_fields(&[column("id", "int")], &[index("PRIMARY", true, true, &["id"])]);
        let json = serde_json::to_value(&fields[0]).unwrap();
        assert_eq!(json["type"], "int");
        assert_eq!(json["index"], "PRIMARY");
        assert_eq!(json["null"], false);
        assert!(json.get("index_fields").is_none());
    }

    #[test]
    fn test_lock_mode_sql() {
        assert_eq!(LockMode::Write.as_sql(), "WRITE");
        assert_eq!(LockMode::LowPriorityWrite.as_sql(), "LOW_PRIORITY WRITE");
    }
}
