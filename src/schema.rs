//! The fixed three-column working schema.

/// Logical column types. `Str` is rendered as the neutral `STRING` keyword
/// and later substituted per dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Str,
    Timestamp,
}

impl ColumnType {
    pub fn sql_keyword(self) -> &'static str {
        match self {
            ColumnType::Int => "INT",
            ColumnType::Str => "STRING",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

/// Column layout shared by every table of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<Column>,
}

impl Default for TableSchema {
    fn default() -> Self {
        let col = |name: &str, ty| Column {
            name: name.to_string(),
            ty,
        };
        Self {
            columns: vec![
                col("c0", ColumnType::Int),
                col("c1", ColumnType::Str),
                col("c2", ColumnType::Timestamp),
            ],
        }
    }
}

impl TableSchema {
    /// Names of the string-typed columns.
    pub fn string_columns(&self) -> Vec<String> {
        self.columns_of(ColumnType::Str)
    }

    /// First timestamp column, used for day bucketing.
    pub fn timestamp_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.ty == ColumnType::Timestamp)
            .map(|c| c.name.as_str())
    }

    fn columns_of(&self, ty: ColumnType) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.ty == ty)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Dialect-neutral `CREATE TABLE` statement.
    pub fn create_table_sql(&self, table: &str) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.ty.sql_keyword()))
            .collect();
        format!("CREATE TABLE {} ({});", table, cols.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let schema = TableSchema::default();
        assert_eq!(
            schema.create_table_sql("abcdefgh"),
            "CREATE TABLE abcdefgh (c0 INT,c1 STRING,c2 TIMESTAMP);"
        );
        assert_eq!(schema.string_columns(), vec!["c1".to_string()]);
        assert_eq!(schema.timestamp_column(), Some("c2"));
    }
}
